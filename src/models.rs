pub mod api;
pub mod const_val;
pub mod invite;
pub mod profile;
pub mod settings;
pub mod users;
