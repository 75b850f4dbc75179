pub mod short_code;
pub mod smart_to_string;
pub mod time_fmt;
