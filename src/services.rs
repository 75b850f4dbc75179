pub mod accounts;
pub mod invites;
pub mod mailer;
pub mod media;
pub mod notifier;
pub mod ombi;
pub mod password;
pub mod provisioner;
pub mod settings;
pub mod states;
#[cfg(test)]
pub mod testing;
