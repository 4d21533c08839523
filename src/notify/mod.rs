pub mod dispatcher;
pub mod mailer;
pub mod templates;

pub use dispatcher::{DispatcherConfig, NotificationDispatcher};
pub use mailer::{BrevoMailer, EmailMessage, LogMailer, Mailbox, Mailer};
