// Notification sink implementations
pub mod email;
pub mod discord;
pub mod log;

pub use email::EmailSink;
pub use discord::DiscordSink;
pub use log::LogSink;
