pub mod site;
pub mod notifier;

pub use site::SiteParser;
pub use notifier::NotificationSink;
