pub mod traits;
pub mod manager;
pub mod sites;
pub mod notifiers;

pub use manager::PluginManager;
pub use traits::{NotificationSink, SiteParser};
