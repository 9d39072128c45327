use async_trait::async_trait;

use crate::utils::error::SinkError;

/// A destination for rendered deal alerts (email, Discord, log, ...).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;

    /// Delivers one message. Acceptance is fire-and-forget: once this returns
    /// `Ok` the message is the sink's responsibility.
    async fn send(&self, subject: &str, html_body: &str) -> Result<(), SinkError>;
}
