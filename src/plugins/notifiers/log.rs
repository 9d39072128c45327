use async_trait::async_trait;

use crate::plugins::traits::NotificationSink;
use crate::utils::error::SinkError;

/// Writes alerts to the log. Useful as a fallback when no delivery channel
/// is configured, and in dry runs.
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        LogSink
    }
}

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, subject: &str, html_body: &str) -> Result<(), SinkError> {
        tracing::info!(target: "hotdeal_watcher::alerts", subject, body = html_body, "deal alert");
        Ok(())
    }
}
