//! Renders diff results into alert messages and hands them to every sink.

use std::sync::Arc;

use crate::engine::DiffResult;
use crate::models::Listing;
use crate::plugins::traits::NotificationSink;

/// A rendered alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub html_body: String,
}

/// Escapes text for interpolation into HTML element content or a quoted
/// attribute value.
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn link(href: &str, text: &str) -> String {
    format!("<a href=\"{}\">{}</a>", escape_html(href), escape_html(text))
}

fn render_initial(keyword: &str, search_url: &str, first: &Listing) -> AlertMessage {
    let label = if first.price.is_empty() {
        first.title.clone()
    } else {
        format!("{} ({})", first.title, first.price)
    };

    AlertMessage {
        subject: format!("[{}] Deal alert registered", keyword),
        html_body: format!(
            "<h2>{}</h2><p>{}</p>",
            link(search_url, &format!("All results for {}", keyword)),
            link(&first.link, &label)
        ),
    }
}

fn render_updates(keyword: &str, site: &str, listings: &[Listing]) -> AlertMessage {
    let body: String = listings
        .iter()
        .map(|listing| {
            let mut line = link(&listing.link, &listing.title);
            if !listing.price.is_empty() {
                line.push_str(&format!(" - {}", escape_html(&listing.price)));
            }
            if !listing.metadata.is_empty() {
                line.push_str(&format!(" <small>{}</small>", escape_html(&listing.metadata)));
            }
            format!("<p>{}</p>", line)
        })
        .collect();

    AlertMessage {
        subject: format!("[{}] {} new deal(s) on {}", keyword, listings.len(), site),
        html_body: body,
    }
}

/// Renders `diff` for a pair; `None` when there is nothing to deliver.
pub fn render(keyword: &str, site: &str, search_url: &str, diff: &DiffResult) -> Option<AlertMessage> {
    match diff {
        DiffResult::NoChange => None,
        DiffResult::Initial(first) => Some(render_initial(keyword, search_url, first)),
        DiffResult::Updates(listings) if listings.is_empty() => None,
        DiffResult::Updates(listings) => Some(render_updates(keyword, site, listings)),
    }
}

/// Outcome of handing one message to all sinks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub accepted: usize,
}

/// Fans a message out to every sink. Failures are logged and never
/// propagated: once state is saved a lost alert is not retried.
pub struct Notifier {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl Notifier {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub async fn dispatch(&self, message: &AlertMessage) -> DispatchReport {
        let mut report = DispatchReport {
            attempted: self.sinks.len(),
            accepted: 0,
        };

        for sink in &self.sinks {
            match sink.send(&message.subject, &message.html_body).await {
                Ok(()) => report.accepted += 1,
                Err(e) => tracing::error!(sink = sink.name(), subject = %message.subject, "alert not delivered: {}", e),
            }
        }
        report
    }

    /// Renders and dispatches `diff`. Sinks are not called for `NoChange`.
    pub async fn notify(
        &self,
        keyword: &str,
        site: &str,
        search_url: &str,
        diff: &DiffResult,
    ) -> DispatchReport {
        match render(keyword, site, search_url, diff) {
            Some(message) => self.dispatch(&message).await,
            None => DispatchReport::default(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::utils::error::SinkError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every message it receives; optionally fails each send.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) fail: bool,
        pub(crate) received: Mutex<Vec<AlertMessage>>,
    }

    impl RecordingSink {
        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub(crate) fn messages(&self) -> Vec<AlertMessage> {
            self.received.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        fn name(&self) -> &str {
            if self.fail { "failing" } else { "recording" }
        }

        async fn send(&self, subject: &str, html_body: &str) -> Result<(), SinkError> {
            self.received.lock().unwrap().push(AlertMessage {
                subject: subject.to_string(),
                html_body: html_body.to_string(),
            });
            if self.fail {
                return Err(SinkError::delivery("failing", "smtp connection refused"));
            }
            Ok(())
        }
    }

    fn deal(id: &str, title: &str, price: &str) -> Listing {
        Listing::new(id, title, format!("https://www.algumon.com/l/d/{}", id)).with_price(price)
    }

    #[test]
    fn test_no_change_renders_nothing() {
        assert!(render("ssd", "algumon", "https://x", &DiffResult::NoChange).is_none());
        assert!(render("ssd", "algumon", "https://x", &DiffResult::Updates(vec![])).is_none());
    }

    #[test]
    fn test_initial_message() {
        let diff = DiffResult::Initial(deal("100", "SSD 1TB", "89,000원"));
        let message = render("ssd", "algumon", "https://www.algumon.com/search/ssd", &diff).unwrap();

        assert_eq!(message.subject, "[ssd] Deal alert registered");
        assert_eq!(
            message.html_body,
            "<h2><a href=\"https://www.algumon.com/search/ssd\">All results for ssd</a></h2>\
             <p><a href=\"https://www.algumon.com/l/d/100\">SSD 1TB (89,000원)</a></p>"
        );
    }

    #[test]
    fn test_updates_keep_newest_first_order() {
        let diff = DiffResult::Updates(vec![
            deal("103", "SSD 4TB", "299,000원").with_metadata("쿠팡|무료배송"),
            deal("102", "SSD 2TB", ""),
        ]);
        let message = render("ssd", "algumon", "https://x", &diff).unwrap();

        assert_eq!(message.subject, "[ssd] 2 new deal(s) on algumon");
        assert_eq!(
            message.html_body,
            "<p><a href=\"https://www.algumon.com/l/d/103\">SSD 4TB</a> - 299,000원 <small>쿠팡|무료배송</small></p>\
             <p><a href=\"https://www.algumon.com/l/d/102\">SSD 2TB</a></p>"
        );
    }

    #[test]
    fn test_listing_text_is_escaped() {
        let mut listing = deal("1", "<script>alert('x')</script> & \"free\"", "1원");
        listing.link = "https://example.com/?a=1&b=\"2\"".to_string();
        let message = render("k", "s", "https://x", &DiffResult::Updates(vec![listing])).unwrap();

        assert!(message.html_body.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; &quot;free&quot;"));
        assert!(message.html_body.contains("href=\"https://example.com/?a=1&amp;b=&quot;2&quot;\""));
        assert!(!message.html_body.contains("<script>"));
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures_and_reaches_every_sink() {
        let failing = Arc::new(RecordingSink::failing());
        let recording = Arc::new(RecordingSink::default());
        let notifier = Notifier::new(vec![
            failing.clone() as Arc<dyn NotificationSink>,
            recording.clone() as Arc<dyn NotificationSink>,
        ]);
        assert_eq!(notifier.sink_count(), 2);

        let report = notifier
            .notify("ssd", "algumon", "https://x", &DiffResult::Initial(deal("1", "SSD", "")))
            .await;

        assert_eq!(report, DispatchReport { attempted: 2, accepted: 1 });
        assert_eq!(failing.messages().len(), 1);
        assert_eq!(recording.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_no_change_calls_no_sink() {
        let recording = Arc::new(RecordingSink::default());
        let notifier = Notifier::new(vec![recording.clone() as Arc<dyn NotificationSink>]);

        let report = notifier.notify("ssd", "algumon", "https://x", &DiffResult::NoChange).await;

        assert_eq!(report, DispatchReport::default());
        assert!(recording.messages().is_empty());
    }
}
