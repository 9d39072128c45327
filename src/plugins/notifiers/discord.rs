use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Node};
use serde_json::json;
use std::time::Duration;

use crate::plugins::traits::NotificationSink;
use crate::utils::error::SinkError;

const SINK: &str = "discord";
const EMBED_COLOR: u32 = 0xff5a36;
// Discord rejects embed descriptions longer than this.
const MAX_DESCRIPTION: usize = 4096;

pub struct DiscordSink {
    client: Client,
    webhook_url: String,
    username: String,
}

impl DiscordSink {
    pub fn new(webhook_url: impl Into<String>, username: impl Into<String>) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SinkError::config(SINK, e.to_string()))?;

        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
            username: username.into(),
        })
    }

    fn create_payload(&self, subject: &str, html_body: &str) -> serde_json::Value {
        let mut description = html_to_text(html_body);
        if description.chars().count() > MAX_DESCRIPTION {
            description = description.chars().take(MAX_DESCRIPTION - 1).collect();
            description.push('…');
        }

        json!({
            "username": self.username,
            "embeds": [{
                "title": subject,
                "description": description,
                "color": EMBED_COLOR,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }]
        })
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    fn name(&self) -> &str {
        SINK
    }

    async fn send(&self, subject: &str, html_body: &str) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&self.create_payload(subject, html_body))
            .send()
            .await
            .map_err(|e| SinkError::delivery(SINK, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::delivery(
                SINK,
                format!("webhook returned {}: {}", status, body),
            ));
        }

        tracing::debug!("discord webhook accepted alert");
        Ok(())
    }
}

/// Flattens an alert body to plain text. Links become `text (url)` and block
/// elements end their line.
pub(crate) fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    flatten(fragment.root_element(), &mut out);

    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn flatten(element: scraper::ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let Some(child_el) = scraper::ElementRef::wrap(child) else {
                    continue;
                };
                match el.name() {
                    "a" => {
                        let label: String = child_el.text().collect();
                        match el.attr("href") {
                            Some(href) if href != label.trim() => {
                                out.push_str(&format!("{} ({})", label.trim(), href));
                            }
                            _ => out.push_str(label.trim()),
                        }
                    }
                    "br" => out.push('\n'),
                    "p" | "div" | "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                        flatten(child_el, out);
                        out.push('\n');
                    }
                    _ => flatten(child_el, out),
                }
            }
            _ => {}
        }
    }
}
