use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::plugins::traits::NotificationSink;
use crate::utils::error::SinkError;

const SINK: &str = "email";

/// Sends alerts over SMTP to the configured account itself.
///
/// With `use_tls` the connection uses implicit TLS (SMTPS, usually port 465);
/// otherwise it is plaintext, which is only meant for local relays.
pub struct EmailSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    mailbox: Mailbox,
}

impl EmailSink {
    pub fn new(config: &SmtpConfig) -> Result<Self, SinkError> {
        let account = config
            .username
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| SinkError::config(SINK, "SMTP username (account address) is not set"))?;

        let address: Address = account
            .parse()
            .map_err(|e| SinkError::config(SINK, format!("invalid account address {}: {}", account, e)))?;
        let name = (!config.from_name.is_empty()).then(|| config.from_name.clone());
        let mailbox = Mailbox::new(name, address);

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| SinkError::config(SINK, e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder.port(config.port);
        if let Some(password) = &config.password {
            builder = builder.credentials(Credentials::new(account.to_string(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            mailbox,
        })
    }

    fn build_message(&self, subject: &str, html_body: &str) -> Result<Message, SinkError> {
        Message::builder()
            .from(self.mailbox.clone())
            .to(self.mailbox.clone())
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| SinkError::delivery(SINK, format!("could not build message: {}", e)))
    }
}

#[async_trait]
impl NotificationSink for EmailSink {
    fn name(&self) -> &str {
        SINK
    }

    async fn send(&self, subject: &str, html_body: &str) -> Result<(), SinkError> {
        let message = self.build_message(subject, html_body)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| SinkError::delivery(SINK, e.to_string()))?;

        tracing::info!(to = %self.mailbox.email, "alert email sent");
        Ok(())
    }
}
