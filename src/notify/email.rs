use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

use super::{Notifier, content_for, qualify_sender};
use crate::database::Database;
use crate::database::models::{Endpoint, MonitoringSettings};
use crate::monitoring::TransitionEvent;

/// SMTP notification dispatcher
///
/// Recipients are resolved from the user directory on every dispatch since
/// the opted-in set can change between sweeps. Delivery is attempted
/// independently per recipient; one failed send never aborts the rest.
pub struct EmailNotifier {
    database: Arc<dyn Database>,
    sender_domain: Option<String>,
    timeout: Duration,
}

impl EmailNotifier {
    pub fn new(database: Arc<dyn Database>, sender_domain: Option<String>, timeout: Duration) -> Self {
        Self { database, sender_domain, timeout }
    }

    /// Port 465 speaks implicit TLS from the first byte; any other port
    /// connects in plaintext and upgrades via STARTTLS before login
    fn build_transport(
        &self,
        settings: &MonitoringSettings,
        user: &str,
        password: &str,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if settings.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)?
        };

        Ok(builder
            .port(settings.smtp_port)
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .timeout(Some(self.timeout))
            .build())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn dispatch(
        &self,
        event: TransitionEvent,
        endpoint: &Endpoint,
        settings: &MonitoringSettings,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let (Some(user), Some(password)) =
            (settings.smtp_user.as_deref(), settings.smtp_password.as_deref())
        else {
            debug!("SMTP credentials not configured; skipping notification");
            return Ok(());
        };

        let recipients = self.database.list_notifiable_recipients().await?;
        if recipients.is_empty() {
            info!("no users opted in to notifications; nothing to send");
            return Ok(());
        }

        let content = content_for(event, endpoint, settings, now);
        let sender = qualify_sender(user, self.sender_domain.as_deref());
        let from: Mailbox = format!("Site Monitor <{sender}>")
            .parse()
            .with_context(|| format!("invalid sender address '{sender}'"))?;

        let transport = self.build_transport(settings, user, password)?;

        for recipient in recipients {
            let to: Mailbox = match recipient.email.parse() {
                Ok(mailbox) => mailbox,
                Err(e) => {
                    warn!(email = %recipient.email, error = %e, "skipping invalid recipient address");
                    continue;
                }
            };

            let message = Message::builder()
                .from(from.clone())
                .to(to)
                .subject(content.subject.clone())
                .header(ContentType::TEXT_PLAIN)
                .body(content.body.clone())?;

            match transport.send(message).await {
                Ok(_) => {
                    info!(
                        endpoint = %endpoint.name,
                        recipient = %recipient.email,
                        event = ?event,
                        "sent notification email"
                    );
                }
                Err(e) => {
                    warn!(
                        endpoint = %endpoint.name,
                        recipient = %recipient.email,
                        error = %e,
                        "failed to send notification email"
                    );
                }
            }
        }

        Ok(())
    }
}
