//! Notification dispatch for job outcomes
//!
//! One notification event is dispatched per asset per tick, success or
//! failure. Delivery is best-effort: a transport error is logged and emitted
//! on the event bus, but never propagated - a dropped notification is an
//! observability gap, not a pipeline failure. The dispatcher never retries.

use crate::config::{Config, EmailSettings, SmsSettings};
use crate::types::{Event, NotificationEvent, NotificationMethod};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tokio::sync::broadcast;

/// Subject line for email notifications
const EMAIL_SUBJECT: &str = "Chart Collector Notification";

/// SMTP connection/command timeout
const SMTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Routes notification events to the configured channel
///
/// Channel settings are resolved once from the tick's configuration; the
/// dispatcher lives for one tick, like the configuration itself.
pub struct NotificationDispatcher {
    email: Option<EmailSettings>,
    sms: Option<SmsSettings>,
    client: reqwest::Client,
    event_tx: broadcast::Sender<Event>,
}

impl NotificationDispatcher {
    /// Build a dispatcher from the tick's configuration
    pub fn new(config: &Config, event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            email: config.email.clone(),
            sms: config.sms.clone(),
            client: reqwest::Client::new(),
            event_tx,
        }
    }

    /// Dispatch one notification, best-effort
    ///
    /// Unknown channel names log a warning and drop the event. Transport
    /// failures log and emit [`Event::NotificationFailed`]; nothing here can
    /// abort acquisition.
    pub async fn notify(&self, event: &NotificationEvent) {
        let Some(method) = NotificationMethod::from_name(&event.method) else {
            tracing::warn!(method = %event.method, "unknown notification method, dropping event");
            return;
        };

        let result = match method {
            NotificationMethod::Log => {
                tracing::info!(notification = %event.message, "notification");
                Ok(())
            }
            NotificationMethod::Email => self.send_email(&event.message).await,
            NotificationMethod::Sms => self.send_sms(&event.message).await,
        };

        match result {
            Ok(()) => {
                if method != NotificationMethod::Log {
                    tracing::info!(method = %method, "notification sent");
                }
                self.event_tx
                    .send(Event::NotificationSent {
                        method: method.as_str().to_string(),
                    })
                    .ok();
            }
            Err(error) => {
                tracing::error!(method = %method, error = %error, "failed to send notification");
                self.event_tx
                    .send(Event::NotificationFailed {
                        method: method.as_str().to_string(),
                        error,
                    })
                    .ok();
            }
        }
    }

    /// Compose and submit the message over SMTP (STARTTLS)
    async fn send_email(&self, body: &str) -> Result<(), String> {
        let Some(settings) = &self.email else {
            return Err("email settings not configured".to_string());
        };

        let from: Mailbox = settings
            .from_email
            .parse()
            .map_err(|e| format!("invalid from address: {e}"))?;
        let to: Mailbox = settings
            .to_email
            .parse()
            .map_err(|e| format!("invalid to address: {e}"))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(EMAIL_SUBJECT)
            .body(body.to_string())
            .map_err(|e| format!("failed to build message: {e}"))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_server)
            .map_err(|e| format!("SMTP relay setup failed: {e}"))?
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.smtp_user.clone(),
                settings.smtp_password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        transport
            .send(message)
            .await
            .map_err(|e| format!("SMTP send failed: {e}"))?;
        Ok(())
    }

    /// POST the message to the configured SMS gateway
    async fn send_sms(&self, body: &str) -> Result<(), String> {
        let Some(settings) = &self.sms else {
            return Err("sms settings not configured".to_string());
        };

        let response = self
            .client
            .post(&settings.api_url)
            .form(&[
                ("to", settings.to_phone.as_str()),
                ("message", body),
                ("api_key", settings.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| format!("SMS gateway request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!(
                "SMS gateway returned status {}",
                response.status().as_u16()
            ));
        }
        Ok(())
    }
}
