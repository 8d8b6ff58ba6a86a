//! Buyer Email
//!
//! Renders queued email events and sends them over SMTP (`lettre`), or logs
//! them when no SMTP server is configured.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::Value;
use std::fmt::Write;
use tokio::sync::Mutex;

use checkout_core::{EmailTemplate, OutboundEvent, OutboundTarget};

use crate::error::{EngineError, Result};

/// Rendered email ready to send
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

fn text<'a>(payload: &'a Value, pointer: &str) -> Option<&'a str> {
    payload.pointer(pointer).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Render the email for an email event
pub fn render_email(event: &OutboundEvent) -> Result<EmailMessage> {
    let OutboundTarget::Email { to, template } = &event.target else {
        return Err(EngineError::Delivery(format!(
            "event {} is not an email",
            event.id
        )));
    };
    let payload = &event.payload;
    let product = text(payload, "/product/name").unwrap_or("sua compra");
    let buyer = text(payload, "/buyer/name").unwrap_or("cliente");

    let mut body = format!("Olá, {buyer}!\n\nSeu pagamento de \"{product}\" foi confirmado.\n");
    match template {
        EmailTemplate::AccessGranted => {
            let url = text(payload, "/access/url").unwrap_or_default();
            let login = text(payload, "/access/login").unwrap_or(to.as_str());
            let _ = write!(body, "\nAcesse a área de membros: {url}\nLogin: {login}\n");
            match text(payload, "/access/password") {
                Some(password) => {
                    let _ = write!(
                        body,
                        "Senha temporária: {password}\n\nRecomendamos trocar a senha no primeiro acesso.\n"
                    );
                }
                None => {
                    body.push_str("Use a senha que você já cadastrou; o novo conteúdo já está liberado.\n");
                }
            }
        }
        EmailTemplate::PurchaseConfirmed => {
            if let Some(url) = text(payload, "/delivery_url") {
                let _ = write!(body, "\nAcesse seu produto: {url}\n");
            }
        }
    }
    if let Some(sale_id) = text(payload, "/sale_id") {
        let _ = write!(body, "\nPedido: {sale_id}\n");
    }

    Ok(EmailMessage {
        to: to.clone(),
        subject: format!("Compra confirmada: {product}"),
        body,
    })
}

/// Email transport
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

// ============================================================================
// SMTP
// ============================================================================

/// SMTP settings
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

impl SmtpConfig {
    /// Create from environment variables; `None` when `SMTP_HOST` is unset
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok().filter(|h| !h.trim().is_empty())?;
        Some(Self {
            host,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(587),
            username: std::env::var("SMTP_USERNAME").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
            from: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| "Checkout <no-reply@localhost>".to_string()),
        })
    }
}

pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| EngineError::Delivery(format!("SMTP relay {}: {e}", config.host)))?
            .port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| EngineError::Delivery(format!("invalid SMTP_FROM: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| EngineError::Delivery(format!("invalid recipient {}: {e}", message.to)))?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| EngineError::Delivery(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| EngineError::Delivery(format!("SMTP: {e}")))?;
        tracing::info!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(())
    }
}

// ============================================================================
// Logging sender
// ============================================================================

/// Logs emails instead of sending them and keeps an outbox for inspection
#[derive(Default)]
pub struct LogEmailSender {
    outbox: Mutex<Vec<EmailMessage>>,
}

impl LogEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.outbox.lock().await.clone()
    }
}

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        tracing::info!(to = %message.to, subject = %message.subject, "Email (not sent, SMTP not configured)");
        self.outbox.lock().await.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::CanonicalStatus;
    use serde_json::json;
    use uuid::Uuid;

    fn email_event(template: EmailTemplate, payload: Value) -> OutboundEvent {
        OutboundEvent::new(
            Uuid::new_v4(),
            "seller_1",
            OutboundTarget::Email {
                to: "lia@example.com".into(),
                template,
            },
            CanonicalStatus::Approved,
            payload,
        )
    }

    #[test]
    fn test_access_email_includes_new_password() {
        let event = email_event(
            EmailTemplate::AccessGranted,
            json!({
                "product": { "name": "Curso de Violão" },
                "buyer": { "name": "Lia" },
                "access": {
                    "url": "https://members.example.com",
                    "login": "lia@example.com",
                    "password": "a1b2-c3d4-e5f6",
                    "existing_access": false
                }
            }),
        );
        let message = render_email(&event).unwrap();
        assert_eq!(message.subject, "Compra confirmada: Curso de Violão");
        assert!(message.body.contains("a1b2-c3d4-e5f6"));
        assert!(message.body.contains("https://members.example.com"));
    }

    #[test]
    fn test_existing_access_email_has_no_password() {
        let event = email_event(
            EmailTemplate::AccessGranted,
            json!({
                "product": { "name": "Curso" },
                "access": { "url": "https://m.example.com", "password": null, "existing_access": true }
            }),
        );
        let message = render_email(&event).unwrap();
        assert!(!message.body.contains("Senha temporária"));
        assert!(message.body.contains("Login: lia@example.com"));
    }

    #[test]
    fn test_non_email_event_is_rejected() {
        let event = OutboundEvent::new(
            Uuid::new_v4(),
            "seller_1",
            OutboundTarget::Webhook {
                integration_id: "x".into(),
                url: "http://localhost".into(),
                secret: None,
            },
            CanonicalStatus::Approved,
            json!({}),
        );
        assert!(render_email(&event).is_err());
    }

    #[tokio::test]
    async fn test_log_sender_keeps_outbox() {
        let sender = LogEmailSender::new();
        let message = EmailMessage {
            to: "lia@example.com".into(),
            subject: "Oi".into(),
            body: "Corpo".into(),
        };
        sender.send(&message).await.unwrap();
        assert_eq!(sender.sent().await, vec![message]);
    }
}
