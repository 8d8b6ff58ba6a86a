//! Delivery Transports

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;

use checkout_core::{OutboundEvent, OutboundTarget};

use super::email::{render_email, EmailSender};
use crate::error::{EngineError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of `{timestamp}.{body}`
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Unix timestamp included in the signature
pub const TIMESTAMP_HEADER: &str = "X-Signature-Timestamp";

/// Lets receivers drop redeliveries
const EVENT_ID_HEADER: &str = "X-Event-Id";

const MAX_ERROR_BODY: usize = 200;

/// Delivers one outbound event to its target
#[async_trait]
pub trait Deliverer: Send + Sync {
    async fn deliver(&self, event: &OutboundEvent) -> Result<()>;
}

/// Sign a webhook body for an integration secret
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| EngineError::Delivery(format!("invalid signing key: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Email over the configured sender, webhooks and attribution over HTTP
pub struct OutboundDeliverer {
    client: Client,
    email: Arc<dyn EmailSender>,
}

impl OutboundDeliverer {
    pub fn new(email: Arc<dyn EmailSender>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("checkout-gateway-webhooks/1.0")
            .build()
            .map_err(|e| EngineError::Delivery(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, email })
    }

    async fn post(&self, request: reqwest::RequestBuilder) -> Result<()> {
        let response = request
            .send()
            .await
            .map_err(|e| EngineError::Delivery(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(MAX_ERROR_BODY).collect();
        Err(EngineError::Delivery(format!("HTTP {}: {body}", status.as_u16())))
    }
}

#[async_trait]
impl Deliverer for OutboundDeliverer {
    async fn deliver(&self, event: &OutboundEvent) -> Result<()> {
        match &event.target {
            OutboundTarget::Email { .. } => {
                let message = render_email(event)?;
                self.email.send(&message).await
            }
            OutboundTarget::Webhook { url, secret, .. } => {
                let body = serde_json::to_vec(&event.payload)
                    .map_err(|e| EngineError::Delivery(e.to_string()))?;
                let mut request = self
                    .client
                    .post(url)
                    .header("Content-Type", "application/json")
                    .header(EVENT_ID_HEADER, event.id.to_string());
                if let Some(secret) = secret.as_deref().filter(|s| !s.is_empty()) {
                    let timestamp = chrono::Utc::now().timestamp();
                    request = request
                        .header(TIMESTAMP_HEADER, timestamp.to_string())
                        .header(SIGNATURE_HEADER, sign_payload(secret, timestamp, &body)?);
                }
                self.post(request.body(body)).await
            }
            OutboundTarget::Attribution { url, token, .. } => {
                let mut request = self
                    .client
                    .post(url)
                    .header(EVENT_ID_HEADER, event.id.to_string())
                    .json(&event.payload);
                if let Some(token) = token.as_deref().filter(|t| !t.is_empty()) {
                    request = request.bearer_auth(token);
                }
                self.post(request).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::email::LogEmailSender;
    use checkout_core::{CanonicalStatus, EmailTemplate};
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event(target: OutboundTarget) -> OutboundEvent {
        OutboundEvent::new(
            Uuid::new_v4(),
            "seller_1",
            target,
            CanonicalStatus::Approved,
            json!({ "event": "sale.approved", "product": { "id": "p1", "name": "Ebook" } }),
        )
    }

    fn deliverer(email: Arc<LogEmailSender>) -> OutboundDeliverer {
        OutboundDeliverer::new(email, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_signature_vector() {
        let signature = sign_payload("s3cret", 1_700_000_000, br#"{"event":"sale.approved"}"#).unwrap();
        assert_eq!(
            signature,
            "37c0b5c6aa027ef60c93472327dbc21e16ffedac8cfd1f20fc1982521ceb4fcf"
        );
    }

    #[tokio::test]
    async fn test_signed_webhook_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/crm"))
            .and(header_exists(SIGNATURE_HEADER))
            .and(header_exists(TIMESTAMP_HEADER))
            .and(body_json(json!({ "event": "sale.approved", "product": { "id": "p1", "name": "Ebook" } })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let event = event(OutboundTarget::Webhook {
            integration_id: "crm".into(),
            url: format!("{}/hooks/crm", server.uri()),
            secret: Some("s3cret".into()),
        });
        deliverer(Arc::new(LogEmailSender::new())).deliver(&event).await.unwrap();
    }

    #[tokio::test]
    async fn test_attribution_uses_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/events"))
            .and(header("authorization", "Bearer px-token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let event = event(OutboundTarget::Attribution {
            integration_id: "ads".into(),
            url: format!("{}/events", server.uri()),
            token: Some("px-token".into()),
        });
        deliverer(Arc::new(LogEmailSender::new())).deliver(&event).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_2xx_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let event = event(OutboundTarget::Webhook {
            integration_id: "crm".into(),
            url: server.uri(),
            secret: None,
        });
        let err = deliverer(Arc::new(LogEmailSender::new()))
            .deliver(&event)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Delivery failed: HTTP 500: boom");
    }

    #[tokio::test]
    async fn test_email_goes_through_sender() {
        let email = Arc::new(LogEmailSender::new());
        let event = event(OutboundTarget::Email {
            to: "buyer@example.com".into(),
            template: EmailTemplate::PurchaseConfirmed,
        });
        deliverer(email.clone()).deliver(&event).await.unwrap();

        let sent = email.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "buyer@example.com");
    }
}
