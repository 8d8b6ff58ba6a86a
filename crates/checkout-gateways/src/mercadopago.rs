//! MercadoPago Adapter
//!
//! Pix and boleto go through the Payments API; card payments go through a
//! Checkout Pro preference and a hosted redirect, so the payment id is only
//! known once the first webhook arrives.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;

use checkout_core::{CredentialSet, GatewayKind, PaymentMethod};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::gateway::{CreatedPayment, PaymentGateway, PaymentRequest, PaymentSnapshot, Presentation};
use crate::http;
use crate::notification::{Notification, WebhookContext};

const KIND: GatewayKind = GatewayKind::MercadoPago;

type HmacSha256 = Hmac<Sha256>;

/// MercadoPago client bound to one seller's access token
pub struct MercadoPagoGateway {
    client: Client,
    base_url: String,
    access_token: String,
}

impl MercadoPagoGateway {
    pub fn from_credentials(credentials: &CredentialSet, config: &GatewayConfig) -> Result<Self> {
        let access_token = credentials
            .get("access_token")
            .ok_or_else(|| GatewayError::missing_field(KIND, "access_token"))?;
        Ok(Self {
            client: http::client(config.timeout)?,
            base_url: config.base_url(KIND).to_string(),
            access_token: access_token.to_string(),
        })
    }

    async fn create_direct(&self, request: &PaymentRequest) -> Result<CreatedPayment> {
        let payment_method_id = match request.method {
            PaymentMethod::Pix => "pix",
            PaymentMethod::Boleto => "bolbradesco",
            PaymentMethod::Card => {
                return Err(GatewayError::UnsupportedMethod {
                    gateway: KIND,
                    method: request.method,
                })
            }
        };
        let (first_name, last_name) = request.buyer.split_name();
        let mut payer = json!({
            "email": request.buyer.email,
            "first_name": first_name,
            "last_name": last_name,
        });
        if let Some(document) = request.buyer.document_digits() {
            let doc_type = if document.len() > 11 { "CNPJ" } else { "CPF" };
            payer["identification"] = json!({ "type": doc_type, "number": document });
        }

        let body = json!({
            "transaction_amount": request.amount.to_f64(),
            "description": request.description,
            "payment_method_id": payment_method_id,
            "external_reference": request.external_reference,
            "notification_url": request.notification_url,
            "payer": payer,
        });

        let payment: PaymentResponse = http::send_json(
            KIND,
            self.client
                .post(format!("{}/v1/payments", self.base_url))
                .bearer_auth(&self.access_token)
                .header("X-Idempotency-Key", &request.external_reference)
                .json(&body),
        )
        .await?;

        let presentation = payment.presentation(request.method)?;
        let id = http::id_string(&payment.id)
            .ok_or_else(|| GatewayError::decode(KIND, "payment without id"))?;

        Ok(CreatedPayment {
            gateway_payment_id: Some(id),
            provider_status: payment.status,
            presentation,
        })
    }

    async fn create_preference(&self, request: &PaymentRequest) -> Result<CreatedPayment> {
        let body = json!({
            "items": [{
                "title": request.description,
                "quantity": 1,
                "unit_price": request.amount.to_f64(),
                "currency_id": "BRL",
            }],
            "payer": { "email": request.buyer.email },
            "external_reference": request.external_reference,
            "notification_url": request.notification_url,
            "payment_methods": {
                "excluded_payment_types": [{ "id": "ticket" }, { "id": "bank_transfer" }],
            },
        });

        let preference: PreferenceResponse = http::send_json(
            KIND,
            self.client
                .post(format!("{}/checkout/preferences", self.base_url))
                .bearer_auth(&self.access_token)
                .json(&body),
        )
        .await?;

        Ok(CreatedPayment {
            gateway_payment_id: None,
            provider_status: "pending".into(),
            presentation: Presentation::Redirect {
                url: preference.init_point,
            },
        })
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoGateway {
    fn kind(&self) -> GatewayKind {
        KIND
    }

    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment> {
        match request.method {
            PaymentMethod::Card => self.create_preference(request).await,
            PaymentMethod::Pix | PaymentMethod::Boleto => self.create_direct(request).await,
        }
    }

    async fn payment_status(&self, gateway_payment_id: &str) -> Result<PaymentSnapshot> {
        let payment: PaymentResponse = http::send_json(
            KIND,
            self.client
                .get(format!("{}/v1/payments/{}", self.base_url, gateway_payment_id))
                .bearer_auth(&self.access_token),
        )
        .await?;

        Ok(PaymentSnapshot {
            provider_status: payment.status,
            external_reference: payment.external_reference.filter(|r| !r.is_empty()),
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct PaymentResponse {
    id: serde_json::Value,
    status: String,
    #[serde(default)]
    external_reference: Option<String>,
    #[serde(default)]
    date_of_expiration: Option<String>,
    #[serde(default)]
    point_of_interaction: Option<PointOfInteraction>,
    #[serde(default)]
    transaction_details: Option<TransactionDetails>,
    #[serde(default)]
    barcode: Option<Barcode>,
}

impl PaymentResponse {
    fn presentation(&self, method: PaymentMethod) -> Result<Presentation> {
        match method {
            PaymentMethod::Pix => {
                let data = self
                    .point_of_interaction
                    .as_ref()
                    .and_then(|p| p.transaction_data.as_ref())
                    .ok_or_else(|| GatewayError::decode(KIND, "pix payment without transaction_data"))?;
                let qr_code = data
                    .qr_code
                    .clone()
                    .ok_or_else(|| GatewayError::decode(KIND, "pix payment without qr_code"))?;
                Ok(Presentation::Pix {
                    qr_code,
                    qr_code_base64: data.qr_code_base64.clone(),
                    expires_at: self
                        .date_of_expiration
                        .as_deref()
                        .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                        .map(|d| d.with_timezone(&Utc)),
                })
            }
            PaymentMethod::Boleto => {
                let url = self
                    .transaction_details
                    .as_ref()
                    .and_then(|t| t.external_resource_url.clone())
                    .ok_or_else(|| GatewayError::decode(KIND, "boleto without external_resource_url"))?;
                Ok(Presentation::Boleto {
                    url,
                    barcode: self.barcode.as_ref().and_then(|b| b.content.clone()),
                })
            }
            PaymentMethod::Card => Err(GatewayError::UnsupportedMethod {
                gateway: KIND,
                method,
            }),
        }
    }
}

#[derive(Deserialize)]
struct PointOfInteraction {
    #[serde(default)]
    transaction_data: Option<TransactionData>,
}

#[derive(Deserialize)]
struct TransactionData {
    #[serde(default)]
    qr_code: Option<String>,
    #[serde(default)]
    qr_code_base64: Option<String>,
}

#[derive(Deserialize)]
struct TransactionDetails {
    #[serde(default)]
    external_resource_url: Option<String>,
}

#[derive(Deserialize)]
struct Barcode {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct PreferenceResponse {
    init_point: String,
}

#[derive(Deserialize)]
struct WebhookBody {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    data: Option<WebhookData>,
    /// Legacy IPN feeds send the id as `resource`
    #[serde(default)]
    resource: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct WebhookData {
    #[serde(default)]
    id: serde_json::Value,
}

/// MercadoPago notifications carry only the payment id; the status is fetched
pub(crate) fn parse_notification(body: &[u8]) -> Result<Vec<Notification>> {
    let webhook: WebhookBody =
        serde_json::from_slice(body).map_err(|e| GatewayError::parse(KIND, e.to_string()))?;

    let topic = webhook.kind.or(webhook.topic).unwrap_or_default();
    if topic != "payment" {
        return Ok(Vec::new());
    }

    let id = webhook
        .data
        .as_ref()
        .and_then(|d| http::id_string(&d.id))
        .or_else(|| webhook.resource.as_ref().and_then(http::id_string))
        .ok_or_else(|| GatewayError::parse(KIND, "payment notification without id"))?;

    Ok(vec![Notification::new(KIND, id)])
}

/// Verify the `x-signature` header (`ts=…,v1=…`).
///
/// The signed manifest is `id:{data.id};request-id:{x-request-id};ts:{ts};`.
pub(crate) fn verify_signature(secret: &str, data_id: &str, context: &WebhookContext) -> bool {
    let Some(header) = context.header("x-signature") else {
        return false;
    };
    let mut ts = None;
    let mut v1 = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("ts", value)) => ts = Some(value.trim()),
            Some(("v1", value)) => v1 = Some(value.trim()),
            _ => {}
        }
    }
    let (Some(ts), Some(v1)) = (ts, v1) else {
        return false;
    };
    let Ok(expected) = hex::decode(v1) else {
        return false;
    };

    let id = if data_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        data_id.to_lowercase()
    } else {
        data_id.to_string()
    };
    let manifest = match context.header("x-request-id") {
        Some(request_id) => format!("id:{id};request-id:{request_id};ts:{ts};"),
        None => format!("id:{id};ts:{ts};"),
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(manifest.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::Buyer;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(method: PaymentMethod) -> PaymentRequest {
        PaymentRequest {
            amount: dec!(97.00),
            method,
            buyer: Buyer {
                name: "Joana Lima".into(),
                email: "joana@example.com".into(),
                document: Some("123.456.789-09".into()),
                phone: None,
            },
            external_reference: "sale-1".into(),
            description: "Curso de Fotografia".into(),
            notification_url: "https://shop.example.com/webhooks/mercadopago?ref=sale-1".into(),
        }
    }

    fn gateway(server: &MockServer) -> MercadoPagoGateway {
        let config = GatewayConfig::default().with_base_url(KIND, server.uri());
        let credentials = CredentialSet::new().with("access_token", "APP_USR-test");
        MercadoPagoGateway::from_credentials(&credentials, &config).unwrap()
    }

    #[test]
    fn test_missing_token_is_credentials_error() {
        let err = MercadoPagoGateway::from_credentials(&CredentialSet::new(), &GatewayConfig::default())
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_create_pix_payment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payments"))
            .and(header("authorization", "Bearer APP_USR-test"))
            .and(header("x-idempotency-key", "sale-1"))
            .and(body_partial_json(json!({
                "payment_method_id": "pix",
                "external_reference": "sale-1",
                "payer": { "identification": { "type": "CPF", "number": "12345678909" } }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 123_456_789,
                "status": "pending",
                "date_of_expiration": "2024-05-01T12:00:00.000-04:00",
                "point_of_interaction": {
                    "transaction_data": { "qr_code": "000201...", "qr_code_base64": "iVBOR" }
                }
            })))
            .mount(&server)
            .await;

        let created = gateway(&server).create_payment(&request(PaymentMethod::Pix)).await.unwrap();
        assert_eq!(created.gateway_payment_id.as_deref(), Some("123456789"));
        assert_eq!(created.provider_status, "pending");
        match created.presentation {
            Presentation::Pix { qr_code, qr_code_base64, expires_at } => {
                assert_eq!(qr_code, "000201...");
                assert_eq!(qr_code_base64.as_deref(), Some("iVBOR"));
                assert!(expires_at.is_some());
            }
            other => panic!("unexpected presentation: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_card_uses_preference_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/checkout/preferences"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "pref-1",
                "init_point": "https://www.mercadopago.com.br/checkout/v1/redirect?pref_id=pref-1"
            })))
            .mount(&server)
            .await;

        let created = gateway(&server).create_payment(&request(PaymentMethod::Card)).await.unwrap();
        assert!(created.gateway_payment_id.is_none());
        assert!(matches!(created.presentation, Presentation::Redirect { ref url } if url.contains("pref-1")));
    }

    #[tokio::test]
    async fn test_payment_status_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/payments/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 42,
                "status": "approved",
                "external_reference": "sale-1"
            })))
            .mount(&server)
            .await;

        let snapshot = gateway(&server).payment_status("42").await.unwrap();
        assert_eq!(snapshot.provider_status, "approved");
        assert_eq!(snapshot.external_reference.as_deref(), Some("sale-1"));
    }

    #[tokio::test]
    async fn test_unauthorized_is_credentials_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid access token"))
            .mount(&server)
            .await;

        let err = gateway(&server).payment_status("42").await.unwrap_err();
        assert!(matches!(err, GatewayError::Credentials { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_payment_notification() {
        let parsed = parse_notification(
            br#"{"action":"payment.updated","type":"payment","data":{"id":"987"}}"#,
        )
        .unwrap();
        assert_eq!(parsed, vec![Notification::new(KIND, "987")]);

        let legacy = parse_notification(br#"{"topic":"payment","resource":987}"#).unwrap();
        assert_eq!(legacy[0].provider_payment_id, "987");
    }

    #[test]
    fn test_non_payment_topics_are_ignored() {
        let parsed = parse_notification(br#"{"type":"merchant_order","data":{"id":"1"}}"#).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_signature_verification() {
        let secret = "mp-secret";
        let manifest = "id:987;request-id:req-1;ts:1704908010;";
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(manifest.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        let mut context = WebhookContext::default();
        context.headers.insert("x-request-id".into(), "req-1".into());
        context
            .headers
            .insert("x-signature".into(), format!("ts=1704908010,v1={signature}"));
        assert!(verify_signature(secret, "987", &context));
        assert!(!verify_signature("other-secret", "987", &context));
        assert!(!verify_signature(secret, "988", &context));

        context.headers.remove("x-signature");
        assert!(!verify_signature(secret, "987", &context));
    }
}
