//! Beehive Adapter

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use checkout_core::{CredentialSet, GatewayKind, PaymentMethod};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::gateway::{CreatedPayment, PaymentGateway, PaymentRequest, PaymentSnapshot, Presentation};
use crate::http;
use crate::notification::Notification;

const KIND: GatewayKind = GatewayKind::Beehive;

pub struct BeehiveGateway {
    client: Client,
    base_url: String,
    secret_key: String,
}

impl BeehiveGateway {
    pub fn from_credentials(credentials: &CredentialSet, config: &GatewayConfig) -> Result<Self> {
        let secret_key = credentials
            .get("secret_key")
            .ok_or_else(|| GatewayError::missing_field(KIND, "secret_key"))?;
        Ok(Self {
            client: http::client(config.timeout)?,
            base_url: config.base_url(KIND).to_string(),
            secret_key: secret_key.to_string(),
        })
    }
}

fn method_name(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Pix => "pix",
        PaymentMethod::Card => "credit_card",
        PaymentMethod::Boleto => "boleto",
    }
}

#[async_trait]
impl PaymentGateway for BeehiveGateway {
    fn kind(&self) -> GatewayKind {
        KIND
    }

    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment> {
        let amount = http::cents(KIND, request.amount)?;
        let mut customer = json!({
            "name": request.buyer.name,
            "email": request.buyer.email,
        });
        if let Some(phone) = &request.buyer.phone {
            customer["phone"] = json!(phone);
        }
        if let Some(document) = request.buyer.document_digits() {
            let kind = if document.len() > 11 { "cnpj" } else { "cpf" };
            customer["document"] = json!({ "type": kind, "number": document });
        }

        let body = json!({
            "amount": amount,
            "paymentMethod": method_name(request.method),
            "customer": customer,
            "items": [{
                "title": request.description,
                "unitPrice": amount,
                "quantity": 1,
                "tangible": false,
            }],
            "postbackUrl": request.notification_url,
            "externalRef": request.external_reference,
        });

        let transaction: Transaction = http::send_json(
            KIND,
            self.client
                .post(format!("{}/v1/transactions", self.base_url))
                .bearer_auth(&self.secret_key)
                .json(&body),
        )
        .await?;

        let gateway_payment_id = http::id_string(&transaction.id)
            .ok_or_else(|| GatewayError::decode(KIND, "transaction without id"))?;
        let presentation = transaction.presentation(request.method)?;

        Ok(CreatedPayment {
            gateway_payment_id: Some(gateway_payment_id),
            provider_status: transaction.status,
            presentation,
        })
    }

    async fn payment_status(&self, gateway_payment_id: &str) -> Result<PaymentSnapshot> {
        let transaction: Transaction = http::send_json(
            KIND,
            self.client
                .get(format!("{}/v1/transactions/{}", self.base_url, gateway_payment_id))
                .bearer_auth(&self.secret_key),
        )
        .await?;

        Ok(PaymentSnapshot {
            provider_status: transaction.status,
            external_reference: transaction.external_ref,
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Transaction {
    id: Value,
    status: String,
    #[serde(default)]
    external_ref: Option<String>,
    #[serde(default)]
    pix: Option<PixData>,
    #[serde(default)]
    boleto: Option<BoletoData>,
    #[serde(default)]
    secure_url: Option<String>,
}

impl Transaction {
    fn presentation(&self, method: PaymentMethod) -> Result<Presentation> {
        match method {
            PaymentMethod::Pix => {
                let pix = self
                    .pix
                    .as_ref()
                    .ok_or_else(|| GatewayError::decode(KIND, "pix transaction without pix data"))?;
                Ok(Presentation::Pix {
                    qr_code: pix.qrcode.clone(),
                    qr_code_base64: None,
                    expires_at: pix
                        .expiration_date
                        .as_deref()
                        .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                        .map(|d| d.with_timezone(&Utc)),
                })
            }
            PaymentMethod::Boleto => {
                let boleto = self
                    .boleto
                    .as_ref()
                    .ok_or_else(|| GatewayError::decode(KIND, "boleto transaction without boleto data"))?;
                Ok(Presentation::Boleto {
                    url: boleto.url.clone(),
                    barcode: boleto.barcode.clone(),
                })
            }
            PaymentMethod::Card => self
                .secure_url
                .clone()
                .map(|url| Presentation::Redirect { url })
                .ok_or_else(|| GatewayError::decode(KIND, "card transaction without secureUrl")),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PixData {
    qrcode: String,
    #[serde(default)]
    expiration_date: Option<String>,
}

#[derive(Deserialize)]
struct BoletoData {
    url: String,
    #[serde(default)]
    barcode: Option<String>,
}

#[derive(Deserialize)]
struct WebhookBody {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    data: WebhookData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookData {
    id: Value,
    status: String,
    #[serde(default)]
    external_ref: Option<String>,
}

pub(crate) fn parse_notification(body: &[u8]) -> Result<Vec<Notification>> {
    let webhook: WebhookBody =
        serde_json::from_slice(body).map_err(|e| GatewayError::parse(KIND, e.to_string()))?;

    if webhook.kind.as_deref().is_some_and(|k| k != "transaction") {
        return Ok(Vec::new());
    }
    let id = http::id_string(&webhook.data.id)
        .ok_or_else(|| GatewayError::parse(KIND, "notification without transaction id"))?;

    Ok(vec![Notification::new(KIND, id)
        .with_status(webhook.data.status)
        .with_reference(webhook.data.external_ref)])
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
            amount: dec!(197),
            method,
            buyer: Buyer {
                name: "Rafaela Lima".into(),
                email: "rafa@example.com".into(),
                document: Some("123.456.789-09".into()),
                phone: Some("11999990000".into()),
            },
            external_reference: "sale-42".into(),
            description: "Curso".into(),
            notification_url: "https://shop.example.com/webhooks/beehive?ref=sale-42".into(),
        }
    }

    fn gateway(server: &MockServer) -> BeehiveGateway {
        let config = GatewayConfig::default().with_base_url(KIND, server.uri());
        let credentials = CredentialSet::new().with("secret_key", "sk_live_1");
        BeehiveGateway::from_credentials(&credentials, &config).unwrap()
    }

    #[tokio::test]
    async fn test_create_pix_transaction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transactions"))
            .and(header("authorization", "Bearer sk_live_1"))
            .and(body_partial_json(json!({
                "amount": 19700,
                "paymentMethod": "pix",
                "customer": { "document": { "type": "cpf", "number": "12345678909" } },
                "externalRef": "sale-42"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1234567,
                "status": "waiting_payment",
                "externalRef": "sale-42",
                "pix": { "qrcode": "00020126580014br.gov.bcb.pix", "expirationDate": "2024-05-02T10:00:00Z" }
            })))
            .mount(&server)
            .await;

        let created = gateway(&server).create_payment(&request(PaymentMethod::Pix)).await.unwrap();
        assert_eq!(created.gateway_payment_id.as_deref(), Some("1234567"));
        assert!(matches!(
            created.presentation,
            Presentation::Pix { expires_at: Some(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_card_redirects_to_secure_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transactions"))
            .and(body_partial_json(json!({ "paymentMethod": "credit_card" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 99,
                "status": "processing",
                "secureUrl": "https://pay.beehive.example/s/99"
            })))
            .mount(&server)
            .await;

        let created = gateway(&server).create_payment(&request(PaymentMethod::Card)).await.unwrap();
        match created.presentation {
            Presentation::Redirect { url } => assert_eq!(url, "https://pay.beehive.example/s/99"),
            other => panic!("unexpected presentation: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_is_credentials_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/transactions/5"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "invalid key" })))
            .mount(&server)
            .await;

        let err = gateway(&server).payment_status("5").await.unwrap_err();
        assert!(err.is_configuration());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_notification() {
        let parsed = parse_notification(
            br#"{"type":"transaction","data":{"id":1234567,"status":"paid","externalRef":"sale-42"}}"#,
        )
        .unwrap();
        assert_eq!(
            parsed,
            vec![Notification::new(KIND, "1234567")
                .with_status("paid")
                .with_reference(Some("sale-42".into()))]
        );
    }

    #[test]
    fn test_other_event_types_are_ignored() {
        let parsed =
            parse_notification(br#"{"type":"transfer","data":{"id":1,"status":"done"}}"#).unwrap();
        assert!(parsed.is_empty());
    }
}
