//! Hypercash Adapter
//!
//! Pix is rendered inline; card payments redirect to Hypercash's hosted page.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use checkout_core::{CredentialSet, GatewayKind, PaymentMethod};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::gateway::{CreatedPayment, PaymentGateway, PaymentRequest, PaymentSnapshot, Presentation};
use crate::http;
use crate::notification::Notification;

const KIND: GatewayKind = GatewayKind::Hypercash;

pub struct HypercashGateway {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HypercashGateway {
    pub fn from_credentials(credentials: &CredentialSet, config: &GatewayConfig) -> Result<Self> {
        let api_key = credentials
            .get("api_key")
            .ok_or_else(|| GatewayError::missing_field(KIND, "api_key"))?;
        Ok(Self {
            client: http::client(config.timeout)?,
            base_url: config.base_url(KIND).to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HypercashGateway {
    fn kind(&self) -> GatewayKind {
        KIND
    }

    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment> {
        let payment_method = match request.method {
            PaymentMethod::Pix => "PIX",
            PaymentMethod::Card => "CARD",
            PaymentMethod::Boleto => {
                return Err(GatewayError::UnsupportedMethod {
                    gateway: KIND,
                    method: request.method,
                })
            }
        };

        let mut customer = json!({
            "name": request.buyer.name,
            "email": request.buyer.email,
        });
        if let Some(document) = request.buyer.document_digits() {
            customer["document"] = json!(document);
        }
        if let Some(phone) = &request.buyer.phone {
            customer["phone"] = json!(phone);
        }

        let body = json!({
            "amount": http::two_decimals(request.amount),
            "currency": "BRL",
            "payment_method": payment_method,
            "description": request.description,
            "customer": customer,
            "external_id": request.external_reference,
            "callback_url": request.notification_url,
        });

        let payment: Payment = http::send_json(
            KIND,
            self.client
                .post(format!("{}/v1/payments", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;

        let id = http::id_string(&payment.id)
            .ok_or_else(|| GatewayError::decode(KIND, "payment without id"))?;

        let presentation = match request.method {
            PaymentMethod::Pix => {
                let pix = payment
                    .pix
                    .ok_or_else(|| GatewayError::decode(KIND, "pix payment without pix data"))?;
                Presentation::Pix {
                    qr_code: pix.copy_paste,
                    qr_code_base64: pix.qr_code_image,
                    expires_at: None,
                }
            }
            _ => Presentation::Redirect {
                url: payment
                    .checkout_url
                    .ok_or_else(|| GatewayError::decode(KIND, "card payment without checkout_url"))?,
            },
        };

        Ok(CreatedPayment {
            gateway_payment_id: Some(id),
            provider_status: payment.status,
            presentation,
        })
    }

    async fn payment_status(&self, gateway_payment_id: &str) -> Result<PaymentSnapshot> {
        let payment: Payment = http::send_json(
            KIND,
            self.client
                .get(format!("{}/v1/payments/{}", self.base_url, gateway_payment_id))
                .bearer_auth(&self.api_key),
        )
        .await?;

        Ok(PaymentSnapshot {
            provider_status: payment.status,
            external_reference: payment.external_id,
        })
    }
}

#[derive(Deserialize)]
struct Payment {
    id: Value,
    status: String,
    #[serde(default)]
    external_id: Option<String>,
    #[serde(default)]
    pix: Option<PixData>,
    #[serde(default)]
    checkout_url: Option<String>,
}

#[derive(Deserialize)]
struct PixData {
    copy_paste: String,
    #[serde(default)]
    qr_code_image: Option<String>,
}

#[derive(Deserialize)]
struct WebhookBody {
    #[serde(default)]
    event: Option<String>,
    payment: WebhookPayment,
}

#[derive(Deserialize)]
struct WebhookPayment {
    id: Value,
    status: String,
    #[serde(default)]
    external_id: Option<String>,
}

pub(crate) fn parse_notification(body: &[u8]) -> Result<Vec<Notification>> {
    let webhook: WebhookBody =
        serde_json::from_slice(body).map_err(|e| GatewayError::parse(KIND, e.to_string()))?;

    if webhook.event.as_deref().is_some_and(|e| !e.starts_with("payment.")) {
        return Ok(Vec::new());
    }
    let id = http::id_string(&webhook.payment.id)
        .ok_or_else(|| GatewayError::parse(KIND, "notification without payment id"))?;

    Ok(vec![Notification::new(KIND, id)
        .with_status(webhook.payment.status)
        .with_reference(webhook.payment.external_id)])
}
