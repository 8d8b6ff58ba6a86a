//! PushinPay Adapter
//!
//! Pix-only provider. Amounts travel in cents; transaction ids are UUIDs whose
//! letter case differs between the API and webhooks, so ids are lowercased.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use checkout_core::{CredentialSet, GatewayKind, PaymentMethod};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::gateway::{CreatedPayment, PaymentGateway, PaymentRequest, PaymentSnapshot, Presentation};
use crate::http;
use crate::notification::Notification;

const KIND: GatewayKind = GatewayKind::PushinPay;

pub struct PushinPayGateway {
    client: Client,
    base_url: String,
    api_token: String,
}

impl PushinPayGateway {
    pub fn from_credentials(credentials: &CredentialSet, config: &GatewayConfig) -> Result<Self> {
        let api_token = credentials
            .get("api_token")
            .ok_or_else(|| GatewayError::missing_field(KIND, "api_token"))?;
        Ok(Self {
            client: http::client(config.timeout)?,
            base_url: config.base_url(KIND).to_string(),
            api_token: api_token.to_string(),
        })
    }
}

fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

#[async_trait]
impl PaymentGateway for PushinPayGateway {
    fn kind(&self) -> GatewayKind {
        KIND
    }

    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment> {
        if request.method != PaymentMethod::Pix {
            return Err(GatewayError::UnsupportedMethod {
                gateway: KIND,
                method: request.method,
            });
        }

        let body = json!({
            "value": http::cents(KIND, request.amount)?,
            "webhook_url": request.notification_url,
        });
        let cash_in: Transaction = http::send_json(
            KIND,
            self.client
                .post(format!("{}/api/pix/cashIn", self.base_url))
                .bearer_auth(&self.api_token)
                .header("Accept", "application/json")
                .json(&body),
        )
        .await?;

        let qr_code = cash_in
            .qr_code
            .ok_or_else(|| GatewayError::decode(KIND, "cashIn without qr_code"))?;

        Ok(CreatedPayment {
            gateway_payment_id: Some(normalize_id(&cash_in.id)),
            provider_status: cash_in.status,
            presentation: Presentation::Pix {
                qr_code,
                qr_code_base64: cash_in.qr_code_base64,
                expires_at: None,
            },
        })
    }

    async fn payment_status(&self, gateway_payment_id: &str) -> Result<PaymentSnapshot> {
        let transaction: Transaction = http::send_json(
            KIND,
            self.client
                .get(format!(
                    "{}/api/transactions/{}",
                    self.base_url,
                    normalize_id(gateway_payment_id)
                ))
                .bearer_auth(&self.api_token)
                .header("Accept", "application/json"),
        )
        .await?;

        Ok(PaymentSnapshot {
            provider_status: transaction.status,
            external_reference: None,
        })
    }
}

#[derive(Deserialize)]
struct Transaction {
    id: String,
    status: String,
    #[serde(default)]
    qr_code: Option<String>,
    #[serde(default)]
    qr_code_base64: Option<String>,
}

#[derive(Deserialize)]
struct WebhookBody {
    id: String,
    status: String,
}

pub(crate) fn parse_notification(body: &[u8]) -> Result<Vec<Notification>> {
    let webhook: WebhookBody =
        serde_json::from_slice(body).map_err(|e| GatewayError::parse(KIND, e.to_string()))?;
    Ok(vec![
        Notification::new(KIND, normalize_id(&webhook.id)).with_status(webhook.status),
    ])
}
