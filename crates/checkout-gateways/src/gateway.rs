//! Payment Gateway Strategy Pattern
//!
//! Common interface for all payment providers, so the checkout and webhook
//! paths never branch on which provider a seller uses.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_gateways::{GatewayFactory, HttpGatewayFactory, PaymentRequest};
//!
//! let gateway = factory.build(GatewayKind::PushinPay, &credentials)?;
//! let created = gateway.create_payment(&request).await?;
//! let snapshot = gateway.payment_status(&created.gateway_payment_id.unwrap()).await?;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use checkout_core::{Buyer, CredentialSet, GatewayKind, PaymentMethod};

use crate::error::Result;

/// Request to create a payment with a provider
#[derive(Clone, Debug)]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub buyer: Buyer,

    /// Our sale id, echoed back by providers that support it
    pub external_reference: String,

    /// Statement/checkout description
    pub description: String,

    /// Webhook URL the provider should call for this payment
    pub notification_url: String,
}

/// How the buyer completes the payment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Presentation {
    Pix {
        /// Copy-paste ("copia e cola") code
        qr_code: String,
        /// Base64 PNG of the QR code, when the provider renders one
        #[serde(default)]
        qr_code_base64: Option<String>,
        #[serde(default)]
        expires_at: Option<DateTime<Utc>>,
    },
    Redirect {
        url: String,
    },
    Boleto {
        url: String,
        #[serde(default)]
        barcode: Option<String>,
    },
}

/// Result of creating a payment
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatedPayment {
    /// Provider payment id; `None` when the provider only assigns one after
    /// the buyer finishes a hosted checkout
    pub gateway_payment_id: Option<String>,

    /// Status in the provider's own vocabulary
    pub provider_status: String,

    pub presentation: Presentation,
}

/// Current state of a payment as reported by the provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSnapshot {
    pub provider_status: String,

    /// Our sale id, when the provider stores it
    pub external_reference: Option<String>,
}

/// Payment provider trait (Strategy pattern)
///
/// One implementation per provider. Implementations only talk to the
/// provider; they never write to storage.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn kind(&self) -> GatewayKind;

    /// Create a payment
    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment>;

    /// Query a payment's current provider status
    async fn payment_status(&self, gateway_payment_id: &str) -> Result<PaymentSnapshot>;
}

/// Builds a gateway bound to one seller's credentials.
///
/// Gateways are built per request so credentials, client certificates and
/// tokens never cross between sellers.
pub trait GatewayFactory: Send + Sync {
    fn build(&self, kind: GatewayKind, credentials: &CredentialSet) -> Result<Arc<dyn PaymentGateway>>;
}
