//! Domain Model
//!
//! Sales, products, sellers and the seller-owned configuration the checkout
//! pipeline reads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;
use crate::status::CanonicalStatus;

// ============================================================================
// Gateways & payment methods
// ============================================================================

/// Supported payment providers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    MercadoPago,
    PushinPay,
    Efi,
    Beehive,
    Hypercash,
}

impl GatewayKind {
    pub const ALL: [GatewayKind; 5] = [
        GatewayKind::MercadoPago,
        GatewayKind::PushinPay,
        GatewayKind::Efi,
        GatewayKind::Beehive,
        GatewayKind::Hypercash,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayKind::MercadoPago => "mercadopago",
            GatewayKind::PushinPay => "pushinpay",
            GatewayKind::Efi => "efi",
            GatewayKind::Beehive => "beehive",
            GatewayKind::Hypercash => "hypercash",
        }
    }
}

impl std::fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GatewayKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lower)
            .ok_or_else(|| CoreError::UnknownValue {
                kind: "gateway",
                value: s.to_string(),
            })
    }
}

/// How the buyer pays
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Pix,
    Card,
    Boleto,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Pix => "pix",
            PaymentMethod::Card => "card",
            PaymentMethod::Boleto => "boleto",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Sale
// ============================================================================

/// Buyer contact information captured at checkout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub name: String,
    pub email: String,

    /// CPF/CNPJ digits
    #[serde(default)]
    pub document: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,
}

impl Buyer {
    /// Document with formatting characters stripped
    pub fn document_digits(&self) -> Option<String> {
        self.document
            .as_deref()
            .map(|d| d.chars().filter(char::is_ascii_digit).collect::<String>())
            .filter(|d| !d.is_empty())
    }

    /// First and remaining names, for providers that split them
    pub fn split_name(&self) -> (&str, &str) {
        let name = self.name.trim();
        match name.split_once(' ') {
            Some((first, rest)) => (first, rest.trim()),
            None => (name, ""),
        }
    }
}

/// Attribution metadata carried from the checkout URL
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
    #[serde(default)]
    pub utm_content: Option<String>,
    #[serde(default)]
    pub utm_term: Option<String>,
    #[serde(default)]
    pub src: Option<String>,
}

/// One purchase attempt and its lifecycle.
///
/// Status is only changed through `SaleStore::commit_transition`; sales are
/// never deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub product_id: String,
    pub seller_id: String,
    pub buyer: Buyer,

    /// Total charged, order bumps included
    pub amount: Decimal,

    pub gateway: GatewayKind,
    pub method: PaymentMethod,

    /// Provider-side payment id; unknown until the provider reports one
    pub transaction_id: Option<String>,

    pub status: CanonicalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// First time the sale reached `approved`
    pub approved_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub attribution: Attribution,

    /// Order bump ids accepted with this sale
    #[serde(default)]
    pub order_bumps: Vec<String>,
}

impl Sale {
    /// Create a new pending sale
    pub fn new(
        product: &Product,
        buyer: Buyer,
        amount: Decimal,
        gateway: GatewayKind,
        method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            product_id: product.id.clone(),
            seller_id: product.seller_id.clone(),
            buyer,
            amount,
            gateway,
            method,
            transaction_id: None,
            status: CanonicalStatus::Pending,
            created_at: now,
            updated_at: now,
            approved_at: None,
            attribution: Attribution::default(),
            order_bumps: Vec::new(),
        }
    }

    pub fn with_attribution(mut self, attribution: Attribution) -> Self {
        self.attribution = attribution;
        self
    }

    pub fn with_order_bumps(mut self, bumps: Vec<String>) -> Self {
        self.order_bumps = bumps;
        self
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// How a product is delivered once paid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    /// Access to a hosted member area; requires a member access grant
    MemberArea,
    /// Link sent by email
    ExternalLink,
    /// Nothing beyond the confirmation email
    EmailOnly,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub seller_id: String,
    pub name: String,
    pub price: Decimal,
    pub delivery: DeliveryType,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub delivery_url: Option<String>,
}

/// Add-on offer shown on a checkout
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderBump {
    pub id: String,
    pub seller_id: String,
    pub product_id: String,
    pub headline: String,
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Seller-controlled checkout settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CheckoutConfig {
    #[serde(default)]
    pub title: Option<String>,

    /// Restricts the methods offered; `None` offers everything available
    #[serde(default)]
    pub payment_methods: Option<Vec<PaymentMethod>>,

    #[serde(default)]
    pub order_bump_ids: Vec<String>,

    #[serde(default)]
    pub success_url: Option<String>,

    /// Opaque presentation settings (colors, banner, timer)
    #[serde(default)]
    pub appearance: serde_json::Value,
}

/// Public checkout page
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkout {
    pub public_id: String,
    pub product_id: String,
    #[serde(default)]
    pub config: CheckoutConfig,
}

// ============================================================================
// Seller account
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Seller {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Seller's SaaS plan subscription. `None` limits are unlimited.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscription {
    pub plan: String,
    pub active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default, alias = "max_produtos")]
    pub max_products: Option<u32>,

    /// Approved sales allowed per calendar month
    #[serde(default, alias = "max_pedidos_mes")]
    pub max_monthly_sales: Option<u32>,
}

impl Subscription {
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.is_none_or(|expires| expires > now)
    }
}

/// Named credential fields for one gateway (tokens, keys, certificates)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialSet(BTreeMap<String, String>);

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Field value; blank values count as absent
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some()
    }
}

/// All gateway credentials configured by one seller
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SellerCredentials(HashMap<GatewayKind, CredentialSet>);

impl SellerCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: GatewayKind, set: CredentialSet) -> Self {
        self.0.insert(kind, set);
        self
    }

    pub fn for_gateway(&self, kind: GatewayKind) -> Option<&CredentialSet> {
        self.0.get(&kind)
    }
}

/// Kind of seller-configured outbound integration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationKind {
    /// Generic JSON webhook, optionally HMAC-signed
    Webhook,
    /// Ads/attribution platform endpoint, bearer-token authenticated
    Attribution,
}

/// Seller-configured destination notified on status changes
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutboundIntegration {
    pub id: String,
    pub seller_id: String,
    pub kind: IntegrationKind,
    pub url: String,

    /// Statuses this integration subscribes to
    pub events: Vec<CanonicalStatus>,

    #[serde(default)]
    pub secret: Option<String>,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_true")]
    pub active: bool,
}

impl OutboundIntegration {
    pub fn wants(&self, status: CanonicalStatus) -> bool {
        self.active && self.events.contains(&status)
    }
}

fn default_true() -> bool {
    true
}
