//! # checkout-core
//!
//! Domain model and storage ports for the checkout gateway.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       checkout-core                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │    Sale     │  │  Canonical  │  │  SaleStore /        │  │
//! │  │    Model    │──│   Status    │──│  AccountDirectory   │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sales move through the canonical status machine only via
//! `SaleStore::commit_transition`, which writes the status, the member access
//! grant and the outbound events as one unit.

pub mod access;
pub mod authorize;
pub mod error;
pub mod memory;
pub mod model;
pub mod outbound;
pub mod status;
pub mod store;

pub use access::{IssuedCredential, MemberAccessGrant};
pub use error::{CoreError, Result};
pub use memory::{MemoryAccountDirectory, MemorySaleStore, SeedData};
pub use model::{
    Attribution, Buyer, Checkout, CheckoutConfig, CredentialSet, DeliveryType, GatewayKind,
    IntegrationKind, OrderBump, OutboundIntegration, PaymentMethod, Product, Sale, Seller,
    SellerCredentials, Subscription,
};
pub use outbound::{backoff, DeliveryStatus, EmailTemplate, OutboundEvent, OutboundTarget};
pub use status::CanonicalStatus;
pub use store::{
    AccountDirectory, AnomalyKind, CommitOutcome, SaleStore, TransitionCommit, WebhookAnomaly,
};
