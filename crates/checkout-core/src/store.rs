//! Storage Ports
//!
//! Traits for the relational store and the seller account directory. The
//! checkout pipeline only talks to these; `memory` provides in-process
//! implementations.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::MemberAccessGrant;
use crate::error::Result;
use crate::model::{
    Checkout, GatewayKind, OrderBump, OutboundIntegration, Product, Sale, Seller,
    SellerCredentials, Subscription,
};
use crate::outbound::OutboundEvent;
use crate::status::CanonicalStatus;

/// Everything a status transition writes, committed as one unit
#[derive(Clone, Debug)]
pub struct TransitionCommit {
    pub sale_id: Uuid,

    /// Status the decision was based on; the commit fails if it moved
    pub expected: CanonicalStatus,

    pub next: CanonicalStatus,

    /// Grant to create; the commit fails if one already exists for its key
    pub new_grant: Option<MemberAccessGrant>,

    pub events: Vec<OutboundEvent>,
    pub at: DateTime<Utc>,
}

/// Result of a transition commit
#[derive(Clone, Debug)]
pub enum CommitOutcome {
    /// Everything was written
    Applied(Sale),

    /// Sale status was no longer `expected`; nothing was written
    StatusMoved(CanonicalStatus),

    /// A grant for the same (email, product) appeared; nothing was written
    GrantExists,
}

/// Why a webhook could not be applied
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// No sale matched the payment id or reference
    UnknownPayment,
    /// Reference matched a sale already bound to another payment id
    ReferenceMismatch,
    /// Notification signature did not verify
    InvalidSignature,
    /// Provider status lookup failed
    StatusLookupFailed,
    /// Reconciler could not apply the confirmed status
    TransitionFailed,
}

/// Operational anomaly recorded during webhook ingestion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookAnomaly {
    pub id: Uuid,
    pub kind: AnomalyKind,
    pub gateway: GatewayKind,
    pub provider_payment_id: Option<String>,
    pub external_reference: Option<String>,
    pub detail: String,
    pub received_at: DateTime<Utc>,
}

impl WebhookAnomaly {
    pub fn new(
        kind: AnomalyKind,
        gateway: GatewayKind,
        provider_payment_id: Option<&str>,
        external_reference: Option<&str>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            gateway,
            provider_payment_id: provider_payment_id.map(str::to_string),
            external_reference: external_reference.map(str::to_string),
            detail: detail.into(),
            received_at: Utc::now(),
        }
    }
}

/// Durable home for sales, grants, outbound events and anomalies
#[async_trait]
pub trait SaleStore: Send + Sync {
    /// Insert a newly created sale
    async fn insert_sale(&self, sale: &Sale) -> Result<()>;

    async fn get_sale(&self, id: Uuid) -> Result<Option<Sale>>;

    /// Find a sale by the provider's payment id
    async fn find_by_transaction(
        &self,
        gateway: GatewayKind,
        transaction_id: &str,
    ) -> Result<Option<Sale>>;

    /// Bind a provider payment id to a sale that has none yet.
    ///
    /// Returns the stored sale. If a different id is already bound the sale is
    /// returned unchanged; callers compare `transaction_id`.
    async fn attach_transaction(&self, id: Uuid, transaction_id: &str) -> Result<Option<Sale>>;

    /// Atomically apply a status transition with its grant and events
    async fn commit_transition(&self, commit: TransitionCommit) -> Result<CommitOutcome>;

    async fn find_grant(&self, email: &str, product_id: &str) -> Result<Option<MemberAccessGrant>>;

    /// Sales of a seller first approved at or after `since`
    async fn count_approved_since(&self, seller_id: &str, since: DateTime<Utc>) -> Result<u32>;

    async fn events_for_sale(&self, sale_id: Uuid) -> Result<Vec<OutboundEvent>>;

    async fn get_event(&self, id: Uuid) -> Result<Option<OutboundEvent>>;

    /// Claim up to `limit` due events in creation order for `worker`.
    ///
    /// Claiming is compare-and-swap: an event is handed to one worker at a
    /// time until its lease expires.
    async fn claim_due(
        &self,
        worker: &str,
        now: DateTime<Utc>,
        limit: usize,
        max_attempts: u32,
        lease: Duration,
    ) -> Result<Vec<OutboundEvent>>;

    /// Mark a claimed event delivered
    async fn mark_sent(&self, id: Uuid, worker: &str) -> Result<()>;

    /// Mark a claimed event failed and schedule its next attempt
    async fn mark_failed(
        &self,
        id: Uuid,
        worker: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Put a failed event back in the queue with a fresh attempt budget
    async fn requeue_event(&self, id: Uuid) -> Result<bool>;

    async fn record_anomaly(&self, anomaly: WebhookAnomaly) -> Result<()>;

    async fn anomalies(&self) -> Result<Vec<WebhookAnomaly>>;
}

/// Read-only view of seller accounts, catalog and settings
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn checkout(&self, public_id: &str) -> Result<Option<Checkout>>;

    async fn product(&self, id: &str) -> Result<Option<Product>>;

    async fn seller(&self, id: &str) -> Result<Option<Seller>>;

    async fn subscription(&self, seller_id: &str) -> Result<Option<Subscription>>;

    async fn credentials(&self, seller_id: &str) -> Result<SellerCredentials>;

    async fn order_bumps(&self, ids: &[String]) -> Result<Vec<OrderBump>>;

    async fn integrations(&self, seller_id: &str) -> Result<Vec<OutboundIntegration>>;

    async fn active_product_count(&self, seller_id: &str) -> Result<u32>;
}
