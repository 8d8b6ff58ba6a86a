//! In-Memory Stores
//!
//! Development and test implementations of the storage ports. The sale store
//! keeps every table behind one lock so a transition commit is a single
//! write section.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::access::{normalize_email, MemberAccessGrant};
use crate::error::{CoreError, Result};
use crate::model::{
    Checkout, GatewayKind, OrderBump, OutboundIntegration, Product, Sale, Seller,
    SellerCredentials, Subscription,
};
use crate::outbound::{DeliveryStatus, OutboundEvent};
use crate::status::CanonicalStatus;
use crate::store::{
    AccountDirectory, CommitOutcome, SaleStore, TransitionCommit, WebhookAnomaly,
};

// ============================================================================
// Sale store
// ============================================================================

#[derive(Default)]
struct SaleTables {
    sales: HashMap<Uuid, Sale>,
    by_transaction: HashMap<(GatewayKind, String), Uuid>,
    grants: HashMap<(String, String), MemberAccessGrant>,
    /// Creation order
    events: Vec<OutboundEvent>,
    anomalies: Vec<WebhookAnomaly>,
}

impl SaleTables {
    fn event_mut(&mut self, id: Uuid) -> Result<&mut OutboundEvent> {
        self.events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CoreError::not_found("outbound event", id))
    }
}

/// In-memory sale store (for development and tests)
#[derive(Default)]
pub struct MemorySaleStore {
    tables: RwLock<SaleTables>,
}

impl MemorySaleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All grants, for inspection
    pub async fn grants(&self) -> Vec<MemberAccessGrant> {
        self.tables.read().await.grants.values().cloned().collect()
    }

    /// All events in creation order, for inspection
    pub async fn events(&self) -> Vec<OutboundEvent> {
        self.tables.read().await.events.clone()
    }
}

#[async_trait]
impl SaleStore for MemorySaleStore {
    async fn insert_sale(&self, sale: &Sale) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.sales.contains_key(&sale.id) {
            return Err(CoreError::Storage(format!("duplicate sale id {}", sale.id)));
        }
        if let Some(tx) = &sale.transaction_id {
            tables.by_transaction.insert((sale.gateway, tx.clone()), sale.id);
        }
        tables.sales.insert(sale.id, sale.clone());
        Ok(())
    }

    async fn get_sale(&self, id: Uuid) -> Result<Option<Sale>> {
        Ok(self.tables.read().await.sales.get(&id).cloned())
    }

    async fn find_by_transaction(
        &self,
        gateway: GatewayKind,
        transaction_id: &str,
    ) -> Result<Option<Sale>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_transaction
            .get(&(gateway, transaction_id.to_string()))
            .and_then(|id| tables.sales.get(id))
            .cloned())
    }

    async fn attach_transaction(&self, id: Uuid, transaction_id: &str) -> Result<Option<Sale>> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let Some(sale) = tables.sales.get_mut(&id) else {
            return Ok(None);
        };
        if sale.transaction_id.is_none() {
            sale.transaction_id = Some(transaction_id.to_string());
            sale.updated_at = Utc::now();
            tables
                .by_transaction
                .insert((sale.gateway, transaction_id.to_string()), id);
        }
        Ok(Some(sale.clone()))
    }

    async fn commit_transition(&self, commit: TransitionCommit) -> Result<CommitOutcome> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let current = tables
            .sales
            .get(&commit.sale_id)
            .map(|s| s.status)
            .ok_or_else(|| CoreError::not_found("sale", commit.sale_id))?;
        if current != commit.expected {
            return Ok(CommitOutcome::StatusMoved(current));
        }
        if let Some(grant) = &commit.new_grant {
            if tables.grants.contains_key(&grant.key()) {
                return Ok(CommitOutcome::GrantExists);
            }
        }

        // Checks passed; from here every write lands together.
        let sale = tables
            .sales
            .get_mut(&commit.sale_id)
            .ok_or_else(|| CoreError::not_found("sale", commit.sale_id))?;
        sale.status = commit.next;
        sale.updated_at = commit.at;
        if commit.next == CanonicalStatus::Approved && sale.approved_at.is_none() {
            sale.approved_at = Some(commit.at);
        }
        let updated = sale.clone();

        if let Some(grant) = commit.new_grant {
            tables.grants.insert(grant.key(), grant);
        }
        tables.events.extend(commit.events);

        Ok(CommitOutcome::Applied(updated))
    }

    async fn find_grant(&self, email: &str, product_id: &str) -> Result<Option<MemberAccessGrant>> {
        let key = (normalize_email(email), product_id.to_string());
        Ok(self.tables.read().await.grants.get(&key).cloned())
    }

    async fn count_approved_since(&self, seller_id: &str, since: DateTime<Utc>) -> Result<u32> {
        let tables = self.tables.read().await;
        let count = tables
            .sales
            .values()
            .filter(|s| s.seller_id == seller_id)
            .filter(|s| s.approved_at.is_some_and(|at| at >= since))
            .count();
        u32::try_from(count).map_err(|_| CoreError::Storage("approved sale count overflow".into()))
    }

    async fn events_for_sale(&self, sale_id: Uuid) -> Result<Vec<OutboundEvent>> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .iter()
            .filter(|e| e.sale_id == sale_id)
            .cloned()
            .collect())
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<OutboundEvent>> {
        let tables = self.tables.read().await;
        Ok(tables.events.iter().find(|e| e.id == id).cloned())
    }

    async fn claim_due(
        &self,
        worker: &str,
        now: DateTime<Utc>,
        limit: usize,
        max_attempts: u32,
        lease: Duration,
    ) -> Result<Vec<OutboundEvent>> {
        let mut tables = self.tables.write().await;
        let claimed = tables
            .events
            .iter_mut()
            .filter(|e| e.is_claimable(now, max_attempts, lease))
            .take(limit)
            .map(|event| {
                event.claimed_by = Some(worker.to_string());
                event.claimed_at = Some(now);
                event.clone()
            })
            .collect();
        Ok(claimed)
    }

    async fn mark_sent(&self, id: Uuid, worker: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let event = tables.event_mut(id)?;
        if event.claimed_by.as_deref() != Some(worker) {
            tracing::warn!(event_id = %id, worker, "Lost claim before marking sent");
            return Ok(());
        }
        event.attempts += 1;
        event.status = DeliveryStatus::Sent;
        event.last_error = None;
        event.updated_at = Utc::now();
        event.claimed_by = None;
        event.claimed_at = None;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        worker: &str,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let event = tables.event_mut(id)?;
        if event.claimed_by.as_deref() != Some(worker) {
            tracing::warn!(event_id = %id, worker, "Lost claim before marking failed");
            return Ok(());
        }
        event.attempts += 1;
        event.status = DeliveryStatus::Failed;
        event.last_error = Some(error.to_string());
        event.next_attempt_at = next_attempt_at;
        event.updated_at = Utc::now();
        event.claimed_by = None;
        event.claimed_at = None;
        Ok(())
    }

    async fn requeue_event(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let event = tables.event_mut(id)?;
        if event.status != DeliveryStatus::Failed {
            return Ok(false);
        }
        let now = Utc::now();
        event.status = DeliveryStatus::Pending;
        event.attempts = 0;
        event.next_attempt_at = now;
        event.updated_at = now;
        Ok(true)
    }

    async fn record_anomaly(&self, anomaly: WebhookAnomaly) -> Result<()> {
        self.tables.write().await.anomalies.push(anomaly);
        Ok(())
    }

    async fn anomalies(&self) -> Result<Vec<WebhookAnomaly>> {
        Ok(self.tables.read().await.anomalies.clone())
    }
}

// ============================================================================
// Account directory
// ============================================================================

/// Seed document for the in-memory directory
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub sellers: Vec<Seller>,
    #[serde(default)]
    pub subscriptions: HashMap<String, Subscription>,
    #[serde(default)]
    pub credentials: HashMap<String, SellerCredentials>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub checkouts: Vec<Checkout>,
    #[serde(default)]
    pub order_bumps: Vec<OrderBump>,
    #[serde(default)]
    pub integrations: Vec<OutboundIntegration>,
}

impl SeedData {
    /// Load a seed document from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// In-memory, read-only account directory
#[derive(Default)]
pub struct MemoryAccountDirectory {
    sellers: HashMap<String, Seller>,
    subscriptions: HashMap<String, Subscription>,
    credentials: HashMap<String, SellerCredentials>,
    products: HashMap<String, Product>,
    checkouts: HashMap<String, Checkout>,
    order_bumps: HashMap<String, OrderBump>,
    integrations: Vec<OutboundIntegration>,
}

impl MemoryAccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedData) -> Self {
        let mut directory = Self {
            subscriptions: seed.subscriptions,
            credentials: seed.credentials,
            integrations: seed.integrations,
            ..Self::default()
        };
        for seller in seed.sellers {
            directory = directory.with_seller(seller);
        }
        for product in seed.products {
            directory = directory.with_product(product);
        }
        for checkout in seed.checkouts {
            directory = directory.with_checkout(checkout);
        }
        for bump in seed.order_bumps {
            directory = directory.with_order_bump(bump);
        }
        directory
    }

    pub fn with_seller(mut self, seller: Seller) -> Self {
        self.sellers.insert(seller.id.clone(), seller);
        self
    }

    pub fn with_subscription(mut self, seller_id: &str, subscription: Subscription) -> Self {
        self.subscriptions.insert(seller_id.to_string(), subscription);
        self
    }

    pub fn with_credentials(mut self, seller_id: &str, credentials: SellerCredentials) -> Self {
        self.credentials.insert(seller_id.to_string(), credentials);
        self
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.products.insert(product.id.clone(), product);
        self
    }

    pub fn with_checkout(mut self, checkout: Checkout) -> Self {
        self.checkouts.insert(checkout.public_id.clone(), checkout);
        self
    }

    pub fn with_order_bump(mut self, bump: OrderBump) -> Self {
        self.order_bumps.insert(bump.id.clone(), bump);
        self
    }

    pub fn with_integration(mut self, integration: OutboundIntegration) -> Self {
        self.integrations.push(integration);
        self
    }
}

#[async_trait]
impl AccountDirectory for MemoryAccountDirectory {
    async fn checkout(&self, public_id: &str) -> Result<Option<Checkout>> {
        Ok(self.checkouts.get(public_id).cloned())
    }

    async fn product(&self, id: &str) -> Result<Option<Product>> {
        Ok(self.products.get(id).cloned())
    }

    async fn seller(&self, id: &str) -> Result<Option<Seller>> {
        Ok(self.sellers.get(id).cloned())
    }

    async fn subscription(&self, seller_id: &str) -> Result<Option<Subscription>> {
        Ok(self.subscriptions.get(seller_id).cloned())
    }

    async fn credentials(&self, seller_id: &str) -> Result<SellerCredentials> {
        Ok(self.credentials.get(seller_id).cloned().unwrap_or_default())
    }

    async fn order_bumps(&self, ids: &[String]) -> Result<Vec<OrderBump>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.order_bumps.get(id))
            .cloned()
            .collect())
    }

    async fn integrations(&self, seller_id: &str) -> Result<Vec<OutboundIntegration>> {
        Ok(self
            .integrations
            .iter()
            .filter(|i| i.seller_id == seller_id)
            .cloned()
            .collect())
    }

    async fn active_product_count(&self, seller_id: &str) -> Result<u32> {
        let count = self
            .products
            .values()
            .filter(|p| p.seller_id == seller_id && p.active)
            .count();
        u32::try_from(count).map_err(|_| CoreError::Storage("product count overflow".into()))
    }
}
