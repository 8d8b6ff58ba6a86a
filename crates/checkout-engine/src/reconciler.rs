//! Sale Reconciler
//!
//! Applies a canonical status to a sale. Every caller (webhooks, status polls)
//! goes through here, so redelivered and out-of-order notifications converge
//! on the same result.
//!
//! The decision and its effects (status, member access grant, outbound events)
//! are committed as one unit with a compare-and-swap on the status the decision
//! was based on. Losing a race means reloading and deciding again.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use checkout_core::{
    AccountDirectory, CanonicalStatus, CommitOutcome, DeliveryType, IssuedCredential,
    MemberAccessGrant, Sale, SaleStore, TransitionCommit,
};

use crate::error::{EngineError, Result};
use crate::events::{integration_events, welcome_email, MemberLogin};

/// Reloads allowed after a lost compare-and-swap
pub const MAX_COMMIT_RETRIES: usize = 3;

/// What `apply` did
#[derive(Clone, Debug)]
pub enum TransitionOutcome {
    /// Status changed and effects were queued
    Applied {
        sale: Sale,
        previous: CanonicalStatus,
        events_queued: usize,
    },
    /// Not an allowed transition from the current status; nothing changed.
    /// Carries the sale as loaded for the decision.
    Ignored { sale: Sale },
}

impl TransitionOutcome {
    pub fn status(&self) -> CanonicalStatus {
        match self {
            TransitionOutcome::Applied { sale, .. } | TransitionOutcome::Ignored { sale } => sale.status,
        }
    }
}

pub struct Reconciler {
    store: Arc<dyn SaleStore>,
    directory: Arc<dyn AccountDirectory>,
    member_area_url: String,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn SaleStore>,
        directory: Arc<dyn AccountDirectory>,
        member_area_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            directory,
            member_area_url: member_area_url.into(),
        }
    }

    /// Move a sale to `next` if the state machine allows it
    pub async fn apply(&self, sale_id: Uuid, next: CanonicalStatus) -> Result<TransitionOutcome> {
        for attempt in 0..=MAX_COMMIT_RETRIES {
            let sale = self
                .store
                .get_sale(sale_id)
                .await?
                .ok_or_else(|| EngineError::not_found("sale", sale_id))?;

            if !sale.status.can_transition_to(next) {
                tracing::debug!(
                    sale_id = %sale_id,
                    current = %sale.status,
                    requested = %next,
                    "Transition not allowed; ignoring"
                );
                return Ok(TransitionOutcome::Ignored { sale });
            }

            let previous = sale.status;
            let commit = self.plan(&sale, next).await?;
            let events_queued = commit.events.len();

            match self.store.commit_transition(commit).await? {
                CommitOutcome::Applied(sale) => {
                    tracing::info!(
                        sale_id = %sale_id,
                        gateway = %sale.gateway,
                        from = %previous,
                        status = %next,
                        events = events_queued,
                        "Sale transitioned"
                    );
                    return Ok(TransitionOutcome::Applied {
                        sale,
                        previous,
                        events_queued,
                    });
                }
                CommitOutcome::StatusMoved(current) => {
                    tracing::debug!(sale_id = %sale_id, attempt, current = %current, "Status moved during commit");
                }
                CommitOutcome::GrantExists => {
                    tracing::debug!(sale_id = %sale_id, attempt, "Access grant created concurrently");
                }
            }
        }

        tracing::warn!(sale_id = %sale_id, status = %next, "Gave up after repeated commit conflicts");
        Err(EngineError::Conflict(sale_id))
    }

    /// Build the commit for `sale → next` without writing anything
    async fn plan(&self, sale: &Sale, next: CanonicalStatus) -> Result<TransitionCommit> {
        let product = self
            .directory
            .product(&sale.product_id)
            .await?
            .ok_or_else(|| EngineError::not_found("product", &sale.product_id))?;
        let integrations = self.directory.integrations(&sale.seller_id).await?;
        let at = Utc::now();

        let mut events = Vec::new();
        let mut new_grant = None;

        if next == CanonicalStatus::Approved {
            let login = if product.delivery == DeliveryType::MemberArea {
                match self.store.find_grant(&sale.buyer.email, &product.id).await? {
                    Some(_) => Some(MemberLogin::Existing),
                    None => {
                        let credential = IssuedCredential::generate();
                        new_grant = Some(MemberAccessGrant::new(
                            &sale.buyer.email,
                            &product.id,
                            sale.id,
                            &credential,
                        ));
                        Some(MemberLogin::Issued {
                            password: credential.password,
                        })
                    }
                }
            } else {
                None
            };
            events.push(welcome_email(
                sale,
                &product,
                login.as_ref(),
                &self.member_area_url,
                at,
            ));
        }
        events.extend(integration_events(sale, &product, &integrations, next, at));

        Ok(TransitionCommit {
            sale_id: sale.id,
            expected: sale.status,
            next,
            new_grant,
            events,
            at,
        })
    }
}
