//! Outbound Fan-out
//!
//! Delivers the events queued by sale transitions: buyer emails, seller
//! webhooks and attribution pings. Each event is claimed, delivered and
//! recorded on its own, so one failing destination never holds up another.
//! Delivery is at-least-once.

mod delivery;
mod email;
mod worker;

pub use delivery::{sign_payload, Deliverer, OutboundDeliverer, SIGNATURE_HEADER, TIMESTAMP_HEADER};
pub use email::{render_email, EmailMessage, EmailSender, LogEmailSender, SmtpConfig, SmtpEmailSender};
pub use worker::{FanoutConfig, FanoutWorker, SweepReport};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use checkout_core::authorize::{owns_event, owns_sale};
use checkout_core::{DeliveryStatus, OutboundEvent, SaleStore};

use crate::error::{EngineError, Result};

/// Event state safe to show to a seller (no payload, no secrets)
#[derive(Clone, Debug, Serialize)]
pub struct EventSummary {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub kind: &'static str,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
}

impl From<&OutboundEvent> for EventSummary {
    fn from(event: &OutboundEvent) -> Self {
        Self {
            id: event.id,
            sale_id: event.sale_id,
            kind: event.target.kind(),
            status: event.status,
            attempts: event.attempts,
            last_error: event.last_error.clone(),
            next_attempt_at: event.next_attempt_at,
        }
    }
}

/// Delivery state of every event a sale produced
pub async fn sale_events(store: &dyn SaleStore, sale_id: Uuid, seller_id: &str) -> Result<Vec<EventSummary>> {
    if !owns_sale(store, sale_id, seller_id).await? {
        return Err(EngineError::not_found("sale", sale_id));
    }
    let events = store.events_for_sale(sale_id).await?;
    Ok(events.iter().map(EventSummary::from).collect())
}

/// Put a failed event of `seller_id` back in the queue
pub async fn retry_event(store: &dyn SaleStore, event_id: Uuid, seller_id: &str) -> Result<EventSummary> {
    if !owns_event(store, event_id, seller_id).await? {
        return Err(EngineError::not_found("event", event_id));
    }
    if !store.requeue_event(event_id).await? {
        return Err(EngineError::InvalidRequest("only failed events can be retried".into()));
    }
    let event = store
        .get_event(event_id)
        .await?
        .ok_or_else(|| EngineError::not_found("event", event_id))?;
    tracing::info!(event_id = %event_id, seller_id, "Outbound event requeued");
    Ok(EventSummary::from(&event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::{CanonicalStatus, EmailTemplate, MemorySaleStore, OutboundTarget, TransitionCommit};
    use checkout_core::{Buyer, DeliveryType, GatewayKind, PaymentMethod, Product, Sale};
    use rust_decimal_macros::dec;

    async fn store_with_event() -> (MemorySaleStore, OutboundEvent) {
        let store = MemorySaleStore::new();
        let product = Product {
            id: "prod_1".into(),
            seller_id: "seller_1".into(),
            name: "Ebook".into(),
            price: dec!(10),
            delivery: DeliveryType::EmailOnly,
            active: true,
            delivery_url: None,
        };
        let sale = Sale::new(
            &product,
            Buyer {
                name: "Duda".into(),
                email: "duda@example.com".into(),
                document: None,
                phone: None,
            },
            dec!(10),
            GatewayKind::PushinPay,
            PaymentMethod::Pix,
        );
        store.insert_sale(&sale).await.unwrap();
        let event = OutboundEvent::new(
            sale.id,
            "seller_1",
            OutboundTarget::Email {
                to: "duda@example.com".into(),
                template: EmailTemplate::PurchaseConfirmed,
            },
            CanonicalStatus::Approved,
            serde_json::json!({}),
        );
        store
            .commit_transition(TransitionCommit {
                sale_id: sale.id,
                expected: CanonicalStatus::Pending,
                next: CanonicalStatus::Approved,
                new_grant: None,
                events: vec![event.clone()],
                at: Utc::now(),
            })
            .await
            .unwrap();
        (store, event)
    }

    #[tokio::test]
    async fn test_sale_events_are_scoped_to_seller() {
        let (store, event) = store_with_event().await;

        let summaries = sale_events(&store, event.sale_id, "seller_1").await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].kind, "email");

        let err = sale_events(&store, event.sale_id, "seller_2").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_retry_requires_ownership_and_failure() {
        let (store, event) = store_with_event().await;

        let err = retry_event(&store, event.id, "seller_2").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));

        let err = retry_event(&store, event.id, "seller_1").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidRequest(_)));

        let now = Utc::now();
        store
            .claim_due("w1", now, 10, 6, chrono::Duration::minutes(5))
            .await
            .unwrap();
        store
            .mark_failed(event.id, "w1", "HTTP 500", now + chrono::Duration::hours(2))
            .await
            .unwrap();

        let summary = retry_event(&store, event.id, "seller_1").await.unwrap();
        assert_eq!(summary.status, DeliveryStatus::Pending);
        assert_eq!(summary.attempts, 0);
    }
}
