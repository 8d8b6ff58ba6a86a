//! Outbound Events
//!
//! Queued side effects of a sale transition. The reconciler creates them inside
//! the transition commit; after that only the fan-out worker mutates them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::CanonicalStatus;

/// Retry backoff schedule (in seconds): 1min, 5min, 30min, 2hr, 24hr.
pub const BACKOFF_SCHEDULE_SECS: [i64; 5] = [60, 300, 1800, 7200, 86400];

/// Delay before the next attempt after `attempts` failed deliveries
pub fn backoff(attempts: u32) -> Duration {
    let index = (attempts.max(1) as usize - 1).min(BACKOFF_SCHEDULE_SECS.len() - 1);
    Duration::seconds(BACKOFF_SCHEDULE_SECS[index])
}

/// Which email the buyer receives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    /// Purchase confirmed, with member-area login details
    AccessGranted,
    /// Purchase confirmed, delivery link or plain receipt
    PurchaseConfirmed,
}

/// Where an event is delivered
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundTarget {
    Email {
        to: String,
        template: EmailTemplate,
    },
    Webhook {
        integration_id: String,
        url: String,
        #[serde(default)]
        secret: Option<String>,
    },
    Attribution {
        integration_id: String,
        url: String,
        #[serde(default)]
        token: Option<String>,
    },
}

impl OutboundTarget {
    /// Destination key, used for logging and per-destination ordering
    pub fn destination(&self) -> &str {
        match self {
            OutboundTarget::Email { to, .. } => to,
            OutboundTarget::Webhook { url, .. } | OutboundTarget::Attribution { url, .. } => url,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutboundTarget::Email { .. } => "email",
            OutboundTarget::Webhook { .. } => "webhook",
            OutboundTarget::Attribution { .. } => "attribution",
        }
    }
}

/// Delivery state of an outbound event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

/// A queued, independently retried unit of notification work
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub seller_id: String,
    pub target: OutboundTarget,

    /// Sale status that produced this event
    pub trigger: CanonicalStatus,

    pub payload: serde_json::Value,
    pub attempts: u32,
    pub status: DeliveryStatus,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,

    /// Worker currently holding the event, if claimed
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl OutboundEvent {
    /// Create a pending event, due immediately
    pub fn new(
        sale_id: Uuid,
        seller_id: impl Into<String>,
        target: OutboundTarget,
        trigger: CanonicalStatus,
        payload: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            sale_id,
            seller_id: seller_id.into(),
            target,
            trigger,
            payload,
            attempts: 0,
            status: DeliveryStatus::Pending,
            last_error: None,
            created_at: now,
            updated_at: now,
            next_attempt_at: now,
            claimed_by: None,
            claimed_at: None,
        }
    }

    /// Whether a worker may claim this event now.
    ///
    /// Claims older than `lease` are considered abandoned.
    pub fn is_claimable(&self, now: DateTime<Utc>, max_attempts: u32, lease: Duration) -> bool {
        let claim_free = match self.claimed_at {
            Some(at) => now - at >= lease,
            None => true,
        };
        let due = match self.status {
            DeliveryStatus::Pending => self.next_attempt_at <= now,
            DeliveryStatus::Failed => self.attempts < max_attempts && self.next_attempt_at <= now,
            DeliveryStatus::Sent => false,
        };
        claim_free && due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email_event() -> OutboundEvent {
        OutboundEvent::new(
            Uuid::new_v4(),
            "seller_1",
            OutboundTarget::Email {
                to: "buyer@example.com".into(),
                template: EmailTemplate::PurchaseConfirmed,
            },
            CanonicalStatus::Approved,
            serde_json::json!({}),
        )
    }

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(backoff(1), Duration::seconds(60));
        assert_eq!(backoff(2), Duration::seconds(300));
        assert_eq!(backoff(5), Duration::seconds(86400));
        assert_eq!(backoff(40), Duration::seconds(86400));
    }

    #[test]
    fn test_pending_event_is_claimable() {
        let event = email_event();
        assert!(event.is_claimable(Utc::now(), 6, Duration::minutes(5)));
    }

    #[test]
    fn test_claimed_event_respects_lease() {
        let mut event = email_event();
        let now = Utc::now();
        event.claimed_by = Some("worker-a".into());
        event.claimed_at = Some(now);
        assert!(!event.is_claimable(now, 6, Duration::minutes(5)));
        assert!(event.is_claimable(now + Duration::minutes(6), 6, Duration::minutes(5)));
    }

    #[test]
    fn test_failed_event_waits_for_backoff_and_attempt_cap() {
        let mut event = email_event();
        let now = Utc::now();
        event.status = DeliveryStatus::Failed;
        event.attempts = 1;
        event.next_attempt_at = now + backoff(1);
        assert!(!event.is_claimable(now, 6, Duration::minutes(5)));
        assert!(event.is_claimable(now + Duration::seconds(61), 6, Duration::minutes(5)));

        event.attempts = 6;
        assert!(!event.is_claimable(now + Duration::days(2), 6, Duration::minutes(5)));
    }

    #[test]
    fn test_sent_event_is_never_claimable() {
        let mut event = email_event();
        event.status = DeliveryStatus::Sent;
        assert!(!event.is_claimable(Utc::now() + Duration::days(1), 6, Duration::minutes(5)));
    }
}
