//! # checkout-engine
//!
//! Sale lifecycle orchestration on top of the payment gateway adapters.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       checkout-engine                         │
//! │  ┌─────────────┐   ┌─────────────┐   ┌────────────────────┐  │
//! │  │  Admission  │   │   Webhook   │   │      Fan-out       │  │
//! │  │ (checkout)  │   │  Ingestor   │   │      Worker        │  │
//! │  └──────┬──────┘   └──────┬──────┘   └─────────▲──────────┘  │
//! │         │                 │                    │ events      │
//! │         └──────► Reconciler (CAS commit) ──────┘             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every status change, whether it comes from a buyer polling or a provider
//! webhook, goes through the [`Reconciler`], so access grants and
//! notifications are produced exactly once per transition.

pub mod checkout;
pub mod error;
pub mod events;
pub mod fanout;
pub mod quota;
pub mod reconciler;
pub mod webhook;

pub use checkout::{AdmissionController, CheckoutView, PaySubmission, PaymentOutcome, SaleStatusView};
pub use error::{EngineError, Result};
pub use fanout::{
    retry_event, sale_events, EventSummary, FanoutConfig, FanoutWorker, LogEmailSender, OutboundDeliverer, SmtpConfig,
    SmtpEmailSender,
};
pub use quota::{LimitReason, QuotaSnapshot};
pub use reconciler::{Reconciler, TransitionOutcome};
pub use webhook::{NotificationOutcome, WebhookIngestor, WebhookReport};
