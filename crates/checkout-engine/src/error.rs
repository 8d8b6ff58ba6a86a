//! Engine Error Types

use thiserror::Error;
use uuid::Uuid;

use checkout_core::CoreError;
use checkout_gateways::GatewayError;

use crate::quota::LimitReason;

/// Result type alias
pub type Result<T> = std::result::Result<T, EngineError>;

/// Checkout pipeline errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Storage or directory failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Payment provider failure
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Seller's plan does not allow new checkouts
    #[error("Seller limit reached: {reason}")]
    SellerLimitReached { reason: LimitReason },

    /// Checkout, product, sale or event does not exist (or is not offered)
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Requested gateway/method pair is not configured for this checkout
    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Buyer input rejected
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Webhook body could not be parsed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Outbound delivery failed
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// Sale kept changing under the reconciler
    #[error("Transition conflict on sale {0}")]
    Conflict(Uuid),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Core(e) => e.is_retryable(),
            EngineError::Gateway(e) => e.is_retryable(),
            EngineError::Delivery(_) | EngineError::Conflict(_) => true,
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            EngineError::Gateway(e) => e.user_message(),
            EngineError::SellerLimitReached { .. } => {
                "This checkout is temporarily unavailable."
            }
            EngineError::NotFound { .. } => "Not found.",
            EngineError::GatewayUnavailable(_) => {
                "This payment method is not available for this product."
            }
            EngineError::InvalidRequest(_) => "Please check the information you entered.",
            EngineError::WebhookParse(_) => "Malformed notification.",
            _ => "An error occurred processing your request.",
        }
    }
}
