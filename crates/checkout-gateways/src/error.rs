//! Gateway Error Types

use thiserror::Error;

use checkout_core::{GatewayKind, PaymentMethod};

/// Result type alias
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Payment provider errors
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Network, DNS, TLS or provider 5xx failure
    #[error("{gateway} transport error: {message}")]
    Transport { gateway: GatewayKind, message: String },

    /// Provider did not answer within the configured timeout
    #[error("{gateway} request timed out")]
    Timeout { gateway: GatewayKind },

    /// Seller credentials missing, malformed, or refused by the provider
    #[error("{gateway} credentials rejected: {message}")]
    Credentials { gateway: GatewayKind, message: String },

    /// Local configuration problem (base URL, client construction)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider refused the request (non-auth 4xx)
    #[error("{gateway} rejected request ({status}): {message}")]
    Provider {
        gateway: GatewayKind,
        status: u16,
        message: String,
    },

    /// Provider response did not have the expected shape
    #[error("{gateway} response decode error: {message}")]
    Decode { gateway: GatewayKind, message: String },

    /// Gateway cannot take this payment method
    #[error("{gateway} does not support {method}")]
    UnsupportedMethod {
        gateway: GatewayKind,
        method: PaymentMethod,
    },

    /// Webhook body could not be parsed
    #[error("{gateway} notification parse error: {message}")]
    NotificationParse { gateway: GatewayKind, message: String },
}

impl GatewayError {
    pub fn missing_field(gateway: GatewayKind, field: &str) -> Self {
        GatewayError::Credentials {
            gateway,
            message: format!("missing credential field '{field}'"),
        }
    }

    pub fn decode(gateway: GatewayKind, message: impl Into<String>) -> Self {
        GatewayError::Decode {
            gateway,
            message: message.into(),
        }
    }

    pub fn parse(gateway: GatewayKind, message: impl Into<String>) -> Self {
        GatewayError::NotificationParse {
            gateway,
            message: message.into(),
        }
    }

    /// Map a reqwest failure for `gateway`
    pub fn from_reqwest(gateway: GatewayKind, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout { gateway }
        } else if err.is_decode() {
            GatewayError::decode(gateway, err.to_string())
        } else {
            GatewayError::Transport {
                gateway,
                message: err.to_string(),
            }
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport { .. } | GatewayError::Timeout { .. }
        )
    }

    /// Whether the seller has to fix something before this can succeed
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GatewayError::Credentials { .. } | GatewayError::Config(_)
        )
    }

    /// Buyer-facing message
    pub fn user_message(&self) -> &str {
        match self {
            GatewayError::Transport { .. } | GatewayError::Timeout { .. } => {
                "Payment processing failed. Please try again."
            }
            GatewayError::Credentials { .. } | GatewayError::Config(_) => {
                "This payment method is temporarily unavailable."
            }
            GatewayError::UnsupportedMethod { .. } => {
                "This payment method is not available for this product."
            }
            GatewayError::Provider { .. } => "The payment was declined by the provider.",
            _ => "An error occurred processing your payment.",
        }
    }

    /// Seller-facing message, including provider detail
    pub fn seller_message(&self) -> String {
        match self {
            GatewayError::Credentials { gateway, message } => format!(
                "Your {gateway} credentials were rejected ({message}). Update them in payment settings."
            ),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(GatewayError::Timeout { gateway: GatewayKind::Efi }.is_retryable());
        assert!(GatewayError::Transport {
            gateway: GatewayKind::Beehive,
            message: "connection reset".into()
        }
        .is_retryable());

        let credentials = GatewayError::missing_field(GatewayKind::PushinPay, "api_token");
        assert!(!credentials.is_retryable());
        assert!(credentials.is_configuration());
        assert!(credentials.seller_message().contains("api_token"));
        assert!(!credentials.user_message().contains("api_token"));
    }
}
