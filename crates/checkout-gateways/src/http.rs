//! Shared HTTP plumbing for the REST adapters

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use checkout_core::GatewayKind;

use crate::error::{GatewayError, Result};

const MAX_ERROR_BODY: usize = 300;

/// Build a client with the bounded request timeout
pub(crate) fn client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent("checkout-gateways/1.0")
        .build()
        .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {e}")))
}

/// Send a request and decode a JSON success body.
///
/// 401/403 become credential errors, 429 and 5xx are transport errors
/// (retriable), any other non-success status is a provider rejection.
pub(crate) async fn send_json<T: DeserializeOwned>(
    gateway: GatewayKind,
    request: RequestBuilder,
) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| GatewayError::from_reqwest(gateway, &e))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GatewayError::from_reqwest(gateway, &e))?;

    if !status.is_success() {
        return Err(classify_status(gateway, status, &body));
    }

    serde_json::from_str(&body).map_err(|e| GatewayError::decode(gateway, e.to_string()))
}

fn classify_status(gateway: GatewayKind, status: StatusCode, body: &str) -> GatewayError {
    let message: String = body.chars().take(MAX_ERROR_BODY).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GatewayError::Credentials { gateway, message }
        }
        StatusCode::TOO_MANY_REQUESTS => GatewayError::Transport {
            gateway,
            message: format!("rate limited: {message}"),
        },
        s if s.is_server_error() => GatewayError::Transport {
            gateway,
            message: format!("HTTP {}: {message}", s.as_u16()),
        },
        s => GatewayError::Provider {
            gateway,
            status: s.as_u16(),
            message,
        },
    }
}

/// Amount in integer cents
pub(crate) fn cents(gateway: GatewayKind, amount: rust_decimal::Decimal) -> Result<i64> {
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal::RoundingStrategy;

    (amount * rust_decimal::Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| GatewayError::decode(gateway, format!("amount out of range: {amount}")))
}

/// Amount as a two-decimal string ("97.00")
pub(crate) fn two_decimals(amount: rust_decimal::Decimal) -> String {
    use rust_decimal::RoundingStrategy;

    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

/// Provider ids come back as strings or numbers depending on the endpoint
pub(crate) fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
