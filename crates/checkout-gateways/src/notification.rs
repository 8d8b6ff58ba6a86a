//! Webhook Notifications
//!
//! Turns each provider's webhook body into provider-neutral notifications and
//! verifies signatures for providers that sign them. Dispatch on the provider
//! happens here so the ingestion layer never looks at provider wire formats.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use checkout_core::{CredentialSet, GatewayKind};

use crate::error::Result;
use crate::{beehive, efi, hypercash, mercadopago, pushinpay};

/// Credential field holding a seller's webhook signing secret
pub const WEBHOOK_SECRET_FIELD: &str = "webhook_secret";

/// One payment update reported by a provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub gateway: GatewayKind,
    pub provider_payment_id: String,

    /// Provider status; `None` when the provider only says "something changed"
    /// and the status has to be fetched
    pub provider_status: Option<String>,

    /// Our sale id, when the provider echoes it
    pub external_reference: Option<String>,
}

impl Notification {
    pub fn new(gateway: GatewayKind, provider_payment_id: impl Into<String>) -> Self {
        Self {
            gateway,
            provider_payment_id: provider_payment_id.into(),
            provider_status: None,
            external_reference: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.provider_status = Some(status.into());
        self
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.external_reference = reference.filter(|r| !r.trim().is_empty());
        self
    }
}

/// Request metadata that accompanies a webhook body
#[derive(Clone, Debug, Default)]
pub struct WebhookContext {
    /// Lowercased header names
    pub headers: HashMap<String, String>,

    /// `ref` query parameter we put on notification URLs
    pub reference: Option<String>,
}

impl WebhookContext {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// Parse a webhook body into zero or more notifications.
///
/// Bodies that are valid but irrelevant (test pings, non-payment topics)
/// yield an empty list. Only unparseable bodies are errors.
pub fn parse(kind: GatewayKind, body: &[u8], context: &WebhookContext) -> Result<Vec<Notification>> {
    let notifications = match kind {
        GatewayKind::MercadoPago => mercadopago::parse_notification(body)?,
        GatewayKind::PushinPay => pushinpay::parse_notification(body)?,
        GatewayKind::Efi => efi::parse_notification(body)?,
        GatewayKind::Beehive => beehive::parse_notification(body)?,
        GatewayKind::Hypercash => hypercash::parse_notification(body)?,
    };

    Ok(notifications
        .into_iter()
        .map(|n| {
            if n.external_reference.is_none() {
                let reference = context.reference.clone();
                n.with_reference(reference)
            } else {
                n
            }
        })
        .collect())
}

/// Verify a webhook signature against the seller's configured secret.
///
/// Returns `true` when the provider does not sign notifications or the seller
/// has not configured a secret.
pub fn verify(
    notification: &Notification,
    credentials: &CredentialSet,
    context: &WebhookContext,
) -> bool {
    let Some(secret) = credentials.get(WEBHOOK_SECRET_FIELD) else {
        return true;
    };
    match notification.gateway {
        GatewayKind::MercadoPago => {
            mercadopago::verify_signature(secret, &notification.provider_payment_id, context)
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_reference_fills_missing_reference() {
        let context = WebhookContext {
            reference: Some("sale-123".into()),
            ..Default::default()
        };
        let parsed = parse(
            GatewayKind::PushinPay,
            br#"{"id":"9C1E-AA","status":"paid","value":1000}"#,
            &context,
        )
        .unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].external_reference.as_deref(), Some("sale-123"));
    }

    #[test]
    fn test_body_reference_wins_over_query() {
        let context = WebhookContext {
            reference: Some("from-query".into()),
            ..Default::default()
        };
        let parsed = parse(
            GatewayKind::Beehive,
            br#"{"type":"transaction","data":{"id":77,"status":"paid","externalRef":"from-body"}}"#,
            &context,
        )
        .unwrap();
        assert_eq!(parsed[0].external_reference.as_deref(), Some("from-body"));
    }

    #[test]
    fn test_unparseable_body_is_an_error() {
        for kind in GatewayKind::ALL {
            assert!(parse(kind, b"not json", &WebhookContext::default()).is_err(), "{kind}");
        }
    }

    #[test]
    fn test_verify_without_secret_passes() {
        let n = Notification::new(GatewayKind::MercadoPago, "1");
        assert!(verify(&n, &CredentialSet::new(), &WebhookContext::default()));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut context = WebhookContext::default();
        context.headers.insert("x-request-id".into(), "abc".into());
        assert_eq!(context.header("X-Request-Id"), Some("abc"));
    }
}
