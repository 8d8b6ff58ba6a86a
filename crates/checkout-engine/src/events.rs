//! Outbound Event Builders
//!
//! Produces the provider-agnostic payloads queued by a sale transition.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use checkout_core::{
    CanonicalStatus, DeliveryType, EmailTemplate, IntegrationKind, OutboundEvent,
    OutboundIntegration, OutboundTarget, Product, Sale,
};

/// Event name for a status ("sale.approved", "sale.refunded", ...)
pub fn event_name(status: CanonicalStatus) -> String {
    format!("sale.{}", status.as_str())
}

/// JSON body shared by every integration
pub fn sale_payload(sale: &Sale, product: &Product, status: CanonicalStatus, at: DateTime<Utc>) -> Value {
    json!({
        "event": event_name(status),
        "sale_id": sale.id,
        "status": status,
        "amount": sale.amount,
        "currency": "BRL",
        "product": { "id": product.id, "name": product.name },
        "buyer": { "name": sale.buyer.name, "email": sale.buyer.email },
        "utm": {
            "utm_source": sale.attribution.utm_source,
            "utm_medium": sale.attribution.utm_medium,
            "utm_campaign": sale.attribution.utm_campaign,
            "utm_content": sale.attribution.utm_content,
            "utm_term": sale.attribution.utm_term,
            "src": sale.attribution.src,
        },
        "occurred_at": at,
    })
}

/// Events for every active integration subscribed to `status`.
///
/// Secrets and tokens are copied into the target so a later settings change
/// does not alter an already queued event.
pub fn integration_events(
    sale: &Sale,
    product: &Product,
    integrations: &[OutboundIntegration],
    status: CanonicalStatus,
    at: DateTime<Utc>,
) -> Vec<OutboundEvent> {
    let payload = sale_payload(sale, product, status, at);
    integrations
        .iter()
        .filter(|integration| integration.seller_id == sale.seller_id && integration.wants(status))
        .map(|integration| {
            let target = match integration.kind {
                IntegrationKind::Webhook => OutboundTarget::Webhook {
                    integration_id: integration.id.clone(),
                    url: integration.url.clone(),
                    secret: integration.secret.clone(),
                },
                IntegrationKind::Attribution => OutboundTarget::Attribution {
                    integration_id: integration.id.clone(),
                    url: integration.url.clone(),
                    token: integration.token.clone(),
                },
            };
            OutboundEvent::new(sale.id, &sale.seller_id, target, status, payload.clone())
        })
        .collect()
}

/// Member-area login details carried by the welcome email
#[derive(Clone, Debug)]
pub enum MemberLogin {
    /// First grant for this buyer and product; includes the temporary password
    Issued { password: String },
    /// Buyer already had access; the existing credential stays valid
    Existing,
}

/// Welcome email queued on approval
pub fn welcome_email(
    sale: &Sale,
    product: &Product,
    login: Option<&MemberLogin>,
    member_area_url: &str,
    at: DateTime<Utc>,
) -> OutboundEvent {
    let mut payload = sale_payload(sale, product, CanonicalStatus::Approved, at);
    let template = match (product.delivery, login) {
        (DeliveryType::MemberArea, Some(login)) => {
            let (password, existing) = match login {
                MemberLogin::Issued { password } => (Some(password.as_str()), false),
                MemberLogin::Existing => (None, true),
            };
            payload["access"] = json!({
                "url": member_area_url,
                "login": sale.buyer.email.trim().to_lowercase(),
                "password": password,
                "existing_access": existing,
            });
            EmailTemplate::AccessGranted
        }
        _ => {
            if let Some(url) = &product.delivery_url {
                payload["delivery_url"] = json!(url);
            }
            EmailTemplate::PurchaseConfirmed
        }
    };

    OutboundEvent::new(
        sale.id,
        &sale.seller_id,
        OutboundTarget::Email {
            to: sale.buyer.email.trim().to_string(),
            template,
        },
        CanonicalStatus::Approved,
        payload,
    )
}
