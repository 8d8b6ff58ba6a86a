//! Webhook Ingestion
//!
//! One entry point for every provider. Bodies are parsed by the gateway layer
//! into provider-neutral notifications; each notification is matched to a
//! sale, verified, confirmed against the provider's own record of the payment
//! and handed to the reconciler. A status carried in the body is never trusted
//! on its own.
//!
//! Notifications that cannot be applied are acknowledged and recorded as
//! anomalies so the provider stops redelivering them.

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use checkout_core::{
    AccountDirectory, AnomalyKind, CanonicalStatus, CredentialSet, GatewayKind, Sale, SaleStore,
    WebhookAnomaly,
};
use checkout_gateways::{
    capability, normalize, notification, GatewayFactory, Notification, PaymentSnapshot, WebhookContext,
};

use crate::error::{EngineError, Result};
use crate::reconciler::{Reconciler, TransitionOutcome};

/// What happened to one notification
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NotificationOutcome {
    Applied { sale_id: Uuid, status: CanonicalStatus },
    Ignored { sale_id: Uuid, current: CanonicalStatus },
    Unresolved,
    InvalidSignature,
    StatusUnavailable { sale_id: Uuid },
    /// Confirmed status could not be applied to the sale
    Failed { sale_id: Uuid },
}

/// Summary of one webhook delivery
#[derive(Clone, Debug, Default, Serialize)]
pub struct WebhookReport {
    pub outcomes: Vec<NotificationOutcome>,
}

enum Resolution {
    Matched(Sale),
    /// Found through the external reference; payment id not yet bound
    ByReference(Sale),
    Unresolved(AnomalyKind, String),
}

pub struct WebhookIngestor {
    store: Arc<dyn SaleStore>,
    directory: Arc<dyn AccountDirectory>,
    factory: Arc<dyn GatewayFactory>,
    reconciler: Arc<Reconciler>,
}

impl WebhookIngestor {
    pub fn new(
        store: Arc<dyn SaleStore>,
        directory: Arc<dyn AccountDirectory>,
        factory: Arc<dyn GatewayFactory>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            store,
            directory,
            factory,
            reconciler,
        }
    }

    /// Process a webhook body.
    ///
    /// Only unparseable bodies and retryable failures (storage, commit
    /// conflicts) are errors; everything else is reported in the returned
    /// outcomes.
    pub async fn ingest(
        &self,
        kind: GatewayKind,
        body: &[u8],
        context: &WebhookContext,
    ) -> Result<WebhookReport> {
        let notifications = notification::parse(kind, body, context).map_err(|e| {
            tracing::warn!(gateway = %kind, error = %e, "Unparseable webhook body");
            EngineError::WebhookParse(e.to_string())
        })?;
        if notifications.is_empty() {
            tracing::debug!(gateway = %kind, "Webhook carried no payment notifications");
        }

        let mut report = WebhookReport::default();
        let mut failure = None;
        for n in notifications {
            match self.process(kind, &n, context).await {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(
                        gateway = %kind,
                        payment_id = %n.provider_payment_id,
                        error = %e,
                        "Webhook notification failed"
                    );
                    failure = Some(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    async fn process(
        &self,
        kind: GatewayKind,
        n: &Notification,
        context: &WebhookContext,
    ) -> Result<NotificationOutcome> {
        let (sale, by_reference) = match self.resolve(kind, n).await? {
            Resolution::Matched(sale) => (sale, false),
            Resolution::ByReference(sale) => (sale, true),
            Resolution::Unresolved(anomaly, detail) => {
                self.record(anomaly, n, detail).await?;
                return Ok(NotificationOutcome::Unresolved);
            }
        };

        let credentials = self
            .directory
            .credentials(&sale.seller_id)
            .await?
            .for_gateway(kind)
            .cloned()
            .unwrap_or_default();

        if !notification::verify(n, &credentials, context) {
            self.record(AnomalyKind::InvalidSignature, n, format!("sale {}", sale.id))
                .await?;
            return Ok(NotificationOutcome::InvalidSignature);
        }

        // The body is a hint; the provider's own record decides the status
        let snapshot = match self.fetch_snapshot(kind, &credentials, &n.provider_payment_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.record(AnomalyKind::StatusLookupFailed, n, e.to_string())
                    .await?;
                return Ok(NotificationOutcome::StatusUnavailable { sale_id: sale.id });
            }
        };
        let status = normalize(kind, &snapshot.provider_status);
        if let Some(hint) = &n.provider_status {
            if normalize(kind, hint) != status {
                tracing::warn!(
                    sale_id = %sale.id,
                    gateway = %kind,
                    payment_id = %n.provider_payment_id,
                    body_status = %hint,
                    provider_status = %snapshot.provider_status,
                    "Webhook status disagrees with provider"
                );
            }
        }

        if by_reference {
            let sale_ref = sale.id.to_string();
            if let Some(reported) = snapshot
                .external_reference
                .as_deref()
                .map(str::trim)
                .filter(|r| *r != sale_ref)
            {
                self.record(
                    AnomalyKind::ReferenceMismatch,
                    n,
                    format!("provider reports reference {reported} for sale {}", sale.id),
                )
                .await?;
                return Ok(NotificationOutcome::Unresolved);
            }

            let bound = self
                .store
                .attach_transaction(sale.id, &n.provider_payment_id)
                .await?;
            if bound.and_then(|s| s.transaction_id).as_deref() != Some(n.provider_payment_id.as_str()) {
                self.record(
                    AnomalyKind::ReferenceMismatch,
                    n,
                    format!("sale {} was bound to another payment concurrently", sale.id),
                )
                .await?;
                return Ok(NotificationOutcome::Unresolved);
            }
            tracing::info!(
                sale_id = %sale.id,
                gateway = %kind,
                payment_id = %n.provider_payment_id,
                "Backfilled provider payment id"
            );
        }

        tracing::info!(
            sale_id = %sale.id,
            gateway = %kind,
            provider_status = %snapshot.provider_status,
            status = %status,
            "Webhook notification resolved"
        );

        match self.reconciler.apply(sale.id, status).await {
            Ok(TransitionOutcome::Applied { sale, .. }) => Ok(NotificationOutcome::Applied {
                sale_id: sale.id,
                status: sale.status,
            }),
            Ok(TransitionOutcome::Ignored { sale }) => Ok(NotificationOutcome::Ignored {
                sale_id: sale.id,
                current: sale.status,
            }),
            // Redelivery cannot fix these; acknowledge and keep a record
            Err(e) if !e.is_retryable() => {
                self.record(AnomalyKind::TransitionFailed, n, e.to_string())
                    .await?;
                Ok(NotificationOutcome::Failed { sale_id: sale.id })
            }
            Err(e) => Err(e),
        }
    }

    async fn resolve(&self, kind: GatewayKind, n: &Notification) -> Result<Resolution> {
        if let Some(sale) = self
            .store
            .find_by_transaction(kind, &n.provider_payment_id)
            .await?
        {
            return Ok(Resolution::Matched(sale));
        }

        if !capability(kind).resolves_by_reference {
            return Ok(Resolution::Unresolved(
                AnomalyKind::UnknownPayment,
                "no sale for payment id".into(),
            ));
        }
        let Some(sale_id) = n
            .external_reference
            .as_deref()
            .and_then(|r| r.trim().parse::<Uuid>().ok())
        else {
            return Ok(Resolution::Unresolved(
                AnomalyKind::UnknownPayment,
                "no sale for payment id and no usable reference".into(),
            ));
        };
        let Some(sale) = self.store.get_sale(sale_id).await? else {
            return Ok(Resolution::Unresolved(
                AnomalyKind::UnknownPayment,
                "reference matches no sale".into(),
            ));
        };

        if sale.gateway != kind {
            return Ok(Resolution::Unresolved(
                AnomalyKind::ReferenceMismatch,
                format!("sale {} was created on {}", sale.id, sale.gateway),
            ));
        }
        if sale
            .transaction_id
            .as_deref()
            .is_some_and(|existing| existing != n.provider_payment_id)
        {
            return Ok(Resolution::Unresolved(
                AnomalyKind::ReferenceMismatch,
                format!("sale {} is bound to another payment id", sale.id),
            ));
        }
        Ok(Resolution::ByReference(sale))
    }

    async fn fetch_snapshot(
        &self,
        kind: GatewayKind,
        credentials: &CredentialSet,
        payment_id: &str,
    ) -> Result<PaymentSnapshot> {
        let gateway = self.factory.build(kind, credentials)?;
        Ok(gateway.payment_status(payment_id).await?)
    }

    async fn record(&self, kind: AnomalyKind, n: &Notification, detail: String) -> Result<()> {
        tracing::warn!(
            gateway = %n.gateway,
            payment_id = %n.provider_payment_id,
            reference = ?n.external_reference,
            anomaly = ?kind,
            detail = %detail,
            "Webhook notification not applied"
        );
        self.store
            .record_anomaly(WebhookAnomaly::new(
                kind,
                n.gateway,
                Some(&n.provider_payment_id),
                n.external_reference.as_deref(),
                detail,
            ))
            .await?;
        Ok(())
    }
}
