//! Checkout Admission
//!
//! Resolves a public checkout into what the buyer may pay with, gates it on the
//! seller's plan quota, and starts payments with the seller's own gateway
//! credentials.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use checkout_core::authorize::owns_product;
use checkout_core::{
    AccountDirectory, Attribution, Buyer, CanonicalStatus, Checkout, CheckoutConfig,
    CredentialSet, DeliveryType, GatewayKind, OrderBump, PaymentMethod, Product, Sale, SaleStore,
    Seller,
};
use checkout_gateways::{
    available_gateways, normalize, payment_methods, Capability, GatewayFactory, PaymentRequest,
    PaymentSnapshot, Presentation,
};

use crate::error::{EngineError, Result};
use crate::quota::QuotaSnapshot;
use crate::reconciler::{Reconciler, TransitionOutcome};

// ============================================================================
// Views
// ============================================================================

#[derive(Clone, Debug, Serialize)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub delivery: DeliveryType,
}

#[derive(Clone, Debug, Serialize)]
pub struct SellerSummary {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct BumpOffer {
    pub id: String,
    pub product_id: String,
    pub headline: String,
    pub price: Decimal,
}

/// Everything the checkout page needs
#[derive(Clone, Debug, Serialize)]
pub struct CheckoutView {
    pub public_id: String,
    pub product: ProductSummary,
    pub seller: SellerSummary,
    pub order_bumps: Vec<BumpOffer>,
    pub available_gateways: Vec<GatewayKind>,
    pub payment_methods: Vec<PaymentMethod>,
    pub checkout_config: CheckoutConfig,
}

/// Buyer's payment submission
#[derive(Clone, Debug, Deserialize)]
pub struct PaySubmission {
    /// Preferred gateway; the first capable one is used when absent
    #[serde(default)]
    pub gateway: Option<GatewayKind>,
    pub method: PaymentMethod,
    pub buyer: Buyer,
    #[serde(default)]
    pub order_bumps: Vec<String>,
    #[serde(default)]
    pub attribution: Attribution,
}

/// Payment started for a new sale
#[derive(Clone, Debug, Serialize)]
pub struct PaymentOutcome {
    pub sale_id: Uuid,
    pub status: CanonicalStatus,
    pub gateway: GatewayKind,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub presentation: Presentation,
}

#[derive(Clone, Debug, Serialize)]
pub struct SaleStatusView {
    pub sale_id: Uuid,
    pub status: CanonicalStatus,
    pub updated_at: DateTime<Utc>,
}

/// Admitted checkout, before it is turned into a view
struct Admission {
    checkout: Checkout,
    product: Product,
    seller: Seller,
    gateways: Vec<&'static Capability>,
    methods: Vec<PaymentMethod>,
    bumps: Vec<OrderBump>,
}

// ============================================================================
// Controller
// ============================================================================

pub struct AdmissionController {
    store: Arc<dyn SaleStore>,
    directory: Arc<dyn AccountDirectory>,
    factory: Arc<dyn GatewayFactory>,
    reconciler: Arc<Reconciler>,
    public_base_url: String,
}

impl AdmissionController {
    pub fn new(
        store: Arc<dyn SaleStore>,
        directory: Arc<dyn AccountDirectory>,
        factory: Arc<dyn GatewayFactory>,
        reconciler: Arc<Reconciler>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            directory,
            factory,
            reconciler,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a public checkout, refusing when the seller is over quota
    pub async fn resolve(&self, public_id: &str) -> Result<CheckoutView> {
        let admission = self.admit(public_id).await?;
        Ok(CheckoutView {
            public_id: admission.checkout.public_id,
            product: ProductSummary {
                id: admission.product.id,
                name: admission.product.name,
                price: admission.product.price,
                delivery: admission.product.delivery,
            },
            seller: SellerSummary {
                id: admission.seller.id,
                name: admission.seller.name,
            },
            order_bumps: admission
                .bumps
                .into_iter()
                .map(|b| BumpOffer {
                    id: b.id,
                    product_id: b.product_id,
                    headline: b.headline,
                    price: b.price,
                })
                .collect(),
            available_gateways: admission.gateways.iter().map(|c| c.kind).collect(),
            payment_methods: admission.methods,
            checkout_config: admission.checkout.config,
        })
    }

    async fn admit(&self, public_id: &str) -> Result<Admission> {
        let checkout = self
            .directory
            .checkout(public_id)
            .await?
            .ok_or_else(|| EngineError::not_found("checkout", public_id))?;
        let product = self
            .directory
            .product(&checkout.product_id)
            .await?
            .filter(|p| p.active)
            .ok_or_else(|| EngineError::not_found("product", &checkout.product_id))?;
        let seller = self
            .directory
            .seller(&product.seller_id)
            .await?
            .ok_or_else(|| EngineError::not_found("seller", &product.seller_id))?;

        let quota =
            QuotaSnapshot::load(self.directory.as_ref(), self.store.as_ref(), &seller.id, Utc::now())
                .await?;
        if let Err(reason) = quota.check() {
            tracing::info!(seller_id = %seller.id, checkout = public_id, %reason, "Checkout refused by plan quota");
            return Err(EngineError::SellerLimitReached { reason });
        }

        let credentials = self.directory.credentials(&seller.id).await?;
        let gateways = available_gateways(&credentials);
        let mut methods = payment_methods(&gateways);
        if let Some(enabled) = &checkout.config.payment_methods {
            methods.retain(|m| enabled.contains(m));
        }

        let mut bumps = Vec::new();
        for bump in self.directory.order_bumps(&checkout.config.order_bump_ids).await? {
            // A bump may only sell another product of the same seller
            if bump.active
                && bump.seller_id == seller.id
                && owns_product(self.directory.as_ref(), &bump.product_id, &seller.id).await?
            {
                bumps.push(bump);
            }
        }

        Ok(Admission {
            checkout,
            product,
            seller,
            gateways,
            methods,
            bumps,
        })
    }

    /// Create a pending sale and start the payment with the provider.
    ///
    /// Provider failures leave the sale `pending`.
    pub async fn submit(&self, public_id: &str, submission: PaySubmission) -> Result<PaymentOutcome> {
        let admission = self.admit(public_id).await?;
        validate_buyer(&submission.buyer)?;

        if !admission.methods.contains(&submission.method) {
            return Err(EngineError::GatewayUnavailable(format!(
                "{} is not offered on this checkout",
                submission.method
            )));
        }
        let capability = admission
            .gateways
            .iter()
            .filter(|c| c.supports(submission.method))
            .find(|c| submission.gateway.is_none_or(|wanted| wanted == c.kind))
            .ok_or_else(|| {
                EngineError::GatewayUnavailable(format!(
                    "no configured gateway takes {}",
                    submission.method
                ))
            })?;
        let kind = capability.kind;

        let bumps: Vec<&OrderBump> = admission
            .bumps
            .iter()
            .filter(|b| submission.order_bumps.contains(&b.id))
            .collect();
        let amount = admission.product.price + bumps.iter().map(|b| b.price).sum::<Decimal>();

        let sale = Sale::new(&admission.product, submission.buyer, amount, kind, submission.method)
            .with_attribution(submission.attribution)
            .with_order_bumps(bumps.iter().map(|b| b.id.clone()).collect());
        self.store.insert_sale(&sale).await?;
        tracing::info!(
            sale_id = %sale.id,
            gateway = %kind,
            method = %sale.method,
            amount = %amount,
            "Sale created"
        );

        let credentials = self.directory.credentials(&sale.seller_id).await?;
        let set = credentials.for_gateway(kind).cloned().unwrap_or_default();
        let gateway = self.factory.build(kind, &set).inspect_err(|e| {
            tracing::error!(sale_id = %sale.id, gateway = %kind, seller_id = %sale.seller_id, error = %e, "Gateway misconfigured");
        })?;

        let request = PaymentRequest {
            amount,
            method: sale.method,
            buyer: sale.buyer.clone(),
            external_reference: sale.id.to_string(),
            description: admission.product.name.clone(),
            notification_url: self.notification_url(kind, sale.id),
        };
        let created = match gateway.create_payment(&request).await {
            Ok(created) => created,
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(sale_id = %sale.id, gateway = %kind, error = %e, "Payment creation failed; buyer may retry");
                } else {
                    tracing::error!(
                        sale_id = %sale.id,
                        gateway = %kind,
                        seller_id = %sale.seller_id,
                        error = %e,
                        detail = %e.seller_message(),
                        "Payment creation rejected"
                    );
                }
                return Err(e.into());
            }
        };

        if let Some(payment_id) = &created.gateway_payment_id {
            self.store.attach_transaction(sale.id, payment_id).await?;
        }

        Ok(PaymentOutcome {
            sale_id: sale.id,
            status: sale.status,
            gateway: kind,
            method: sale.method,
            amount,
            presentation: created.presentation,
        })
    }

    /// Current sale status, refreshed from the provider while pending
    pub async fn poll_status(&self, sale_id: Uuid) -> Result<SaleStatusView> {
        let sale = self
            .store
            .get_sale(sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("sale", sale_id))?;

        let (Some(payment_id), CanonicalStatus::Pending) = (&sale.transaction_id, sale.status) else {
            return Ok(status_view(&sale));
        };

        let credentials = self.directory.credentials(&sale.seller_id).await?;
        let set = credentials.for_gateway(sale.gateway).cloned().unwrap_or_default();
        let snapshot = match self.lookup(&sale, &set, payment_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(sale_id = %sale.id, gateway = %sale.gateway, error = %e, "Status poll lookup failed");
                return Ok(status_view(&sale));
            }
        };

        let status = normalize(sale.gateway, &snapshot.provider_status);
        if status == CanonicalStatus::Pending {
            return Ok(status_view(&sale));
        }
        let (TransitionOutcome::Applied { sale, .. } | TransitionOutcome::Ignored { sale }) =
            self.reconciler.apply(sale.id, status).await?;
        Ok(status_view(&sale))
    }

    async fn lookup(
        &self,
        sale: &Sale,
        credentials: &CredentialSet,
        payment_id: &str,
    ) -> Result<PaymentSnapshot> {
        let gateway = self.factory.build(sale.gateway, credentials)?;
        Ok(gateway.payment_status(payment_id).await?)
    }

    fn notification_url(&self, kind: GatewayKind, sale_id: Uuid) -> String {
        format!("{}/webhooks/{}?ref={}", self.public_base_url, kind, sale_id)
    }
}

fn status_view(sale: &Sale) -> SaleStatusView {
    SaleStatusView {
        sale_id: sale.id,
        status: sale.status,
        updated_at: sale.updated_at,
    }
}

fn validate_buyer(buyer: &Buyer) -> Result<()> {
    if buyer.name.trim().is_empty() {
        return Err(EngineError::InvalidRequest("buyer name is required".into()));
    }
    let email = buyer.email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(EngineError::InvalidRequest("buyer email is invalid".into())),
    }
}
