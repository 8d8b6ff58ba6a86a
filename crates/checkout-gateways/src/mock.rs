//! Mock Gateway for Testing
//!
//! In-process provider that records requests and serves scripted statuses.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use checkout_core::{CredentialSet, GatewayKind};

use crate::capability::capability;
use crate::error::{GatewayError, Result};
use crate::gateway::{
    CreatedPayment, GatewayFactory, PaymentGateway, PaymentRequest, PaymentSnapshot, Presentation,
};

/// Failure a mock gateway can be told to produce
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockFailure {
    Transport,
    Timeout,
    Credentials,
}

impl MockFailure {
    fn into_error(self, gateway: GatewayKind) -> GatewayError {
        match self {
            MockFailure::Transport => GatewayError::Transport {
                gateway,
                message: "connection reset".into(),
            },
            MockFailure::Timeout => GatewayError::Timeout { gateway },
            MockFailure::Credentials => GatewayError::Credentials {
                gateway,
                message: "invalid token".into(),
            },
        }
    }
}

#[derive(Default)]
struct MockState {
    statuses: HashMap<String, String>,
    references: HashMap<String, String>,
    requests: Vec<PaymentRequest>,
    create_failure: Option<MockFailure>,
    status_failure: Option<MockFailure>,
}

pub struct MockGateway {
    kind: GatewayKind,
    /// Hosted-checkout style: no payment id until the first webhook
    deferred_id: bool,
    counter: AtomicU64,
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new(kind: GatewayKind) -> Self {
        Self {
            kind,
            deferred_id: false,
            counter: AtomicU64::new(0),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Create payments without a provider id, like a hosted redirect
    pub fn with_deferred_id(mut self) -> Self {
        self.deferred_id = true;
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Script the status returned for `payment_id`
    pub fn set_status(&self, payment_id: &str, status: &str) {
        self.state()
            .statuses
            .insert(payment_id.to_string(), status.to_string());
    }

    /// Script the external reference the provider reports for `payment_id`
    pub fn set_reference(&self, payment_id: &str, reference: &str) {
        self.state()
            .references
            .insert(payment_id.to_string(), reference.to_string());
    }

    pub fn fail_create(&self, failure: Option<MockFailure>) {
        self.state().create_failure = failure;
    }

    pub fn fail_status(&self, failure: Option<MockFailure>) {
        self.state().status_failure = failure;
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.state().requests.clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn kind(&self) -> GatewayKind {
        self.kind
    }

    async fn create_payment(&self, request: &PaymentRequest) -> Result<CreatedPayment> {
        let mut state = self.state();
        state.requests.push(request.clone());
        if let Some(failure) = state.create_failure {
            return Err(failure.into_error(self.kind));
        }

        if self.deferred_id {
            return Ok(CreatedPayment {
                gateway_payment_id: None,
                provider_status: "pending".into(),
                presentation: Presentation::Redirect {
                    url: format!("https://{}.example/checkout/{}", self.kind, request.external_reference),
                },
            });
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("{}-{}", self.kind, n);
        state.statuses.insert(id.clone(), "pending".into());
        state
            .references
            .insert(id.clone(), request.external_reference.clone());

        Ok(CreatedPayment {
            gateway_payment_id: Some(id.clone()),
            provider_status: "pending".into(),
            presentation: Presentation::Pix {
                qr_code: format!("00020126-{id}"),
                qr_code_base64: None,
                expires_at: None,
            },
        })
    }

    async fn payment_status(&self, gateway_payment_id: &str) -> Result<PaymentSnapshot> {
        let state = self.state();
        if let Some(failure) = state.status_failure {
            return Err(failure.into_error(self.kind));
        }
        let provider_status = state
            .statuses
            .get(gateway_payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::Provider {
                gateway: self.kind,
                status: 404,
                message: format!("payment {gateway_payment_id} not found"),
            })?;
        Ok(PaymentSnapshot {
            provider_status,
            external_reference: state.references.get(gateway_payment_id).cloned(),
        })
    }
}

/// Factory serving registered mock gateways.
///
/// Still enforces each provider's required credential fields so callers see
/// the same configuration errors as with real adapters.
#[derive(Default)]
pub struct MockGatewayFactory {
    gateways: HashMap<GatewayKind, Arc<MockGateway>>,
}

impl MockGatewayFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gateway(mut self, gateway: MockGateway) -> Self {
        self.gateways.insert(gateway.kind, Arc::new(gateway));
        self
    }

    /// Registered gateway, for scripting and inspection
    pub fn gateway(&self, kind: GatewayKind) -> Option<Arc<MockGateway>> {
        self.gateways.get(&kind).cloned()
    }
}

impl GatewayFactory for MockGatewayFactory {
    fn build(&self, kind: GatewayKind, credentials: &CredentialSet) -> Result<Arc<dyn PaymentGateway>> {
        if let Some(field) = capability(kind)
            .required_fields
            .iter()
            .find(|field| !credentials.has(field))
        {
            return Err(GatewayError::missing_field(kind, field));
        }
        let gateway = self
            .gateways
            .get(&kind)
            .cloned()
            .ok_or_else(|| GatewayError::Config(format!("no mock registered for {kind}")))?;
        Ok(gateway)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::{Buyer, PaymentMethod};
    use rust_decimal_macros::dec;

    fn request() -> PaymentRequest {
        PaymentRequest {
            amount: dec!(10),
            method: PaymentMethod::Pix,
            buyer: Buyer {
                name: "Ana".into(),
                email: "ana@example.com".into(),
                document: None,
                phone: None,
            },
            external_reference: "sale-1".into(),
            description: "Test".into(),
            notification_url: "http://localhost/webhooks/pushinpay".into(),
        }
    }

    #[tokio::test]
    async fn test_scripted_status() {
        let gateway = MockGateway::new(GatewayKind::PushinPay);
        let created = gateway.create_payment(&request()).await.unwrap();
        let id = created.gateway_payment_id.unwrap();
        assert_eq!(id, "pushinpay-1");

        gateway.set_status(&id, "paid");
        let snapshot = gateway.payment_status(&id).await.unwrap();
        assert_eq!(snapshot.provider_status, "paid");
        assert_eq!(snapshot.external_reference.as_deref(), Some("sale-1"));
    }

    #[tokio::test]
    async fn test_factory_checks_required_fields() {
        let factory = MockGatewayFactory::new().with_gateway(MockGateway::new(GatewayKind::Efi));
        let partial = CredentialSet::new().with("client_id", "id");
        assert!(factory.build(GatewayKind::Efi, &partial).is_err());

        let full = partial
            .with("client_secret", "s")
            .with("certificate", "c")
            .with("pix_key", "k");
        assert!(factory.build(GatewayKind::Efi, &full).is_ok());
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let gateway = MockGateway::new(GatewayKind::Beehive);
        gateway.fail_create(Some(MockFailure::Timeout));
        let err = gateway.create_payment(&request()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(gateway.requests().len(), 1);
    }
}
