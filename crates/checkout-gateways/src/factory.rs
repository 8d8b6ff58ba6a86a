//! Gateway Factory
//!
//! Builds provider adapters from a seller's stored credentials.

use std::sync::Arc;

use checkout_core::{CredentialSet, GatewayKind};

use crate::beehive::BeehiveGateway;
use crate::config::GatewayConfig;
use crate::efi::EfiGateway;
use crate::error::Result;
use crate::gateway::{GatewayFactory, PaymentGateway};
use crate::hypercash::HypercashGateway;
use crate::mercadopago::MercadoPagoGateway;
use crate::pushinpay::PushinPayGateway;

/// Factory for the real HTTP adapters
#[derive(Clone, Debug, Default)]
pub struct HttpGatewayFactory {
    config: GatewayConfig,
}

impl HttpGatewayFactory {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

impl GatewayFactory for HttpGatewayFactory {
    fn build(&self, kind: GatewayKind, credentials: &CredentialSet) -> Result<Arc<dyn PaymentGateway>> {
        let gateway: Arc<dyn PaymentGateway> = match kind {
            GatewayKind::MercadoPago => {
                Arc::new(MercadoPagoGateway::from_credentials(credentials, &self.config)?)
            }
            GatewayKind::PushinPay => {
                Arc::new(PushinPayGateway::from_credentials(credentials, &self.config)?)
            }
            GatewayKind::Efi => Arc::new(EfiGateway::from_credentials(credentials, &self.config)?),
            GatewayKind::Beehive => {
                Arc::new(BeehiveGateway::from_credentials(credentials, &self.config)?)
            }
            GatewayKind::Hypercash => {
                Arc::new(HypercashGateway::from_credentials(credentials, &self.config)?)
            }
        };
        tracing::debug!(gateway = %kind, "Built payment gateway");
        Ok(gateway)
    }
}
