//! Application State

use std::sync::Arc;

use checkout_core::{AccountDirectory, SaleStore};
use checkout_engine::{AdmissionController, Reconciler, WebhookIngestor};
use checkout_gateways::GatewayFactory;

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Sales, grants and the outbound queue
    pub store: Arc<dyn SaleStore>,

    /// Checkout resolution and payment submission
    pub admission: Arc<AdmissionController>,

    /// Provider webhook processing
    pub webhooks: Arc<WebhookIngestor>,

    /// Whether buyer emails go out over SMTP or only to the log
    pub smtp_configured: bool,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SaleStore>,
        directory: Arc<dyn AccountDirectory>,
        factory: Arc<dyn GatewayFactory>,
        config: &ServerConfig,
        smtp_configured: bool,
    ) -> Self {
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            directory.clone(),
            config.member_area_url.clone(),
        ));
        let admission = AdmissionController::new(
            store.clone(),
            directory.clone(),
            factory.clone(),
            reconciler.clone(),
            config.public_base_url.clone(),
        );
        let webhooks = WebhookIngestor::new(store.clone(), directory, factory, reconciler);

        Self {
            store,
            admission: Arc::new(admission),
            webhooks: Arc::new(webhooks),
            smtp_configured,
        }
    }
}
