//! # checkout-gateways
//!
//! Payment provider adapters for the checkout gateway.
//!
//! ## Providers
//!
//! | Provider    | Methods             | Auth                               |
//! |-------------|---------------------|------------------------------------|
//! | MercadoPago | pix, card, boleto   | bearer access token                |
//! | PushinPay   | pix                 | bearer API token                   |
//! | Efí         | pix                 | mTLS certificate + OAuth           |
//! | Beehive     | pix, card, boleto   | bearer secret key                  |
//! | Hypercash   | pix, card           | bearer API key                     |
//!
//! Every adapter implements [`PaymentGateway`] and is built per seller by a
//! [`GatewayFactory`]. Provider statuses are mapped onto
//! [`checkout_core::CanonicalStatus`] by the tables in [`status`]; webhook
//! bodies are turned into [`Notification`]s by [`notification::parse`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_gateways::{GatewayConfig, GatewayFactory, HttpGatewayFactory};
//!
//! let factory = HttpGatewayFactory::new(GatewayConfig::from_env());
//! let gateway = factory.build(GatewayKind::MercadoPago, &credentials)?;
//! let created = gateway.create_payment(&request).await?;
//! ```

pub mod beehive;
pub mod capability;
pub mod config;
pub mod efi;
pub mod error;
pub mod factory;
pub mod gateway;
mod http;
pub mod hypercash;
pub mod mercadopago;
pub mod mock;
pub mod notification;
pub mod pushinpay;
pub mod status;

pub use capability::{available_gateways, capability, payment_methods, Capability, CAPABILITIES};
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use factory::HttpGatewayFactory;
pub use gateway::{
    CreatedPayment, GatewayFactory, PaymentGateway, PaymentRequest, PaymentSnapshot, Presentation,
};
pub use mock::{MockFailure, MockGateway, MockGatewayFactory};
pub use notification::{Notification, WebhookContext, WEBHOOK_SECRET_FIELD};
pub use status::normalize;
