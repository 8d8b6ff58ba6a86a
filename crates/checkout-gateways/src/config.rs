//! Gateway Configuration

use std::collections::HashMap;
use std::time::Duration;

use checkout_core::GatewayKind;

/// Provider endpoints and client limits
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Upper bound for any single provider call
    pub timeout: Duration,

    base_urls: HashMap<GatewayKind, String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let base_urls = GatewayKind::ALL
            .into_iter()
            .map(|kind| (kind, default_base_url(kind).to_string()))
            .collect();
        Self {
            timeout: Duration::from_secs(15),
            base_urls,
        }
    }
}

fn default_base_url(kind: GatewayKind) -> &'static str {
    match kind {
        GatewayKind::MercadoPago => "https://api.mercadopago.com",
        GatewayKind::PushinPay => "https://api.pushinpay.com.br",
        GatewayKind::Efi => "https://pix.api.efipay.com.br",
        GatewayKind::Beehive => "https://api.conta.paybeehive.com.br",
        GatewayKind::Hypercash => "https://api.hypercashbrasil.com.br",
    }
}

fn env_var_name(kind: GatewayKind) -> String {
    format!("{}_API_URL", kind.as_str().to_uppercase())
}

impl GatewayConfig {
    /// Create from environment variables
    ///
    /// `GATEWAY_TIMEOUT_SECS` and one `<PROVIDER>_API_URL` override per
    /// provider (e.g. `MERCADOPAGO_API_URL` for a sandbox).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = std::env::var("GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        for kind in GatewayKind::ALL {
            if let Ok(url) = std::env::var(env_var_name(kind)) {
                config = config.with_base_url(kind, url);
            }
        }
        config
    }

    pub fn with_base_url(mut self, kind: GatewayKind, url: impl Into<String>) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        self.base_urls.insert(kind, url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self, kind: GatewayKind) -> &str {
        self.base_urls
            .get(&kind)
            .map_or_else(|| default_base_url(kind), String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_override_strips_trailing_slash() {
        let config = GatewayConfig::default().with_base_url(GatewayKind::Beehive, "http://127.0.0.1:9000/");
        assert_eq!(config.base_url(GatewayKind::Beehive), "http://127.0.0.1:9000");
        assert_eq!(config.base_url(GatewayKind::Efi), "https://pix.api.efipay.com.br");
    }

    #[test]
    fn test_env_var_names() {
        assert_eq!(env_var_name(GatewayKind::MercadoPago), "MERCADOPAGO_API_URL");
        assert_eq!(env_var_name(GatewayKind::PushinPay), "PUSHINPAY_API_URL");
    }
}
