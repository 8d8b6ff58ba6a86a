//! Gateway Capability Table
//!
//! Declarative description of every provider: which credential fields a seller
//! must configure, which payment methods it offers, and how its webhooks are
//! matched back to sales.

use checkout_core::{GatewayKind, PaymentMethod, SellerCredentials};

/// What a provider needs and offers
#[derive(Clone, Copy, Debug)]
pub struct Capability {
    pub kind: GatewayKind,

    /// Credential fields that must all be present and non-blank
    pub required_fields: &'static [&'static str],

    pub methods: &'static [PaymentMethod],

    /// Webhooks may arrive before our sale knows the provider payment id, so
    /// an unmatched notification falls back to the external reference
    pub resolves_by_reference: bool,
}

impl Capability {
    pub fn supports(&self, method: PaymentMethod) -> bool {
        self.methods.contains(&method)
    }
}

pub const CAPABILITIES: [Capability; 5] = [
    Capability {
        kind: GatewayKind::MercadoPago,
        required_fields: &["access_token"],
        methods: &[PaymentMethod::Pix, PaymentMethod::Card, PaymentMethod::Boleto],
        resolves_by_reference: true,
    },
    Capability {
        kind: GatewayKind::PushinPay,
        required_fields: &["api_token"],
        methods: &[PaymentMethod::Pix],
        resolves_by_reference: true,
    },
    Capability {
        kind: GatewayKind::Efi,
        required_fields: &["client_id", "client_secret", "certificate", "pix_key"],
        methods: &[PaymentMethod::Pix],
        resolves_by_reference: false,
    },
    Capability {
        kind: GatewayKind::Beehive,
        required_fields: &["secret_key"],
        methods: &[PaymentMethod::Pix, PaymentMethod::Card, PaymentMethod::Boleto],
        resolves_by_reference: true,
    },
    Capability {
        kind: GatewayKind::Hypercash,
        required_fields: &["api_key"],
        methods: &[PaymentMethod::Pix, PaymentMethod::Card],
        resolves_by_reference: true,
    },
];

/// Capability entry for a provider
pub fn capability(kind: GatewayKind) -> &'static Capability {
    CAPABILITIES
        .iter()
        .find(|c| c.kind == kind)
        .unwrap_or(&CAPABILITIES[0])
}

/// Gateways the seller has fully configured, in table order
pub fn available_gateways(credentials: &SellerCredentials) -> Vec<&'static Capability> {
    CAPABILITIES
        .iter()
        .filter(|cap| {
            credentials
                .for_gateway(cap.kind)
                .is_some_and(|set| cap.required_fields.iter().all(|field| set.has(field)))
        })
        .collect()
}

/// Union of methods offered by `gateways`, in stable order
pub fn payment_methods(gateways: &[&Capability]) -> Vec<PaymentMethod> {
    let mut methods: Vec<PaymentMethod> = gateways
        .iter()
        .flat_map(|cap| cap.methods.iter().copied())
        .collect();
    methods.sort();
    methods.dedup();
    methods
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_core::CredentialSet;

    #[test]
    fn test_every_gateway_has_an_entry() {
        for kind in GatewayKind::ALL {
            assert_eq!(capability(kind).kind, kind);
        }
    }

    #[test]
    fn test_pushinpay_offers_only_pix() {
        let cap = capability(GatewayKind::PushinPay);
        assert!(cap.supports(PaymentMethod::Pix));
        assert!(!cap.supports(PaymentMethod::Card));
        assert!(!cap.supports(PaymentMethod::Boleto));
    }

    #[test]
    fn test_partial_credentials_are_unavailable() {
        let credentials = SellerCredentials::new()
            .with(
                GatewayKind::Efi,
                CredentialSet::new()
                    .with("client_id", "id")
                    .with("client_secret", "secret")
                    .with("pix_key", "key@example.com"),
            )
            .with(
                GatewayKind::PushinPay,
                CredentialSet::new().with("api_token", "tok"),
            )
            .with(
                GatewayKind::MercadoPago,
                CredentialSet::new().with("access_token", " "),
            );

        let kinds: Vec<GatewayKind> = available_gateways(&credentials)
            .iter()
            .map(|c| c.kind)
            .collect();
        assert_eq!(kinds, vec![GatewayKind::PushinPay]);
    }

    #[test]
    fn test_payment_methods_union() {
        let gateways = vec![
            capability(GatewayKind::PushinPay),
            capability(GatewayKind::Hypercash),
        ];
        assert_eq!(
            payment_methods(&gateways),
            vec![PaymentMethod::Pix, PaymentMethod::Card]
        );
        assert!(payment_methods(&[]).is_empty());
    }
}
