//! Status Normalization
//!
//! Immutable per-provider tables mapping provider status vocabulary onto the
//! canonical taxonomy. Unmapped values normalize to `pending`, never to a
//! terminal status.

use checkout_core::{CanonicalStatus, GatewayKind};

use CanonicalStatus::{Approved, Cancelled, ChargedBack, Pending, Refunded, Rejected};

pub const MERCADOPAGO: &[(&str, CanonicalStatus)] = &[
    ("pending", Pending),
    ("in_process", Pending),
    ("authorized", Pending),
    ("in_mediation", Pending),
    ("approved", Approved),
    ("rejected", Rejected),
    ("cancelled", Cancelled),
    ("refunded", Refunded),
    ("charged_back", ChargedBack),
];

pub const PUSHINPAY: &[(&str, CanonicalStatus)] = &[
    ("created", Pending),
    ("paid", Approved),
    ("canceled", Cancelled),
    ("cancelled", Cancelled),
    ("expired", Cancelled),
    ("refunded", Refunded),
];

pub const EFI: &[(&str, CanonicalStatus)] = &[
    ("ativa", Pending),
    ("concluida", Approved),
    ("removida_pelo_usuario_recebedor", Cancelled),
    ("removida_pelo_psp", Cancelled),
    ("devolvido", Refunded),
];

pub const BEEHIVE: &[(&str, CanonicalStatus)] = &[
    ("waiting_payment", Pending),
    ("processing", Pending),
    ("authorized", Pending),
    ("paid", Approved),
    ("refused", Rejected),
    ("canceled", Cancelled),
    ("refunded", Refunded),
    ("chargedback", ChargedBack),
];

pub const HYPERCASH: &[(&str, CanonicalStatus)] = &[
    ("pending", Pending),
    ("waiting_payment", Pending),
    ("approved", Approved),
    ("paid", Approved),
    ("refused", Rejected),
    ("failed", Rejected),
    ("cancelled", Cancelled),
    ("expired", Cancelled),
    ("refunded", Refunded),
    ("chargeback", ChargedBack),
];

/// Mapping table for a provider
pub fn table(kind: GatewayKind) -> &'static [(&'static str, CanonicalStatus)] {
    match kind {
        GatewayKind::MercadoPago => MERCADOPAGO,
        GatewayKind::PushinPay => PUSHINPAY,
        GatewayKind::Efi => EFI,
        GatewayKind::Beehive => BEEHIVE,
        GatewayKind::Hypercash => HYPERCASH,
    }
}

/// Normalize a provider status string (case-insensitive, trimmed)
pub fn normalize(kind: GatewayKind, provider_status: &str) -> CanonicalStatus {
    let needle = provider_status.trim().to_lowercase();
    table(kind)
        .iter()
        .find(|(raw, _)| *raw == needle)
        .map_or(Pending, |(_, status)| *status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_table(kind: GatewayKind, expected: &[(&str, CanonicalStatus)]) {
        for (raw, status) in expected {
            assert_eq!(normalize(kind, raw), *status, "{kind}: {raw}");
        }
        assert_eq!(table(kind).len(), expected.len(), "{kind} table size");
    }

    #[test]
    fn test_mercadopago_table() {
        assert_table(
            GatewayKind::MercadoPago,
            &[
                ("pending", Pending),
                ("in_process", Pending),
                ("authorized", Pending),
                ("in_mediation", Pending),
                ("approved", Approved),
                ("rejected", Rejected),
                ("cancelled", Cancelled),
                ("refunded", Refunded),
                ("charged_back", ChargedBack),
            ],
        );
    }

    #[test]
    fn test_pushinpay_table() {
        assert_table(
            GatewayKind::PushinPay,
            &[
                ("created", Pending),
                ("paid", Approved),
                ("canceled", Cancelled),
                ("cancelled", Cancelled),
                ("expired", Cancelled),
                ("refunded", Refunded),
            ],
        );
    }

    #[test]
    fn test_efi_table_is_case_insensitive() {
        assert_table(
            GatewayKind::Efi,
            &[
                ("ATIVA", Pending),
                ("CONCLUIDA", Approved),
                ("REMOVIDA_PELO_USUARIO_RECEBEDOR", Cancelled),
                ("REMOVIDA_PELO_PSP", Cancelled),
                ("DEVOLVIDO", Refunded),
            ],
        );
    }

    #[test]
    fn test_beehive_table() {
        assert_table(
            GatewayKind::Beehive,
            &[
                ("waiting_payment", Pending),
                ("processing", Pending),
                ("authorized", Pending),
                ("paid", Approved),
                ("refused", Rejected),
                ("canceled", Cancelled),
                ("refunded", Refunded),
                ("chargedback", ChargedBack),
            ],
        );
    }

    #[test]
    fn test_hypercash_table() {
        assert_table(
            GatewayKind::Hypercash,
            &[
                ("PENDING", Pending),
                ("WAITING_PAYMENT", Pending),
                ("APPROVED", Approved),
                ("PAID", Approved),
                ("REFUSED", Rejected),
                ("FAILED", Rejected),
                ("CANCELLED", Cancelled),
                ("EXPIRED", Cancelled),
                ("REFUNDED", Refunded),
                ("CHARGEBACK", ChargedBack),
            ],
        );
    }

    #[test]
    fn test_unknown_status_is_pending_for_every_provider() {
        for kind in GatewayKind::ALL {
            for raw in ["", "   ", "unknown", "APPROVED_MAYBE", "succeeded", "paid!"] {
                assert_eq!(normalize(kind, raw), Pending, "{kind}: {raw:?}");
            }
        }
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(normalize(GatewayKind::PushinPay, "  paid\n"), Approved);
    }

    #[test]
    fn test_tables_only_hold_lowercase_keys() {
        for kind in GatewayKind::ALL {
            for (raw, _) in table(kind) {
                assert_eq!(*raw, raw.to_lowercase(), "{kind}: {raw}");
            }
        }
    }
}
