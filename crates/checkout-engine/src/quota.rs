//! Plan Quota
//!
//! Snapshot of a seller's plan limits against current usage, evaluated when a
//! buyer opens a checkout. The check is advisory: concurrent checkouts that are
//! admitted together may overshoot a limit.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;

use checkout_core::{AccountDirectory, SaleStore};

use crate::error::Result;

/// Why a seller cannot take new checkouts
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LimitReason {
    /// No subscription, or it is inactive or expired
    SubscriptionInactive,
    /// Approved sales this month reached the plan limit
    MonthlySalesLimit { limit: u32 },
    /// More active products than the plan allows
    ProductLimit { limit: u32 },
}

impl std::fmt::Display for LimitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitReason::SubscriptionInactive => write!(f, "subscription inactive or expired"),
            LimitReason::MonthlySalesLimit { limit } => {
                write!(f, "monthly sales limit of {limit} reached")
            }
            LimitReason::ProductLimit { limit } => {
                write!(f, "active product limit of {limit} exceeded")
            }
        }
    }
}

/// Plan limits and usage at one point in time
#[derive(Clone, Debug, Serialize)]
pub struct QuotaSnapshot {
    pub plan: Option<String>,
    pub subscription_current: bool,
    pub max_products: Option<u32>,
    pub max_monthly_sales: Option<u32>,
    pub active_products: u32,
    pub approved_this_month: u32,
}

/// First instant of the calendar month (UTC) containing `now`
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

impl QuotaSnapshot {
    /// Load limits and usage for a seller
    pub async fn load(
        directory: &dyn AccountDirectory,
        store: &dyn SaleStore,
        seller_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let subscription = directory.subscription(seller_id).await?;
        let active_products = directory.active_product_count(seller_id).await?;
        let approved_this_month = store
            .count_approved_since(seller_id, month_start(now))
            .await?;

        Ok(Self {
            plan: subscription.as_ref().map(|s| s.plan.clone()),
            subscription_current: subscription.as_ref().is_some_and(|s| s.is_current(now)),
            max_products: subscription.as_ref().and_then(|s| s.max_products),
            max_monthly_sales: subscription.as_ref().and_then(|s| s.max_monthly_sales),
            active_products,
            approved_this_month,
        })
    }

    /// Refuse when the plan does not allow another checkout
    pub fn check(&self) -> std::result::Result<(), LimitReason> {
        if !self.subscription_current {
            return Err(LimitReason::SubscriptionInactive);
        }
        if let Some(limit) = self.max_monthly_sales {
            if self.approved_this_month >= limit {
                return Err(LimitReason::MonthlySalesLimit { limit });
            }
        }
        if let Some(limit) = self.max_products {
            if self.active_products > limit {
                return Err(LimitReason::ProductLimit { limit });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(max_monthly_sales: Option<u32>, approved: u32) -> QuotaSnapshot {
        QuotaSnapshot {
            plan: Some("starter".into()),
            subscription_current: true,
            max_products: Some(3),
            max_monthly_sales,
            active_products: 1,
            approved_this_month: approved,
        }
    }

    #[test]
    fn test_monthly_cap_reached() {
        assert_eq!(
            snapshot(Some(5), 5).check(),
            Err(LimitReason::MonthlySalesLimit { limit: 5 })
        );
        assert!(snapshot(Some(5), 4).check().is_ok());
    }

    #[test]
    fn test_null_cap_is_unlimited() {
        assert!(snapshot(None, 10_000).check().is_ok());
    }

    #[test]
    fn test_inactive_subscription_wins() {
        let mut quota = snapshot(None, 0);
        quota.subscription_current = false;
        assert_eq!(quota.check(), Err(LimitReason::SubscriptionInactive));
    }

    #[test]
    fn test_product_limit_exceeded() {
        let mut quota = snapshot(None, 0);
        quota.active_products = 3;
        assert!(quota.check().is_ok());
        quota.active_products = 4;
        assert_eq!(quota.check(), Err(LimitReason::ProductLimit { limit: 3 }));
    }

    #[test]
    fn test_month_start() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        assert_eq!(
            month_start(now),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
        );
    }
}
