use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::eligibility_snapshots::EligibilitySnapshotEntity;

const DAYS_PER_MONTH: i64 = 30;

/// Raw aggregates read from meetings and commission transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EligibilityAggregates {
    pub first_booking_at: Option<DateTime<Utc>>,
    pub window_booking_count: i64,
    pub window_gross_minor: i64,
    pub total_commissions_minor: i64,
    pub window_commissions_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityMetrics {
    pub months_active: i32,
    pub booking_count: i64,
    pub average_monthly_revenue_minor: i64,
    pub total_commissions_minor: i64,
    pub rolling_commissions_minor: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityRule {
    pub window_days: i64,
    pub min_months_active: i32,
    pub min_average_monthly_revenue_minor: i64,
}

impl Default for EligibilityRule {
    fn default() -> Self {
        Self {
            window_days: 90,
            min_months_active: 3,
            min_average_monthly_revenue_minor: 100_000,
        }
    }
}

impl EligibilityRule {
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.window_days.max(1))
    }

    pub fn derive_metrics(
        &self,
        aggregates: &EligibilityAggregates,
        now: DateTime<Utc>,
    ) -> EligibilityMetrics {
        let months_active = aggregates
            .first_booking_at
            .map(|first| ((now - first).num_days().max(0) / DAYS_PER_MONTH) as i32)
            .unwrap_or(0);

        let window_days = self.window_days.max(1);
        let average_monthly_revenue_minor =
            aggregates.window_gross_minor.saturating_mul(DAYS_PER_MONTH) / window_days;

        EligibilityMetrics {
            months_active,
            booking_count: aggregates.window_booking_count,
            average_monthly_revenue_minor,
            total_commissions_minor: aggregates.total_commissions_minor,
            rolling_commissions_minor: aggregates.window_commissions_minor,
        }
    }

    pub fn is_eligible(&self, metrics: &EligibilityMetrics) -> bool {
        metrics.months_active >= self.min_months_active
            && metrics.average_monthly_revenue_minor >= self.min_average_monthly_revenue_minor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityTransition {
    BecameEligible,
    BecameIneligible,
    Unchanged,
}

impl EligibilityTransition {
    /// A missing snapshot counts as "not eligible".
    pub fn between(previous: Option<bool>, current: bool) -> Self {
        match (previous.unwrap_or(false), current) {
            (false, true) => EligibilityTransition::BecameEligible,
            (true, false) => EligibilityTransition::BecameIneligible,
            _ => EligibilityTransition::Unchanged,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EligibilitySnapshotDto {
    pub expert_id: Uuid,
    pub months_active: i32,
    pub booking_count: i64,
    pub average_monthly_revenue_minor: i64,
    pub total_commissions_minor: i64,
    pub rolling_commissions_minor: i64,
    pub is_eligible: bool,
    pub transitioned_at: Option<DateTime<Utc>>,
    pub computed_at: DateTime<Utc>,
}

impl From<EligibilitySnapshotEntity> for EligibilitySnapshotDto {
    fn from(value: EligibilitySnapshotEntity) -> Self {
        Self {
            expert_id: value.expert_id,
            months_active: value.months_active,
            booking_count: value.booking_count,
            average_monthly_revenue_minor: value.average_monthly_revenue_minor,
            total_commissions_minor: value.total_commissions_minor,
            rolling_commissions_minor: value.rolling_commissions_minor,
            is_eligible: value.is_eligible,
            transitioned_at: value.transitioned_at,
            computed_at: value.computed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap()
    }

    #[test]
    fn average_monthly_revenue_spreads_the_window_gross() {
        let rule = EligibilityRule::default();
        let metrics = rule.derive_metrics(
            &EligibilityAggregates {
                first_booking_at: Some(now() - Duration::days(200)),
                window_booking_count: 12,
                window_gross_minor: 450_000,
                total_commissions_minor: 80_000,
                window_commissions_minor: 54_000,
            },
            now(),
        );

        assert_eq!(metrics.months_active, 6);
        assert_eq!(metrics.booking_count, 12);
        assert_eq!(metrics.average_monthly_revenue_minor, 150_000);
        assert_eq!(metrics.rolling_commissions_minor, 54_000);
        assert!(rule.is_eligible(&metrics));
    }

    #[test]
    fn new_experts_are_not_eligible_regardless_of_revenue() {
        let rule = EligibilityRule::default();
        let metrics = rule.derive_metrics(
            &EligibilityAggregates {
                first_booking_at: Some(now() - Duration::days(45)),
                window_booking_count: 40,
                window_gross_minor: 9_000_000,
                ..Default::default()
            },
            now(),
        );

        assert_eq!(metrics.months_active, 1);
        assert!(!rule.is_eligible(&metrics));
    }

    #[test]
    fn no_bookings_yields_zero_metrics() {
        let rule = EligibilityRule::default();
        let metrics = rule.derive_metrics(&EligibilityAggregates::default(), now());
        assert_eq!(metrics.months_active, 0);
        assert_eq!(metrics.average_monthly_revenue_minor, 0);
        assert!(!rule.is_eligible(&metrics));
    }

    #[test]
    fn transitions_only_fire_on_flag_changes() {
        use EligibilityTransition::*;
        assert_eq!(EligibilityTransition::between(None, true), BecameEligible);
        assert_eq!(EligibilityTransition::between(Some(false), true), BecameEligible);
        assert_eq!(EligibilityTransition::between(Some(true), true), Unchanged);
        assert_eq!(EligibilityTransition::between(Some(true), false), BecameIneligible);
        assert_eq!(EligibilityTransition::between(None, false), Unchanged);
    }
}
