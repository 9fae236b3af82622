use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::enums::{
    commission_statuses::CommissionStatus, plan_types::PlanType, tier_levels::TierLevel,
};
use crate::domain::entities::commission_transactions::CommissionTransactionEntity;

pub const BASIS_POINTS_SCALE: i64 = 10_000;

/// The commission/net division of one gross amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
    pub gross_amount_minor: i64,
    pub rate_bps: i32,
    pub commission_amount_minor: i64,
    pub net_amount_minor: i64,
}

impl CommissionSplit {
    /// `commission = round_half_up(gross * rate / 10000)`, `net = gross - commission`.
    pub fn compute(gross_amount_minor: i64, rate_bps: i32) -> Result<Self> {
        if gross_amount_minor < 0 {
            bail!("gross amount must not be negative");
        }
        if !(0..=BASIS_POINTS_SCALE as i32).contains(&rate_bps) {
            bail!("commission rate {rate_bps} bps is outside 0..=10000");
        }

        let scaled = gross_amount_minor
            .checked_mul(i64::from(rate_bps))
            .and_then(|v| v.checked_add(BASIS_POINTS_SCALE / 2))
            .context("commission computation overflowed")?;
        let commission_amount_minor = scaled / BASIS_POINTS_SCALE;

        Ok(Self {
            gross_amount_minor,
            rate_bps,
            commission_amount_minor,
            net_amount_minor: gross_amount_minor - commission_amount_minor,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommissionTransactionDto {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub gross_amount_minor: i64,
    pub rate_bps: i32,
    pub commission_amount_minor: i64,
    pub net_amount_minor: i64,
    pub currency: String,
    pub plan_type: PlanType,
    pub tier_level: TierLevel,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
}

impl From<CommissionTransactionEntity> for CommissionTransactionDto {
    fn from(value: CommissionTransactionEntity) -> Self {
        Self {
            id: value.id,
            meeting_id: value.meeting_id,
            gross_amount_minor: value.gross_amount_minor,
            rate_bps: value.rate_bps,
            commission_amount_minor: value.commission_amount_minor,
            net_amount_minor: value.net_amount_minor,
            currency: value.currency,
            plan_type: value.plan_type,
            tier_level: value.tier_level,
            status: value.status,
            created_at: value.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twelve_percent_of_one_hundred() {
        let split = CommissionSplit::compute(10_000, 1_200).unwrap();
        assert_eq!(split.commission_amount_minor, 1_200);
        assert_eq!(split.net_amount_minor, 8_800);
    }

    #[test]
    fn half_cent_rounds_up() {
        // 1250 * 1500 / 10000 = 187.5
        let split = CommissionSplit::compute(1_250, 1_500).unwrap();
        assert_eq!(split.commission_amount_minor, 188);
        assert_eq!(split.net_amount_minor, 1_062);
    }

    #[test]
    fn below_half_cent_rounds_down() {
        // 1249 * 1500 / 10000 = 187.35
        let split = CommissionSplit::compute(1_249, 1_500).unwrap();
        assert_eq!(split.commission_amount_minor, 187);
    }

    #[test]
    fn parts_always_sum_to_gross() {
        for gross in [0_i64, 1, 7, 99, 333, 1_001, 49_999, 1_000_000_007] {
            for rate in [0, 1, 300, 1_200, 1_500, 3_333, 10_000] {
                let split = CommissionSplit::compute(gross, rate).unwrap();
                assert_eq!(
                    split.commission_amount_minor + split.net_amount_minor,
                    gross,
                    "gross {gross} rate {rate}"
                );
                let expected = (gross * i64::from(rate) + 5_000) / 10_000;
                assert_eq!(split.commission_amount_minor, expected);
            }
        }
    }

    #[test]
    fn zero_and_full_rate_edges() {
        let free = CommissionSplit::compute(5_000, 0).unwrap();
        assert_eq!((free.commission_amount_minor, free.net_amount_minor), (0, 5_000));

        let all = CommissionSplit::compute(5_000, 10_000).unwrap();
        assert_eq!((all.commission_amount_minor, all.net_amount_minor), (5_000, 0));
    }

    #[test]
    fn rejects_invalid_inputs() {
        assert!(CommissionSplit::compute(-1, 1_000).is_err());
        assert!(CommissionSplit::compute(1_000, 10_001).is_err());
        assert!(CommissionSplit::compute(1_000, -5).is_err());
        assert!(CommissionSplit::compute(i64::MAX, 10_000).is_err());
    }
}
