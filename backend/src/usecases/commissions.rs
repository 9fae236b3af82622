use std::sync::Arc;

use anyhow::Result;
use crates::domain::{
    entities::{
        commission_transactions::{CommissionTransactionEntity, InsertCommissionTransactionEntity},
        meetings::MeetingEntity,
    },
    repositories::{
        commission_transactions::CommissionTransactionRepository, plan_rates::PlanRateRepository,
        subscription_plans::SubscriptionPlanRepository,
    },
    value_objects::{
        commissions::{CommissionSplit, CommissionTransactionDto},
        enums::{plan_types::PlanType, tier_levels::TierLevel},
    },
};
use tracing::{debug, info};
use uuid::Uuid;

use super::plan_rates::PlanRateCache;

pub const MAX_PAGE_SIZE: i64 = 100;

pub struct CommissionUseCase<P, R, C>
where
    P: SubscriptionPlanRepository + Send + Sync + 'static,
    R: PlanRateRepository + Send + Sync + 'static,
    C: CommissionTransactionRepository + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
    rates: Arc<PlanRateCache<R>>,
    commission_repo: Arc<C>,
}

impl<P, R, C> CommissionUseCase<P, R, C>
where
    P: SubscriptionPlanRepository + Send + Sync + 'static,
    R: PlanRateRepository + Send + Sync + 'static,
    C: CommissionTransactionRepository + Send + Sync + 'static,
{
    pub fn new(plan_repo: Arc<P>, rates: Arc<PlanRateCache<R>>, commission_repo: Arc<C>) -> Self {
        Self {
            plan_repo,
            rates,
            commission_repo,
        }
    }

    /// Freezes the commission split for a meeting using the expert's plan as of now.
    /// Calling it again for the same meeting returns the stored snapshot.
    pub async fn compute_and_record(
        &self,
        meeting: &MeetingEntity,
    ) -> Result<CommissionTransactionEntity> {
        if let Some(existing) = self.commission_repo.find_by_meeting(meeting.id).await? {
            debug!(meeting_id = %meeting.id, "commissions: snapshot already recorded");
            return Ok(existing);
        }

        let (plan_type, tier_level) = match self.plan_repo.find_active(meeting.expert_id).await? {
            Some(plan) => (plan.plan_type, plan.tier_level),
            None => (PlanType::default(), TierLevel::default()),
        };
        let rate_bps = self.rates.rate_bps(plan_type, tier_level).await?;
        let split = CommissionSplit::compute(meeting.amount_minor, rate_bps)?;

        let recorded = self
            .commission_repo
            .record(InsertCommissionTransactionEntity::snapshot(
                meeting.id,
                meeting.expert_id,
                meeting.currency.clone(),
                split,
                plan_type,
                tier_level,
            ))
            .await?;

        info!(
            meeting_id = %meeting.id,
            expert_id = %meeting.expert_id,
            %plan_type,
            %tier_level,
            rate_bps = recorded.rate_bps,
            commission_minor = recorded.commission_amount_minor,
            net_minor = recorded.net_amount_minor,
            "commissions: snapshot recorded"
        );

        Ok(recorded)
    }

    pub async fn list_for_expert(
        &self,
        expert_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<CommissionTransactionDto>> {
        let limit = limit.unwrap_or(20).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);

        let rows = self
            .commission_repo
            .list_by_expert(expert_id, limit, offset)
            .await?;

        Ok(rows.into_iter().map(CommissionTransactionDto::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use crates::domain::{
        entities::subscription_plans::SubscriptionPlanEntity,
        repositories::{
            commission_transactions::MockCommissionTransactionRepository,
            plan_rates::MockPlanRateRepository,
            subscription_plans::MockSubscriptionPlanRepository,
        },
        value_objects::{
            enums::{
                commission_statuses::CommissionStatus,
                meeting_payment_statuses::MeetingPaymentStatus,
            },
            reservations::GuestContact,
            time_windows::TimeWindow,
        },
    };
    use mockall::predicate::eq;

    fn meeting(amount_minor: i64) -> MeetingEntity {
        let start = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();
        MeetingEntity {
            id: Uuid::new_v4(),
            reservation_id: None,
            event_id: None,
            expert_id: Uuid::new_v4(),
            guest: GuestContact {
                account_id: None,
                name: "Guest".to_string(),
                email: "guest@example.com".to_string(),
            },
            window: TimeWindow::new(start, start + Duration::minutes(30)).unwrap(),
            amount_minor,
            currency: "usd".to_string(),
            payment_intent_id: "pi_123".to_string(),
            payment_status: MeetingPaymentStatus::Succeeded,
            transfer_ref: None,
            created_at: start,
        }
    }

    fn stored(insert: &InsertCommissionTransactionEntity) -> CommissionTransactionEntity {
        CommissionTransactionEntity {
            id: Uuid::new_v4(),
            meeting_id: insert.meeting_id,
            expert_id: insert.expert_id,
            gross_amount_minor: insert.gross_amount_minor,
            rate_bps: insert.rate_bps,
            commission_amount_minor: insert.commission_amount_minor,
            net_amount_minor: insert.net_amount_minor,
            currency: insert.currency.clone(),
            plan_type: PlanType::try_from(insert.plan_type.as_str()).unwrap(),
            tier_level: TierLevel::try_from(insert.tier_level.as_str()).unwrap(),
            status: CommissionStatus::Recorded,
            created_at: Utc::now(),
        }
    }

    fn rates(rate_bps: i32) -> Arc<PlanRateCache<MockPlanRateRepository>> {
        let mut repo = MockPlanRateRepository::new();
        repo.expect_find_rate_bps()
            .returning(move |_, _| Ok(Some(rate_bps)));
        Arc::new(PlanRateCache::new(
            Arc::new(repo),
            std::time::Duration::from_secs(60),
        ))
    }

    #[tokio::test]
    async fn records_split_with_plan_observed_at_this_instant() {
        let meeting = meeting(10_000);
        let expert_id = meeting.expert_id;

        let mut plans = MockSubscriptionPlanRepository::new();
        plans
            .expect_find_active()
            .with(eq(expert_id))
            .returning(move |_| {
                Ok(Some(SubscriptionPlanEntity {
                    id: Uuid::new_v4(),
                    expert_id,
                    plan_type: PlanType::Monthly,
                    tier_level: TierLevel::Premium,
                    effective_from: Utc::now(),
                    effective_to: None,
                }))
            });

        let mut commissions = MockCommissionTransactionRepository::new();
        commissions.expect_find_by_meeting().returning(|_| Ok(None));
        commissions
            .expect_record()
            .withf(|insert| {
                insert.rate_bps == 1_200
                    && insert.commission_amount_minor == 1_200
                    && insert.net_amount_minor == 8_800
                    && insert.plan_type == "monthly"
                    && insert.tier_level == "premium"
                    && insert.status == "recorded"
            })
            .times(1)
            .returning(|insert| Ok(stored(&insert)));

        let recorded = CommissionUseCase::new(Arc::new(plans), rates(1_200), Arc::new(commissions))
            .compute_and_record(&meeting)
            .await
            .unwrap();

        assert_eq!(recorded.commission_amount_minor + recorded.net_amount_minor, 10_000);
        assert_eq!(recorded.plan_type, PlanType::Monthly);
    }

    #[tokio::test]
    async fn experts_without_a_plan_pay_the_commission_only_rate() {
        let mut plans = MockSubscriptionPlanRepository::new();
        plans.expect_find_active().returning(|_| Ok(None));

        let mut rate_repo = MockPlanRateRepository::new();
        rate_repo
            .expect_find_rate_bps()
            .with(eq(PlanType::CommissionOnly), eq(TierLevel::Standard))
            .returning(|_, _| Ok(Some(1_500)));
        let rates = Arc::new(PlanRateCache::new(
            Arc::new(rate_repo),
            std::time::Duration::from_secs(60),
        ));

        let mut commissions = MockCommissionTransactionRepository::new();
        commissions.expect_find_by_meeting().returning(|_| Ok(None));
        commissions
            .expect_record()
            .withf(|insert| insert.commission_amount_minor == 188 && insert.net_amount_minor == 1_062)
            .returning(|insert| Ok(stored(&insert)));

        CommissionUseCase::new(Arc::new(plans), rates, Arc::new(commissions))
            .compute_and_record(&meeting(1_250))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn existing_snapshot_is_returned_unchanged() {
        let meeting = meeting(10_000);
        let existing = stored(&InsertCommissionTransactionEntity::snapshot(
            meeting.id,
            meeting.expert_id,
            "usd".to_string(),
            CommissionSplit::compute(10_000, 1_500).unwrap(),
            PlanType::CommissionOnly,
            TierLevel::Standard,
        ));
        let existing_id = existing.id;

        let mut plans = MockSubscriptionPlanRepository::new();
        plans.expect_find_active().never();
        let mut commissions = MockCommissionTransactionRepository::new();
        commissions
            .expect_find_by_meeting()
            .with(eq(meeting.id))
            .returning(move |_| Ok(Some(existing.clone())));
        commissions.expect_record().never();

        let recorded = CommissionUseCase::new(Arc::new(plans), rates(900), Arc::new(commissions))
            .compute_and_record(&meeting)
            .await
            .unwrap();

        assert_eq!(recorded.id, existing_id);
        assert_eq!(recorded.rate_bps, 1_500);
    }

    #[tokio::test]
    async fn history_pages_are_clamped() {
        let expert_id = Uuid::new_v4();
        let mut commissions = MockCommissionTransactionRepository::new();
        commissions
            .expect_list_by_expert()
            .with(eq(expert_id), eq(MAX_PAGE_SIZE), eq(0))
            .times(1)
            .returning(|_, _, _| Ok(vec![]));

        let rows = CommissionUseCase::new(
            Arc::new(MockSubscriptionPlanRepository::new()),
            rates(1_000),
            Arc::new(commissions),
        )
        .list_for_expert(expert_id, Some(5_000), Some(-3))
        .await
        .unwrap();

        assert!(rows.is_empty());
    }
}
