use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use crates::domain::{
    repositories::plan_rates::PlanRateRepository,
    value_objects::{
        enums::{plan_types::PlanType, tier_levels::TierLevel},
        plans::default_commission_rate_bps,
    },
};
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate_bps: i32,
    fetched_at: Instant,
}

/// Read-through TTL cache over `plan_rates`. The table stays authoritative: entries are
/// refetched once they are older than the TTL.
pub struct PlanRateCache<R>
where
    R: PlanRateRepository + Send + Sync + 'static,
{
    plan_rate_repo: Arc<R>,
    ttl: Duration,
    entries: RwLock<HashMap<(PlanType, TierLevel), CachedRate>>,
}

impl<R> PlanRateCache<R>
where
    R: PlanRateRepository + Send + Sync + 'static,
{
    pub fn new(plan_rate_repo: Arc<R>, ttl: Duration) -> Self {
        Self {
            plan_rate_repo,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn rate_bps(&self, plan_type: PlanType, tier_level: TierLevel) -> Result<i32> {
        let key = (plan_type, tier_level);

        if let Some(cached) = self.entries.read().await.get(&key)
            && cached.fetched_at.elapsed() < self.ttl
        {
            return Ok(cached.rate_bps);
        }

        let rate_bps = match self
            .plan_rate_repo
            .find_rate_bps(plan_type, tier_level)
            .await?
        {
            Some(rate_bps) => rate_bps,
            None => {
                let fallback = default_commission_rate_bps(plan_type, tier_level);
                warn!(
                    %plan_type,
                    %tier_level,
                    rate_bps = fallback,
                    "plan_rates: no rate row, using built-in default"
                );
                fallback
            }
        };

        debug!(%plan_type, %tier_level, rate_bps, "plan_rates: cache refreshed");
        self.entries.write().await.insert(
            key,
            CachedRate {
                rate_bps,
                fetched_at: Instant::now(),
            },
        );

        Ok(rate_bps)
    }
}
