use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::eligibility_snapshots::EligibilitySnapshotEntity,
    value_objects::eligibility::EligibilityAggregates,
};

#[automock]
#[async_trait]
pub trait EligibilityRepository {
    async fn aggregate(
        &self,
        expert_id: Uuid,
        window_start: DateTime<Utc>,
    ) -> Result<EligibilityAggregates>;

    async fn find_snapshot(&self, expert_id: Uuid) -> Result<Option<EligibilitySnapshotEntity>>;

    /// Writes the snapshot only while the stored eligibility flag still equals
    /// `expected_eligible` (`None` when no snapshot exists). Returns false when
    /// a concurrent recompute changed it first.
    async fn upsert_snapshot(
        &self,
        snapshot: EligibilitySnapshotEntity,
        expected_eligible: Option<bool>,
    ) -> Result<bool>;

    /// Experts with at least one meeting, ordered for stable batching.
    async fn list_expert_ids(&self) -> Result<Vec<Uuid>>;
}
