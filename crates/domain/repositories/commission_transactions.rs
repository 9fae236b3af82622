use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::commission_transactions::{
    CommissionTransactionEntity, InsertCommissionTransactionEntity,
};

#[automock]
#[async_trait]
pub trait CommissionTransactionRepository {
    /// Idempotent per meeting: a second call returns the stored snapshot untouched.
    async fn record(
        &self,
        commission: InsertCommissionTransactionEntity,
    ) -> Result<CommissionTransactionEntity>;

    async fn find_by_meeting(&self, meeting_id: Uuid)
    -> Result<Option<CommissionTransactionEntity>>;

    async fn list_by_expert(
        &self,
        expert_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CommissionTransactionEntity>>;

}
