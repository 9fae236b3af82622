use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::expert_payout_accounts::ExpertPayoutAccountEntity;

#[automock]
#[async_trait]
pub trait ExpertPayoutAccountRepository {
    async fn find_by_expert(&self, expert_id: Uuid) -> Result<Option<ExpertPayoutAccountEntity>>;
}
