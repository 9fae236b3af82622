use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::events::EventEntity;

#[automock]
#[async_trait]
pub trait EventRepository {
    async fn find_by_id(&self, event_id: Uuid) -> Result<Option<EventEntity>>;
}
