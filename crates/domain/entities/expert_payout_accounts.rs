use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::expert_payout_accounts;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = expert_payout_accounts, primary_key(expert_id))]
pub struct ExpertPayoutAccountEntity {
    pub expert_id: Uuid,
    pub provider: String,
    pub account_ref: String,
    pub created_at: DateTime<Utc>,
}
