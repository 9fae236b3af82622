use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::eligibility_snapshots;

#[derive(
    Debug, Clone, PartialEq, Eq, Identifiable, Selectable, Queryable, Insertable, AsChangeset,
)]
#[diesel(table_name = eligibility_snapshots, primary_key(expert_id))]
#[diesel(treat_none_as_null = true)]
pub struct EligibilitySnapshotEntity {
    pub expert_id: Uuid,
    pub months_active: i32,
    pub booking_count: i64,
    pub average_monthly_revenue_minor: i64,
    pub total_commissions_minor: i64,
    pub rolling_commissions_minor: i64,
    pub is_eligible: bool,
    pub transitioned_at: Option<DateTime<Utc>>,
    pub notified_at: Option<DateTime<Utc>>,
    pub computed_at: DateTime<Utc>,
}
