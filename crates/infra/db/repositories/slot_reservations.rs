use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain;
use crate::infra::db::postgres::{
    postgres_connection::PgPoolSquad,
    schema::{meetings, slot_reservations},
};
use domain::{
    entities::slot_reservations::{
        InsertSlotReservationEntity, SlotReservationEntity, SlotReservationRow,
    },
    repositories::slot_reservations::SlotReservationRepository,
    value_objects::{
        enums::reservation_statuses::ReservationStatus,
        reservations::{CancelReservationOutcome, ReminderTier, ReserveSlotOutcome},
        time_windows::TimeWindow,
    },
};

const MAX_SERIALIZATION_RETRIES: u32 = 3;
const NO_OVERLAP_CONSTRAINT: &str = "slot_reservations_pending_no_overlap";

pub struct SlotReservationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SlotReservationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

/// `None` means the window is taken. Pending holds past their expiry still
/// count until the sweep has expired them.
fn check_and_insert(
    conn: &mut PgConnection,
    reservation: &InsertSlotReservationEntity,
    window: &TimeWindow,
) -> QueryResult<Option<SlotReservationRow>> {
    let held = slot_reservations::table
        .filter(slot_reservations::expert_id.eq(reservation.expert_id))
        .filter(slot_reservations::status.eq(ReservationStatus::Pending.as_str()))
        .filter(slot_reservations::start_time.lt(window.end()))
        .filter(slot_reservations::end_time.gt(window.start()))
        .select(slot_reservations::id)
        .first::<Uuid>(conn)
        .optional()?;
    if held.is_some() {
        return Ok(None);
    }

    let booked = meetings::table
        .filter(meetings::expert_id.eq(reservation.expert_id))
        .filter(meetings::start_time.lt(window.end()))
        .filter(meetings::end_time.gt(window.start()))
        .select(meetings::id)
        .first::<Uuid>(conn)
        .optional()?;
    if booked.is_some() {
        return Ok(None);
    }

    diesel::insert_into(slot_reservations::table)
        .values(reservation)
        .returning(SlotReservationRow::as_returning())
        .get_result::<SlotReservationRow>(conn)
        .map(Some)
}

#[async_trait]
impl SlotReservationRepository for SlotReservationPostgres {
    async fn reserve(&self, reservation: InsertSlotReservationEntity) -> Result<ReserveSlotOutcome> {
        let window = reservation.window()?;
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = conn
                .build_transaction()
                .serializable()
                .run(|conn| check_and_insert(conn, &reservation, &window));

            match result {
                Ok(Some(row)) => return Ok(ReserveSlotOutcome::Reserved(row.try_into()?)),
                Ok(None) => return Ok(ReserveSlotOutcome::Conflict),
                Err(DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _))
                    if attempt < MAX_SERIALIZATION_RETRIES =>
                {
                    debug!(
                        expert_id = %reservation.expert_id,
                        attempt,
                        "reservations: serialization failure, retrying"
                    );
                }
                Err(DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _)) => {
                    warn!(
                        expert_id = %reservation.expert_id,
                        attempt,
                        "reservations: serialization retries exhausted, reporting conflict"
                    );
                    return Ok(ReserveSlotOutcome::Conflict);
                }
                Err(DieselError::DatabaseError(_, info))
                    if info.constraint_name() == Some(NO_OVERLAP_CONSTRAINT) =>
                {
                    return Ok(ReserveSlotOutcome::Conflict);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn find_by_id(&self, reservation_id: Uuid) -> Result<Option<SlotReservationEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = slot_reservations::table
            .find(reservation_id)
            .select(SlotReservationRow::as_select())
            .first::<SlotReservationRow>(&mut conn)
            .optional()?;

        row.map(SlotReservationEntity::try_from).transpose()
    }

    async fn cancel(&self, reservation_id: Uuid) -> Result<CancelReservationOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let current = conn.transaction::<Option<String>, DieselError, _>(|conn| {
            let status = slot_reservations::table
                .find(reservation_id)
                .select(slot_reservations::status)
                .for_update()
                .first::<String>(conn)
                .optional()?;

            if status.as_deref() == Some(ReservationStatus::Pending.as_str()) {
                diesel::update(slot_reservations::table.find(reservation_id))
                    .set((
                        slot_reservations::status.eq(ReservationStatus::Cancelled.as_str()),
                        slot_reservations::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;
            }

            Ok(status)
        })?;

        match current {
            None => bail!("reservation {reservation_id} not found"),
            Some(status) => match ReservationStatus::try_from(status.as_str())? {
                ReservationStatus::Pending => Ok(CancelReservationOutcome::Cancelled),
                other => Ok(CancelReservationOutcome::Unchanged(other)),
            },
        }
    }

    async fn attach_payment_intent(
        &self,
        reservation_id: Uuid,
        payment_intent_ref: String,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = diesel::update(
            slot_reservations::table
                .filter(slot_reservations::id.eq(reservation_id))
                .filter(slot_reservations::status.eq(ReservationStatus::Pending.as_str())),
        )
        .set((
            slot_reservations::payment_intent_ref.eq(Some(payment_intent_ref)),
            slot_reservations::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated > 0)
    }

    async fn expire_stale_batch(&self, now: DateTime<Utc>, batch_size: i64) -> Result<Vec<Uuid>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let expired = conn.transaction::<Vec<Uuid>, DieselError, _>(|conn| {
            let candidates = slot_reservations::table
                .filter(slot_reservations::status.eq(ReservationStatus::Pending.as_str()))
                .filter(slot_reservations::expires_at.lt(now))
                .order(slot_reservations::expires_at.asc())
                .limit(batch_size)
                .select(slot_reservations::id)
                .for_update()
                .skip_locked()
                .load::<Uuid>(conn)?;

            if candidates.is_empty() {
                return Ok(candidates);
            }

            // Re-checked under the row lock so a confirmation that won the race is never expired.
            diesel::update(
                slot_reservations::table
                    .filter(slot_reservations::id.eq_any(&candidates))
                    .filter(slot_reservations::status.eq(ReservationStatus::Pending.as_str())),
            )
            .set((
                slot_reservations::status.eq(ReservationStatus::Expired.as_str()),
                slot_reservations::updated_at.eq(now),
            ))
            .returning(slot_reservations::id)
            .get_results::<Uuid>(conn)
        })?;

        Ok(expired)
    }

    async fn list_due_for_reminder(
        &self,
        tier: ReminderTier,
        now: DateTime<Utc>,
        due_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<SlotReservationEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let base = slot_reservations::table
            .filter(slot_reservations::status.eq(ReservationStatus::Pending.as_str()))
            .filter(slot_reservations::expires_at.gt(now))
            .filter(slot_reservations::expires_at.le(due_before))
            .order(slot_reservations::expires_at.asc())
            .limit(limit)
            .select(SlotReservationRow::as_select())
            .into_boxed();

        let query = match tier {
            ReminderTier::First => base.filter(slot_reservations::first_reminder_sent_at.is_null()),
            ReminderTier::Second => {
                base.filter(slot_reservations::second_reminder_sent_at.is_null())
            }
        };

        let rows = query.load::<SlotReservationRow>(&mut conn)?;

        rows.into_iter()
            .map(SlotReservationEntity::try_from)
            .collect()
    }

    async fn mark_reminder_sent(
        &self,
        reservation_id: Uuid,
        tier: ReminderTier,
        sent_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let target = slot_reservations::table
            .filter(slot_reservations::id.eq(reservation_id))
            .filter(slot_reservations::status.eq(ReservationStatus::Pending.as_str()));

        let updated = match tier {
            ReminderTier::First => diesel::update(
                target.filter(slot_reservations::first_reminder_sent_at.is_null()),
            )
            .set(slot_reservations::first_reminder_sent_at.eq(Some(sent_at)))
            .execute(&mut conn)?,
            ReminderTier::Second => diesel::update(
                target.filter(slot_reservations::second_reminder_sent_at.is_null()),
            )
            .set(slot_reservations::second_reminder_sent_at.eq(Some(sent_at)))
            .execute(&mut conn)?,
        };

        Ok(updated > 0)
    }
}
