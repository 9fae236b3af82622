use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{prelude::*, result::Error as DieselError};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain;
use crate::infra::db::postgres::{
    postgres_connection::PgPoolSquad,
    schema::{commission_transactions, meetings, payment_transfers, slot_reservations},
};
use domain::{
    entities::meetings::{InsertMeetingEntity, MeetingEntity, MeetingRow},
    repositories::meetings::MeetingRepository,
    value_objects::{
        enums::{
            commission_statuses::CommissionStatus, meeting_payment_statuses::MeetingPaymentStatus,
            reservation_statuses::ReservationStatus, transfer_statuses::TransferStatus,
        },
        meetings::{ConfirmationOutcome, PaymentReversal, ReservationLink, ReversedTransfer},
    },
};

pub struct MeetingPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl MeetingPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn confirm_hold(conn: &mut PgConnection, reservation_id: Uuid, meeting_id: Uuid) -> QueryResult<bool> {
    let updated = diesel::update(
        slot_reservations::table
            .filter(slot_reservations::id.eq(reservation_id))
            .filter(slot_reservations::status.eq(ReservationStatus::Pending.as_str())),
    )
    .set((
        slot_reservations::status.eq(ReservationStatus::Confirmed.as_str()),
        slot_reservations::meeting_id.eq(Some(meeting_id)),
        slot_reservations::updated_at.eq(Utc::now()),
    ))
    .execute(conn)?;

    Ok(updated > 0)
}

/// Stored reservation id first, then expert + window + guest.
fn link_reservation(
    conn: &mut PgConnection,
    meeting: &InsertMeetingEntity,
    meeting_id: Uuid,
) -> QueryResult<ReservationLink> {
    if let Some(reservation_id) = meeting.reservation_id {
        if confirm_hold(conn, reservation_id, meeting_id)? {
            return Ok(ReservationLink::Confirmed(reservation_id));
        }
    }

    let candidate = slot_reservations::table
        .filter(slot_reservations::expert_id.eq(meeting.expert_id))
        .filter(slot_reservations::start_time.eq(meeting.start_time))
        .filter(slot_reservations::end_time.eq(meeting.end_time))
        .filter(slot_reservations::guest_email.eq(&meeting.guest_email))
        .filter(slot_reservations::status.eq(ReservationStatus::Pending.as_str()))
        .order(slot_reservations::created_at.desc())
        .select(slot_reservations::id)
        .for_update()
        .first::<Uuid>(conn)
        .optional()?;

    if let Some(reservation_id) = candidate {
        if confirm_hold(conn, reservation_id, meeting_id)? {
            return Ok(ReservationLink::Confirmed(reservation_id));
        }
    }

    Ok(ReservationLink::ExpiredOrMissing)
}

#[async_trait]
impl MeetingRepository for MeetingPostgres {
    async fn confirm(&self, meeting: InsertMeetingEntity) -> Result<ConfirmationOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let (row, link) = conn.transaction::<_, DieselError, _>(|conn| {
            let inserted = diesel::insert_into(meetings::table)
                .values(&meeting)
                .on_conflict(meetings::payment_intent_id)
                .do_nothing()
                .returning(MeetingRow::as_returning())
                .get_result::<MeetingRow>(conn)
                .optional()?;

            match inserted {
                Some(row) => {
                    let link = link_reservation(conn, &meeting, row.id)?;
                    Ok((row, Some(link)))
                }
                None => {
                    let existing = meetings::table
                        .filter(meetings::payment_intent_id.eq(&meeting.payment_intent_id))
                        .select(MeetingRow::as_select())
                        .first::<MeetingRow>(conn)?;
                    Ok((existing, None))
                }
            }
        })?;

        let entity = MeetingEntity::try_from(row)?;
        Ok(match link {
            Some(reservation) => ConfirmationOutcome::Created {
                meeting: entity,
                reservation,
            },
            None => ConfirmationOutcome::AlreadyConfirmed(entity),
        })
    }

    async fn find_by_id(&self, meeting_id: Uuid) -> Result<Option<MeetingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = meetings::table
            .find(meeting_id)
            .select(MeetingRow::as_select())
            .first::<MeetingRow>(&mut conn)
            .optional()?;

        row.map(MeetingEntity::try_from).transpose()
    }

    async fn find_by_payment_intent(
        &self,
        payment_intent_id: String,
    ) -> Result<Option<MeetingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = meetings::table
            .filter(meetings::payment_intent_id.eq(payment_intent_id))
            .select(MeetingRow::as_select())
            .first::<MeetingRow>(&mut conn)
            .optional()?;

        row.map(MeetingEntity::try_from).transpose()
    }

    async fn reverse_payment(
        &self,
        payment_intent_id: String,
        payment_status: MeetingPaymentStatus,
        commission_status: CommissionStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentReversal>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let hold_reason = format!("payment {payment_status} before payout");
        let commission_sources: Vec<&'static str> =
            CommissionStatus::allowed_sources(commission_status)
                .iter()
                .map(CommissionStatus::as_str)
                .collect();
        let unstarted: Vec<&'static str> = TransferStatus::claimable()
            .iter()
            .map(TransferStatus::as_str)
            .collect();

        let reversed = conn.transaction::<_, DieselError, _>(|conn| {
            let Some(row) = diesel::update(
                meetings::table.filter(meetings::payment_intent_id.eq(&payment_intent_id)),
            )
            .set((
                meetings::payment_status.eq(payment_status.as_str()),
                meetings::updated_at.eq(now),
            ))
            .returning(MeetingRow::as_returning())
            .get_result::<MeetingRow>(conn)
            .optional()?
            else {
                return Ok(None);
            };

            let commission_updated = diesel::update(
                commission_transactions::table
                    .filter(commission_transactions::meeting_id.eq(row.id))
                    .filter(commission_transactions::status.eq_any(commission_sources)),
            )
            .set((
                commission_transactions::status.eq(commission_status.as_str()),
                commission_transactions::updated_at.eq(now),
            ))
            .execute(conn)?
                > 0;

            // A live lease means the gateway call is in flight; that row stays with its worker.
            let abandoned = payment_transfers::status
                .eq(TransferStatus::Processing.as_str())
                .and(payment_transfers::leased_until.assume_not_null().lt(now));
            let held = diesel::update(
                payment_transfers::table
                    .filter(payment_transfers::meeting_id.eq(row.id))
                    .filter(payment_transfers::status.eq_any(unstarted).or(abandoned)),
            )
            .set((
                payment_transfers::status.eq(TransferStatus::RequiresApproval.as_str()),
                payment_transfers::last_error.eq(Some(hold_reason.as_str())),
                payment_transfers::approved.eq(false),
                payment_transfers::locked_by.eq(None::<String>),
                payment_transfers::leased_until.eq(None::<DateTime<Utc>>),
                payment_transfers::updated_at.eq(now),
            ))
            .execute(conn)?
                > 0;

            let transfer = payment_transfers::table
                .filter(payment_transfers::meeting_id.eq(row.id))
                .select((payment_transfers::id, payment_transfers::status))
                .first::<(Uuid, String)>(conn)
                .optional()?;

            Ok(Some((row, commission_updated, held, transfer)))
        })?;

        let Some((row, commission_updated, held, transfer)) = reversed else {
            return Ok(None);
        };

        let transfer = transfer
            .map(|(transfer_id, status)| {
                Ok::<_, anyhow::Error>(ReversedTransfer {
                    transfer_id,
                    status: TransferStatus::try_from(status.as_str())?,
                    held,
                })
            })
            .transpose()?;

        Ok(Some(PaymentReversal {
            meeting: MeetingEntity::try_from(row)?,
            commission_updated,
            transfer,
        }))
    }

    async fn list_unsettled(&self, limit: i64) -> Result<Vec<MeetingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = meetings::table
            .left_join(commission_transactions::table)
            .left_join(payment_transfers::table)
            .filter(meetings::payment_status.eq(MeetingPaymentStatus::Succeeded.as_str()))
            .filter(
                commission_transactions::id
                    .nullable()
                    .is_null()
                    .or(payment_transfers::id.nullable().is_null()),
            )
            .order(meetings::created_at.asc())
            .limit(limit)
            .select(MeetingRow::as_select())
            .load::<MeetingRow>(&mut conn)?;

        rows.into_iter().map(MeetingEntity::try_from).collect()
    }
}
