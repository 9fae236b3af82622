use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{prelude::*, result::Error as DieselError};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::domain;
use crate::infra::db::postgres::{
    postgres_connection::PgPoolSquad,
    schema::{commission_transactions, meetings, payment_transfers},
};
use domain::{
    entities::payment_transfers::{
        InsertPaymentTransferEntity, PaymentTransferEntity, PaymentTransferRow,
    },
    repositories::payment_transfers::PaymentTransferRepository,
    value_objects::enums::{
        commission_statuses::CommissionStatus, meeting_payment_statuses::MeetingPaymentStatus,
        transfer_statuses::TransferStatus,
    },
};

pub struct PaymentTransferPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentTransferPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

const LEASE_EXPIRED: &str = "lease expired before the outcome was recorded";

fn into_entities(rows: Vec<PaymentTransferRow>) -> Result<Vec<PaymentTransferEntity>> {
    rows.into_iter()
        .map(PaymentTransferEntity::try_from)
        .collect()
}

#[async_trait]
impl PaymentTransferRepository for PaymentTransferPostgres {
    async fn schedule(
        &self,
        transfer: InsertPaymentTransferEntity,
    ) -> Result<PaymentTransferEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = diesel::insert_into(payment_transfers::table)
            .values(&transfer)
            .on_conflict(payment_transfers::meeting_id)
            .do_nothing()
            .returning(PaymentTransferRow::as_returning())
            .get_result::<PaymentTransferRow>(&mut conn)
            .optional()?;

        let row = match inserted {
            Some(row) => row,
            None => payment_transfers::table
                .filter(payment_transfers::meeting_id.eq(transfer.meeting_id))
                .select(PaymentTransferRow::as_select())
                .first::<PaymentTransferRow>(&mut conn)?,
        };

        row.try_into()
    }

    async fn find_by_id(&self, transfer_id: Uuid) -> Result<Option<PaymentTransferEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = payment_transfers::table
            .find(transfer_id)
            .select(PaymentTransferRow::as_select())
            .first::<PaymentTransferRow>(&mut conn)
            .optional()?;

        row.map(PaymentTransferEntity::try_from).transpose()
    }

    async fn list_by_status(
        &self,
        status: TransferStatus,
        limit: i64,
    ) -> Result<Vec<PaymentTransferEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = payment_transfers::table
            .filter(payment_transfers::status.eq(status.as_str()))
            .order(payment_transfers::updated_at.asc())
            .limit(limit)
            .select(PaymentTransferRow::as_select())
            .load::<PaymentTransferRow>(&mut conn)?;

        into_entities(rows)
    }

    async fn claim_due(
        &self,
        worker_id: String,
        now: DateTime<Utc>,
        leased_until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PaymentTransferEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let claimable: Vec<&'static str> = TransferStatus::claimable()
            .iter()
            .map(TransferStatus::as_str)
            .collect();

        let rows = conn.transaction::<Vec<PaymentTransferRow>, DieselError, _>(|conn| {
            let due = payment_transfers::status
                .eq_any(claimable)
                .and(payment_transfers::scheduled_transfer_time.le(now))
                .and(payment_transfers::next_attempt_at.le(now));
            // A worker that crashed mid-call leaves its lease behind; it is reclaimed once stale.
            let stale_lease = payment_transfers::status
                .eq(TransferStatus::Processing.as_str())
                .and(payment_transfers::leased_until.assume_not_null().lt(now));

            let candidates = payment_transfers::table
                .filter(due.or(stale_lease))
                // Refunded or disputed bookings are never paid out.
                .filter(
                    payment_transfers::meeting_id.eq_any(
                        meetings::table
                            .filter(
                                meetings::payment_status
                                    .eq(MeetingPaymentStatus::Succeeded.as_str()),
                            )
                            .select(meetings::id),
                    ),
                )
                .order(payment_transfers::next_attempt_at.asc())
                .limit(limit)
                .select((payment_transfers::id, payment_transfers::status))
                .for_update()
                .skip_locked()
                .load::<(Uuid, String)>(conn)?;

            if candidates.is_empty() {
                return Ok(Vec::new());
            }

            // An abandoned lease counts as a failed attempt so a payout that keeps
            // killing its worker still reaches the retry bound.
            let reclaimed: Vec<Uuid> = candidates
                .iter()
                .filter(|(_, status)| status == TransferStatus::Processing.as_str())
                .map(|(id, _)| *id)
                .collect();
            if !reclaimed.is_empty() {
                warn!(
                    %worker_id,
                    reclaimed = reclaimed.len(),
                    "payment_transfers: reclaiming expired leases"
                );
                diesel::update(
                    payment_transfers::table.filter(payment_transfers::id.eq_any(&reclaimed)),
                )
                .set((
                    payment_transfers::retry_count.eq(payment_transfers::retry_count + 1),
                    payment_transfers::last_error.eq(Some(LEASE_EXPIRED)),
                ))
                .execute(conn)?;
            }

            let ids: Vec<Uuid> = candidates.into_iter().map(|(id, _)| id).collect();
            diesel::update(payment_transfers::table.filter(payment_transfers::id.eq_any(&ids)))
                .set((
                    payment_transfers::status.eq(TransferStatus::Processing.as_str()),
                    payment_transfers::locked_by.eq(Some(worker_id.as_str())),
                    payment_transfers::leased_until.eq(Some(leased_until)),
                    payment_transfers::updated_at.eq(now),
                ))
                .returning(PaymentTransferRow::as_returning())
                .get_results::<PaymentTransferRow>(conn)
        })?;

        into_entities(rows)
    }

    async fn mark_succeeded(
        &self,
        transfer_id: Uuid,
        worker_id: String,
        gateway_transfer_id: String,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let settled = conn.transaction::<bool, DieselError, _>(|conn| {
            let meeting_id = diesel::update(
                payment_transfers::table
                    .filter(payment_transfers::id.eq(transfer_id))
                    .filter(payment_transfers::status.eq(TransferStatus::Processing.as_str()))
                    .filter(payment_transfers::locked_by.eq(&worker_id)),
            )
            .set((
                payment_transfers::status.eq(TransferStatus::Succeeded.as_str()),
                payment_transfers::gateway_transfer_id.eq(Some(&gateway_transfer_id)),
                payment_transfers::last_error.eq(None::<String>),
                payment_transfers::locked_by.eq(None::<String>),
                payment_transfers::leased_until.eq(None::<DateTime<Utc>>),
                payment_transfers::updated_at.eq(now),
            ))
            .returning(payment_transfers::meeting_id)
            .get_result::<Uuid>(conn)
            .optional()?;

            let Some(meeting_id) = meeting_id else {
                return Ok(false);
            };

            diesel::update(
                commission_transactions::table
                    .filter(commission_transactions::meeting_id.eq(meeting_id))
                    .filter(commission_transactions::status.eq(CommissionStatus::Recorded.as_str())),
            )
            .set((
                commission_transactions::status.eq(CommissionStatus::Processed.as_str()),
                commission_transactions::updated_at.eq(now),
            ))
            .execute(conn)?;

            diesel::update(meetings::table.find(meeting_id))
                .set((
                    meetings::transfer_ref.eq(Some(transfer_id)),
                    meetings::updated_at.eq(now),
                ))
                .execute(conn)?;

            Ok(true)
        })?;

        Ok(settled)
    }

    async fn mark_retry_scheduled(
        &self,
        transfer_id: Uuid,
        worker_id: String,
        retry_count: i32,
        next_attempt_at: DateTime<Utc>,
        last_error: String,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = diesel::update(
            payment_transfers::table
                .filter(payment_transfers::id.eq(transfer_id))
                .filter(payment_transfers::status.eq(TransferStatus::Processing.as_str()))
                .filter(payment_transfers::locked_by.eq(worker_id)),
        )
        .set((
            payment_transfers::status.eq(TransferStatus::RetryScheduled.as_str()),
            payment_transfers::retry_count.eq(retry_count),
            payment_transfers::next_attempt_at.eq(next_attempt_at),
            payment_transfers::last_error.eq(Some(last_error)),
            payment_transfers::locked_by.eq(None::<String>),
            payment_transfers::leased_until.eq(None::<DateTime<Utc>>),
            payment_transfers::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated > 0)
    }

    async fn mark_requires_approval(
        &self,
        transfer_id: Uuid,
        worker_id: String,
        retry_count: i32,
        last_error: String,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = diesel::update(
            payment_transfers::table
                .filter(payment_transfers::id.eq(transfer_id))
                .filter(payment_transfers::status.eq(TransferStatus::Processing.as_str()))
                .filter(payment_transfers::locked_by.eq(worker_id)),
        )
        .set((
            payment_transfers::status.eq(TransferStatus::RequiresApproval.as_str()),
            payment_transfers::retry_count.eq(retry_count),
            payment_transfers::last_error.eq(Some(last_error)),
            payment_transfers::approved.eq(false),
            payment_transfers::locked_by.eq(None::<String>),
            payment_transfers::leased_until.eq(None::<DateTime<Utc>>),
            payment_transfers::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated > 0)
    }

    async fn approve(
        &self,
        transfer_id: Uuid,
        approved_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentTransferEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = diesel::update(
            payment_transfers::table
                .filter(payment_transfers::id.eq(transfer_id))
                .filter(payment_transfers::status.eq(TransferStatus::RequiresApproval.as_str()))
                .filter(
                    payment_transfers::meeting_id.eq_any(
                        meetings::table
                            .filter(
                                meetings::payment_status
                                    .eq(MeetingPaymentStatus::Succeeded.as_str()),
                            )
                            .select(meetings::id),
                    ),
                ),
        )
        .set((
            payment_transfers::status.eq(TransferStatus::RetryScheduled.as_str()),
            payment_transfers::retry_count.eq(0),
            payment_transfers::next_attempt_at.eq(now),
            payment_transfers::approved.eq(true),
            payment_transfers::approved_by.eq(Some(approved_by)),
            payment_transfers::approved_at.eq(Some(now)),
            payment_transfers::updated_at.eq(now),
        ))
        .returning(PaymentTransferRow::as_returning())
        .get_result::<PaymentTransferRow>(&mut conn)
        .optional()?;

        row.map(PaymentTransferEntity::try_from).transpose()
    }

    async fn cancel(&self, transfer_id: Uuid) -> Result<Option<PaymentTransferEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = diesel::update(
            payment_transfers::table
                .filter(payment_transfers::id.eq(transfer_id))
                .filter(payment_transfers::status.eq(TransferStatus::RequiresApproval.as_str())),
        )
        .set((
            payment_transfers::status.eq(TransferStatus::Cancelled.as_str()),
            payment_transfers::updated_at.eq(Utc::now()),
        ))
        .returning(PaymentTransferRow::as_returning())
        .get_result::<PaymentTransferRow>(&mut conn)
        .optional()?;

        row.map(PaymentTransferEntity::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        entities::meetings::MeetingEntity, repositories::meetings::MeetingRepository,
    };
    use crate::infra::db::{
        repositories::meetings::MeetingPostgres,
        test_support::{TestDatabase, at, window},
    };
    use chrono::Duration;
    use std::{collections::HashSet, sync::Barrier};

    const LEASE: i64 = 5;

    async fn booked(db: &TestDatabase, day: u32, hour: u32, pi: &str) -> MeetingEntity {
        db.paid_meeting(Uuid::new_v4(), window(at(day, hour, 0), 30), pi)
            .await
    }

    async fn claim(
        repo: &PaymentTransferPostgres,
        worker: &str,
        now: DateTime<Utc>,
    ) -> Vec<PaymentTransferEntity> {
        repo.claim_due(worker.to_string(), now, now + Duration::minutes(LEASE), 50)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn refunded_payout_is_held_and_never_claimed() {
        let Some(db) = TestDatabase::connect() else { return };
        let repo = PaymentTransferPostgres::new(Arc::clone(&db.pool));
        let meeting = booked(&db, 21, 9, "pi_refunded").await;
        let transfer = db.due_transfer(&meeting).await;

        MeetingPostgres::new(Arc::clone(&db.pool))
            .reverse_payment(
                "pi_refunded".to_string(),
                MeetingPaymentStatus::Refunded,
                CommissionStatus::Refunded,
                at(21, 9, 30),
            )
            .await
            .unwrap();

        assert!(claim(&repo, "worker-a", at(22, 9, 0)).await.is_empty());
        let stored = repo.find_by_id(transfer.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransferStatus::RequiresApproval);
    }

    #[tokio::test]
    async fn claim_skips_due_payout_of_a_reversed_booking() {
        let Some(db) = TestDatabase::connect() else { return };
        let repo = PaymentTransferPostgres::new(Arc::clone(&db.pool));
        let refunded = booked(&db, 21, 11, "pi_refunded_late").await;
        let paid = booked(&db, 21, 12, "pi_paid").await;
        db.due_transfer(&refunded).await;
        let payable = db.due_transfer(&paid).await;

        // Payment status flipped without the hold, as if the reversal raced an earlier release.
        diesel::update(meetings::table.find(refunded.id))
            .set(meetings::payment_status.eq(MeetingPaymentStatus::Disputed.as_str()))
            .execute(&mut db.conn())
            .unwrap();

        let claimed = claim(&repo, "worker-a", at(22, 9, 0)).await;

        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, payable.id);
    }

    #[test]
    fn concurrent_claims_never_share_a_payout() {
        let Some(db) = TestDatabase::connect() else { return };
        let repo = Arc::new(PaymentTransferPostgres::new(Arc::clone(&db.pool)));
        let setup = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let scheduled: HashSet<Uuid> = setup.block_on(async {
            let mut ids = HashSet::new();
            for hour in 8..14 {
                let meeting = booked(&db, 23, hour, &format!("pi_batch_{hour}")).await;
                ids.insert(db.due_transfer(&meeting).await.id);
            }
            ids
        });
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = ["worker-a", "worker-b"]
            .into_iter()
            .map(|worker| {
                let repo = Arc::clone(&repo);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .unwrap();
                    barrier.wait();
                    let mut claimed = Vec::new();
                    // Each worker keeps claiming small batches until nothing is left.
                    loop {
                        let now = at(24, 9, 0);
                        let batch = runtime
                            .block_on(repo.claim_due(
                                worker.to_string(),
                                now,
                                now + Duration::minutes(LEASE),
                                2,
                            ))
                            .unwrap();
                        if batch.is_empty() {
                            break claimed;
                        }
                        claimed.extend(batch.into_iter().map(|t| (t.id, t.locked_by)));
                    }
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for (id, locked_by) in handle.join().unwrap() {
                assert!(seen.insert(id), "{id} was claimed twice");
                assert!(locked_by.is_some());
            }
        }
        assert_eq!(seen, scheduled);
    }

    #[tokio::test]
    async fn reclaimed_lease_counts_as_an_attempt_and_fences_the_old_worker() {
        let Some(db) = TestDatabase::connect() else { return };
        let repo = PaymentTransferPostgres::new(Arc::clone(&db.pool));
        let meeting = booked(&db, 25, 9, "pi_crashed_worker").await;
        let transfer = db.due_transfer(&meeting).await;
        let first_claim = at(25, 11, 0);

        let leased = claim(&repo, "worker-a", first_claim).await;
        assert_eq!(leased[0].retry_count, 0);
        // worker-a never reports back; its lease lapses.
        let after_expiry = first_claim + Duration::minutes(LEASE + 1);
        let reclaimed = claim(&repo, "worker-b", after_expiry).await;

        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].id, transfer.id);
        assert_eq!(reclaimed[0].retry_count, 1);
        assert_eq!(reclaimed[0].last_error.as_deref(), Some(LEASE_EXPIRED));
        assert_eq!(reclaimed[0].locked_by.as_deref(), Some("worker-b"));
        let stale_report = repo
            .mark_retry_scheduled(
                transfer.id,
                "worker-a".to_string(),
                1,
                after_expiry,
                "timeout".to_string(),
            )
            .await
            .unwrap();
        assert!(!stale_report);
    }

    #[tokio::test]
    async fn live_lease_is_not_reclaimed() {
        let Some(db) = TestDatabase::connect() else { return };
        let repo = PaymentTransferPostgres::new(Arc::clone(&db.pool));
        let meeting = booked(&db, 25, 13, "pi_live_lease").await;
        db.due_transfer(&meeting).await;
        let now = at(25, 15, 0);

        assert_eq!(claim(&repo, "worker-a", now).await.len(), 1);
        assert!(claim(&repo, "worker-b", now + Duration::minutes(1)).await.is_empty());
    }

    #[tokio::test]
    async fn approve_is_refused_once_the_payment_is_reversed() {
        let Some(db) = TestDatabase::connect() else { return };
        let repo = PaymentTransferPostgres::new(Arc::clone(&db.pool));
        let meeting = booked(&db, 26, 9, "pi_disputed").await;
        let transfer = db.due_transfer(&meeting).await;
        MeetingPostgres::new(Arc::clone(&db.pool))
            .reverse_payment(
                "pi_disputed".to_string(),
                MeetingPaymentStatus::Disputed,
                CommissionStatus::Disputed,
                at(26, 9, 30),
            )
            .await
            .unwrap();

        let approved = repo
            .approve(transfer.id, Uuid::new_v4(), at(26, 12, 0))
            .await
            .unwrap();
        let cancelled = repo.cancel(transfer.id).await.unwrap();

        assert!(approved.is_none());
        assert_eq!(cancelled.map(|t| t.status), Some(TransferStatus::Cancelled));
    }
}
