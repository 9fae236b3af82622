//! Postgres fixtures for repository tests.
//!
//! Tests that need a database are skipped unless `DATABASE_URL` points at a
//! disposable Postgres. Each [`TestDatabase`] migrates a fresh schema and pins
//! every pooled connection to it, so committed rows never leak between tests.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use diesel::{
    connection::SimpleConnection,
    prelude::*,
    r2d2::{ConnectionManager, CustomizeConnection, Error as R2d2Error, Pool},
};
use uuid::Uuid;

use crate::domain::{
    entities::{
        meetings::{InsertMeetingEntity, MeetingEntity},
        payment_transfers::{InsertPaymentTransferEntity, PaymentTransferEntity},
    },
    repositories::{meetings::MeetingRepository, payment_transfers::PaymentTransferRepository},
    value_objects::{
        enums::{meeting_payment_statuses::MeetingPaymentStatus, transfer_statuses::TransferStatus},
        meetings::ConfirmationOutcome,
        reservations::GuestContact,
        time_windows::TimeWindow,
    },
};
use crate::infra::db::{
    postgres::{postgres_connection::PgPoolSquad, schema::events},
    repositories::{meetings::MeetingPostgres, payment_transfers::PaymentTransferPostgres},
};

const MIGRATION: &str =
    include_str!("../../../migrations/2025-01-10-000000_booking_settlement/up.sql");
const EXTENSION_LOCK: i64 = 7_204_118;

#[derive(Debug)]
struct PinnedSchema(String);

impl CustomizeConnection<PgConnection, R2d2Error> for PinnedSchema {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), R2d2Error> {
        conn.batch_execute(&format!("SET search_path TO {}, public", self.0))
            .map_err(R2d2Error::QueryError)
    }
}

pub(crate) struct TestDatabase {
    pub(crate) pool: Arc<PgPoolSquad>,
    url: String,
    schema: String,
}

impl TestDatabase {
    pub(crate) fn connect() -> Option<Self> {
        let url = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => {
                eprintln!("DATABASE_URL is not set; skipping Postgres-backed test");
                return None;
            }
        };
        let schema = format!("test_{}", Uuid::new_v4().simple());

        let mut admin = PgConnection::establish(&url).expect("test database must be reachable");
        // Extension creation is not safe to race between parallel tests.
        admin
            .batch_execute(&format!(
                "SELECT pg_advisory_lock({EXTENSION_LOCK});
                 CREATE EXTENSION IF NOT EXISTS btree_gist SCHEMA public;
                 SELECT pg_advisory_unlock({EXTENSION_LOCK});"
            ))
            .expect("btree_gist must be available");
        admin
            .batch_execute(&format!(
                "CREATE SCHEMA {schema}; SET search_path TO {schema}, public;"
            ))
            .expect("create test schema");
        admin.batch_execute(MIGRATION).expect("apply migration");

        let pool = Pool::builder()
            .max_size(6)
            .connection_customizer(Box::new(PinnedSchema(schema.clone())))
            .build(ConnectionManager::<PgConnection>::new(&url))
            .expect("build test pool");

        Some(Self {
            pool: Arc::new(pool),
            url,
            schema,
        })
    }

    pub(crate) fn conn(
        &self,
    ) -> diesel::r2d2::PooledConnection<ConnectionManager<PgConnection>> {
        self.pool.get().expect("test connection")
    }

    pub(crate) fn event(&self, expert_id: Uuid) -> Uuid {
        diesel::insert_into(events::table)
            .values((
                events::expert_id.eq(expert_id),
                events::title.eq("Consultation"),
                events::duration_minutes.eq(30),
                events::price_minor.eq(10_000_i64),
                events::currency.eq("usd"),
            ))
            .returning(events::id)
            .get_result::<Uuid>(&mut self.conn())
            .expect("insert event")
    }

    /// A captured booking with no originating hold.
    pub(crate) async fn paid_meeting(
        &self,
        expert_id: Uuid,
        window: TimeWindow,
        payment_intent_id: &str,
    ) -> MeetingEntity {
        let outcome = MeetingPostgres::new(Arc::clone(&self.pool))
            .confirm(meeting(expert_id, window, payment_intent_id, None))
            .await
            .expect("confirm meeting");
        match outcome {
            ConfirmationOutcome::Created { meeting, .. } => meeting,
            ConfirmationOutcome::AlreadyConfirmed(meeting) => meeting,
        }
    }

    /// Payout for `meeting`, due one hour after it starts.
    pub(crate) async fn due_transfer(&self, meeting: &MeetingEntity) -> PaymentTransferEntity {
        let due = meeting.window.start() + Duration::hours(1);
        PaymentTransferPostgres::new(Arc::clone(&self.pool))
            .schedule(InsertPaymentTransferEntity {
                meeting_id: meeting.id,
                expert_id: meeting.expert_id,
                amount_minor: 8_800,
                currency: meeting.currency.clone(),
                meeting_start_time: meeting.window.start(),
                scheduled_transfer_time: due,
                next_attempt_at: due,
                status: TransferStatus::Pending.to_string(),
            })
            .await
            .expect("schedule transfer")
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        if let Ok(mut conn) = PgConnection::establish(&self.url) {
            let _ = conn.batch_execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema));
        }
    }
}

pub(crate) fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, minute, 0).unwrap()
}

pub(crate) fn window(start: DateTime<Utc>, minutes: i64) -> TimeWindow {
    TimeWindow::new(start, start + Duration::minutes(minutes)).unwrap()
}

pub(crate) fn guest(email: &str) -> GuestContact {
    GuestContact {
        account_id: None,
        name: "Guest".to_string(),
        email: email.to_string(),
    }
}

pub(crate) fn meeting(
    expert_id: Uuid,
    window: TimeWindow,
    payment_intent_id: &str,
    reservation_id: Option<Uuid>,
) -> InsertMeetingEntity {
    InsertMeetingEntity {
        reservation_id,
        event_id: None,
        expert_id,
        guest_account_id: None,
        guest_name: "Guest".to_string(),
        guest_email: "guest@example.com".to_string(),
        start_time: window.start(),
        end_time: window.end(),
        amount_minor: 10_000,
        currency: "usd".to_string(),
        payment_intent_id: payment_intent_id.to_string(),
        payment_status: MeetingPaymentStatus::Succeeded.to_string(),
    }
}
