pub mod expire_stale_reservations;
pub mod payment_reminders;
pub mod process_payment_transfers;
pub mod settlement_backfill;
