pub mod eligibility;
pub mod reservation_expiry;
pub mod settlement_backfill;
pub mod transfer_processing;
