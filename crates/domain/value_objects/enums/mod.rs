pub mod commission_statuses;
pub mod meeting_payment_statuses;
pub mod plan_types;
pub mod reservation_statuses;
pub mod tier_levels;
pub mod transfer_statuses;
