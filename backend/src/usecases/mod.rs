pub mod booking_confirmation;
pub mod commissions;
pub mod eligibility;
pub mod payment_transfers;
pub mod payment_webhook;
pub mod plan_rates;
pub mod reservations;
pub mod settlement;
pub mod subscription_plans;
