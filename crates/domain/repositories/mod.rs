pub mod commission_transactions;
pub mod eligibility;
pub mod events;
pub mod expert_payout_accounts;
pub mod meetings;
pub mod notifications;
pub mod payment_transfers;
pub mod plan_rates;
pub mod slot_reservations;
pub mod subscription_plans;
