pub mod commission_transactions;
pub mod eligibility_snapshots;
pub mod events;
pub mod expert_payout_accounts;
pub mod meetings;
pub mod payment_transfers;
pub mod slot_reservations;
pub mod subscription_plans;
