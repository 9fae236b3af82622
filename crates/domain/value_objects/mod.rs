pub mod account_refs;
pub mod commissions;
pub mod eligibility;
pub mod enums;
pub mod meetings;
pub mod notifications;
pub mod plans;
pub mod reservations;
pub mod time_windows;
pub mod transfers;
