pub mod admin_transfers;
pub mod experts;
pub mod payment_webhook;
pub mod reservations;
