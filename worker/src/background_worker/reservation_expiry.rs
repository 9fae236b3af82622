use crate::usecases::{
    expire_stale_reservations::ExpireStaleReservationsUseCase,
    payment_reminders::PaymentRemindersUseCase,
};
use anyhow::Result;
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};

/// Reminders go first so a hold on the edge of expiry still gets its last notice.
pub async fn run(
    reminders: Arc<PaymentRemindersUseCase>,
    expiry: Arc<ExpireStaleReservationsUseCase>,
    interval: Duration,
) -> Result<()> {
    info!(interval_secs = interval.as_secs(), "reservation_expiry: starting worker loop");
    loop {
        let now = Utc::now();

        if let Err(err) = reminders.run(now).await {
            error!(error = ?err, "reservation_expiry: reminder pass failed");
        }
        if let Err(err) = expiry.run(now).await {
            error!(error = ?err, "reservation_expiry: expiry pass failed");
        }

        tokio::time::sleep(interval).await;
    }
}
