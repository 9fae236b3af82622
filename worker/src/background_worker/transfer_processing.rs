use crate::usecases::process_payment_transfers::ProcessPaymentTransfersUseCase;
use anyhow::Result;
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};

pub async fn run(usecase: Arc<ProcessPaymentTransfersUseCase>, poll_interval: Duration) -> Result<()> {
    info!("transfer_processing: starting worker loop");
    loop {
        match usecase.run(Utc::now()).await {
            // Claimed work means more rows may be due; poll again without sleeping.
            Ok(summary) if summary.claimed > 0 => continue,
            Ok(_) => {}
            Err(err) => {
                error!(error = ?err, "transfer_processing: error claiming due transfers");
            }
        }
        tokio::time::sleep(poll_interval).await;
    }
}
