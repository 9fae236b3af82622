use anyhow::Result;
use backend::usecases::eligibility::EligibilityUseCase;
use chrono::Utc;
use crates::domain::repositories::eligibility::EligibilityRepository;
use std::{sync::Arc, time::Duration};
use tracing::{error, info};

pub async fn run<E>(usecase: Arc<EligibilityUseCase<E>>, interval: Duration) -> Result<()>
where
    E: EligibilityRepository + Send + Sync + 'static,
{
    info!("eligibility: starting worker loop");
    loop {
        match usecase.recompute_all(Utc::now()).await {
            Ok(summary) => info!(
                evaluated = summary.evaluated,
                failed = summary.failed,
                newly_eligible = summary.newly_eligible,
                "eligibility: scheduled recompute finished"
            ),
            Err(err) => error!(error = ?err, "eligibility: scheduled recompute failed"),
        }
        tokio::time::sleep(interval).await;
    }
}
