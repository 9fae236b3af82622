use anyhow::Result;
use chrono::{DateTime, Utc};
use crates::domain::repositories::slot_reservations::SlotReservationRepository;
use std::sync::Arc;
use tracing::info;

/// Upper bound on batches per sweep so one run cannot starve the loop.
const MAX_BATCHES_PER_RUN: usize = 50;

pub struct ExpireStaleReservationsUseCase {
    repository: Arc<dyn SlotReservationRepository + Send + Sync>,
    batch_size: i64,
}

impl ExpireStaleReservationsUseCase {
    pub fn new(repository: Arc<dyn SlotReservationRepository + Send + Sync>, batch_size: i64) -> Self {
        Self {
            repository,
            batch_size: batch_size.max(1),
        }
    }

    /// Expires pending holds whose `expires_at` is before `now`. Confirmed holds are
    /// never touched; the status check happens under the row lock.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut expired = 0;

        for _ in 0..MAX_BATCHES_PER_RUN {
            let ids = self
                .repository
                .expire_stale_batch(now, self.batch_size)
                .await?;
            expired += ids.len();

            if (ids.len() as i64) < self.batch_size {
                break;
            }
        }

        if expired > 0 {
            info!(expired, "expire_reservations: stale holds expired");
        }

        Ok(expired)
    }
}
