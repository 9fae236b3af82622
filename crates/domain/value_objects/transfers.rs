use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::enums::transfer_statuses::TransferStatus;
use crate::{
    domain::entities::payment_transfers::PaymentTransferEntity,
    payments::gateway::PaymentGatewayError,
};

/// Bounded retry schedule for payouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRetryPolicy {
    pub max_attempts: i32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for TransferRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::minutes(1),
            backoff_max: Duration::hours(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferFailureDecision {
    Retry {
        retry_count: i32,
        next_attempt_at: DateTime<Utc>,
    },
    Escalate {
        retry_count: i32,
    },
}

impl TransferRetryPolicy {
    /// Delay before the attempt following the `failures`-th failure: `base * 2^(failures-1)`,
    /// capped at `backoff_max`.
    pub fn backoff_for(&self, failures: i32) -> Duration {
        let exponent = failures.saturating_sub(1).clamp(0, 30) as u32;
        let factor = 1_i32.checked_shl(exponent).unwrap_or(i32::MAX);
        self.backoff_base
            .checked_mul(factor)
            .filter(|delay| *delay <= self.backoff_max)
            .unwrap_or(self.backoff_max)
    }

    /// Reclaimed leases count as attempts, so a claimed transfer can arrive with nothing left.
    pub fn is_exhausted(&self, retry_count: i32) -> bool {
        retry_count >= self.max_attempts
    }

    pub fn after_failure(
        &self,
        previous_retry_count: i32,
        error: &PaymentGatewayError,
        now: DateTime<Utc>,
    ) -> TransferFailureDecision {
        let retry_count = previous_retry_count.saturating_add(1);

        match error {
            PaymentGatewayError::Permanent(_) => TransferFailureDecision::Escalate { retry_count },
            PaymentGatewayError::Transient(_) if retry_count >= self.max_attempts => {
                TransferFailureDecision::Escalate { retry_count }
            }
            PaymentGatewayError::Transient(_) => TransferFailureDecision::Retry {
                retry_count,
                next_attempt_at: now + self.backoff_for(retry_count),
            },
        }
    }
}

/// `meeting_start + payout_delay`, never earlier than the session itself.
pub fn scheduled_transfer_time(meeting_start: DateTime<Utc>, payout_delay: Duration) -> DateTime<Utc> {
    let candidate = meeting_start + payout_delay;
    candidate.max(meeting_start)
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentTransferDto {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub expert_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub scheduled_transfer_time: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub status: TransferStatus,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub gateway_transfer_id: Option<String>,
    pub approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
}

impl From<PaymentTransferEntity> for PaymentTransferDto {
    fn from(value: PaymentTransferEntity) -> Self {
        Self {
            id: value.id,
            meeting_id: value.meeting_id,
            expert_id: value.expert_id,
            amount_minor: value.amount_minor,
            currency: value.currency,
            scheduled_transfer_time: value.scheduled_transfer_time,
            next_attempt_at: value.next_attempt_at,
            status: value.status,
            retry_count: value.retry_count,
            last_error: value.last_error,
            gateway_transfer_id: value.gateway_transfer_id,
            approved: value.approved,
            approved_at: value.approved_at,
        }
    }
}
