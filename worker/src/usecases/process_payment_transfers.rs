use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use crates::{
    domain::{
        entities::payment_transfers::PaymentTransferEntity,
        repositories::{
            expert_payout_accounts::ExpertPayoutAccountRepository,
            notifications::NotificationDispatcher, payment_transfers::PaymentTransferRepository,
        },
        value_objects::{
            notifications::NotificationEvent,
            transfers::{TransferFailureDecision, TransferRetryPolicy},
        },
    },
    payments::gateway::{CreateTransferRequest, PaymentGateway, PaymentGatewayError},
};
use std::{collections::HashMap, sync::Arc};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferRunSummary {
    pub claimed: usize,
    pub succeeded: usize,
    pub retry_scheduled: usize,
    pub requires_approval: usize,
    /// Outcomes that could not be written back because the lease was lost.
    pub lost_lease: usize,
}

pub struct ProcessPaymentTransfersUseCase {
    transfer_repo: Arc<dyn PaymentTransferRepository + Send + Sync>,
    payout_accounts: Arc<dyn ExpertPayoutAccountRepository + Send + Sync>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationDispatcher>,
    policy: TransferRetryPolicy,
    worker_id: String,
    lease: Duration,
    batch_size: i64,
}

/// Stable across transient retries so a lost response never pays twice. An admin
/// approval starts a fresh key because the previous attempts were all rejected.
pub fn transfer_idempotency_key(transfer: &PaymentTransferEntity) -> String {
    match transfer.approved_at {
        Some(approved_at) => format!("transfer_{}_{}", transfer.id, approved_at.timestamp()),
        None => format!("transfer_{}", transfer.id),
    }
}

enum Reconciled {
    Succeeded,
    RetryScheduled,
    RequiresApproval,
    LostLease,
}

impl ProcessPaymentTransfersUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transfer_repo: Arc<dyn PaymentTransferRepository + Send + Sync>,
        payout_accounts: Arc<dyn ExpertPayoutAccountRepository + Send + Sync>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationDispatcher>,
        policy: TransferRetryPolicy,
        worker_id: String,
        lease: Duration,
        batch_size: i64,
    ) -> Self {
        Self {
            transfer_repo,
            payout_accounts,
            gateway,
            notifier,
            policy,
            worker_id,
            lease,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<TransferRunSummary> {
        let claimed = self
            .transfer_repo
            .claim_due(self.worker_id.clone(), now, now + self.lease, self.batch_size)
            .await?;

        let mut summary = TransferRunSummary {
            claimed: claimed.len(),
            ..Default::default()
        };

        for transfer in claimed {
            match self.process_one(&transfer, now).await {
                Ok(Reconciled::Succeeded) => summary.succeeded += 1,
                Ok(Reconciled::RetryScheduled) => summary.retry_scheduled += 1,
                Ok(Reconciled::RequiresApproval) => summary.requires_approval += 1,
                Ok(Reconciled::LostLease) => summary.lost_lease += 1,
                // Lease expiry hands the row back to the next claim.
                Err(err) => error!(
                    transfer_id = %transfer.id,
                    error = ?err,
                    "process_transfers: failed to record outcome"
                ),
            }
        }

        if summary.claimed > 0 {
            info!(
                worker_id = %self.worker_id,
                claimed = summary.claimed,
                succeeded = summary.succeeded,
                retry_scheduled = summary.retry_scheduled,
                requires_approval = summary.requires_approval,
                lost_lease = summary.lost_lease,
                "process_transfers: batch finished"
            );
        }

        Ok(summary)
    }

    async fn process_one(
        &self,
        transfer: &PaymentTransferEntity,
        now: DateTime<Utc>,
    ) -> Result<Reconciled> {
        // Only reclaimed leases can arrive here with the budget already spent.
        if self.policy.is_exhausted(transfer.retry_count) {
            let reason = transfer
                .last_error
                .clone()
                .unwrap_or_else(|| "retry limit reached".to_string());
            return self.escalate(transfer, transfer.retry_count, reason, true).await;
        }

        match self.attempt(transfer).await {
            Ok(gateway_transfer_id) => {
                let stored = self
                    .transfer_repo
                    .mark_succeeded(transfer.id, self.worker_id.clone(), gateway_transfer_id.clone())
                    .await?;
                if !stored {
                    warn!(
                        transfer_id = %transfer.id,
                        gateway_transfer_id = %gateway_transfer_id,
                        "process_transfers: paid out but lease was lost"
                    );
                    return Ok(Reconciled::LostLease);
                }
                info!(
                    transfer_id = %transfer.id,
                    meeting_id = %transfer.meeting_id,
                    gateway_transfer_id = %gateway_transfer_id,
                    "process_transfers: transfer succeeded"
                );
                Ok(Reconciled::Succeeded)
            }
            Err(failure) => self.record_failure(transfer, failure, now).await,
        }
    }

    async fn attempt(&self, transfer: &PaymentTransferEntity) -> Result<String, PaymentGatewayError> {
        let destination = match self.payout_accounts.find_by_expert(transfer.expert_id).await {
            Ok(Some(account)) => account.account_ref,
            Ok(None) => {
                return Err(PaymentGatewayError::Permanent(
                    "expert has no payout account".to_string(),
                ));
            }
            Err(err) => {
                return Err(PaymentGatewayError::Transient(format!(
                    "payout account lookup failed: {err}"
                )));
            }
        };

        let metadata = HashMap::from([
            ("transfer_id".to_string(), transfer.id.to_string()),
            ("meeting_id".to_string(), transfer.meeting_id.to_string()),
            ("expert_id".to_string(), transfer.expert_id.to_string()),
        ]);

        self.gateway
            .create_transfer(CreateTransferRequest {
                amount_minor: transfer.amount_minor,
                currency: transfer.currency.clone(),
                destination_account: destination,
                idempotency_key: transfer_idempotency_key(transfer),
                metadata,
            })
            .await
    }

    async fn record_failure(
        &self,
        transfer: &PaymentTransferEntity,
        failure: PaymentGatewayError,
        now: DateTime<Utc>,
    ) -> Result<Reconciled> {
        let reason = failure.reason().to_string();

        match self.policy.after_failure(transfer.retry_count, &failure, now) {
            TransferFailureDecision::Retry {
                retry_count,
                next_attempt_at,
            } => {
                let stored = self
                    .transfer_repo
                    .mark_retry_scheduled(
                        transfer.id,
                        self.worker_id.clone(),
                        retry_count,
                        next_attempt_at,
                        reason.clone(),
                    )
                    .await?;
                if !stored {
                    return Ok(Reconciled::LostLease);
                }
                warn!(
                    transfer_id = %transfer.id,
                    retry_count,
                    %next_attempt_at,
                    reason = %reason,
                    "process_transfers: transient failure, retry scheduled"
                );
                Ok(Reconciled::RetryScheduled)
            }
            TransferFailureDecision::Escalate { retry_count } => {
                self.escalate(transfer, retry_count, reason, failure.is_transient())
                    .await
            }
        }
    }

    async fn escalate(
        &self,
        transfer: &PaymentTransferEntity,
        retry_count: i32,
        reason: String,
        transient: bool,
    ) -> Result<Reconciled> {
        let stored = self
            .transfer_repo
            .mark_requires_approval(
                transfer.id,
                self.worker_id.clone(),
                retry_count,
                reason.clone(),
            )
            .await?;
        if !stored {
            return Ok(Reconciled::LostLease);
        }
        error!(
            transfer_id = %transfer.id,
            retry_count,
            transient,
            reason = %reason,
            "process_transfers: escalated for manual approval"
        );
        self.notifier
            .trigger(NotificationEvent::TransferRequiresApproval {
                transfer_id: transfer.id,
                meeting_id: transfer.meeting_id,
                expert_id: transfer.expert_id,
                retry_count,
                reason,
            });
        Ok(Reconciled::RequiresApproval)
    }
}
