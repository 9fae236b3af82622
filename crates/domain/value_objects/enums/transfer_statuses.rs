use std::fmt::Display;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Lifecycle of a deferred payout.
///
/// `Pending -> Processing -> RetryScheduled (bounded) -> Succeeded | RequiresApproval`,
/// `RequiresApproval -> RetryScheduled | Cancelled`. `Succeeded` and `Cancelled` are terminal.
/// A refund or dispute moves a payout that has not started to `RequiresApproval`.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    #[default]
    Pending,
    Processing,
    RetryScheduled,
    Succeeded,
    RequiresApproval,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Processing => "processing",
            TransferStatus::RetryScheduled => "retry_scheduled",
            TransferStatus::Succeeded => "succeeded",
            TransferStatus::RequiresApproval => "requires_approval",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses the worker may claim once the transfer is due.
    pub fn claimable() -> [TransferStatus; 2] {
        [TransferStatus::Pending, TransferStatus::RetryScheduled]
    }
}

impl TryFrom<&str> for TransferStatus {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(TransferStatus::Pending),
            "processing" => Ok(TransferStatus::Processing),
            "retry_scheduled" => Ok(TransferStatus::RetryScheduled),
            "succeeded" => Ok(TransferStatus::Succeeded),
            "requires_approval" => Ok(TransferStatus::RequiresApproval),
            "cancelled" => Ok(TransferStatus::Cancelled),
            other => Err(anyhow!("unknown transfer status: {other}")),
        }
    }
}

impl Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
