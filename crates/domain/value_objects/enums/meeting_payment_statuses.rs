use std::fmt::Display;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MeetingPaymentStatus {
    #[default]
    Succeeded,
    Refunded,
    Disputed,
}

impl MeetingPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingPaymentStatus::Succeeded => "succeeded",
            MeetingPaymentStatus::Refunded => "refunded",
            MeetingPaymentStatus::Disputed => "disputed",
        }
    }
}

impl TryFrom<&str> for MeetingPaymentStatus {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "succeeded" => Ok(MeetingPaymentStatus::Succeeded),
            "refunded" => Ok(MeetingPaymentStatus::Refunded),
            "disputed" => Ok(MeetingPaymentStatus::Disputed),
            other => Err(anyhow!("unknown meeting payment status: {other}")),
        }
    }
}

impl Display for MeetingPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
