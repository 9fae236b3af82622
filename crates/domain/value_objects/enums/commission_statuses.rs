use std::fmt::Display;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    #[default]
    Recorded,
    Processed,
    Refunded,
    Disputed,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Recorded => "recorded",
            CommissionStatus::Processed => "processed",
            CommissionStatus::Refunded => "refunded",
            CommissionStatus::Disputed => "disputed",
        }
    }

    /// Statuses a snapshot may hold when it moves to `next`. A refund or
    /// dispute can still arrive after the payout went out.
    pub fn allowed_sources(next: CommissionStatus) -> &'static [CommissionStatus] {
        match next {
            CommissionStatus::Recorded => &[],
            CommissionStatus::Processed => &[CommissionStatus::Recorded],
            CommissionStatus::Refunded | CommissionStatus::Disputed => {
                &[CommissionStatus::Recorded, CommissionStatus::Processed]
            }
        }
    }
}

impl TryFrom<&str> for CommissionStatus {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "recorded" => Ok(CommissionStatus::Recorded),
            "processed" => Ok(CommissionStatus::Processed),
            "refunded" => Ok(CommissionStatus::Refunded),
            "disputed" => Ok(CommissionStatus::Disputed),
            other => Err(anyhow!("unknown commission status: {other}")),
        }
    }
}

impl Display for CommissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::CommissionStatus::{self, *};

    #[test]
    fn recorded_moves_to_any_terminal_status() {
        for next in [Processed, Refunded, Disputed] {
            assert!(CommissionStatus::allowed_sources(next).contains(&Recorded), "recorded -> {next}");
        }
    }

    #[test]
    fn processed_can_still_be_clawed_back() {
        assert!(CommissionStatus::allowed_sources(Refunded).contains(&Processed));
        assert!(CommissionStatus::allowed_sources(Disputed).contains(&Processed));
        assert!(!CommissionStatus::allowed_sources(Processed).contains(&Processed));
    }

    #[test]
    fn refunded_and_disputed_are_final() {
        for next in [Recorded, Processed, Refunded, Disputed] {
            let sources = CommissionStatus::allowed_sources(next);
            assert!(!sources.contains(&Refunded) && !sources.contains(&Disputed), "-> {next}");
        }
    }
}
