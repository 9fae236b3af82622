use std::fmt::Display;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TierLevel {
    #[default]
    Standard,
    Premium,
}

impl TierLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierLevel::Standard => "standard",
            TierLevel::Premium => "premium",
        }
    }
}

impl TryFrom<&str> for TierLevel {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "standard" => Ok(TierLevel::Standard),
            "premium" => Ok(TierLevel::Premium),
            other => Err(anyhow!("unknown tier level: {other}")),
        }
    }
}

impl Display for TierLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
