use std::fmt::Display;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    #[default]
    CommissionOnly,
    Monthly,
    Annual,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::CommissionOnly => "commission_only",
            PlanType::Monthly => "monthly",
            PlanType::Annual => "annual",
        }
    }
}

impl TryFrom<&str> for PlanType {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "commission_only" => Ok(PlanType::CommissionOnly),
            "monthly" => Ok(PlanType::Monthly),
            "annual" => Ok(PlanType::Annual),
            other => Err(anyhow!("unknown plan type: {other}")),
        }
    }
}

impl Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
