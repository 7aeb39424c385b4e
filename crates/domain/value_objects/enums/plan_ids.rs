use std::fmt::Display;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// Closed set of plan tiers. Stored as text; an id outside this set is a data error.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlanId {
    #[default]
    Free,
    DayPass,
    ProMonthly,
    ProAnnual,
}

impl PlanId {
    pub const ALL: [PlanId; 4] = [
        PlanId::Free,
        PlanId::DayPass,
        PlanId::ProMonthly,
        PlanId::ProAnnual,
    ];
}

impl Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plan = match self {
            PlanId::Free => "free",
            PlanId::DayPass => "day_pass",
            PlanId::ProMonthly => "pro_monthly",
            PlanId::ProAnnual => "pro_annual",
        };
        write!(f, "{}", plan)
    }
}

impl TryFrom<&str> for PlanId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "free" => Ok(PlanId::Free),
            "day_pass" => Ok(PlanId::DayPass),
            "pro_monthly" => Ok(PlanId::ProMonthly),
            "pro_annual" => Ok(PlanId::ProAnnual),
            other => Err(anyhow!("unknown plan id: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree_for_every_plan() {
        for plan in PlanId::ALL {
            assert_eq!(PlanId::try_from(plan.to_string().as_str()).unwrap(), plan);
        }
    }

    #[test]
    fn unknown_plan_id_is_rejected() {
        assert!(PlanId::try_from("enterprise").is_err());
        assert!(PlanId::try_from("").is_err());
    }
}
