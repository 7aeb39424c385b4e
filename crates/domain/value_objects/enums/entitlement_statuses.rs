use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    #[default]
    Active,
    Inactive,
}

impl Display for EntitlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            EntitlementStatus::Active => "active",
            EntitlementStatus::Inactive => "inactive",
        };
        write!(f, "{}", status)
    }
}

impl EntitlementStatus {
    pub fn from_str(value: &str) -> Self {
        match value {
            "active" => EntitlementStatus::Active,
            _ => EntitlementStatus::Inactive,
        }
    }
}
