use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrialKind {
    Parse,
    Generation,
    Download,
}

impl TrialKind {
    pub const ALL: [TrialKind; 3] = [TrialKind::Parse, TrialKind::Generation, TrialKind::Download];
}

impl Display for TrialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            TrialKind::Parse => "parse",
            TrialKind::Generation => "generation",
            TrialKind::Download => "download",
        };
        write!(f, "{}", kind)
    }
}
