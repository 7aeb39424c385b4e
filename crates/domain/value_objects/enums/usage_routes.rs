use std::fmt::Display;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// Route tag written to the usage ledger for each billable action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum UsageRoute {
    Generation,
    PdfDownload,
    DocxDownload,
}

impl UsageRoute {
    pub const DOWNLOADS: [UsageRoute; 2] = [UsageRoute::PdfDownload, UsageRoute::DocxDownload];
}

impl Display for UsageRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let route = match self {
            UsageRoute::Generation => "generation",
            UsageRoute::PdfDownload => "pdf-download",
            UsageRoute::DocxDownload => "docx-download",
        };
        write!(f, "{}", route)
    }
}

impl TryFrom<&str> for UsageRoute {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "generation" => Ok(UsageRoute::Generation),
            "pdf-download" => Ok(UsageRoute::PdfDownload),
            "docx-download" => Ok(UsageRoute::DocxDownload),
            other => Err(anyhow!("unknown usage route: {other}")),
        }
    }
}
