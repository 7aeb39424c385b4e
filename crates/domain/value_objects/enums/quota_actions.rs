use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::usage_routes::UsageRoute;

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DownloadFormat {
    #[default]
    Pdf,
    Docx,
}

/// A gated action. Downloads carry their format so the ledger tag and DOCX gating follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaAction {
    Generation,
    Download(DownloadFormat),
}

impl QuotaAction {
    pub fn usage_route(&self) -> UsageRoute {
        match self {
            QuotaAction::Generation => UsageRoute::Generation,
            QuotaAction::Download(DownloadFormat::Pdf) => UsageRoute::PdfDownload,
            QuotaAction::Download(DownloadFormat::Docx) => UsageRoute::DocxDownload,
        }
    }

    pub fn is_download(&self) -> bool {
        matches!(self, QuotaAction::Download(_))
    }
}

impl Display for QuotaAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.usage_route())
    }
}
