use serde::{Deserialize, Serialize};

use super::enums::{plan_ids::PlanId, template_access::TemplateAccess};

/// Per-counter limit for anonymous trial usage (parse, generation, download).
pub const TRIAL_LIMIT: i32 = 2;

/// Static limits for one plan tier. `None` means the limit does not apply to the tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanDefinition {
    pub id: PlanId,
    pub weekly_credits: Option<i32>,
    pub daily_generation_cap: Option<i64>,
    pub monthly_generation_cap: Option<i64>,
    pub monthly_download_cap: Option<i64>,
    pub docx_allowed: bool,
    pub template_access: TemplateAccess,
    pub max_saved_resumes: i64,
    pub requests_per_minute: u32,
    pub retention_days: i64,
}

const FREE: PlanDefinition = PlanDefinition {
    id: PlanId::Free,
    weekly_credits: Some(10),
    daily_generation_cap: None,
    monthly_generation_cap: None,
    monthly_download_cap: None,
    docx_allowed: false,
    template_access: TemplateAccess::Limited,
    max_saved_resumes: 1,
    requests_per_minute: 10,
    retention_days: 7,
};

const DAY_PASS: PlanDefinition = PlanDefinition {
    id: PlanId::DayPass,
    weekly_credits: None,
    daily_generation_cap: Some(50),
    monthly_generation_cap: None,
    monthly_download_cap: None,
    docx_allowed: true,
    template_access: TemplateAccess::All,
    max_saved_resumes: 3,
    requests_per_minute: 30,
    retention_days: 30,
};

const PRO_MONTHLY: PlanDefinition = PlanDefinition {
    id: PlanId::ProMonthly,
    weekly_credits: None,
    daily_generation_cap: None,
    monthly_generation_cap: Some(300),
    monthly_download_cap: Some(500),
    docx_allowed: true,
    template_access: TemplateAccess::All,
    max_saved_resumes: 5,
    requests_per_minute: 60,
    retention_days: 90,
};

const PRO_ANNUAL: PlanDefinition = PlanDefinition {
    id: PlanId::ProAnnual,
    weekly_credits: None,
    daily_generation_cap: None,
    monthly_generation_cap: Some(500),
    monthly_download_cap: Some(1000),
    docx_allowed: true,
    template_access: TemplateAccess::All,
    max_saved_resumes: 10,
    requests_per_minute: 60,
    retention_days: 365,
};

impl PlanId {
    pub fn definition(self) -> &'static PlanDefinition {
        match self {
            PlanId::Free => &FREE,
            PlanId::DayPass => &DAY_PASS,
            PlanId::ProMonthly => &PRO_MONTHLY,
            PlanId::ProAnnual => &PRO_ANNUAL,
        }
    }
}

impl PlanDefinition {
    pub fn catalog() -> Vec<&'static PlanDefinition> {
        PlanId::ALL.iter().map(|plan| plan.definition()).collect()
    }

    pub fn weekly_credits_or_default(&self) -> i32 {
        self.weekly_credits.unwrap_or(0)
    }
}

/// Feature flags copied onto an entitlement when its plan changes. Stored as JSONB.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EntitlementFeatures {
    #[serde(default)]
    pub docx_allowed: Option<bool>,

    #[serde(default)]
    pub template_access: Option<TemplateAccess>,

    #[serde(default)]
    pub max_saved_resumes: Option<i64>,
}

impl EntitlementFeatures {
    pub fn for_plan(plan: PlanId) -> Self {
        let definition = plan.definition();
        Self {
            docx_allowed: Some(definition.docx_allowed),
            template_access: Some(definition.template_access),
            max_saved_resumes: Some(definition.max_saved_resumes),
        }
    }

    pub fn docx_allowed_or_default(&self) -> bool {
        self.docx_allowed.unwrap_or(false)
    }

    pub fn template_access_or_default(&self) -> TemplateAccess {
        self.template_access.unwrap_or_default()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
