pub mod entitlement_statuses;
pub mod plan_ids;
pub mod quota_actions;
pub mod template_access;
pub mod trial_kinds;
pub mod usage_routes;
