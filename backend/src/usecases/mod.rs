pub mod credit_consumer;
pub mod plan_resolver;
pub mod quota_checker;
pub mod quota_gate;
pub mod reset_scheduler;
pub mod storage_limits;
pub mod trial_quota;
pub mod usage_ledger;
pub mod usage_summary;
