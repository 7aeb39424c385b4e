pub mod entitlements;
pub mod saved_documents;
pub mod trial_usages;
pub mod usage_events;
