pub mod calendar;
pub mod entitlement_refresh;
pub mod enums;
pub mod plans;
pub mod quota;
pub mod storage;
pub mod usage_summary;
