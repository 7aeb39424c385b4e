pub mod documents;
pub mod plans;
pub mod quota;
pub mod trial;
