pub mod evaluation;
pub mod organization;
