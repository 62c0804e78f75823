pub mod evv;
pub mod scheduling;
pub mod visits;
