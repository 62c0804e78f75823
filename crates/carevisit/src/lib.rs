//! Home-care visit coordination: caregiver matching, daily routes and electronic visit
//! verification behind an axum API.

pub mod config;
pub mod error;
pub mod geo;
pub mod telemetry;
pub mod workflows;

pub use error::AppError;
