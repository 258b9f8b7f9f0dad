pub mod denormalize;
pub mod dispatch;
mod distribution;
mod error;
pub mod generator;
pub mod harness;
pub mod loader;
pub mod model;
mod populate;
mod queries;

pub use distribution::{CompanyCount, Distribution, distribution};
pub use error::Error;
pub use populate::{Phase, PhaseObserver, PopulationReport, populate, populate_observed, reset};
