pub mod executor;
pub mod languages;
pub mod sandbox;
pub mod worker;
pub mod workspace;

pub use executor::{SubmissionExecutor, UniversalExecutor};
pub use worker::ExecutionWorker;
