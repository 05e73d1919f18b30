pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod monitor;
pub mod store;


pub use config::{SandboxConfig, WorkerAppConfig, WorkerConfig};
pub use error::{Result, WorkerError};
pub use models::{ExecutionWorker, SubmissionExecutor, UniversalExecutor};
pub use store::{DbSubmissionStore, LoadedSubmission, SubmissionStore};
