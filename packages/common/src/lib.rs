pub mod config;
pub mod execution_result;
pub mod language;
pub mod output;
pub mod submission_status;

pub use execution_result::{ExecutionResult, TestCaseOutcome, compute_score, resolve_status};
pub use language::{LanguageKind, UnsupportedLanguage};
pub use submission_status::{SubmissionStatus, TestCaseStatus};
