use thiserror::Error;
use uuid::Uuid;

use crate::models::sandbox::error::SandboxError;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("Workspace error: {0}")]
    Workspace(#[from] std::io::Error),

    #[error(transparent)]
    UnsupportedLanguage(#[from] common::UnsupportedLanguage),

    #[error("Language '{0}' is disabled")]
    LanguageDisabled(String),

    #[error("Test case {test_case_id} does not belong to submission {submission_id}")]
    UnknownTestCase {
        submission_id: Uuid,
        test_case_id: Uuid,
    },

    #[error("Submission {0} not found")]
    SubmissionNotFound(Uuid),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    /// Diagnostic stored on the submission. Infrastructure details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            WorkerError::Sandbox(SandboxError::Aborted) => "Execution aborted".into(),
            WorkerError::Sandbox(SandboxError::Harness(_)) => {
                "Execution failed: the test harness produced no usable result".into()
            }
            WorkerError::Sandbox(_) => "Execution failed: sandbox could not be started".into(),
            WorkerError::UnsupportedLanguage(e) => e.to_string(),
            WorkerError::LanguageDisabled(_) => self.to_string(),
            WorkerError::UnknownTestCase { .. } => {
                "Execution failed: results did not match the problem's test cases".into()
            }
            _ => "Execution failed: internal error".into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
