use crate::{SubmissionStatus, TestCaseStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result for a single test case execution.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TestCaseOutcome {
    /// Test case that was executed.
    pub test_case_id: Uuid,
    pub status: TestCaseStatus,
    /// Program stdout as captured by the harness.
    pub actual_output: Option<String>,
    /// Cleaned stderr for runtime errors, or a timeout notice.
    pub error_message: Option<String>,
    /// Wall-clock time in milliseconds.
    pub execution_time_ms: i64,
    /// Peak resident memory in kilobytes.
    pub memory_used_kb: i64,
}

/// Outcome of executing one submission against all of its test cases.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Terminal status to store on the submission.
    pub status: SubmissionStatus,
    /// `floor(100 * passed / total)`; None when nothing ran.
    pub score: Option<i32>,
    /// Sum of per-test wall-clock times (milliseconds).
    pub total_execution_time_ms: i64,
    /// Peak memory across all test cases (kilobytes).
    pub max_memory_used_kb: i64,
    pub compilation_error: Option<String>,
    pub runtime_error: Option<String>,
    /// Per-test results in test-case order.
    pub test_results: Vec<TestCaseOutcome>,
}

impl ExecutionResult {
    /// Aggregate per-test outcomes into a submission-level result.
    pub fn from_test_results(test_results: Vec<TestCaseOutcome>) -> Self {
        let passed = test_results.iter().filter(|r| r.status.is_passed()).count();
        let status = resolve_status(&test_results);

        // Surface the first crash so the student sees something on the submission itself.
        let runtime_error = if status == SubmissionStatus::RuntimeError {
            test_results
                .iter()
                .find(|r| r.status == TestCaseStatus::RuntimeError)
                .and_then(|r| r.error_message.clone())
        } else {
            None
        };

        Self {
            status,
            score: compute_score(passed, test_results.len()),
            total_execution_time_ms: test_results.iter().map(|r| r.execution_time_ms).sum(),
            max_memory_used_kb: test_results
                .iter()
                .map(|r| r.memory_used_kb)
                .max()
                .unwrap_or(0),
            compilation_error: None,
            runtime_error,
            test_results,
        }
    }

    /// Source preparation failed before any test could run.
    pub fn compilation_error(message: impl Into<String>) -> Self {
        Self {
            status: SubmissionStatus::CompilationError,
            score: None,
            total_execution_time_ms: 0,
            max_memory_used_kb: 0,
            compilation_error: Some(message.into()),
            runtime_error: None,
            test_results: vec![],
        }
    }

    /// Number of passed test cases.
    pub fn passed_count(&self) -> usize {
        self.test_results
            .iter()
            .filter(|r| r.status.is_passed())
            .count()
    }
}

/// Score in percent, rounded down. `None` when there are no test cases.
pub fn compute_score(passed: usize, total: usize) -> Option<i32> {
    if total == 0 {
        return None;
    }
    Some((passed * 100 / total) as i32)
}

/// Overall status: TimeLimitExceeded dominates RuntimeError, which dominates Completed.
pub fn resolve_status(results: &[TestCaseOutcome]) -> SubmissionStatus {
    let worst = results.iter().map(|r| r.status).max_by_key(|s| s.severity());

    match worst {
        Some(TestCaseStatus::TimeLimitExceeded) => SubmissionStatus::TimeLimitExceeded,
        Some(TestCaseStatus::RuntimeError) => SubmissionStatus::RuntimeError,
        _ => SubmissionStatus::Completed,
    }
}
