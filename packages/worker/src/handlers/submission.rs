use common::SubmissionStatus;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::executor::SubmissionExecutor;
use crate::store::SubmissionStore;

/// Diagnostic stored when a problem has nothing to run against.
pub const NO_TEST_CASES_MESSAGE: &str = "No test cases defined for this problem";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    AlreadyFinal(SubmissionStatus),
    AlreadyRunning,
}

/// What happened to one dequeued submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Skipped(SkipReason),
    /// Terminal status written for the submission.
    Finished(SubmissionStatus),
}

/// Execute one dequeued submission end to end and persist the outcome.
///
/// Only store failures while recording a terminal state surface as `Err`;
/// everything the submission itself causes ends as a stored status.
#[instrument(skip(store, executor, abort))]
pub async fn process_submission(
    submission_id: Uuid,
    store: &dyn SubmissionStore,
    executor: &dyn SubmissionExecutor,
    abort: &CancellationToken,
) -> Result<ProcessOutcome> {
    let Some(loaded) = store.load(submission_id).await? else {
        warn!("Submission not found, skipping");
        return Ok(ProcessOutcome::Skipped(SkipReason::NotFound));
    };

    let status = loaded.submission.status;
    if status.is_final() {
        info!(%status, "Submission already finished, skipping");
        return Ok(ProcessOutcome::Skipped(SkipReason::AlreadyFinal(status)));
    }
    if status == SubmissionStatus::Running {
        warn!("Submission already running, skipping");
        return Ok(ProcessOutcome::Skipped(SkipReason::AlreadyRunning));
    }

    if loaded.test_cases.is_empty() {
        warn!("Problem has no test cases, rejecting");
        store.mark_failed(submission_id, NO_TEST_CASES_MESSAGE).await?;
        return Ok(ProcessOutcome::Finished(SubmissionStatus::RuntimeError));
    }

    if !store.mark_running(submission_id).await? {
        warn!("Submission was claimed elsewhere, skipping");
        return Ok(ProcessOutcome::Skipped(SkipReason::AlreadyRunning));
    }

    let result = executor
        .execute(
            &loaded.submission,
            &loaded.language,
            &loaded.test_cases,
            abort,
        )
        .await;

    let failure = match result {
        Ok(result) => match store.save_result(submission_id, &result).await {
            Ok(()) => return Ok(ProcessOutcome::Finished(result.status)),
            Err(e) => {
                error!(error = %e, "Failed to persist execution result");
                e
            }
        },
        Err(e) => {
            error!(error = %e, "Execution failed");
            e
        }
    };

    store
        .mark_failed(submission_id, &failure.user_message())
        .await?;
    Ok(ProcessOutcome::Finished(SubmissionStatus::RuntimeError))
}
