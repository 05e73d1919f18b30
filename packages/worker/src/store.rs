use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ExecutionResult, SubmissionStatus};
use sea_orm::sea_query::LockType;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::entity::{language, submission, test_case, test_case_result};
use crate::error::{Result, WorkerError};

/// A submission with everything needed to execute it.
#[derive(Debug, Clone)]
pub struct LoadedSubmission {
    pub submission: submission::Model,
    pub language: language::Model,
    /// Ordered by `order_index`, then id.
    pub test_cases: Vec<test_case::Model>,
}

/// Persistence used by the worker.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// `None` when the submission does not exist.
    async fn load(&self, submission_id: Uuid) -> Result<Option<LoadedSubmission>>;

    /// Pending → Running, stamping `started_at`. Returns false when the
    /// submission was not Pending.
    async fn mark_running(&self, submission_id: Uuid) -> Result<bool>;

    /// Terminal RuntimeError with a diagnostic and no score.
    async fn mark_failed(&self, submission_id: Uuid, message: &str) -> Result<()>;

    /// Write the aggregate and every per-test result atomically.
    async fn save_result(&self, submission_id: Uuid, result: &ExecutionResult) -> Result<()>;

    /// Submissions still Running that were claimed before `older_than`.
    async fn find_stuck_running(&self, older_than: DateTime<Utc>) -> Result<Vec<Uuid>>;
}

pub struct DbSubmissionStore {
    db: DatabaseConnection,
}

impl DbSubmissionStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SubmissionStore for DbSubmissionStore {
    async fn load(&self, submission_id: Uuid) -> Result<Option<LoadedSubmission>> {
        let Some(submission) = submission::Entity::find_by_id(submission_id)
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let language = language::Entity::find_by_id(submission.language_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                WorkerError::Internal(format!(
                    "language {} of submission {} not found",
                    submission.language_id, submission_id
                ))
            })?;

        let test_cases = test_case::Entity::find()
            .filter(test_case::Column::ProblemId.eq(submission.problem_id))
            .order_by_asc(test_case::Column::OrderIndex)
            .order_by_asc(test_case::Column::Id)
            .all(&self.db)
            .await?;

        Ok(Some(LoadedSubmission {
            submission,
            language,
            test_cases,
        }))
    }

    async fn mark_running(&self, submission_id: Uuid) -> Result<bool> {
        let update = submission::Entity::update_many()
            .set(submission::ActiveModel {
                status: Set(SubmissionStatus::Running),
                started_at: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(submission::Column::Id.eq(submission_id))
            .filter(submission::Column::Status.eq(SubmissionStatus::Pending))
            .exec(&self.db)
            .await?;

        Ok(update.rows_affected > 0)
    }

    async fn mark_failed(&self, submission_id: Uuid, message: &str) -> Result<()> {
        submission::Entity::update_many()
            .set(submission::ActiveModel {
                status: Set(SubmissionStatus::RuntimeError),
                score: Set(None),
                runtime_error: Set(Some(message.to_string())),
                completed_at: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(submission::Column::Id.eq(submission_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn save_result(&self, submission_id: Uuid, result: &ExecutionResult) -> Result<()> {
        let txn = self.db.begin().await?;

        let submission = submission::Entity::find_by_id(submission_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or(WorkerError::SubmissionNotFound(submission_id))?;

        let known: HashSet<Uuid> = test_case::Entity::find()
            .filter(test_case::Column::ProblemId.eq(submission.problem_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|tc| tc.id)
            .collect();

        if let Some(unknown) = result
            .test_results
            .iter()
            .find(|r| !known.contains(&r.test_case_id))
        {
            txn.rollback().await?;
            warn!(
                %submission_id,
                test_case_id = %unknown.test_case_id,
                "Result references a test case outside the problem, discarding"
            );
            return Err(WorkerError::UnknownTestCase {
                submission_id,
                test_case_id: unknown.test_case_id,
            });
        }

        // Results from an earlier interrupted attempt are replaced.
        test_case_result::Entity::delete_many()
            .filter(test_case_result::Column::SubmissionId.eq(submission_id))
            .exec(&txn)
            .await?;

        let now = Utc::now();
        if !result.test_results.is_empty() {
            let rows = result
                .test_results
                .iter()
                .map(|r| test_case_result::ActiveModel {
                    id: Set(Uuid::now_v7()),
                    submission_id: Set(submission_id),
                    test_case_id: Set(r.test_case_id),
                    status: Set(r.status),
                    actual_output: Set(r.actual_output.clone()),
                    error_message: Set(r.error_message.clone()),
                    execution_time_ms: Set(r.execution_time_ms),
                    memory_used_kb: Set(r.memory_used_kb),
                    created_at: Set(now),
                });
            test_case_result::Entity::insert_many(rows)
                .exec_without_returning(&txn)
                .await?;
        }

        submission::Entity::update_many()
            .set(submission::ActiveModel {
                status: Set(result.status),
                score: Set(result.score),
                execution_time_ms: Set(Some(result.total_execution_time_ms)),
                memory_used_kb: Set(Some(result.max_memory_used_kb)),
                compilation_error: Set(result.compilation_error.clone()),
                runtime_error: Set(result.runtime_error.clone()),
                completed_at: Set(Some(now)),
                ..Default::default()
            })
            .filter(submission::Column::Id.eq(submission_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        info!(
            %submission_id,
            status = %result.status,
            score = ?result.score,
            tests = result.test_results.len(),
            "Saved execution result"
        );
        Ok(())
    }

    async fn find_stuck_running(&self, older_than: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let stuck = submission::Entity::find()
            .filter(submission::Column::Status.eq(SubmissionStatus::Running))
            .filter(submission::Column::StartedAt.lt(older_than))
            .order_by_asc(submission::Column::StartedAt)
            .all(&self.db)
            .await?;
        Ok(stuck.into_iter().map(|s| s.id).collect())
    }
}
