use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use common::output::{outputs_match, truncate_output};
use common::{ExecutionResult, TestCaseOutcome, TestCaseStatus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::error::SandboxError;
use super::harness::{self, HARNESS_CONFIG_FILE, HARNESS_FILE, HarnessRecord, HarnessReport};
use super::{DirectoryRule, ResourceLimits, SandboxManager, SandboxOptions};
use crate::config::SandboxConfig;
use crate::entity::{language, submission, test_case};

/// Mount point of the workspace inside the container.
pub const CONTAINER_WORKDIR: &str = "/workspace";

/// Everything one execution needs. The workspace is borrowed: whoever created
/// it removes it.
pub struct ExecutionContext<'a> {
    pub submission: &'a submission::Model,
    pub language: &'a language::Model,
    /// Ordered by `order_index`.
    pub test_cases: &'a [test_case::Model],
    pub workspace: &'a Path,
}

impl ExecutionContext<'_> {
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.language.time_limit_seconds.max(1) as u64)
    }
}

/// Runs a prepared workspace in one container and grades what the harness reports.
pub struct SandboxRunner {
    manager: Arc<dyn SandboxManager>,
    config: SandboxConfig,
}

impl SandboxRunner {
    pub fn new(manager: Arc<dyn SandboxManager>, config: SandboxConfig) -> Self {
        Self { manager, config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    #[instrument(skip_all, fields(submission_id = %ctx.submission.id, language = %ctx.language.name))]
    pub async fn run(
        &self,
        ctx: &ExecutionContext<'_>,
        abort: &CancellationToken,
    ) -> Result<ExecutionResult, SandboxError> {
        validate_workspace(ctx.workspace)?;

        let options = self.sandbox_options(ctx);
        let deadline = self.container_deadline(ctx);

        let sandbox_id = self.manager.create_sandbox(&options).await?;
        let output = self.manager.execute(&sandbox_id, deadline, abort).await;

        if let Err(e) = self.manager.remove_sandbox(&sandbox_id).await {
            warn!(sandbox_id, error = %e, "Failed to remove sandbox container");
        }

        let output = output?;
        debug!(
            exit_code = ?output.exit_code,
            timed_out = output.timed_out,
            wall_time_ms = output.wall_time_ms,
            "Sandbox finished"
        );

        if output.timed_out {
            warn!(
                deadline_secs = deadline.as_secs(),
                "Container deadline exceeded, marking unfinished tests as timed out"
            );
            return Ok(self.timed_out_result(ctx));
        }

        let report = match harness::parse_report(&output.stdout) {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    exit_code = ?output.exit_code,
                    stderr = %truncate_output(output.stderr.trim(), 2048),
                    "Harness output unusable"
                );
                return Err(e);
            }
        };

        let result = match report {
            HarnessReport::SourceError {
                message,
                stack_trace,
            } => {
                debug!(stack_trace = ?stack_trace, "Source preparation failed");
                ExecutionResult::compilation_error(truncate_output(
                    &message,
                    self.config.max_output_bytes,
                ))
            }
            HarnessReport::Tests(records) => {
                ExecutionResult::from_test_results(self.grade(ctx, records)?)
            }
        };

        info!(
            status = %result.status,
            score = ?result.score,
            passed = result.passed_count(),
            total_time_ms = result.total_execution_time_ms,
            peak_memory_kb = result.max_memory_used_kb,
            "Execution finished"
        );
        Ok(result)
    }

    fn sandbox_options(&self, ctx: &ExecutionContext<'_>) -> SandboxOptions {
        let workdir = PathBuf::from(CONTAINER_WORKDIR);
        SandboxOptions {
            image: ctx.language.docker_image.clone(),
            command: vec![
                "python3".to_string(),
                format!("{CONTAINER_WORKDIR}/{HARNESS_FILE}"),
                format!("{CONTAINER_WORKDIR}/{HARNESS_CONFIG_FILE}"),
            ],
            working_dir: workdir.clone(),
            directory_rules: vec![DirectoryRule {
                inside_path: workdir,
                outside_path: ctx.workspace.to_path_buf(),
                read_write: true,
            }],
            resource_limits: ResourceLimits {
                memory_limit_mb: ctx.language.memory_limit_mb as i64,
                cpu_shares: ctx.language.cpu_shares,
                process_limit: Some(self.config.pids_limit),
            },
            env: vec![
                ("HOME".to_string(), "/tmp".to_string()),
                ("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string()),
            ],
            network_disabled: true,
            read_only_root: true,
            run_as_uid: self.config.untrusted_uid(),
        }
    }

    /// Per-test limit for every test, plus room for startup and compilation.
    fn container_deadline(&self, ctx: &ExecutionContext<'_>) -> Duration {
        ctx.time_limit() * ctx.test_cases.len().max(1) as u32
            + Duration::from_secs(self.config.harness_overhead_secs)
    }

    /// Map harness records onto the ordered test cases and grade clean exits.
    fn grade(
        &self,
        ctx: &ExecutionContext<'_>,
        records: Vec<HarnessRecord>,
    ) -> Result<Vec<TestCaseOutcome>, SandboxError> {
        let mut by_id: HashMap<Uuid, HarnessRecord> = HashMap::with_capacity(records.len());
        for record in records {
            if !ctx.test_cases.iter().any(|tc| tc.id == record.test_case_id) {
                return Err(SandboxError::Harness(format!(
                    "result for unknown test case {}",
                    record.test_case_id
                )));
            }
            by_id.insert(record.test_case_id, record);
        }

        ctx.test_cases
            .iter()
            .map(|tc| {
                let record = by_id.remove(&tc.id).ok_or_else(|| {
                    SandboxError::Harness(format!("no result for test case {}", tc.id))
                })?;
                self.grade_one(tc, record)
            })
            .collect()
    }

    fn grade_one(
        &self,
        test_case: &test_case::Model,
        record: HarnessRecord,
    ) -> Result<TestCaseOutcome, SandboxError> {
        let reported = TestCaseStatus::from_code(record.status).ok_or_else(|| {
            SandboxError::Harness(format!(
                "invalid status {} for test case {}",
                record.status, test_case.id
            ))
        })?;

        let actual = record.actual_output.unwrap_or_default();
        let status = match reported {
            TestCaseStatus::Passed if outputs_match(&actual, &test_case.expected_output) => {
                TestCaseStatus::Passed
            }
            TestCaseStatus::Passed | TestCaseStatus::Failed => TestCaseStatus::Failed,
            other => other,
        };

        let cap = self.config.max_output_bytes;
        Ok(TestCaseOutcome {
            test_case_id: test_case.id,
            status,
            actual_output: Some(truncate_output(actual.trim_end(), cap)),
            error_message: record.error_message.map(|m| truncate_output(&m, cap)),
            execution_time_ms: record.execution_time_ms.max(0),
            memory_used_kb: record.memory_used_kb.max(0),
        })
    }

    fn timed_out_result(&self, ctx: &ExecutionContext<'_>) -> ExecutionResult {
        let limit = ctx.time_limit();
        let outcomes = ctx
            .test_cases
            .iter()
            .map(|tc| TestCaseOutcome {
                test_case_id: tc.id,
                status: TestCaseStatus::TimeLimitExceeded,
                actual_output: None,
                error_message: Some(format!("Time limit exceeded ({}s)", limit.as_secs())),
                execution_time_ms: limit.as_millis() as i64,
                memory_used_kb: 0,
            })
            .collect();
        ExecutionResult::from_test_results(outcomes)
    }
}

fn validate_workspace(workspace: &Path) -> Result<(), SandboxError> {
    for file in [HARNESS_FILE, HARNESS_CONFIG_FILE] {
        if !workspace.join(file).is_file() {
            return Err(SandboxError::Initialization(format!(
                "workspace {} is missing {file}",
                workspace.display()
            )));
        }
    }
    Ok(())
}
