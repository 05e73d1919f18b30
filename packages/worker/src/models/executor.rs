use async_trait::async_trait;
use common::{ExecutionResult, LanguageKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::entity::{language, submission, test_case};
use crate::error::{Result, WorkerError};
use crate::models::languages::{self, LanguagePlan};
use crate::models::sandbox::harness::{HARNESS_CONFIG_FILE, HARNESS_FILE, HARNESS_SCRIPT};
use crate::models::sandbox::{ExecutionContext, SandboxRunner};
use crate::models::workspace::Workspace;

/// Runs one submission against its test cases.
#[async_trait]
pub trait SubmissionExecutor: Send + Sync {
    /// `abort` kills the sandbox mid-run; the result is then an error.
    async fn execute(
        &self,
        submission: &submission::Model,
        language: &language::Model,
        test_cases: &[test_case::Model],
        abort: &CancellationToken,
    ) -> Result<ExecutionResult>;
}

/// Single executor for every `LanguageKind`. Owns the workspace for the
/// duration of one execution and hands the runner a borrowed path.
pub struct UniversalExecutor {
    runner: SandboxRunner,
}

impl UniversalExecutor {
    pub fn new(runner: SandboxRunner) -> Self {
        Self { runner }
    }

    /// Resolve the language row to a plan, rejecting unknown or disabled languages.
    pub fn resolve(language: &language::Model) -> Result<(LanguageKind, LanguagePlan)> {
        let kind: LanguageKind = language.name.parse()?;
        if !language.is_enabled {
            return Err(WorkerError::LanguageDisabled(language.name.clone()));
        }
        let plan = languages::plan_for(kind).with_overrides(language);
        Ok((kind, plan))
    }

    async fn prepare(
        &self,
        workspace: &Workspace,
        plan: &LanguagePlan,
        submission: &submission::Model,
        language: &language::Model,
        test_cases: &[test_case::Model],
    ) -> Result<()> {
        workspace.write_file(plan.source_file, &submission.code).await?;
        for file in &plan.support_files {
            workspace.write_file(file.name, file.contents).await?;
        }
        if let Some(dir) = plan.build_dir {
            workspace.create_dir(dir).await?;
        }

        let config = plan.harness_config(language, test_cases, self.runner.config());
        let config = serde_json::to_vec(&config)
            .map_err(|e| WorkerError::Internal(format!("failed to encode harness config: {e}")))?;
        workspace.write_file(HARNESS_CONFIG_FILE, config).await?;
        workspace.write_file(HARNESS_FILE, HARNESS_SCRIPT).await?;
        Ok(())
    }
}

#[async_trait]
impl SubmissionExecutor for UniversalExecutor {
    #[instrument(skip_all, fields(submission_id = %submission.id, language = %language.name))]
    async fn execute(
        &self,
        submission: &submission::Model,
        language: &language::Model,
        test_cases: &[test_case::Model],
        abort: &CancellationToken,
    ) -> Result<ExecutionResult> {
        let (kind, plan) = Self::resolve(language)?;
        debug!(%kind, tests = test_cases.len(), "Preparing workspace");

        let base = &self.runner.config().workspace_base_path;
        let workspace = Workspace::create(base, submission.id).await?;

        let outcome = match self
            .prepare(&workspace, &plan, submission, language, test_cases)
            .await
        {
            Ok(()) => {
                let ctx = ExecutionContext {
                    submission,
                    language,
                    test_cases,
                    workspace: workspace.path(),
                };
                self.runner.run(&ctx, abort).await.map_err(WorkerError::from)
            }
            Err(e) => Err(e),
        };

        if let Err(e) = workspace.remove().await {
            warn!(error = %e, "Failed to remove workspace");
        }
        outcome
    }
}
