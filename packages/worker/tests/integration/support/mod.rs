use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ::common::{ExecutionResult, SubmissionStatus, TestCaseOutcome};
use mq::{InMemoryQueue, SubmissionQueue};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use worker::config::{SandboxConfig, WorkerConfig};
use worker::entity::{language, submission, test_case};
use worker::models::sandbox::error::SandboxError;
use worker::models::sandbox::harness::{HARNESS_CONFIG_FILE, HarnessConfig};
use worker::models::sandbox::runner::CONTAINER_WORKDIR;
use worker::models::sandbox::{ContainerOutput, SandboxManager, SandboxOptions, SandboxRunner};
use worker::{ExecutionWorker, LoadedSubmission, SubmissionStore, UniversalExecutor, WorkerError};


pub const SUM_SOLUTION: &str = "def solution():\n a,b=map(int,input().split())\n print(a+b)\n";
pub const RAISING_SOLUTION: &str = "def solution():\n raise ValueError('bad input')\n";
pub const LOOPING_SOLUTION: &str = "def solution():\n while True: pass\n";

#[derive(Default)]
struct State {
    languages: HashMap<Uuid, language::Model>,
    submissions: HashMap<Uuid, submission::Model>,
    test_cases: Vec<test_case::Model>,
    results: HashMap<Uuid, Vec<TestCaseOutcome>>,
    history: HashMap<Uuid, Vec<SubmissionStatus>>,
}

/// Submission store backed by maps; records every status a submission passes through.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn add_language(&self, language: language::Model) {
        self.state
            .lock()
            .unwrap()
            .languages
            .insert(language.id, language);
    }

    /// Insert a problem with the given (input, expected) pairs and a Pending submission for it.
    pub fn add_submission(&self, language: &language::Model, code: &str, cases: &[(&str, &str)]) -> Uuid {
        let problem_id = Uuid::new_v4();
        let now = Utc::now();
        let submission = submission::Model {
            id: Uuid::new_v4(),
            code: code.into(),
            problem_id,
            language_id: language.id,
            status: SubmissionStatus::Pending,
            score: None,
            execution_time_ms: None,
            memory_used_kb: None,
            compilation_error: None,
            runtime_error: None,
            created_at: now,
            started_at: None,
            completed_at: None,
        };

        let mut state = self.state.lock().unwrap();
        for (i, (input, expected)) in cases.iter().enumerate() {
            state.test_cases.push(test_case::Model {
                id: Uuid::new_v4(),
                problem_id,
                input: input.to_string(),
                expected_output: expected.to_string(),
                is_public: false,
                order_index: i as i32,
                created_at: now,
            });
        }
        let id = submission.id;
        state.history.insert(id, vec![SubmissionStatus::Pending]);
        state.submissions.insert(id, submission);
        id
    }

    pub fn submission(&self, id: Uuid) -> submission::Model {
        self.state.lock().unwrap().submissions[&id].clone()
    }

    pub fn results(&self, id: Uuid) -> Vec<TestCaseOutcome> {
        self.state
            .lock()
            .unwrap()
            .results
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn history(&self, id: Uuid) -> Vec<SubmissionStatus> {
        self.state.lock().unwrap().history[&id].clone()
    }

    fn set_status(state: &mut State, id: Uuid, status: SubmissionStatus) {
        if let Some(s) = state.submissions.get_mut(&id) {
            s.status = status;
        }
        state.history.entry(id).or_default().push(status);
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn load(&self, submission_id: Uuid) -> worker::Result<Option<LoadedSubmission>> {
        let state = self.state.lock().unwrap();
        let Some(submission) = state.submissions.get(&submission_id).cloned() else {
            return Ok(None);
        };
        let language = state.languages[&submission.language_id].clone();
        let mut test_cases: Vec<_> = state
            .test_cases
            .iter()
            .filter(|tc| tc.problem_id == submission.problem_id)
            .cloned()
            .collect();
        test_cases.sort_by_key(|tc| (tc.order_index, tc.id));
        Ok(Some(LoadedSubmission {
            submission,
            language,
            test_cases,
        }))
    }

    async fn mark_running(&self, submission_id: Uuid) -> worker::Result<bool> {
        let mut state = self.state.lock().unwrap();
        let pending = state
            .submissions
            .get(&submission_id)
            .is_some_and(|s| s.status == SubmissionStatus::Pending);
        if pending {
            Self::set_status(&mut state, submission_id, SubmissionStatus::Running);
            if let Some(s) = state.submissions.get_mut(&submission_id) {
                s.started_at = Some(Utc::now());
            }
        }
        Ok(pending)
    }

    async fn mark_failed(&self, submission_id: Uuid, message: &str) -> worker::Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::set_status(&mut state, submission_id, SubmissionStatus::RuntimeError);
        if let Some(s) = state.submissions.get_mut(&submission_id) {
            s.score = None;
            s.runtime_error = Some(message.to_string());
            s.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn save_result(&self, submission_id: Uuid, result: &ExecutionResult) -> worker::Result<()> {
        let mut state = self.state.lock().unwrap();
        let problem_id = state.submissions[&submission_id].problem_id;
        for r in &result.test_results {
            let known = state
                .test_cases
                .iter()
                .any(|tc| tc.id == r.test_case_id && tc.problem_id == problem_id);
            if !known {
                return Err(WorkerError::UnknownTestCase {
                    submission_id,
                    test_case_id: r.test_case_id,
                });
            }
        }

        Self::set_status(&mut state, submission_id, result.status);
        if let Some(s) = state.submissions.get_mut(&submission_id) {
            s.score = result.score;
            s.execution_time_ms = Some(result.total_execution_time_ms);
            s.memory_used_kb = Some(result.max_memory_used_kb);
            s.compilation_error = result.compilation_error.clone();
            s.runtime_error = result.runtime_error.clone();
            s.completed_at = Some(Utc::now());
        }
        state
            .results
            .insert(submission_id, result.test_results.clone());
        Ok(())
    }

    async fn find_stuck_running(&self, older_than: DateTime<Utc>) -> worker::Result<Vec<Uuid>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .submissions
            .values()
            .filter(|s| {
                s.status == SubmissionStatus::Running && s.started_at.is_some_and(|t| t < older_than)
            })
            .map(|s| s.id)
            .collect())
    }
}

/// Stands in for the container: reads the prepared workspace and answers the
/// way the harness would for a handful of known programs.
pub struct FakeSandbox {
    pub delay: Duration,
    workspaces: Mutex<HashMap<String, std::path::PathBuf>>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub created: AtomicUsize,
}

impl FakeSandbox {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            workspaces: Mutex::new(HashMap::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
        })
    }

    fn respond(workspace: &Path) -> ContainerOutput {
        let config: HarnessConfig = serde_json::from_slice(
            &std::fs::read(workspace.join(HARNESS_CONFIG_FILE)).unwrap(),
        )
        .unwrap();
        let code = std::fs::read_to_string(workspace.join("solution.py")).unwrap();

        if code.contains("while True") {
            return ContainerOutput {
                timed_out: true,
                ..Default::default()
            };
        }

        let records: Vec<serde_json::Value> = config
            .test_cases
            .iter()
            .map(|tc| {
                if code.contains("raise") {
                    serde_json::json!({
                        "testCaseId": tc.id,
                        "status": 3,
                        "actualOutput": "",
                        "executionTimeMs": 4,
                        "memoryUsedKb": 9000,
                        "errorMessage": "ValueError: bad input",
                    })
                } else {
                    let sum: i64 = tc
                        .input
                        .split_whitespace()
                        .filter_map(|n| n.parse::<i64>().ok())
                        .sum();
                    serde_json::json!({
                        "testCaseId": tc.id,
                        "status": 1,
                        "actualOutput": format!("{sum}\r\n"),
                        "executionTimeMs": 7,
                        "memoryUsedKb": 8000,
                        "errorMessage": null,
                    })
                }
            })
            .collect();

        ContainerOutput {
            exit_code: Some(0),
            stdout: format!("{}\n", serde_json::Value::Array(records)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl SandboxManager for FakeSandbox {
    async fn create_sandbox(&self, options: &SandboxOptions) -> Result<String, SandboxError> {
        let id = Uuid::new_v4().to_string();
        self.workspaces
            .lock()
            .unwrap()
            .insert(id.clone(), options.directory_rules[0].outside_path.clone());
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn execute(
        &self,
        sandbox_id: &str,
        _deadline: Duration,
        abort: &CancellationToken,
    ) -> Result<ContainerOutput, SandboxError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let aborted = tokio::select! {
            _ = tokio::time::sleep(self.delay) => false,
            _ = abort.cancelled() => true,
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        if aborted {
            return Err(SandboxError::Aborted);
        }

        let workspace = self.workspaces.lock().unwrap()[sandbox_id].clone();
        Ok(Self::respond(&workspace))
    }

    async fn remove_sandbox(&self, sandbox_id: &str) -> Result<(), SandboxError> {
        self.workspaces.lock().unwrap().remove(sandbox_id);
        Ok(())
    }
}

/// Runs the real harness with the host's `python3` instead of a container.
/// Container paths in the command and in `harness.json` are rewritten to the
/// workspace on the host.
#[derive(Default)]
pub struct LocalHarness {
    sandboxes: Mutex<HashMap<String, (std::path::PathBuf, Vec<String>)>>,
}

impl LocalHarness {
    /// False when no `python3` is on PATH; harness tests skip themselves then.
    pub fn available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .is_ok_and(|out| out.status.success())
    }
}

#[async_trait]
impl SandboxManager for LocalHarness {
    async fn create_sandbox(&self, options: &SandboxOptions) -> Result<String, SandboxError> {
        let id = Uuid::new_v4().to_string();
        self.sandboxes.lock().unwrap().insert(
            id.clone(),
            (
                options.directory_rules[0].outside_path.clone(),
                options.command.clone(),
            ),
        );
        Ok(id)
    }

    async fn execute(
        &self,
        sandbox_id: &str,
        deadline: Duration,
        abort: &CancellationToken,
    ) -> Result<ContainerOutput, SandboxError> {
        let (workspace, command) = self.sandboxes.lock().unwrap()[sandbox_id].clone();
        let host = workspace.to_string_lossy().to_string();

        let config_path = workspace.join(HARNESS_CONFIG_FILE);
        let config = std::fs::read_to_string(&config_path)
            .unwrap()
            .replace(&format!("\"{CONTAINER_WORKDIR}/"), &format!("\"{host}/"));
        std::fs::write(&config_path, config).unwrap();

        let args: Vec<String> = command
            .iter()
            .map(|arg| arg.replacen(CONTAINER_WORKDIR, &host, 1))
            .collect();
        let started = std::time::Instant::now();
        let mut cmd = tokio::process::Command::new(&args[0]);
        cmd.args(&args[1..]).kill_on_drop(true);
        let child = cmd.output();

        let output = tokio::select! {
            res = tokio::time::timeout(deadline, child) => match res {
                Ok(output) => output.map_err(|e| SandboxError::Execution(e.to_string()))?,
                Err(_) => {
                    return Ok(ContainerOutput {
                        timed_out: true,
                        ..Default::default()
                    })
                }
            },
            _ = abort.cancelled() => return Err(SandboxError::Aborted),
        };

        Ok(ContainerOutput {
            exit_code: output.status.code().map(i64::from),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            timed_out: false,
            wall_time_ms: started.elapsed().as_millis() as i64,
        })
    }

    async fn remove_sandbox(&self, sandbox_id: &str) -> Result<(), SandboxError> {
        self.sandboxes.lock().unwrap().remove(sandbox_id);
        Ok(())
    }
}

pub fn python_language() -> language::Model {
    language::Model {
        id: Uuid::new_v4(),
        name: "Python".into(),
        version: "3.12".into(),
        docker_image: "python:3.12-slim".into(),
        file_extension: "py".into(),
        run_command: None,
        compile_command: None,
        time_limit_seconds: 2,
        memory_limit_mb: 256,
        cpu_shares: 512,
        is_enabled: true,
    }
}

pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub queue: Arc<InMemoryQueue>,
    pub sandbox: Arc<FakeSandbox>,
    pub language: language::Model,
    pub workspace_base: tempfile::TempDir,
    pub worker_config: WorkerConfig,
}

impl TestEnv {
    pub fn new(max_concurrent_executions: usize, delay: Duration) -> Self {
        let store = Arc::new(MemoryStore::default());
        let language = python_language();
        store.add_language(language.clone());
        Self {
            store,
            queue: Arc::new(InMemoryQueue::new()),
            sandbox: FakeSandbox::new(delay),
            language,
            workspace_base: tempfile::tempdir().unwrap(),
            worker_config: WorkerConfig {
                max_concurrent_executions,
                poll_interval_ms: 10,
                ..Default::default()
            },
        }
    }

    pub async fn submit(&self, code: &str, cases: &[(&str, &str)]) -> Uuid {
        let id = self.store.add_submission(&self.language, code, cases);
        self.queue.enqueue(id).await.unwrap();
        id
    }

    pub async fn submit_as(&self, language: &language::Model, code: &str, cases: &[(&str, &str)]) -> Uuid {
        let id = self.store.add_submission(language, code, cases);
        self.queue.enqueue(id).await.unwrap();
        id
    }

    pub fn worker(&self) -> ExecutionWorker {
        self.worker_on(self.sandbox.clone(), SandboxConfig::default())
    }

    /// Worker on another sandbox backend; the workspace base is always this env's.
    pub fn worker_on(&self, manager: Arc<dyn SandboxManager>, config: SandboxConfig) -> ExecutionWorker {
        let sandbox_config = SandboxConfig {
            workspace_base_path: self.workspace_base.path().to_path_buf(),
            ..config
        };
        let runner = SandboxRunner::new(manager, sandbox_config);
        ExecutionWorker::new(
            self.queue.clone(),
            self.store.clone(),
            Arc::new(UniversalExecutor::new(runner)),
            self.worker_config.clone(),
        )
    }

    /// Run the worker until every listed submission is final, then shut it down.
    pub async fn run_until_final(&self, ids: &[Uuid]) {
        self.run_worker_until_final(self.worker(), ids).await;
    }

    pub async fn run_worker_until_final(&self, worker: ExecutionWorker, ids: &[Uuid]) {
        let shutdown = CancellationToken::new();
        let abort = CancellationToken::new();

        let watcher = {
            let store = self.store.clone();
            let ids = ids.to_vec();
            let shutdown = shutdown.clone();
            async move {
                while !ids.iter().all(|id| store.submission(*id).status.is_final()) {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                shutdown.cancel();
            }
        };

        tokio::time::timeout(Duration::from_secs(10), async {
            tokio::join!(worker.run(shutdown.clone(), abort), watcher)
        })
        .await
        .expect("worker did not finish in time");
    }

    pub fn workspace_entries(&self) -> usize {
        std::fs::read_dir(self.workspace_base.path()).unwrap().count()
    }
}
