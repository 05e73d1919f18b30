use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub use common::config::MqAppConfig;

/// Worker-specific configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Unique identifier for this worker instance. Default: "worker-1".
    #[serde(default = "default_worker_id")]
    pub id: String,
    /// Consumer count and handoff channel capacity. Default: 4.
    #[serde(default = "default_max_concurrent_executions")]
    pub max_concurrent_executions: usize,
    /// Sleep after an empty dequeue, in milliseconds. Default: 1000.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Running submissions older than this are reported as stuck. 0 disables. Default: 900.
    #[serde(default = "default_stuck_after_secs")]
    pub stuck_after_secs: u64,
    /// Period of the stuck-submission report. Default: 60.
    #[serde(default = "default_stuck_scan_interval_secs")]
    pub stuck_scan_interval_secs: u64,
}

fn default_worker_id() -> String {
    "worker-1".into()
}
fn default_max_concurrent_executions() -> usize {
    4
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_stuck_after_secs() -> u64 {
    900
}
fn default_stuck_scan_interval_secs() -> u64 {
    60
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            id: default_worker_id(),
            max_concurrent_executions: default_max_concurrent_executions(),
            poll_interval_ms: default_poll_interval_ms(),
            stuck_after_secs: default_stuck_after_secs(),
            stuck_scan_interval_secs: default_stuck_scan_interval_secs(),
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Sandbox and workspace configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct SandboxConfig {
    /// Parent directory of per-execution workspaces. Default: "/tmp/codegrade".
    #[serde(default = "default_workspace_base_path")]
    pub workspace_base_path: PathBuf,
    /// Leftover workspaces older than this are swept at startup. Default: 3600.
    #[serde(default = "default_stale_workspace_secs")]
    pub stale_workspace_secs: u64,
    /// Added to the container deadline for startup and compilation. Default: 10.
    #[serde(default = "default_harness_overhead_secs")]
    pub harness_overhead_secs: u64,
    /// Pull images that are missing locally. Default: true.
    #[serde(default = "default_pull_images")]
    pub pull_images: bool,
    /// Process cap inside the container. Default: 64.
    #[serde(default = "default_pids_limit")]
    pub pids_limit: i64,
    /// Cap on stored output and error text per test case. Default: 65536.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    /// Uid submitted code runs as inside the container. 0 keeps the harness user. Default: 65534.
    #[serde(default = "default_run_as_uid")]
    pub run_as_uid: u32,
}

fn default_workspace_base_path() -> PathBuf {
    PathBuf::from("/tmp/codegrade")
}
fn default_stale_workspace_secs() -> u64 {
    3600
}
fn default_harness_overhead_secs() -> u64 {
    10
}
fn default_pull_images() -> bool {
    true
}
fn default_pids_limit() -> i64 {
    64
}
fn default_max_output_bytes() -> usize {
    64 * 1024
}
fn default_run_as_uid() -> u32 {
    65534
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            workspace_base_path: default_workspace_base_path(),
            stale_workspace_secs: default_stale_workspace_secs(),
            harness_overhead_secs: default_harness_overhead_secs(),
            pull_images: default_pull_images(),
            pids_limit: default_pids_limit(),
            max_output_bytes: default_max_output_bytes(),
            run_as_uid: default_run_as_uid(),
        }
    }
}

impl SandboxConfig {
    /// `None` when submitted code shares the harness user.
    pub fn untrusted_uid(&self) -> Option<u32> {
        (self.run_as_uid != 0).then_some(self.run_as_uid)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "postgres://localhost/codegrade".into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Worker application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct WorkerAppConfig {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub mq: MqAppConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl WorkerAppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CODEGRADE_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("worker.id", "worker-1")?
            .set_default("worker.max_concurrent_executions", 4_i64)?
            .set_default("worker.poll_interval_ms", 1000_i64)?
            .set_default("mq.url", "redis://localhost:6379")?
            .set_default("mq.queue_name", "submission_queue")?
            .set_default("sandbox.workspace_base_path", "/tmp/codegrade")?
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("CODEGRADE").separator("__"))
            .build()?;

        let config: Self = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.max_concurrent_executions == 0 {
            return Err(ConfigError::Message(
                "worker.max_concurrent_executions must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
