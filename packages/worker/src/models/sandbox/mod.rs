pub mod docker;
pub mod error;
pub mod harness;
pub mod runner;

use async_trait::async_trait;
use error::SandboxError;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use runner::{ExecutionContext, SandboxRunner};

/// Bind mount from the host into the container.
#[derive(Debug, Clone)]
pub struct DirectoryRule {
    pub inside_path: PathBuf,
    pub outside_path: PathBuf,
    pub read_write: bool,
}

/// Resource limits applied to the whole container.
#[derive(Debug, Clone, Default)]
pub struct ResourceLimits {
    pub memory_limit_mb: i64,
    pub cpu_shares: i64,
    pub process_limit: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SandboxOptions {
    pub image: String,
    pub command: Vec<String>,
    pub working_dir: PathBuf,
    pub directory_rules: Vec<DirectoryRule>,
    pub resource_limits: ResourceLimits,
    pub env: Vec<(String, String)>,
    pub network_disabled: bool,
    /// Root filesystem is read-only; only bind mounts and a tmpfs /tmp are writable.
    pub read_only_root: bool,
    /// Uid the harness switches submitted code to. The container then keeps
    /// the capabilities needed to switch and to kill that uid.
    pub run_as_uid: Option<u32>,
}

/// What came out of one container run.
#[derive(Debug, Clone, Default)]
pub struct ContainerOutput {
    pub exit_code: Option<i64>,
    pub stdout: String,
    pub stderr: String,
    /// The container deadline fired and the container was killed.
    pub timed_out: bool,
    pub wall_time_ms: i64,
}

/// Container runtime used by the runner. One sandbox per submission execution.
#[async_trait]
pub trait SandboxManager: Send + Sync {
    /// Create (but do not start) a container. Returns its id.
    async fn create_sandbox(&self, options: &SandboxOptions) -> Result<String, SandboxError>;

    /// Start the container and wait for it, killing it once `deadline` elapses
    /// or `abort` is cancelled.
    async fn execute(
        &self,
        sandbox_id: &str,
        deadline: Duration,
        abort: &CancellationToken,
    ) -> Result<ContainerOutput, SandboxError>;

    async fn remove_sandbox(&self, sandbox_id: &str) -> Result<(), SandboxError>;
}
