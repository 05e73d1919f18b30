use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, KillContainerOptions, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use futures_util::stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::SandboxError;
use super::{ContainerOutput, SandboxManager, SandboxOptions};

/// Docker Engine backend for the sandbox runner.
pub struct DockerSandboxManager {
    docker: Docker,
    pull_images: bool,
}

impl DockerSandboxManager {
    pub fn connect(pull_images: bool) -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            SandboxError::Initialization(format!("failed to connect to Docker daemon: {e}"))
        })?;
        Ok(Self {
            docker,
            pull_images,
        })
    }

    async fn ensure_image(&self, image: &str) -> Result<(), SandboxError> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }
        if !self.pull_images {
            return Err(SandboxError::Initialization(format!(
                "image {image} is not present and pulling is disabled"
            )));
        }

        info!(image, "Pulling sandbox image");
        let options = CreateImageOptions {
            from_image: Some(image.to_string()),
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| {
                SandboxError::Initialization(format!("failed to pull image {image}: {e}"))
            })?;
        }
        Ok(())
    }

    async fn collect_logs(&self, sandbox_id: &str) -> Result<(String, String), SandboxError> {
        let mut logs = self.docker.logs(
            sandbox_id,
            Some(LogsOptions {
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );

        let mut stdout = String::new();
        let mut stderr = String::new();
        while let Some(chunk) = logs.next().await {
            match chunk? {
                LogOutput::StdOut { message } => stdout.push_str(&String::from_utf8_lossy(&message)),
                LogOutput::StdErr { message } => stderr.push_str(&String::from_utf8_lossy(&message)),
                _ => {}
            }
        }
        Ok((stdout, stderr))
    }

    async fn kill(&self, sandbox_id: &str) {
        let options = KillContainerOptions {
            signal: "SIGKILL".to_string(),
        };
        if let Err(e) = self.docker.kill_container(sandbox_id, Some(options)).await {
            warn!(sandbox_id, error = %e, "Failed to kill container");
        }
    }
}

/// Host configuration enforcing the sandbox constraints.
fn host_config(options: &SandboxOptions) -> HostConfig {
    let memory_bytes = options.resource_limits.memory_limit_mb * 1024 * 1024;
    let binds = options
        .directory_rules
        .iter()
        .map(|rule| {
            format!(
                "{}:{}:{}",
                rule.outside_path.to_string_lossy(),
                rule.inside_path.to_string_lossy(),
                if rule.read_write { "rw" } else { "ro" }
            )
        })
        .collect();

    HostConfig {
        binds: Some(binds),
        memory: Some(memory_bytes),
        // Equal to memory: no swap on top of the limit.
        memory_swap: Some(memory_bytes),
        cpu_shares: Some(options.resource_limits.cpu_shares),
        pids_limit: options.resource_limits.process_limit,
        network_mode: options.network_disabled.then(|| "none".to_string()),
        readonly_rootfs: Some(options.read_only_root),
        tmpfs: Some(HashMap::from([(
            "/tmp".to_string(),
            "rw,noexec,nosuid,size=64m".to_string(),
        )])),
        cap_drop: Some(vec!["ALL".to_string()]),
        cap_add: options
            .run_as_uid
            .map(|_| vec!["SETUID".to_string(), "SETGID".to_string(), "KILL".to_string()]),
        security_opt: Some(vec!["no-new-privileges".to_string()]),
        ..Default::default()
    }
}

#[async_trait]
impl SandboxManager for DockerSandboxManager {
    async fn create_sandbox(&self, options: &SandboxOptions) -> Result<String, SandboxError> {
        self.ensure_image(&options.image).await?;

        let body = ContainerCreateBody {
            image: Some(options.image.clone()),
            cmd: Some(options.command.clone()),
            working_dir: Some(options.working_dir.to_string_lossy().to_string()),
            env: Some(
                options
                    .env
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect(),
            ),
            network_disabled: Some(options.network_disabled),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(host_config(options)),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: Some(format!("codegrade-{}", Uuid::new_v4().simple())),
            ..Default::default()
        };

        let container = self
            .docker
            .create_container(Some(create_options), body)
            .await
            .map_err(|e| SandboxError::Initialization(format!("failed to create container: {e}")))?;

        debug!(sandbox_id = %container.id, image = %options.image, "Created sandbox container");
        Ok(container.id)
    }

    async fn execute(
        &self,
        sandbox_id: &str,
        deadline: Duration,
        abort: &CancellationToken,
    ) -> Result<ContainerOutput, SandboxError> {
        self.docker
            .start_container(sandbox_id, None::<StartContainerOptions>)
            .await
            .map_err(|e| SandboxError::Initialization(format!("failed to start container: {e}")))?;

        let started = Instant::now();
        let mut wait = self
            .docker
            .wait_container(sandbox_id, None::<WaitContainerOptions>);

        let mut timed_out = false;
        let exit_code = tokio::select! {
            outcome = wait.next() => match outcome {
                Some(Ok(response)) => Some(response.status_code),
                // Non-zero exits surface as a wait error carrying the code.
                Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Some(code),
                Some(Err(e)) => return Err(SandboxError::Execution(e.to_string())),
                None => None,
            },
            _ = tokio::time::sleep(deadline) => {
                warn!(sandbox_id, deadline_secs = deadline.as_secs(), "Sandbox deadline exceeded, killing container");
                self.kill(sandbox_id).await;
                timed_out = true;
                None
            }
            _ = abort.cancelled() => {
                warn!(sandbox_id, "Execution aborted, killing container");
                self.kill(sandbox_id).await;
                return Err(SandboxError::Aborted);
            }
        };
        let wall_time_ms = started.elapsed().as_millis() as i64;

        let (stdout, stderr) = self.collect_logs(sandbox_id).await?;

        Ok(ContainerOutput {
            exit_code,
            stdout,
            stderr,
            timed_out,
            wall_time_ms,
        })
    }

    async fn remove_sandbox(&self, sandbox_id: &str) -> Result<(), SandboxError> {
        self.docker
            .remove_container(
                sandbox_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }
}
