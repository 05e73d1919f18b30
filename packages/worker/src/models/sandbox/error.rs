use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    /// Image pull, container creation or workspace validation failed.
    #[error("Environment initialization failed: {0}")]
    Initialization(String),

    /// The container could not be started, waited on or read.
    #[error("execution error: {0}")]
    Execution(String),

    /// The harness ran but its output broke the result protocol.
    #[error("harness protocol error: {0}")]
    Harness(String),

    /// A hard shutdown killed the container.
    #[error("execution aborted")]
    Aborted,
}

impl From<bollard::errors::Error> for SandboxError {
    fn from(e: bollard::errors::Error) -> Self {
        SandboxError::Execution(e.to_string())
    }
}
