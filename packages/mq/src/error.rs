use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("{0}")]
    Internal(String),
}

impl From<redis::RedisError> for MqError {
    fn from(e: redis::RedisError) -> Self {
        MqError::Internal(e.to_string())
    }
}
