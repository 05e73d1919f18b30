pub mod config;
pub mod error;
pub mod models;

pub use config::MqConfig;
pub use error::MqError;
pub use models::{InMemoryQueue, RedisQueue, SubmissionQueue, init_mq};

pub type Mq = dyn SubmissionQueue;
