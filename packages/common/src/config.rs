use serde::Deserialize;

/// App-level queue configuration, shared by the enqueueing side and the worker.
#[derive(Debug, Deserialize, Clone)]
pub struct MqAppConfig {
    /// Redis connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_mq_url")]
    pub url: String,
    /// Name of the list holding pending submission ids. Default: "submission_queue".
    #[serde(default = "default_mq_queue_name")]
    pub queue_name: String,
}

fn default_mq_url() -> String {
    "redis://localhost:6379".into()
}
fn default_mq_queue_name() -> String {
    "submission_queue".into()
}

impl Default for MqAppConfig {
    fn default() -> Self {
        Self {
            url: default_mq_url(),
            queue_name: default_mq_queue_name(),
        }
    }
}
