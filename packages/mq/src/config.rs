use common::config::MqAppConfig;

/// Connection settings for the submission queue.
#[derive(Debug, Clone)]
pub struct MqConfig {
    pub url: String,
    /// Fixed list key the API pushes to and workers pop from.
    pub queue_name: String,
}

impl From<&MqAppConfig> for MqConfig {
    fn from(app: &MqAppConfig) -> Self {
        Self {
            url: app.url.clone(),
            queue_name: app.queue_name.clone(),
        }
    }
}
