use anyhow::Context;
use clap::Parser;
use mq::{MqConfig, SubmissionQueue, init_mq};
use uuid::Uuid;
use worker::config::WorkerAppConfig;

/// Push submission ids onto the execution queue.
#[derive(Parser, Debug)]
#[command(name = "codegrade-enqueue", version, about)]
struct Cli {
    /// Submission ids to enqueue, oldest first.
    #[arg(required_unless_present = "length")]
    submission_ids: Vec<Uuid>,

    /// Print the current queue depth instead.
    #[arg(long, conflicts_with = "submission_ids")]
    length: bool,

    /// Queue URL; overrides the configured `mq.url`.
    #[arg(long, env = "CODEGRADE__MQ__URL")]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = WorkerAppConfig::load().context("Failed to load config")?;
    let mut mq_config = MqConfig::from(&config.mq);
    if let Some(url) = cli.url {
        mq_config.url = url;
    }

    let queue = init_mq(mq_config)
        .await
        .context("Failed to connect to the queue")?;

    if cli.length {
        println!("{}", queue.queue_length().await);
        return Ok(());
    }

    for id in &cli.submission_ids {
        queue
            .enqueue(*id)
            .await
            .with_context(|| format!("Failed to enqueue {id}"))?;
        println!("enqueued {id}");
    }
    Ok(())
}
