use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use rand::Rng;
use serde::{Deserialize, Serialize};
use spool_core::domain::{Message, ProcessOutcome, SpoolError};
use spool_core::impls::InMemoryBroker;
use spool_core::limiter::CancelHandle;
use spool_core::ports::{Flusher, Processor};
use spool_core::{ConsumerBuilder, ConsumerConfig};
use tracing_subscriber::EnvFilter;

const QUEUE_NAME: &str = "jobs";

#[derive(Parser)]
#[command(name = "spool-cli")]
#[command(about = "Run a queue consumer against an in-memory broker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed a queue and consume it until a limit is reached
    Consume(ConsumeArgs),
}

#[derive(clap::Args)]
struct ConsumeArgs {
    /// JSON config file; flags below override it
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Messages per batch flush
    #[arg(long)]
    batch_size: Option<usize>,

    /// Stop after this many messages
    #[arg(long)]
    limit: Option<u64>,

    /// Stop once resident memory exceeds this many MB
    #[arg(long)]
    max_memory: Option<u64>,

    /// Stop after this many seconds
    #[arg(long)]
    max_time: Option<u64>,

    /// Sleep when the queue is empty (ms)
    #[arg(long)]
    wait: Option<u64>,

    /// Sleep after each message (ms)
    #[arg(long)]
    cool_down: Option<u64>,

    /// Keep the process alive at least this many seconds
    #[arg(long)]
    min_duration: Option<u64>,

    /// Total tries per message (2 or more enables retries)
    #[arg(long)]
    attempts: Option<u32>,

    /// Retry strategy: backoff or deprioritize
    #[arg(long)]
    strategy: Option<String>,

    /// Number of demo messages to seed
    #[arg(long, default_value_t = 100)]
    messages: u64,

    /// Probability that the demo processor fails a message
    #[arg(long, default_value_t = 0.0)]
    fail_rate: f64,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

impl ConsumeArgs {
    fn to_config(&self) -> Result<ConsumerConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => ConsumerConfig::from_json_str(&std::fs::read_to_string(path)?)?,
            None => ConsumerConfig::default(),
        };
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(limit) = self.limit {
            config.limit = limit;
        }
        if let Some(megabytes) = self.max_memory {
            config.max_memory = megabytes.saturating_mul(1024 * 1024);
        }
        if let Some(max_time) = self.max_time {
            config.max_time = max_time;
        }
        if let Some(wait) = self.wait {
            config.wait_interval_ms = wait;
        }
        if let Some(cool_down) = self.cool_down {
            config.cool_down_ms = cool_down;
        }
        if let Some(min_duration) = self.min_duration {
            config.min_runtime = min_duration;
        }
        if let Some(attempts) = self.attempts {
            config.max_attempts = attempts;
        }
        if let Some(strategy) = &self.strategy {
            config.retry_strategy = strategy.clone();
        }
        if !(0.0..=1.0).contains(&self.fail_rate) {
            return Err(format!("--fail-rate must be between 0 and 1, got {}", self.fail_rate).into());
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DemoPayload {
    n: u64,
}

/// Fails a share of messages at random.
struct DemoProcessor {
    fail_rate: f64,
    processed: Arc<AtomicU64>,
}

#[async_trait]
impl Processor for DemoProcessor {
    async fn process(&self, message: &Message) -> Result<ProcessOutcome, SpoolError> {
        let payload: DemoPayload = match serde_json::from_slice(message.body()) {
            Ok(payload) => payload,
            Err(e) => return Ok(ProcessOutcome::failure(format!("json decode: {e}"))),
        };

        let fail = rand::thread_rng().gen_bool(self.fail_rate);
        if fail {
            return Ok(ProcessOutcome::failure(format!(
                "intentional failure (n={}, attempt={})",
                payload.n,
                message.attempt()
            )));
        }

        self.processed.fetch_add(1, Ordering::Relaxed);
        Ok(ProcessOutcome::success())
    }
}

/// Logs how many messages succeeded since the previous flush.
struct TallyFlusher {
    processed: Arc<AtomicU64>,
    flushed: AtomicU64,
}

#[async_trait]
impl Flusher for TallyFlusher {
    fn name(&self) -> &str {
        "tally"
    }

    async fn flush(&self) -> Result<(), SpoolError> {
        let total = self.processed.load(Ordering::Relaxed);
        let previous = self.flushed.swap(total, Ordering::Relaxed);
        tracing::info!(batch = total - previous, total, "flushed tally");
        Ok(())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

async fn consume(args: ConsumeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.to_config()?;

    // (A) broker と queue を用意してメッセージを投入
    let broker = InMemoryBroker::new();
    let queue = broker.queue(QUEUE_NAME).await;
    for n in 1..=args.messages {
        queue.push(serde_json::to_vec(&DemoPayload { n })?).await;
    }

    // (B) consumer を構築
    let processed = Arc::new(AtomicU64::new(0));
    let cancel = CancelHandle::new();
    let mut consumer = ConsumerBuilder::new(
        Arc::new(queue.clone()),
        Arc::new(DemoProcessor {
            fail_rate: args.fail_rate,
            processed: processed.clone(),
        }),
    )
    .config(config)
    .publisher(Arc::new(broker.publisher(QUEUE_NAME)))
    .flusher(Arc::new(TallyFlusher {
        processed,
        flushed: AtomicU64::new(0),
    }))
    .limiter(cancel.limiter())
    .build()?;

    // (C) Ctrl-C で次の limiter 評価時に停止
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping after the current message");
            cancel.cancel();
        }
    });

    let report = consumer.consume().await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let counts = queue.counts().await;
    println!(
        "Consumed {} messages in {} seconds",
        report.processed,
        report.elapsed.as_secs()
    );
    println!(
        "stop: {} | flushes: {} | ready: {} | scheduled: {} | dead-lettered: {}",
        report.stop_reason, report.flushes, counts.ready, counts.scheduled, counts.dead_lettered
    );
    Ok(())
}


#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Consume(args) => consume(args).await,
    }
}
