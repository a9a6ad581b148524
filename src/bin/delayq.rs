//! delayq CLI — drive a delayed queue from the command line.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use delayq::config::{Config, QueueConfig};
use delayq::event::QueueEvent;
use delayq::telemetry::{TelemetryConfig, init_telemetry};
use delayq::{Completion, DelayedQueue, Error};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "delayq", about = "Sequential delayed slot queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enqueue slots and report the order they are released in
    Run {
        /// Per-slot delays in milliseconds; "-" uses the default delay
        #[arg(required = true, allow_negative_numbers = true)]
        delays: Vec<String>,
        /// Drain automatically instead of advancing after each release
        #[arg(long)]
        auto: bool,
        /// Override the configured default delay
        #[arg(long)]
        default_delay_ms: Option<u64>,
        /// Print the event stream as JSON lines instead of a release table
        #[arg(long)]
        json: bool,
    },
    /// Print the effective queue configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Run {
            delays,
            auto,
            default_delay_ms,
            json,
        } => {
            let _guard = init_telemetry(TelemetryConfig {
                endpoint: config.otel_endpoint.clone(),
                service_name: "delayq".to_string(),
                log_level: config.log_level.clone(),
            })?;

            let mut queue_config = config.queue;
            if auto {
                queue_config = queue_config.auto_advance(true);
            }
            if let Some(ms) = default_delay_ms {
                queue_config.default_delay_ms = ms;
            }
            cmd_run(queue_config, &delays, json).await
        }
        Command::Config => {
            print!("{}", config.queue.to_toml_string()?);
            Ok(())
        }
    }
}

async fn cmd_run(queue_config: QueueConfig, delays: &[String], json: bool) -> anyhow::Result<()> {
    let delays = delays
        .iter()
        .map(|raw| parse_delay(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let queue = DelayedQueue::new(queue_config)?;
    let auto = queue.config().auto_advance;

    let printer = json.then(|| tokio::spawn(print_events(queue.subscribe())));

    let completions: Vec<Completion> = delays.into_iter().map(|d| queue.enqueue(d)).collect();
    info!(queue = %queue.id(), slots = completions.len(), auto, "slots enqueued");

    let start = Instant::now();
    if !auto {
        queue.advance();
    }

    if !json {
        println!("{:<6}  {:>10}", "SLOT", "RELEASED");
        println!("{}", "-".repeat(18));
    }

    for completion in completions {
        let slot = completion.slot();
        completion.await?;
        if !json {
            println!("{:<6}  {:>8}ms", slot.to_string(), start.elapsed().as_millis());
        }
        if !auto {
            queue.advance();
        }
    }

    // The event channel closes once the last queue handle is gone.
    drop(queue);
    if let Some(printer) = printer {
        printer.await??;
    }
    Ok(())
}

/// `-` means the queue's default delay.
fn parse_delay(raw: &str) -> anyhow::Result<Option<Duration>> {
    if raw == "-" {
        return Ok(None);
    }
    let ms: i64 = raw
        .parse()
        .with_context(|| format!("invalid delay '{raw}': expected milliseconds or '-'"))?;
    let ms = u64::try_from(ms).map_err(|_| Error::InvalidDelay(ms))?;
    Ok(Some(Duration::from_millis(ms)))
}

async fn print_events(mut events: broadcast::Receiver<QueueEvent>) -> anyhow::Result<()> {
    loop {
        match events.recv().await {
            Ok(event) => println!("{}", serde_json::to_string(&event)?),
            Err(RecvError::Lagged(missed)) => warn!(missed, "event printer lagged"),
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}
