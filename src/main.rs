use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::signal;
use tracing::{info, warn};

use gatekeeper::admission::{
    sweeper, AdmissionBackend, ClockSource, EndpointPolicyRouter, ManualClock, MonotonicClock,
};
use gatekeeper::config::{GatekeeperConfig, LogFormat};
use gatekeeper::{replay, telemetry};

/// Per-endpoint admission control with sliding windows and progressive blocking.
#[derive(Parser, Debug)]
#[command(name = "gatekeeper", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    /// Log level filter, e.g. `debug` or `gatekeeper=trace`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and print the routing table
    Policies,
    /// Replay a JSON-lines request trace and print one decision per request
    Replay {
        /// Trace file, or `-` for stdin
        trace: PathBuf,
    },
    /// Admit `<endpoint> <identity>` lines from stdin in real time
    Gate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = GatekeeperConfig::load(cli.config.as_deref())?;
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    telemetry::init(&config.logging);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Gatekeeper");

    let router = Arc::new(EndpointPolicyRouter::from_config(&config.admission)?);

    match cli.command {
        Command::Policies => print_policies(&router),
        Command::Replay { trace } => replay_trace(&router, &trace)?,
        Command::Gate => gate(router, &config).await?,
    }

    info!("Gatekeeper stopped");
    Ok(())
}

/// Print the routing table to stdout.
fn print_policies(router: &EndpointPolicyRouter) {
    println!(
        "{:<20} {:>8} {:>8} {:>10} {:>10}  {}",
        "ENDPOINT", "MAX", "WINDOW", "BASE_BLOCK", "MAX_BLOCK", "ESCALATION"
    );

    let fallback = router.fallback();
    let rows = router
        .endpoints()
        .map(|endpoint| router.route(endpoint))
        .chain(std::iter::once(fallback));

    for controller in rows {
        match controller.policy() {
            Some(policy) => println!(
                "{:<20} {:>8} {:>7}s {:>9}s {:>9}s  {}",
                controller.endpoint(),
                policy.max_requests,
                policy.window_secs,
                policy.base_block_secs,
                policy.max_block_secs,
                format!("{:?}", policy.escalation).to_lowercase()
            ),
            None => println!("{:<20} {:>8}", controller.endpoint(), "unlimited"),
        }
    }
}

/// Replay a trace file (or stdin) against a manual clock.
fn replay_trace(router: &EndpointPolicyRouter, trace: &Path) -> anyhow::Result<()> {
    let clock = ManualClock::new();
    let stdout = io::stdout().lock();

    let summary = if trace == Path::new("-") {
        replay::replay(router, &clock, io::stdin().lock(), stdout)?
    } else {
        let file = File::open(trace)?;
        replay::replay(router, &clock, BufReader::new(file), stdout)?
    };

    info!(
        admitted = summary.admitted,
        denied = summary.denied,
        "Trace replayed"
    );
    Ok(())
}

/// Admit requests read from stdin until EOF or a shutdown signal.
async fn gate(router: Arc<EndpointPolicyRouter>, config: &GatekeeperConfig) -> anyhow::Result<()> {
    let clock: Arc<dyn ClockSource> = Arc::new(MonotonicClock);
    let sweeper = sweeper::spawn(
        router.clone(),
        clock.clone(),
        config.admission.sweep_interval(),
    );
    let backend: Arc<dyn AdmissionBackend> = router;

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let mut terminate = Terminate::install()?;

    info!("Reading '<endpoint> <identity>' lines from stdin");

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Interrupted, closing gate");
                break;
            }
            _ = terminate.recv() => {
                info!("Terminated, closing gate");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed");
                    break;
                };

                let mut parts = line.split_whitespace();
                let (Some(endpoint), Some(identity)) = (parts.next(), parts.next()) else {
                    if !line.trim().is_empty() {
                        warn!(line = %line, "Expected '<endpoint> <identity>'");
                    }
                    continue;
                };

                let decision = backend.admit(endpoint, identity, clock.now());
                let reply = if !decision.allowed {
                    format!("DENY retry_after={}s\n", decision.retry_after_secs().unwrap_or(1))
                } else if decision.limit == u32::MAX {
                    "ALLOW remaining=unlimited\n".to_string()
                } else {
                    format!("ALLOW remaining={}\n", decision.remaining)
                };

                stdout.write_all(reply.as_bytes()).await?;
                stdout.flush().await?;
            }
        }
    }

    sweeper.shutdown().await;
    Ok(())
}

/// SIGTERM listener; never fires off Unix.
#[cfg(unix)]
struct Terminate(signal::unix::Signal);

#[cfg(unix)]
impl Terminate {
    fn install() -> io::Result<Self> {
        signal::unix::signal(signal::unix::SignalKind::terminate()).map(Self)
    }

    async fn recv(&mut self) {
        self.0.recv().await;
    }
}

#[cfg(not(unix))]
struct Terminate;

#[cfg(not(unix))]
impl Terminate {
    fn install() -> io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await
    }
}
