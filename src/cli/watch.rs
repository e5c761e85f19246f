use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use type_gate::{
    BusDiagnostics, CompositeDiagnostics, Gate, GateDiagnostics, GateEvent, GateOptions,
    TracingDiagnostics,
};
use typegate_event_bus::{to_mpsc, EventBus, InMemoryBus};
use typegate_policy_center::{PolicyStore, StoreOptions};

use super::config::parse_interval;
use super::context::CliContext;
use super::output::{print_records, CheckRecord, OutputFormat};

const EVENT_CAPACITY: usize = 256;

#[derive(Args, Clone, Debug)]
pub struct WatchArgs {
    /// Policy file to keep loaded
    #[arg(short, long, value_name = "FILE")]
    pub policy: PathBuf,

    /// Reload interval, e.g. "2s" (defaults to the configured interval)
    #[arg(long)]
    pub interval: Option<String>,

    /// Print every gate event as it is emitted
    #[arg(long)]
    pub events: bool,

    /// Report would-be blocks as warnings while the policy is profiling
    #[arg(long)]
    pub warn_profiling: bool,
}

/// Check type names read from stdin against a hot-reloaded policy
///
/// Runs until stdin closes or ctrl-c is received.
pub async fn cmd_watch(
    args: WatchArgs,
    ctx: &CliContext,
    output: OutputFormat,
) -> Result<ExitCode> {
    let interval = match &args.interval {
        Some(raw) => parse_interval(raw).context("Invalid --interval")?,
        None => ctx.config().reload_interval()?,
    };
    let store = PolicyStore::new(StoreOptions::default().with_reload_interval(interval));

    let mut diagnostics = CompositeDiagnostics::new(vec![Arc::new(TracingDiagnostics)]);
    let printer = if args.events {
        let bus = InMemoryBus::<GateEvent>::new(EVENT_CAPACITY);
        let publisher: Arc<dyn EventBus<GateEvent>> = bus.clone();
        diagnostics.push(Arc::new(BusDiagnostics::new(publisher)));
        Some(spawn_event_printer(bus, output.clone()))
    } else {
        None
    };
    let diagnostics: Arc<dyn GateDiagnostics> = Arc::new(diagnostics);

    let mut options = GateOptions::default();
    if args.warn_profiling || ctx.config().warn_when_profiling {
        options = options.warn_when_profiling();
    }
    let gate = Gate::with_diagnostics(&store, args.policy.as_path(), diagnostics)
        .with_context(|| format!("Failed to load policy {}", args.policy.display()))?
        .with_options(options);

    info!(
        origin = %gate.origin(),
        interval = %humantime::format_duration(interval),
        "watching policy"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let name = line.trim();
                if name.is_empty() || name.starts_with('#') {
                    continue;
                }
                let record = CheckRecord::new(name, &gate.check(name));
                print_records(&output, std::slice::from_ref(&record))?;
            }
        }
    }

    if let Some(last_error) = gate.handle().last_error() {
        warn!(%last_error, "policy was serving last-known-good version at exit");
    }
    store.shutdown();
    if let Some(printer) = printer {
        printer.abort();
    }
    Ok(ExitCode::SUCCESS)
}

fn spawn_event_printer(bus: Arc<InMemoryBus<GateEvent>>, output: OutputFormat) -> JoinHandle<()> {
    let mut rx = to_mpsc(bus, EVENT_CAPACITY);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let line = match output {
                OutputFormat::Human => format!(
                    "event [{:?}] v{} {}",
                    event.level,
                    event.policy_version,
                    event.message()
                ),
                _ => match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(err) => {
                        warn!(%err, "failed to encode gate event");
                        continue;
                    }
                },
            };
            eprintln!("{line}");
        }
    })
}
