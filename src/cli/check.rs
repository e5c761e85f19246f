use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use type_gate::{Gate, GateOptions};
use typegate_policy_center::{PolicyStore, StoreOptions};

use super::context::CliContext;
use super::output::{print_records, CheckRecord, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    /// Policy file to evaluate against
    #[arg(short, long, value_name = "FILE")]
    pub policy: PathBuf,

    /// Fully-qualified type names; read one per line from stdin when omitted
    pub types: Vec<String>,

    /// Report would-be blocks as warnings while the policy is profiling
    #[arg(long)]
    pub warn_profiling: bool,

    /// Dump Prometheus metrics to stderr when done
    #[arg(long)]
    pub metrics: bool,
}

pub async fn cmd_check(
    args: CheckArgs,
    ctx: &CliContext,
    output: OutputFormat,
) -> Result<ExitCode> {
    let store = PolicyStore::new(StoreOptions::manual());
    let mut options = GateOptions::default();
    if args.warn_profiling || ctx.config().warn_when_profiling {
        options = options.warn_when_profiling();
    }
    let gate = Gate::new(&store, args.policy.as_path())
        .with_context(|| format!("Failed to load policy {}", args.policy.display()))?
        .with_options(options);

    let names = if args.types.is_empty() {
        read_names().await?
    } else {
        args.types.clone()
    };
    debug!(count = names.len(), origin = %gate.origin(), "checking type names");

    let records: Vec<CheckRecord> = names
        .iter()
        .map(|name| CheckRecord::new(name, &gate.check(name)))
        .collect();
    print_records(&output, &records)?;

    if args.metrics {
        eprint!("{}", gather_metrics()?);
    }

    let blocked = records.iter().any(|record| record.decision == "block");
    Ok(if blocked {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

/// One name per line; blank lines and `#` comments are skipped
async fn read_names() -> Result<Vec<String>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut names = Vec::new();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        names.push(line.to_string());
    }
    Ok(names)
}

fn gather_metrics() -> Result<String> {
    let registry = Registry::new();
    typegate_policy_center::metrics::register_metrics(&registry);
    type_gate::metrics::register_metrics(&registry);

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
