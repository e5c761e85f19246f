use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use typegate_core_types::OriginId;
use typegate_policy_center::{PolicyStore, PolicySummary, StoreOptions};

use super::context::CliContext;
use super::output::{render, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Policy file to load
    #[arg(value_name = "FILE")]
    pub policy: PathBuf,
}

pub async fn cmd_validate(
    args: ValidateArgs,
    _ctx: &CliContext,
    output: OutputFormat,
) -> Result<ExitCode> {
    let store = PolicyStore::new(StoreOptions::manual());
    let handle = store
        .get(&OriginId::from(args.policy.as_path()))
        .with_context(|| format!("Invalid policy {}", args.policy.display()))?;
    let summary = handle.current().summary();

    println!("{}", render(&output, &summary, human_summary)?.trim_end());
    Ok(ExitCode::SUCCESS)
}

fn human_summary(summary: &PolicySummary) -> String {
    let mode = if summary.profiling {
        "profiling"
    } else {
        "blocking"
    };
    let mut lines = vec![
        format!("Policy: {}", summary.origin),
        format!("Mode: {mode}"),
        format!("Loaded: {}", summary.loaded_at.to_rfc3339()),
        format!("Blacklist ({}):", summary.blacklist.len()),
    ];
    lines.extend(summary.blacklist.iter().map(|p| format!("  - {p}")));
    lines.push(format!("Whitelist ({}):", summary.whitelist.len()));
    lines.extend(summary.whitelist.iter().map(|p| format!("  - {p}")));
    if summary.whitelist.is_empty() && !summary.profiling {
        lines.push("warning: empty whitelist blocks every type".to_string());
    }
    lines.join("\n")
}
