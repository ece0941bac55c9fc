// cli.rs - CLI argument parsing and main orchestration

use crate::config::{resolve_config, ElevateConfig, ResolvedConfig};
use crate::layout::{Identity, Sysroot};
use crate::patch::service::JS_LAUNCHER_NAME;
use crate::reconcile::{reconcile_all, ReconcileContext, RunSummary};
use crate::rescan::{trigger_rescan, CommandRescanner, RescanOutcome, Rescanner};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "elevate-service",
    about = "Patch service bus configuration so a service runs elevated, then rescan services."
)]
pub struct Cli {
    /// Service identifier to elevate
    pub service: Option<String>,

    /// App identifier (defaults to the service id without its last segment)
    pub app: Option<String>,

    /// Load settings from this JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Treat this directory as the filesystem root
    #[arg(long)]
    pub sysroot: Option<PathBuf>,

    /// Directory containing run-js-service (defaults to the executable's directory)
    #[arg(long = "runtime-dir")]
    pub runtime_dir: Option<PathBuf>,

    /// Command used to rescan services
    #[arg(long = "rescan-command")]
    pub rescan_command: Option<String>,

    /// Seconds to wait for the rescan before giving up
    #[arg(long = "rescan-timeout", value_name = "SECS")]
    pub rescan_timeout: Option<u64>,

    /// Names that must be allowed for the service (comma or repeat)
    #[arg(long = "required-name", value_delimiter = ',')]
    pub required_names: Vec<String>,

    /// Show what would be done without making any changes
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Log file diffs and other debug detail
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// The command-line layer of the config stack.
    fn config_layer(&self) -> ElevateConfig {
        ElevateConfig {
            sysroot: self.sysroot.clone(),
            runtime_dir: self.runtime_dir.clone(),
            rescan_command: self.rescan_command.clone(),
            rescan_timeout_secs: self.rescan_timeout,
            required_names: if self.required_names.is_empty() {
                None
            } else {
                Some(self.required_names.clone())
            },
        }
    }
}

/// Everything needed for one run, after argument and config resolution.
pub struct RunOptions {
    pub identity: Identity,
    pub config: ResolvedConfig,
    pub dry_run: bool,
}

fn log_summary(identity: &Identity, summary: &RunSummary, dry_run: bool) {
    if summary.layouts.is_empty() {
        info!("No service files found for {}", identity.service);
    } else {
        info!("Processed layouts: {}", summary.layouts.join(", "));
    }
    let verb = if dry_run { "Would update" } else { "Updated" };
    for path in &summary.updated {
        info!("{}: {}", verb, path.display());
    }
    let verb = if dry_run { "Would create" } else { "Created" };
    for path in &summary.created {
        info!("{}: {}", verb, path.display());
    }
    for (path, reason) in &summary.failed {
        warn!("Not patched: {} ({})", path.display(), reason);
    }
}

/// Execute one reconciliation pass and the conditional rescan.
///
/// Returns the process exit code: 0 on success, 1 if the rescan failed.
pub fn execute(opts: &RunOptions, rescanner: &dyn Rescanner) -> Result<i32> {
    let launcher = opts.config.runtime_dir.join(JS_LAUNCHER_NAME);
    let sysroot = Sysroot::new(&opts.config.sysroot);

    if opts.dry_run {
        info!("=== DRY RUN (no changes will be made) ===");
    }

    let ctx = ReconcileContext {
        identity: &opts.identity,
        sysroot: &sysroot,
        launcher: &launcher,
        required_names: &opts.config.required_names,
        dry_run: opts.dry_run,
    };
    let summary = reconcile_all(&ctx)?;
    log_summary(&opts.identity, &summary, opts.dry_run);

    if opts.dry_run {
        if summary.changed() {
            info!("> Would refresh services");
        }
        return Ok(0);
    }

    match trigger_rescan(rescanner, summary.changed(), opts.config.rescan_timeout) {
        Ok(RescanOutcome::Skipped) => Ok(0),
        Ok(RescanOutcome::Completed(output)) => {
            debug!(
                "rescan finished ({} bytes stdout, {} bytes stderr)",
                output.stdout.len(),
                output.stderr.len()
            );
            Ok(0)
        }
        Err(e) => {
            error!("Service rescan failed: {}", e);
            Ok(1)
        }
    }
}

pub fn run(args: Cli) -> Result<i32> {
    let exe = std::env::current_exe().context("Could not locate the running executable")?;
    let exe_dir = exe
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = resolve_config(&exe_dir, args.config.as_deref(), args.config_layer())?;
    let identity = Identity::resolve(args.service.as_deref(), args.app.as_deref());
    info!("Elevating {} (app {})", identity.service, identity.app);

    let rescanner = CommandRescanner::ls_control(&config.rescan_command);
    let opts = RunOptions {
        identity,
        config,
        dry_run: args.dry_run,
    };
    execute(&opts, &rescanner)
}
