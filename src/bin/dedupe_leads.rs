//! Script to find and merge duplicate Zoho leads by normalized phone number.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rc_zoho_sync::config::Config;
use rc_zoho_sync::reconciler::DuplicateLeadReconciler;
use rc_zoho_sync::zoho::ZohoClient;

#[derive(Parser)]
#[command(
    name = "dedupe-leads",
    about = "Scan Zoho leads for duplicates by phone number, report, and optionally merge"
)]
struct Args {
    /// Log intended writes without calling any mutating endpoint
    #[arg(long)]
    dry_run: bool,
    /// Merge each duplicate set into its oldest lead (otherwise report only)
    #[arg(long)]
    merge: bool,
    /// Merge at most this many duplicate sets
    #[arg(long)]
    limit: Option<usize>,
    /// Directory for the CSV/JSON reports
    #[arg(long, default_value = "reports")]
    output_dir: PathBuf,
    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

/// Main entry point for the dedupe script.
///
/// Scans every lead in the CRM, groups them by normalized phone number, writes
/// the duplicate reports, and merges duplicate sets when `--merge` is given.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let default_filter = if args.debug {
        "rc_zoho_sync=debug,dedupe_leads=debug"
    } else {
        "rc_zoho_sync=info,dedupe_leads=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let zoho = ZohoClient::new(&config)?;

    tracing::info!(
        "Starting duplicate lead scan{}{}",
        if args.merge { " with merge" } else { "" },
        if args.dry_run { " (dry run)" } else { "" }
    );

    let reconciler = DuplicateLeadReconciler::new(
        zoho,
        args.dry_run,
        args.merge,
        args.limit,
        args.output_dir,
    );
    let stats = reconciler.run().await?;

    tracing::info!(
        "Done: {} duplicate set(s) across {} lead(s), {} set(s) merged, {} lead(s) deleted",
        stats.duplicate_sets,
        stats.duplicate_leads,
        stats.merged_sets,
        stats.deleted_leads
    );

    Ok(())
}
