use chrono::{Duration, Utc};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rc_zoho_sync::cli::{Cli, Command};
use rc_zoho_sync::config::{self, Config};
use rc_zoho_sync::pipeline::{CallPipeline, PipelineKind};
use rc_zoho_sync::ringcentral::RingCentralClient;
use rc_zoho_sync::zoho::ZohoClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (kind, args) = match cli.command {
        Command::Accepted(args) => (PipelineKind::Accepted, args),
        Command::Missed(args) => (PipelineKind::Missed, args),
    };

    // Initialize tracing
    let default_filter = if args.debug {
        "rc_zoho_sync=debug"
    } else {
        "rc_zoho_sync=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let extensions = config::load_extensions(&args.extensions_file)?;
    let owners = config::load_lead_owners(&args.lead_owners_file)?;
    let extension_count = extensions.len();

    let (from, to) = args.window(Utc::now())?;
    tracing::info!(
        "Starting {} call processing for {} to {}{}",
        kind,
        from.format("%Y-%m-%d %H:%M:%S"),
        to.format("%Y-%m-%d %H:%M:%S"),
        if args.dry_run { " (dry run)" } else { "" }
    );

    let ringcentral = RingCentralClient::new(&config)?;
    let zoho = ZohoClient::new(&config)?;
    let mut pipeline = CallPipeline::new(
        kind,
        ringcentral,
        zoho,
        extensions,
        owners,
        Duration::minutes(config.cooldown_minutes),
        args.dry_run,
    );

    let stats = pipeline.run(from, to).await?;

    let mode = if args.dry_run { "DRY RUN" } else { "PRODUCTION" };
    tracing::info!("FINAL SUMMARY ({}):", mode);
    tracing::info!(
        "  Date range: {} to {}",
        from.format("%Y-%m-%d %H:%M:%S"),
        to.format("%Y-%m-%d %H:%M:%S")
    );
    tracing::info!("  Extensions polled: {}", extension_count);
    tracing::info!("  Total calls: {}", stats.total_calls);
    tracing::info!("  Qualified calls: {}", stats.qualified_calls);
    tracing::info!("  Processed calls: {}", stats.processed_calls);
    tracing::info!("  Existing leads updated: {}", stats.existing_leads);
    tracing::info!("  New leads created: {}", stats.new_leads);
    tracing::info!("  Calls skipped: {}", stats.skipped_calls);
    if kind == PipelineKind::Accepted {
        tracing::info!("  Recordings attached: {}", stats.recordings_attached);
        tracing::info!("  Recording failures: {}", stats.recording_failures);
    }

    Ok(())
}
