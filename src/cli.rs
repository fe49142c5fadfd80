//! CLI argument parsing for the call sync binary.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rc-zoho-sync", about = "Sync RingCentral call logs into Zoho CRM leads")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Process accepted inbound calls (creates/updates leads, attaches recordings)
    Accepted(RunArgs),
    /// Process missed inbound calls (creates/updates leads, no recordings)
    Missed(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Window start, ISO 8601 (e.g. 2025-06-01T00:00:00 or 2025-06-01)
    #[arg(long, requires = "end_date", conflicts_with = "hours_back")]
    pub start_date: Option<String>,
    /// Window end, ISO 8601
    #[arg(long, requires = "start_date", conflicts_with = "hours_back")]
    pub end_date: Option<String>,
    /// Look back this many hours from now (default 24)
    #[arg(long)]
    pub hours_back: Option<i64>,
    /// Log intended writes without calling any mutating endpoint
    #[arg(long)]
    pub dry_run: bool,
    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
    /// JSON file listing the RingCentral extensions to poll
    #[arg(long, default_value = "extensions.json")]
    pub extensions_file: PathBuf,
    /// JSON file listing the lead owner rotation
    #[arg(long, default_value = "lead_owners.json")]
    pub lead_owners_file: PathBuf,
}

impl RunArgs {
    /// Resolve the polling window against the current time.
    pub fn window(&self, now: DateTime<Utc>) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
        match (&self.start_date, &self.end_date) {
            (Some(start), Some(end)) => {
                let from = parse_timestamp(start)
                    .ok_or_else(|| anyhow::anyhow!("Invalid --start-date: {}", start))?;
                let to = parse_timestamp(end)
                    .ok_or_else(|| anyhow::anyhow!("Invalid --end-date: {}", end))?;
                if from >= to {
                    anyhow::bail!("--start-date must be before --end-date");
                }
                Ok((from, to))
            }
            (None, None) => {
                let hours = self.hours_back.unwrap_or(24);
                if hours <= 0 {
                    anyhow::bail!("--hours-back must be a positive number of hours");
                }
                Ok((now - Duration::hours(hours), now))
            }
            // clap's `requires` catches this for real invocations
            _ => anyhow::bail!("--start-date and --end-date must be given together"),
        }
    }
}

/// Parse an ISO 8601 timestamp, tolerating a space separator and bare dates.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
}
