//! Offline duplicate-lead reconciliation: scan the whole lead module, group
//! by normalized phone, report, and optionally merge each duplicate set into
//! its oldest lead.

use crate::errors::SyncError;
use crate::models::LeadRecord;
use crate::phone;
use crate::zoho::ZohoClient;
use anyhow::Context;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const MERGE_NOTE_TITLE: &str = "Duplicate Lead Merge";
const NOTE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Counters for one reconciler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub total_leads: u32,
    /// Leads with no phone, or a phone that does not normalize.
    pub leads_without_phone: u32,
    pub duplicate_sets: u32,
    pub duplicate_leads: u32,
    pub merged_sets: u32,
    pub deleted_leads: u32,
    pub skipped_sets: u32,
}

pub struct DuplicateLeadReconciler {
    zoho: ZohoClient,
    dry_run: bool,
    merge: bool,
    limit: Option<usize>,
    output_dir: PathBuf,
}

impl DuplicateLeadReconciler {
    pub fn new(
        zoho: ZohoClient,
        dry_run: bool,
        merge: bool,
        limit: Option<usize>,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            zoho,
            dry_run,
            merge,
            limit,
            output_dir,
        }
    }

    pub async fn run(&self) -> anyhow::Result<ReconcileStats> {
        let mut stats = ReconcileStats::default();

        tracing::info!("Step 1: Scanning all leads");
        let leads = self.zoho.list_all_leads().await?;
        stats.total_leads = leads.len() as u32;

        let groups = group_by_normalized_phone(leads, &mut stats);
        let duplicate_sets: Vec<(&String, &Vec<LeadRecord>)> =
            groups.iter().filter(|(_, leads)| leads.len() >= 2).collect();
        stats.duplicate_sets = duplicate_sets.len() as u32;
        stats.duplicate_leads = duplicate_sets
            .iter()
            .map(|(_, leads)| leads.len() as u32)
            .sum();

        tracing::info!(
            "Step 2: Found {} duplicate set(s) covering {} lead(s)",
            stats.duplicate_sets,
            stats.duplicate_leads
        );

        let (csv_path, json_path) = self.write_reports(&duplicate_sets)?;
        tracing::info!("Reports written: {} and {}", csv_path.display(), json_path.display());

        if self.merge {
            let limit = self.limit.unwrap_or(duplicate_sets.len());
            tracing::info!(
                "Step 3: Merging up to {} of {} duplicate set(s)",
                limit,
                duplicate_sets.len()
            );
            for (normalized, leads) in duplicate_sets.iter().take(limit) {
                match self.merge_set(normalized, leads, &mut stats).await {
                    Ok(()) => {}
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => {
                        tracing::error!("Skipping duplicate set {}: {}", normalized, e);
                        stats.skipped_sets += 1;
                    }
                }
            }
        }

        self.log_summary(&stats);
        Ok(stats)
    }

    /// Merge one duplicate set into its oldest lead.
    ///
    /// The consolidated note on the master must be confirmed before any
    /// delete goes out; if the note fails, the whole set stays untouched.
    async fn merge_set(
        &self,
        normalized: &str,
        leads: &[LeadRecord],
        stats: &mut ReconcileStats,
    ) -> Result<(), SyncError> {
        let Some(master) = choose_master(leads) else {
            tracing::warn!(
                "No lead in set {} has a creation time, cannot pick a master",
                normalized
            );
            stats.skipped_sets += 1;
            return Ok(());
        };
        let duplicates: Vec<&LeadRecord> =
            leads.iter().filter(|lead| lead.id != master.id).collect();

        tracing::info!(
            "Merging {} duplicate(s) of {} into lead {} (created {})",
            duplicates.len(),
            normalized,
            master.id,
            master
                .created_time
                .map(|t| t.format(NOTE_TIME_FORMAT).to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        if self.dry_run {
            tracing::info!(
                "[DRY RUN] Would note lead {} and delete {} duplicate(s)",
                master.id,
                duplicates.len()
            );
            stats.merged_sets += 1;
            return Ok(());
        }

        let note = merge_note(normalized, &duplicates);
        self.zoho
            .add_note(&master.id, MERGE_NOTE_TITLE, &note)
            .await?;

        for duplicate in &duplicates {
            match self.zoho.delete_lead(&duplicate.id).await {
                Ok(()) => stats.deleted_leads += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!("Failed to delete duplicate lead {}: {}", duplicate.id, e);
                }
            }
        }

        stats.merged_sets += 1;
        Ok(())
    }

    fn write_reports(
        &self,
        duplicate_sets: &[(&String, &Vec<LeadRecord>)],
    ) -> anyhow::Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "Failed to create report directory {}",
                self.output_dir.display()
            )
        })?;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let csv_path = self.output_dir.join(format!("duplicate_leads_{}.csv", stamp));
        let json_path = self.output_dir.join(format!("duplicate_leads_{}.json", stamp));

        write_csv_report(&csv_path, duplicate_sets)?;
        write_json_report(&json_path, duplicate_sets)?;

        Ok((csv_path, json_path))
    }

    fn log_summary(&self, stats: &ReconcileStats) {
        let mode = if self.dry_run { "DRY RUN" } else { "PRODUCTION" };
        tracing::info!("Duplicate Lead Summary ({}):", mode);
        tracing::info!("  Total leads scanned: {}", stats.total_leads);
        tracing::info!(
            "  Leads without a usable phone: {}",
            stats.leads_without_phone
        );
        tracing::info!("  Duplicate sets found: {}", stats.duplicate_sets);
        tracing::info!("  Leads in duplicate sets: {}", stats.duplicate_leads);
        if self.merge {
            tracing::info!("  Sets merged: {}", stats.merged_sets);
            tracing::info!("  Duplicates deleted: {}", stats.deleted_leads);
            tracing::info!("  Sets skipped: {}", stats.skipped_sets);
        }
    }
}

fn group_by_normalized_phone(
    leads: Vec<LeadRecord>,
    stats: &mut ReconcileStats,
) -> BTreeMap<String, Vec<LeadRecord>> {
    let mut groups: BTreeMap<String, Vec<LeadRecord>> = BTreeMap::new();
    for lead in leads {
        let Some(raw_phone) = lead.phone.as_deref() else {
            tracing::debug!("Lead {} has no phone on file", lead.id);
            stats.leads_without_phone += 1;
            continue;
        };
        match phone::normalize(raw_phone) {
            Some(normalized) => groups.entry(normalized).or_default().push(lead),
            None => {
                tracing::debug!("Lead {} has un-normalizable phone '{}'", lead.id, raw_phone);
                stats.leads_without_phone += 1;
            }
        }
    }
    groups
}

/// The oldest lead by creation time; a lead with no creation time can never
/// be the master.
fn choose_master(leads: &[LeadRecord]) -> Option<&LeadRecord> {
    leads
        .iter()
        .filter(|lead| lead.created_time.is_some())
        .min_by_key(|lead| lead.created_time)
}

fn merge_note(normalized: &str, duplicates: &[&LeadRecord]) -> String {
    let mut note = format!(
        "Merged {} duplicate lead(s) for phone {} into this lead:\n",
        duplicates.len(),
        normalized
    );
    for duplicate in duplicates {
        let name = format!(
            "{} {}",
            duplicate.first_name.as_deref().unwrap_or(""),
            duplicate.last_name.as_deref().unwrap_or("")
        );
        let owner = duplicate
            .owner
            .as_ref()
            .map(|o| o.name.clone().unwrap_or_else(|| o.id.clone()))
            .unwrap_or_else(|| "unknown".to_string());
        note.push_str(&format!(
            "- Lead {} ({}), phone: {}, status: {}, owner: {}, created: {}\n",
            duplicate.id,
            name.trim(),
            duplicate.phone.as_deref().unwrap_or(""),
            duplicate.status.as_deref().unwrap_or(""),
            owner,
            duplicate
                .created_time
                .map(|t| t.format(NOTE_TIME_FORMAT).to_string())
                .unwrap_or_else(|| "unknown".to_string())
        ));
    }
    note
}

fn write_csv_report(
    path: &Path,
    duplicate_sets: &[(&String, &Vec<LeadRecord>)],
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV report {}", path.display()))?;
    writer.write_record([
        "normalized_phone",
        "lead_id",
        "first_name",
        "last_name",
        "original_phone",
        "status",
        "created_time",
        "owner",
    ])?;

    for (normalized, leads) in duplicate_sets {
        for lead in leads.iter() {
            let created = lead
                .created_time
                .map(|t| t.format(NOTE_TIME_FORMAT).to_string())
                .unwrap_or_default();
            writer.write_record([
                normalized.as_str(),
                lead.id.as_str(),
                lead.first_name.as_deref().unwrap_or(""),
                lead.last_name.as_deref().unwrap_or(""),
                lead.phone.as_deref().unwrap_or(""),
                lead.status.as_deref().unwrap_or(""),
                created.as_str(),
                lead.owner
                    .as_ref()
                    .map(|o| o.name.as_deref().unwrap_or(o.id.as_str()))
                    .unwrap_or(""),
            ])?;
        }
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write CSV report {}", path.display()))?;
    Ok(())
}

fn write_json_report(
    path: &Path,
    duplicate_sets: &[(&String, &Vec<LeadRecord>)],
) -> anyhow::Result<()> {
    let by_phone: BTreeMap<&str, &Vec<LeadRecord>> = duplicate_sets
        .iter()
        .map(|(normalized, leads)| (normalized.as_str(), *leads))
        .collect();
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create JSON report {}", path.display()))?;
    serde_json::to_writer_pretty(file, &by_phone)
        .with_context(|| format!("Failed to write JSON report {}", path.display()))?;
    Ok(())
}
