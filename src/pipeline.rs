//! Call processing pipeline shared by the accepted- and missed-calls jobs.
//!
//! Per call: validate → qualify → extension filter → cooldown → lead
//! search/create/update → recording attachment → statistics. Calls run
//! sequentially in chronological order; per-call failures are counted and the
//! batch moves on.

use crate::dedup::{DedupGuard, Reservation};
use crate::errors::{ResultExt, SyncError};
use crate::models::{
    CallDirection, CallRecord, Extension, LeadOwner, LeadOwnerRef, LeadRecord, NewLead,
    ProcessingStats,
};
use crate::phone;
use crate::qualifier::{self, Qualification};
use crate::ringcentral::RingCentralClient;
use crate::zoho::ZohoClient;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;

const NOTE_TITLE: &str = "Call Information";
const NOTE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which call sense this job processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    Accepted,
    Missed,
}

impl PipelineKind {
    pub fn lead_status(&self) -> &'static str {
        match self {
            PipelineKind::Accepted => "Accepted Call",
            PipelineKind::Missed => "Missed Call",
        }
    }

    fn phrase(&self) -> &'static str {
        match self {
            PipelineKind::Accepted => "Accepted call",
            PipelineKind::Missed => "Missed call",
        }
    }

    fn phrase_lowercase(&self) -> &'static str {
        match self {
            PipelineKind::Accepted => "accepted call",
            PipelineKind::Missed => "missed call",
        }
    }

    fn qualifies(&self, call: &CallRecord) -> bool {
        match self {
            PipelineKind::Accepted => qualifier::qualify(call) == Qualification::Accepted,
            PipelineKind::Missed => qualifier::is_missed(call),
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::Accepted => write!(f, "accepted"),
            PipelineKind::Missed => write!(f, "missed"),
        }
    }
}

/// Round-robin owner assignment over the configured list.
///
/// The counter advances only when an owner is actually handed out, i.e. only
/// for creates; existing-lead updates never consume a slot.
struct OwnerRotation {
    owners: Vec<LeadOwner>,
    counter: usize,
}

impl OwnerRotation {
    fn new(owners: Vec<LeadOwner>) -> Self {
        Self { owners, counter: 0 }
    }

    fn next_owner(&mut self) -> LeadOwner {
        let owner = self.owners[self.counter % self.owners.len()].clone();
        self.counter += 1;
        owner
    }
}

pub struct CallPipeline {
    kind: PipelineKind,
    ringcentral: RingCentralClient,
    zoho: ZohoClient,
    extensions: Vec<Extension>,
    owners: OwnerRotation,
    dedup: DedupGuard,
    dry_run: bool,
}

impl CallPipeline {
    pub fn new(
        kind: PipelineKind,
        ringcentral: RingCentralClient,
        zoho: ZohoClient,
        extensions: Vec<Extension>,
        owners: Vec<LeadOwner>,
        cooldown: Duration,
        dry_run: bool,
    ) -> Self {
        Self {
            kind,
            ringcentral,
            zoho,
            extensions,
            owners: OwnerRotation::new(owners),
            dedup: DedupGuard::new(cooldown),
            dry_run,
        }
    }

    /// Process every qualifying call in the window and return the run's
    /// statistics. Only fatal configuration/auth errors abort; everything
    /// else is counted and skipped.
    pub async fn run(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ProcessingStats, SyncError> {
        let mut stats = ProcessingStats::default();

        tracing::info!(
            "Step 1: Fetching call logs for {} extension(s)",
            self.extensions.len()
        );
        let mut calls = Vec::new();
        for extension in &self.extensions {
            match self.ringcentral.fetch_calls(&extension.id, from, to).await {
                Ok(batch) => calls.extend(batch),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!(
                        "Failed to fetch call log for extension {} ({}): {}",
                        extension.id,
                        extension.name,
                        e
                    );
                }
            }
        }

        // Chronological order, so the latest interaction writes the final
        // status and earlier near-duplicates land in the cooldown
        calls.sort_by_key(|call| call.start_time);
        stats.total_calls = calls.len() as u32;

        let extension_names: HashMap<String, String> = self
            .extensions
            .iter()
            .map(|e| (e.id.clone(), e.name.clone()))
            .collect();

        tracing::info!("Step 2: Processing {} call(s)", calls.len());
        for call in &calls {
            match self.process_call(call, &extension_names, &mut stats).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!("Failed to process call {}: {}", call.id, e);
                    stats.skipped_calls += 1;
                }
            }
        }

        self.log_summary(&stats);
        Ok(stats)
    }

    async fn process_call(
        &mut self,
        call: &CallRecord,
        extension_names: &HashMap<String, String>,
        stats: &mut ProcessingStats,
    ) -> Result<(), SyncError> {
        if call.direction != CallDirection::Inbound {
            tracing::warn!("Skipping call {}: not an inbound call", call.id);
            stats.skipped_calls += 1;
            return Ok(());
        }
        let Some(raw_number) = call.from_number.as_deref() else {
            tracing::warn!("Skipping call {}: caller number withheld", call.id);
            stats.skipped_calls += 1;
            return Ok(());
        };
        let Some(normalized) = phone::normalize(raw_number) else {
            tracing::warn!(
                "Skipping call {}: cannot normalize caller number '{}'",
                call.id,
                raw_number
            );
            stats.skipped_calls += 1;
            return Ok(());
        };

        if !self.kind.qualifies(call) {
            tracing::debug!(
                "Skipping call {}: does not qualify as an {} call",
                call.id,
                self.kind
            );
            stats.skipped_calls += 1;
            return Ok(());
        }
        stats.qualified_calls += 1;

        // Calls routed to extensions we do not watch belong to another job
        let extension_name = match call
            .to_extension_id
            .as_deref()
            .and_then(|id| extension_names.get(id))
        {
            Some(name) => name.as_str(),
            None => {
                tracing::info!(
                    "Call {} went to extension {:?}, which is not in the watched list",
                    call.id,
                    call.to_extension_id
                );
                return Ok(());
            }
        };

        let now = Utc::now();
        if self.dedup.reserve(&normalized, now) == Reservation::SuppressDuplicate {
            tracing::info!(
                "Suppressing call {}: number {} was processed within the cooldown window",
                call.id,
                normalized
            );
            stats.skipped_calls += 1;
            return Ok(());
        }

        let variants = phone::search_variants(&normalized);
        let matches = self.zoho.find_leads_by_phone(&variants).await?;
        let lead_id = if let Some(lead) = matches.first() {
            self.update_existing_lead(lead, call, extension_name).await?;
            stats.existing_leads += 1;
            lead.id.clone()
        } else {
            // One more look right before creating; the sibling job may have
            // written this number since the first search
            let last_check = self.zoho.find_leads_by_phone(&variants).await?;
            if let Some(lead) = last_check.first() {
                tracing::info!(
                    "Lead for {} appeared since the first search, updating it instead",
                    normalized
                );
                self.update_existing_lead(lead, call, extension_name).await?;
                stats.existing_leads += 1;
                lead.id.clone()
            } else {
                let id = self
                    .create_new_lead(call, &normalized, extension_name)
                    .await
                    .context(format!("creating lead for {}", normalized))?;
                stats.new_leads += 1;
                id
            }
        };
        stats.processed_calls += 1;

        if self.kind == PipelineKind::Accepted {
            self.handle_recording(&lead_id, call, stats).await?;
        }

        self.dedup.commit(&normalized, now);
        Ok(())
    }

    async fn update_existing_lead(
        &self,
        lead: &LeadRecord,
        call: &CallRecord,
        extension_name: &str,
    ) -> Result<(), SyncError> {
        let status = self.kind.lead_status();
        if self.dry_run {
            tracing::info!(
                "[DRY RUN] Would update lead {} to '{}' and add a call note",
                lead.id,
                status
            );
            return Ok(());
        }

        self.zoho.update_status(&lead.id, status).await?;
        let note = format!(
            "{} received on {}. Duration: {} seconds. Extension: {}. Call ID: {}.",
            self.kind.phrase(),
            call.start_time.format(NOTE_TIME_FORMAT),
            call.duration_seconds,
            extension_name,
            call.id
        );
        self.zoho.add_note(&lead.id, NOTE_TITLE, &note).await?;
        Ok(())
    }

    async fn create_new_lead(
        &mut self,
        call: &CallRecord,
        normalized: &str,
        extension_name: &str,
    ) -> Result<String, SyncError> {
        let owner = self.owners.next_owner();
        let lead = NewLead {
            phone: normalized.to_string(),
            owner: LeadOwnerRef {
                id: owner.id.clone(),
                name: owner.name.clone(),
            },
            lead_source: extension_name.to_string(),
            lead_status: self.kind.lead_status().to_string(),
            first_name: "Unknown Caller".to_string(),
            last_name: "Unknown Caller".to_string(),
        };

        if self.dry_run {
            tracing::info!(
                "[DRY RUN] Would create a '{}' lead for {} owned by {}",
                lead.lead_status,
                normalized,
                owner.id
            );
            return Ok(format!("dry-run-{}", normalized));
        }

        let lead_id = self.zoho.create_lead(&lead).await?;
        let note = format!(
            "New lead created from {} received on {}. Duration: {} seconds. Extension: {}. Call ID: {}.",
            self.kind.phrase_lowercase(),
            call.start_time.format(NOTE_TIME_FORMAT),
            call.duration_seconds,
            extension_name,
            call.id
        );
        self.zoho.add_note(&lead_id, NOTE_TITLE, &note).await?;
        Ok(lead_id)
    }

    /// Recording phase for the accepted job. Failures here never fail the
    /// call; the lead is already resolved, so problems become notes and
    /// counters. Only fatal auth errors propagate.
    async fn handle_recording(
        &self,
        lead_id: &str,
        call: &CallRecord,
        stats: &mut ProcessingStats,
    ) -> Result<(), SyncError> {
        let Some(recording_ref) = call.recording_ref.as_deref() else {
            let note = format!(
                "No recording was available for call at {}.",
                call.start_time.format(NOTE_TIME_FORMAT)
            );
            self.add_note_best_effort(lead_id, &note).await;
            return Ok(());
        };

        if self.dry_run {
            tracing::info!(
                "[DRY RUN] Would attach recording {} to lead {}",
                recording_ref,
                lead_id
            );
            return Ok(());
        }

        match self.attach_recording(lead_id, recording_ref, call).await {
            Ok(true) => stats.recordings_attached += 1,
            Ok(false) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(SyncError::NotFound(_)) => {
                stats.recording_failures += 1;
                tracing::warn!(
                    "Recording {} for call {} is gone upstream",
                    recording_ref,
                    call.id
                );
                let note = format!(
                    "Recording {} at {} could not be retrieved.",
                    recording_ref,
                    call.start_time.format(NOTE_TIME_FORMAT)
                );
                self.add_note_best_effort(lead_id, &note).await;
            }
            Err(e) => {
                stats.recording_failures += 1;
                tracing::error!(
                    "Failed to attach recording {} to lead {}: {}",
                    recording_ref,
                    lead_id,
                    e
                );
                let note = format!(
                    "Failed to attach recording {} at {}. Error: {}",
                    recording_ref,
                    call.start_time.format(NOTE_TIME_FORMAT),
                    e
                );
                self.add_note_best_effort(lead_id, &note).await;
            }
        }
        Ok(())
    }

    /// Returns Ok(true) when a new file was uploaded, Ok(false) when the
    /// recording was already attached.
    async fn attach_recording(
        &self,
        lead_id: &str,
        recording_ref: &str,
        call: &CallRecord,
    ) -> Result<bool, SyncError> {
        let existing = self.zoho.list_attachments(lead_id).await?;
        let already_attached = existing.iter().any(|a| {
            a.file_name
                .as_deref()
                .map(|name| name.contains(recording_ref))
                .unwrap_or(false)
        });
        if already_attached {
            tracing::info!(
                "Recording {} already attached to lead {}, skipping upload",
                recording_ref,
                lead_id
            );
            return Ok(false);
        }

        let content = self.ringcentral.fetch_recording(recording_ref).await?;
        let filename =
            recording_filename(call.start_time, recording_ref, content.content_type.as_deref());
        self.zoho
            .attach_file(
                lead_id,
                &filename,
                content.bytes,
                content.content_type.as_deref(),
            )
            .await?;
        Ok(true)
    }

    async fn add_note_best_effort(&self, lead_id: &str, note: &str) {
        if self.dry_run {
            tracing::info!("[DRY RUN] Would note lead {}: {}", lead_id, note);
            return;
        }
        if let Err(e) = self.zoho.add_note(lead_id, NOTE_TITLE, note).await {
            tracing::warn!("Could not add note to lead {}: {}", lead_id, e);
        }
    }

    fn log_summary(&self, stats: &ProcessingStats) {
        tracing::info!("Call Processing Summary:");
        tracing::info!("  Total calls found: {}", stats.total_calls);
        tracing::info!("  Calls processed: {}", stats.processed_calls);
        tracing::info!("  Existing leads updated: {}", stats.existing_leads);
        if self.dry_run {
            tracing::info!("  New leads created: 0 (dry run)");
        } else {
            tracing::info!("  New leads created: {}", stats.new_leads);
        }
        tracing::info!("  Calls skipped: {}", stats.skipped_calls);
        if self.kind == PipelineKind::Accepted {
            tracing::info!("  Recordings attached: {}", stats.recordings_attached);
            tracing::info!("  Recording failures: {}", stats.recording_failures);
        }
    }
}

/// Attachment name: call start plus the recording id, so idempotence checks
/// can find it by substring later.
fn recording_filename(
    start_time: DateTime<Utc>,
    recording_ref: &str,
    content_type: Option<&str>,
) -> String {
    format!(
        "{}_recording_{}.{}",
        start_time.format("%Y%m%d_%H%M%S"),
        recording_ref,
        recording_extension(content_type)
    )
}

fn recording_extension(content_type: Option<&str>) -> &str {
    match content_type {
        Some(ct) => {
            let essence = ct.split(';').next().unwrap_or(ct).trim();
            match essence {
                "audio/mpeg" => "mp3",
                "audio/wav" => "wav",
                other => other.split('/').nth(1).filter(|s| !s.is_empty()).unwrap_or("bin"),
            }
        }
        None => "bin",
    }
}
