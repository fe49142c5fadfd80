use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a call event. Only inbound calls are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    Inbound,
    Outbound,
}

/// One segment of a call's routing (e.g. a ring to a queue member).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallLeg {
    /// Leg outcome, e.g. "Accepted", "Missed", "VoiceMail".
    pub result: String,
    /// Connection state, e.g. "CallConnected", "Answered", "NoCall".
    pub telephony_status: String,
}

/// One inbound call event, built by the telephony gateway from the
/// provider's call-log response. Immutable within the pipeline.
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// Opaque provider id, unique per call.
    pub id: String,
    pub direction: CallDirection,
    /// Caller number exactly as delivered; absent when withheld.
    pub from_number: Option<String>,
    /// Receiving extension id; absent for calls not routed to an extension.
    pub to_extension_id: Option<String>,
    /// Call start, UTC.
    pub start_time: DateTime<Utc>,
    pub duration_seconds: u32,
    /// Routing legs in provider order; may be empty.
    pub legs: Vec<CallLeg>,
    /// Opaque recording identifier, when the call was recorded.
    pub recording_ref: Option<String>,
    /// Caller flagged as suspected spam by the provider.
    pub spam: bool,
    /// Caller on the blocked list.
    pub blocked: bool,
}

/// CRM user reference as embedded in lead payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadOwnerRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A CRM lead, in the CRM's own wire field names.
///
/// The CRM does not enforce phone uniqueness; duplicate leads for one caller
/// are expected and handled by the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadRecord {
    /// Opaque CRM-assigned id.
    pub id: String,
    /// Phone as stored by the CRM; `phone::normalize` derives the dedup key.
    #[serde(rename = "Phone")]
    pub phone: Option<String>,
    #[serde(rename = "First_Name")]
    pub first_name: Option<String>,
    #[serde(rename = "Last_Name")]
    pub last_name: Option<String>,
    /// Free-text status; this system writes "Accepted Call" / "Missed Call".
    #[serde(rename = "Lead_Status")]
    pub status: Option<String>,
    /// Creation timestamp, the merge tie-break (oldest survives).
    #[serde(rename = "Created_Time")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(rename = "Owner")]
    pub owner: Option<LeadOwnerRef>,
}

/// Fields for a brand-new lead, in CRM wire field names.
#[derive(Debug, Clone, Serialize)]
pub struct NewLead {
    #[serde(rename = "Phone")]
    pub phone: String,
    #[serde(rename = "Owner")]
    pub owner: LeadOwnerRef,
    /// Receiving extension's display name.
    #[serde(rename = "Lead_Source")]
    pub lead_source: String,
    #[serde(rename = "Lead_Status")]
    pub lead_status: String,
    #[serde(rename = "First_Name")]
    pub first_name: String,
    #[serde(rename = "Last_Name")]
    pub last_name: String,
}

/// Attachment descriptor as returned by the CRM's attachment listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub id: String,
    #[serde(rename = "File_Name")]
    pub file_name: Option<String>,
}

/// One telephony extension the pipeline watches, from the extensions file.
#[derive(Debug, Clone, Deserialize)]
pub struct Extension {
    pub id: String,
    pub name: String,
}

/// One CRM user eligible to own newly created leads, from the owners file.
#[derive(Debug, Clone, Deserialize)]
pub struct LeadOwner {
    pub id: String,
    pub name: Option<String>,
}

/// Per-run aggregate counters. Created fresh per invocation, returned to the
/// caller, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    /// Calls retrieved across all configured extensions.
    pub total_calls: u32,
    /// Calls that passed this job's qualification rule.
    pub qualified_calls: u32,
    /// Calls that completed lead reconciliation.
    pub processed_calls: u32,
    /// Reconciliations that updated a lead found by search.
    pub existing_leads: u32,
    /// Reconciliations that created a lead (classified even in dry-run).
    pub new_leads: u32,
    /// Calls skipped: failed validation or qualification, suppressed by the
    /// cooldown window, or failed with an isolated per-call error.
    pub skipped_calls: u32,
    pub recordings_attached: u32,
    pub recording_failures: u32,
}
