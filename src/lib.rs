//! RingCentral → Zoho CRM Call Sync Library
//!
//! This library provides the core functionality for syncing RingCentral call
//! logs into Zoho CRM leads: call-log polling, call qualification, duplicate-
//! safe lead reconciliation, idempotent recording attachment, and offline
//! duplicate-lead merging.
//!
//! # Modules
//!
//! - `auth`: Access-token holder shared by both gateways.
//! - `cli`: Command-line argument parsing.
//! - `config`: Configuration management.
//! - `dedup`: In-run duplicate suppression with a cooldown window.
//! - `errors`: Error handling types.
//! - `models`: Core data models.
//! - `phone`: Phone number normalization and search variants.
//! - `pipeline`: The per-call processing pipeline.
//! - `qualifier`: Accepted/missed call qualification rules.
//! - `reconciler`: Offline duplicate-lead scan and merge.
//! - `retry`: Exponential backoff policy.
//! - `ringcentral`: RingCentral API client.
//! - `zoho`: Zoho CRM API client.

// Re-export primary modules for shared use in tests and other binaries
pub mod auth;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod errors;
pub mod models;
pub mod phone;
pub mod pipeline;
pub mod qualifier;
pub mod reconciler;
pub mod retry;
pub mod ringcentral;
pub mod zoho;
