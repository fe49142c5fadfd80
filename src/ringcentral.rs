//! RingCentral gateway: JWT token exchange, call-log pagination, recording download.

use crate::auth::TokenHolder;
use crate::config::Config;
use crate::errors::SyncError;
use crate::models::{CallDirection, CallLeg, CallRecord};
use crate::retry::{with_backoff, RetryPolicy};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

pub struct RingCentralClient {
    client: reqwest::Client,
    server_url: String,
    media_url: String,
    account_id: String,
    client_id: String,
    client_secret: String,
    jwt: String,
    token: TokenHolder,
    retry: RetryPolicy,
}

/// Downloaded recording payload with the media type the server reported.
#[derive(Debug, Clone)]
pub struct RecordingContent {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl RingCentralClient {
    pub fn new(config: &Config) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                SyncError::FatalConfig(format!("Failed to create RingCentral client: {}", e))
            })?;

        Ok(Self {
            client,
            server_url: config.rc_server_url.clone(),
            media_url: config.rc_media_url.clone(),
            account_id: config.rc_account_id.clone(),
            client_id: config.rc_client_id.clone(),
            client_secret: config.rc_client_secret.clone(),
            jwt: config.rc_jwt.clone(),
            token: TokenHolder::new(),
            retry: config.retry_policy(),
        })
    }

    /// Fetch all inbound voice calls for one extension in the given window.
    ///
    /// Pages are pulled until the server stops advertising a next page. If a
    /// page still fails after the backoff budget, the calls collected so far
    /// are returned and the gap is logged; auth and permanent provider errors
    /// propagate instead.
    pub async fn fetch_calls(
        &self,
        extension_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CallRecord>, SyncError> {
        let mut calls = Vec::new();
        let mut page = 1u32;

        loop {
            let batch = with_backoff(&self.retry, "RingCentral call log", || {
                self.with_auth(|token| self.call_log_page(extension_id, from, to, page, token))
            })
            .await;

            let batch = match batch {
                Ok(batch) => batch,
                Err(e) if e.is_transient() => {
                    tracing::error!(
                        "Giving up on call log page {} for extension {}, returning {} call(s): {}",
                        page,
                        extension_id,
                        calls.len(),
                        e
                    );
                    break;
                }
                Err(e) => return Err(e),
            };

            let has_next = batch
                .navigation
                .as_ref()
                .and_then(|n| n.next_page.as_ref())
                .is_some();
            calls.extend(batch.records.into_iter().map(CallLogEntry::into_call_record));

            if !has_next {
                break;
            }
            page += 1;
        }

        tracing::info!(
            "Fetched {} call(s) for extension {}",
            calls.len(),
            extension_id
        );
        Ok(calls)
    }

    /// Download a call recording from the media server.
    ///
    /// Returns `SyncError::NotFound` when the recording has already been
    /// purged (404).
    pub async fn fetch_recording(&self, recording_ref: &str) -> Result<RecordingContent, SyncError> {
        with_backoff(&self.retry, "RingCentral recording download", || {
            self.with_auth(|token| self.recording_request(recording_ref, token))
        })
        .await
    }

    async fn call_log_page(
        &self,
        extension_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page: u32,
        token: String,
    ) -> Result<CallLogPage, SyncError> {
        let date_from = from.to_rfc3339_opts(SecondsFormat::Millis, true);
        let date_to = to.to_rfc3339_opts(SecondsFormat::Millis, true);
        let page_number = page.to_string();

        let url = reqwest::Url::parse_with_params(
            &format!(
                "{}/restapi/v1.0/account/{}/extension/{}/call-log",
                self.server_url, self.account_id, extension_id
            ),
            &[
                ("direction", "Inbound"),
                ("type", "Voice"),
                ("view", "Detailed"),
                ("withRecording", "false"),
                ("showBlocked", "true"),
                ("perPage", "250"),
                ("dateFrom", date_from.as_str()),
                ("dateTo", date_to.as_str()),
                ("page", page_number.as_str()),
            ],
        )
        .map_err(|e| SyncError::Provider(format!("Failed to build call log URL: {}", e)))?;

        tracing::debug!(
            "Fetching call log page {} for extension {}",
            page,
            extension_id
        );

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::from_response("RingCentral call log", response).await);
        }

        let page_data: CallLogPage = response.json().await.map_err(|e| {
            SyncError::Provider(format!("Failed to parse call log response: {}", e))
        })?;

        Ok(page_data)
    }

    async fn recording_request(
        &self,
        recording_ref: &str,
        token: String,
    ) -> Result<RecordingContent, SyncError> {
        let url = format!(
            "{}/restapi/v1.0/account/{}/recording/{}/content",
            self.media_url, self.account_id, recording_ref
        );
        tracing::debug!("Downloading recording {}", recording_ref);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::from_response("RingCentral recording download", response).await);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SyncError::Provider(format!("Failed to read recording body: {}", e)))?;

        Ok(RecordingContent {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    /// Run a request with a valid access token, refreshing once on a 401.
    async fn with_auth<T, F, Fut>(&self, call: F) -> Result<T, SyncError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let token = self.access_token().await?;
        match call(token).await {
            Err(e) if e.is_auth_expired() => {
                tracing::info!("RingCentral access token rejected, refreshing");
                self.token.clear();
                let token = self.access_token().await?;
                call(token).await
            }
            other => other,
        }
    }

    async fn access_token(&self) -> Result<String, SyncError> {
        if let Some(token) = self.token.bearer() {
            return Ok(token);
        }
        let token = with_backoff(&self.retry, "RingCentral token exchange", || {
            self.request_token()
        })
        .await?;
        self.token.store(token.clone());
        Ok(token)
    }

    async fn request_token(&self) -> Result<String, SyncError> {
        let url = format!("{}/restapi/oauth/token", self.server_url);
        tracing::debug!("Exchanging JWT assertion for RingCentral access token");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", self.jwt.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SyncError::TransientProvider(format!(
                "RingCentral token endpoint returned {}: {}",
                status, error_text
            )));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(
                "RingCentral rejected JWT credentials: {} {}",
                status,
                error_text
            );
            return Err(SyncError::FatalConfig(format!(
                "RingCentral token request failed {}: {}",
                status, error_text
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Provider(format!("Failed to parse token response: {}", e)))?;

        tracing::info!("RingCentral access token acquired");
        Ok(token.access_token)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallLogPage {
    #[serde(default)]
    records: Vec<CallLogEntry>,
    navigation: Option<Navigation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Navigation {
    next_page: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallLogEntry {
    id: String,
    direction: CallDirection,
    result: Option<String>,
    start_time: DateTime<Utc>,
    #[serde(default)]
    duration: u32,
    from: Option<CallParty>,
    to: Option<CallParty>,
    #[serde(default)]
    legs: Vec<CallLogLeg>,
    recording: Option<RecordingInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallParty {
    phone_number: Option<String>,
    extension_id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallLogLeg {
    result: Option<String>,
    telephony_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordingInfo {
    id: String,
}

impl CallLogEntry {
    fn into_call_record(self) -> CallRecord {
        // Carriers flag junk callers by prefixing the caller-ID name
        let spam = self
            .from
            .as_ref()
            .and_then(|f| f.name.as_deref())
            .map(|name| name.starts_with("SPAM"))
            .unwrap_or(false);
        let blocked = self.result.as_deref() == Some("Blocked");

        CallRecord {
            id: self.id,
            direction: self.direction,
            from_number: self.from.as_ref().and_then(|f| f.phone_number.clone()),
            to_extension_id: self.to.as_ref().and_then(|t| t.extension_id.clone()),
            start_time: self.start_time,
            duration_seconds: self.duration,
            legs: self
                .legs
                .into_iter()
                .map(|leg| CallLeg {
                    result: leg.result.unwrap_or_default(),
                    telephony_status: leg.telephony_status.unwrap_or_default(),
                })
                .collect(),
            recording_ref: self.recording.map(|r| r.id),
            spam,
            blocked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(json: serde_json::Value) -> CallLogEntry {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_call_log_entry_maps_all_fields() {
        let entry = sample_entry(serde_json::json!({
            "id": "call-1",
            "direction": "Inbound",
            "result": "Accepted",
            "startTime": "2025-06-01T10:15:30.000Z",
            "duration": 95,
            "from": {"phoneNumber": "+12025550123", "name": "JANE DOE"},
            "to": {"extensionId": "301"},
            "legs": [
                {"result": "Accepted", "telephonyStatus": "CallConnected"}
            ],
            "recording": {"id": "rec-9"}
        }));
        let call = entry.into_call_record();

        assert_eq!(call.id, "call-1");
        assert_eq!(call.from_number.as_deref(), Some("+12025550123"));
        assert_eq!(call.to_extension_id.as_deref(), Some("301"));
        assert_eq!(call.duration_seconds, 95);
        assert_eq!(call.legs.len(), 1);
        assert_eq!(call.legs[0].result, "Accepted");
        assert_eq!(call.legs[0].telephony_status, "CallConnected");
        assert_eq!(call.recording_ref.as_deref(), Some("rec-9"));
        assert!(!call.spam);
        assert!(!call.blocked);
    }

    #[test]
    fn test_spam_label_sets_spam_flag() {
        let entry = sample_entry(serde_json::json!({
            "id": "call-2",
            "direction": "Inbound",
            "startTime": "2025-06-01T10:15:30Z",
            "from": {"phoneNumber": "+12025550123", "name": "SPAM? Likely Fraud"}
        }));
        assert!(entry.into_call_record().spam);
    }

    #[test]
    fn test_blocked_result_sets_blocked_flag() {
        let entry = sample_entry(serde_json::json!({
            "id": "call-3",
            "direction": "Inbound",
            "result": "Blocked",
            "startTime": "2025-06-01T10:15:30Z"
        }));
        let call = entry.into_call_record();
        assert!(call.blocked);
        assert!(call.from_number.is_none());
        assert!(call.legs.is_empty());
        assert!(call.recording_ref.is_none());
    }
}
