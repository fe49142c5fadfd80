//! Zoho CRM gateway: token refresh, lead search/create/update, notes,
//! attachments, paginated listing and deletion.

use crate::auth::TokenHolder;
use crate::config::Config;
use crate::errors::SyncError;
use crate::models::{Attachment, LeadRecord, NewLead};
use crate::retry::{with_backoff, RetryPolicy};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::time::Duration;

pub struct ZohoClient {
    client: reqwest::Client,
    api_url: String,
    accounts_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    token: TokenHolder,
    retry: RetryPolicy,
}

impl ZohoClient {
    pub fn new(config: &Config) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SyncError::FatalConfig(format!("Failed to create Zoho client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.zoho_api_url.clone(),
            accounts_url: config.zoho_accounts_url.clone(),
            client_id: config.zoho_client_id.clone(),
            client_secret: config.zoho_client_secret.clone(),
            refresh_token: config.zoho_refresh_token.clone(),
            token: TokenHolder::new(),
            retry: config.retry_policy(),
        })
    }

    /// Search leads whose Phone equals any of the given variants.
    ///
    /// Zoho answers 204 when nothing matches; that maps to an empty list.
    pub async fn find_leads_by_phone(
        &self,
        variants: &[String],
    ) -> Result<Vec<LeadRecord>, SyncError> {
        with_backoff(&self.retry, "Zoho lead search", || {
            self.with_auth(|token| self.search_request(variants, token))
        })
        .await
    }

    /// Create a lead and return its id.
    pub async fn create_lead(&self, lead: &NewLead) -> Result<String, SyncError> {
        with_backoff(&self.retry, "Zoho lead create", || {
            self.with_auth(|token| self.create_request(lead, token))
        })
        .await
    }

    /// Overwrite the lead's status field.
    pub async fn update_status(&self, lead_id: &str, status: &str) -> Result<(), SyncError> {
        with_backoff(&self.retry, "Zoho lead update", || {
            self.with_auth(|token| self.update_request(lead_id, status, token))
        })
        .await
    }

    /// Append a note to a lead.
    pub async fn add_note(&self, lead_id: &str, title: &str, content: &str) -> Result<(), SyncError> {
        with_backoff(&self.retry, "Zoho note create", || {
            self.with_auth(|token| self.note_request(lead_id, title, content, token))
        })
        .await
    }

    /// List the attachments already on a lead (id and file name only).
    pub async fn list_attachments(&self, lead_id: &str) -> Result<Vec<Attachment>, SyncError> {
        with_backoff(&self.retry, "Zoho attachment list", || {
            self.with_auth(|token| self.attachment_list_request(lead_id, token))
        })
        .await
    }

    /// Upload a recording file onto a lead.
    pub async fn attach_file(
        &self,
        lead_id: &str,
        filename: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), SyncError> {
        with_backoff(&self.retry, "Zoho attachment upload", || {
            self.with_auth(|token| {
                self.attach_request(lead_id, filename, bytes.clone(), content_type, token)
            })
        })
        .await
    }

    /// Fetch every lead in the module via token-based pagination.
    ///
    /// The search API stops at 2000 records, so the reconciler walks the full
    /// module with the list endpoint instead.
    pub async fn list_all_leads(&self) -> Result<Vec<LeadRecord>, SyncError> {
        let mut leads = Vec::new();
        let mut page_token: Option<String> = None;
        let mut page = 1u32;

        loop {
            let batch = with_backoff(&self.retry, "Zoho lead list", || {
                self.with_auth(|token| self.list_request(page_token.as_deref(), token))
            })
            .await?;

            leads.extend(batch.data);
            tracing::info!("Scanned lead page {} ({} total so far)", page, leads.len());

            let info = batch.info;
            let more = info.as_ref().map(|i| i.more_records).unwrap_or(false);
            page_token = info.and_then(|i| i.next_page_token);
            if !more || page_token.is_none() {
                break;
            }
            page += 1;
        }

        tracing::info!("Fetched {} lead(s) from Zoho", leads.len());
        Ok(leads)
    }

    /// Delete a lead outright.
    pub async fn delete_lead(&self, lead_id: &str) -> Result<(), SyncError> {
        with_backoff(&self.retry, "Zoho lead delete", || {
            self.with_auth(|token| self.delete_request(lead_id, token))
        })
        .await
    }

    async fn search_request(
        &self,
        variants: &[String],
        token: String,
    ) -> Result<Vec<LeadRecord>, SyncError> {
        let criteria = phone_criteria(variants);
        let url = reqwest::Url::parse_with_params(
            &format!("{}/Leads/search", self.api_url),
            &[("criteria", criteria.as_str())],
        )
        .map_err(|e| SyncError::Provider(format!("Failed to build search URL: {}", e)))?;

        tracing::debug!("Searching Zoho leads with criteria {}", criteria);

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Zoho-oauthtoken {}", token))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(SyncError::from_response("Zoho lead search", response).await);
        }

        let result: LeadListResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Provider(format!("Failed to parse search response: {}", e)))?;

        Ok(result.data)
    }

    async fn create_request(&self, lead: &NewLead, token: String) -> Result<String, SyncError> {
        let url = format!("{}/Leads", self.api_url);
        tracing::info!("Creating Zoho lead for {}", lead.phone);

        let body = json!({ "data": [lead] });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Zoho-oauthtoken {}", token))
            .json(&body)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::CREATED {
            return Err(SyncError::from_response("Zoho lead create", response).await);
        }

        let response_data: serde_json::Value = response.json().await.map_err(|e| {
            SyncError::Provider(format!("Failed to parse lead creation response: {}", e))
        })?;

        // Try to get the id from different possible locations in the response
        let lead_id = if let Some(id) = response_data
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|r| r.get("details"))
            .and_then(|d| d.get("id"))
            .and_then(|i| i.as_str())
        {
            id.to_string()
        } else if let Some(id) = response_data
            .get("data")
            .and_then(|d| d.get(0))
            .and_then(|r| r.get("id"))
            .and_then(|i| i.as_str())
        {
            id.to_string()
        } else {
            tracing::warn!("Unexpected Zoho create response format: {:?}", response_data);
            return Err(SyncError::Provider(
                "Lead creation response missing 'id' field".to_string(),
            ));
        };

        tracing::info!("✓ Lead created successfully: {}", lead_id);
        Ok(lead_id)
    }

    async fn update_request(
        &self,
        lead_id: &str,
        status: &str,
        token: String,
    ) -> Result<(), SyncError> {
        let url = format!("{}/Leads/{}", self.api_url, lead_id);
        tracing::info!("Updating lead {} status to '{}'", lead_id, status);

        let body = json!({ "data": [{ "Lead_Status": status }] });

        let response = self
            .client
            .put(&url)
            .header("Authorization", format!("Zoho-oauthtoken {}", token))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::from_response("Zoho lead update", response).await);
        }

        tracing::info!("✓ Lead {} updated", lead_id);
        Ok(())
    }

    async fn note_request(
        &self,
        lead_id: &str,
        title: &str,
        content: &str,
        token: String,
    ) -> Result<(), SyncError> {
        let url = format!("{}/Leads/{}/Notes", self.api_url, lead_id);
        tracing::debug!("Adding note '{}' to lead {}", title, lead_id);

        let body = json!({
            "data": [{
                "Note_Title": title,
                "Note_Content": content
            }]
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Zoho-oauthtoken {}", token))
            .json(&body)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::CREATED {
            return Err(SyncError::from_response("Zoho note create", response).await);
        }

        tracing::info!("✓ Note added to lead {}", lead_id);
        Ok(())
    }

    async fn attachment_list_request(
        &self,
        lead_id: &str,
        token: String,
    ) -> Result<Vec<Attachment>, SyncError> {
        let url = format!(
            "{}/Leads/{}/Attachments?fields=id,File_Name",
            self.api_url, lead_id
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Zoho-oauthtoken {}", token))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(SyncError::from_response("Zoho attachment list", response).await);
        }

        let result: AttachmentListResponse = response.json().await.map_err(|e| {
            SyncError::Provider(format!("Failed to parse attachment list: {}", e))
        })?;

        Ok(result.data)
    }

    async fn attach_request(
        &self,
        lead_id: &str,
        filename: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
        token: String,
    ) -> Result<(), SyncError> {
        let url = format!("{}/Leads/{}/Attachments", self.api_url, lead_id);
        tracing::info!(
            "Uploading {} ({} bytes) to lead {}",
            filename,
            bytes.len(),
            lead_id
        );

        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let part = match content_type {
            Some(ct) => part.mime_str(ct).map_err(|e| {
                SyncError::Validation(format!("Invalid recording content type {}: {}", ct, e))
            })?,
            None => part,
        };
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Zoho-oauthtoken {}", token))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !matches!(status.as_u16(), 200 | 201 | 202) {
            return Err(SyncError::from_response("Zoho attachment upload", response).await);
        }

        tracing::info!("✓ Recording attached to lead {}", lead_id);
        Ok(())
    }

    async fn list_request(
        &self,
        page_token: Option<&str>,
        token: String,
    ) -> Result<LeadListResponse, SyncError> {
        let mut params = vec![
            (
                "fields",
                "id,Phone,First_Name,Last_Name,Lead_Status,Created_Time,Owner".to_string(),
            ),
            ("per_page", "200".to_string()),
        ];
        if let Some(cursor) = page_token {
            params.push(("page_token", cursor.to_string()));
        }

        let url = reqwest::Url::parse_with_params(&format!("{}/Leads", self.api_url), &params)
            .map_err(|e| SyncError::Provider(format!("Failed to build lead list URL: {}", e)))?;

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Zoho-oauthtoken {}", token))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(LeadListResponse {
                data: Vec::new(),
                info: None,
            });
        }
        if !response.status().is_success() {
            return Err(SyncError::from_response("Zoho lead list", response).await);
        }

        let result: LeadListResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Provider(format!("Failed to parse lead list: {}", e)))?;

        Ok(result)
    }

    async fn delete_request(&self, lead_id: &str, token: String) -> Result<(), SyncError> {
        let url = format!("{}/Leads/{}", self.api_url, lead_id);
        tracing::info!("Deleting lead {}", lead_id);

        let response = self
            .client
            .delete(&url)
            .header("Authorization", format!("Zoho-oauthtoken {}", token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::from_response("Zoho lead delete", response).await);
        }

        tracing::info!("✓ Lead {} deleted", lead_id);
        Ok(())
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
                tracing::info!("Zoho access token rejected, refreshing");
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
        let token = with_backoff(&self.retry, "Zoho token refresh", || self.request_token())
            .await?;
        self.token.store(token.clone());
        Ok(token)
    }

    async fn request_token(&self) -> Result<String, SyncError> {
        let url = format!("{}/oauth/v2/token", self.accounts_url);
        tracing::debug!("Refreshing Zoho access token");

        let response = self
            .client
            .post(&url)
            .form(&[
                ("refresh_token", self.refresh_token.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
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
                "Zoho token endpoint returned {}: {}",
                status, error_text
            )));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Zoho rejected token refresh: {} {}", status, error_text);
            return Err(SyncError::FatalConfig(format!(
                "Zoho token refresh failed {}: {}",
                status, error_text
            )));
        }

        // Zoho answers 200 with an error body when the refresh token is bad
        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SyncError::Provider(format!("Failed to parse token response: {}", e)))?;

        if let Some(token) = data.get("access_token").and_then(|t| t.as_str()) {
            tracing::info!("Zoho access token refreshed");
            Ok(token.to_string())
        } else {
            tracing::error!("Zoho token refresh rejected: {:?}", data);
            Err(SyncError::FatalConfig(format!(
                "Zoho token refresh failed: {}",
                data
            )))
        }
    }
}

/// Build the OR search criteria across all phone variants.
fn phone_criteria(variants: &[String]) -> String {
    let clauses: Vec<String> = variants
        .iter()
        .map(|v| format!("(Phone:equals:{})", v))
        .collect();
    format!("({})", clauses.join("or"))
}

#[derive(Debug, Deserialize)]
struct LeadListResponse {
    #[serde(default)]
    data: Vec<LeadRecord>,
    info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(default)]
    more_records: bool,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttachmentListResponse {
    #[serde(default)]
    data: Vec<Attachment>,
}
