use crate::models::{Extension, LeadOwner};
use crate::retry::RetryPolicy;
use std::path::Path;
use std::time::Duration;

/// Runtime configuration, loaded from the environment.
///
/// Base URLs are injectable so tests can point the gateways at mock servers.
#[derive(Debug, Clone)]
pub struct Config {
    pub rc_jwt: String,
    pub rc_client_id: String,
    pub rc_client_secret: String,
    pub rc_account_id: String,
    pub rc_server_url: String,
    pub rc_media_url: String,
    pub zoho_client_id: String,
    pub zoho_client_secret: String,
    pub zoho_refresh_token: String,
    pub zoho_api_url: String,
    pub zoho_accounts_url: String,
    /// Cooldown window for repeat calls from one number, in minutes.
    pub cooldown_minutes: i64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_multiplier: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            rc_jwt: std::env::var("RC_JWT")
                .map_err(|_| anyhow::anyhow!("RC_JWT environment variable required"))
                .and_then(|jwt| {
                    if jwt.trim().is_empty() {
                        anyhow::bail!("RC_JWT cannot be empty");
                    }
                    Ok(jwt)
                })?,
            rc_client_id: std::env::var("RC_CLIENT_ID")
                .map_err(|_| anyhow::anyhow!("RC_CLIENT_ID environment variable required"))
                .and_then(|id| {
                    if id.trim().is_empty() {
                        anyhow::bail!("RC_CLIENT_ID cannot be empty");
                    }
                    Ok(id)
                })?,
            rc_client_secret: std::env::var("RC_CLIENT_SECRET")
                .map_err(|_| anyhow::anyhow!("RC_CLIENT_SECRET environment variable required"))
                .and_then(|secret| {
                    if secret.trim().is_empty() {
                        anyhow::bail!("RC_CLIENT_SECRET cannot be empty");
                    }
                    Ok(secret)
                })?,
            rc_account_id: std::env::var("RC_ACCOUNT_ID").unwrap_or_else(|_| "~".to_string()),
            rc_server_url: std::env::var("RC_SERVER_URL")
                .unwrap_or_else(|_| "https://platform.ringcentral.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            rc_media_url: std::env::var("RC_MEDIA_URL")
                .unwrap_or_else(|_| "https://media.ringcentral.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            zoho_client_id: std::env::var("ZOHO_CLIENT_ID")
                .map_err(|_| anyhow::anyhow!("ZOHO_CLIENT_ID environment variable required"))
                .and_then(|id| {
                    if id.trim().is_empty() {
                        anyhow::bail!("ZOHO_CLIENT_ID cannot be empty");
                    }
                    Ok(id)
                })?,
            zoho_client_secret: std::env::var("ZOHO_CLIENT_SECRET")
                .map_err(|_| anyhow::anyhow!("ZOHO_CLIENT_SECRET environment variable required"))
                .and_then(|secret| {
                    if secret.trim().is_empty() {
                        anyhow::bail!("ZOHO_CLIENT_SECRET cannot be empty");
                    }
                    Ok(secret)
                })?,
            zoho_refresh_token: std::env::var("ZOHO_REFRESH_TOKEN")
                .map_err(|_| anyhow::anyhow!("ZOHO_REFRESH_TOKEN environment variable required"))
                .and_then(|token| {
                    if token.trim().is_empty() {
                        anyhow::bail!("ZOHO_REFRESH_TOKEN cannot be empty");
                    }
                    Ok(token)
                })?,
            zoho_api_url: std::env::var("ZOHO_API_URL")
                .unwrap_or_else(|_| "https://www.zohoapis.com/crm/v7".to_string())
                .trim_end_matches('/')
                .to_string(),
            zoho_accounts_url: std::env::var("ZOHO_ACCOUNTS_URL")
                .unwrap_or_else(|_| "https://accounts.zoho.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            cooldown_minutes: std::env::var("COOLDOWN_MINUTES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("COOLDOWN_MINUTES must be a whole number"))?,
            retry_max_attempts: std::env::var("RETRY_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RETRY_MAX_ATTEMPTS must be a whole number"))?,
            retry_base_delay_ms: std::env::var("RETRY_BASE_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RETRY_BASE_DELAY_MS must be a whole number"))?,
            retry_multiplier: std::env::var("RETRY_MULTIPLIER")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RETRY_MULTIPLIER must be a whole number"))?,
        };

        for (name, url) in [
            ("RC_SERVER_URL", &config.rc_server_url),
            ("RC_MEDIA_URL", &config.rc_media_url),
            ("ZOHO_API_URL", &config.zoho_api_url),
            ("ZOHO_ACCOUNTS_URL", &config.zoho_accounts_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }
        if config.cooldown_minutes < 0 {
            anyhow::bail!("COOLDOWN_MINUTES cannot be negative");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("RingCentral server: {}", config.rc_server_url);
        tracing::debug!("RingCentral media server: {}", config.rc_media_url);
        tracing::debug!("RingCentral account: {}", config.rc_account_id);
        tracing::debug!("Zoho API: {}", config.zoho_api_url);
        tracing::debug!("Zoho accounts server: {}", config.zoho_accounts_url);
        tracing::debug!("Cooldown window: {} minute(s)", config.cooldown_minutes);
        tracing::debug!(
            "Retry policy: {} attempts, {}ms base delay, x{} backoff",
            config.retry_max_attempts,
            config.retry_base_delay_ms,
            config.retry_multiplier
        );

        Ok(config)
    }

    /// Backoff policy shared by both gateways.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
            self.retry_multiplier,
        )
    }
}

/// Load the watched-extension list from its JSON file.
pub fn load_extensions(path: &Path) -> anyhow::Result<Vec<Extension>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read extensions file {}: {}", path.display(), e))?;
    let extensions: Vec<Extension> = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("Invalid extensions file {}: {}", path.display(), e))?;
    if extensions.is_empty() {
        anyhow::bail!("No extensions configured in {}", path.display());
    }
    tracing::info!(
        "Loaded {} extension(s) from {}",
        extensions.len(),
        path.display()
    );
    Ok(extensions)
}

/// Load the lead-owner rotation list from its JSON file.
///
/// An empty list is unusable even in dry-run: the rotation must classify an
/// owner for every would-be create.
pub fn load_lead_owners(path: &Path) -> anyhow::Result<Vec<LeadOwner>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        anyhow::anyhow!("Failed to read lead owners file {}: {}", path.display(), e)
    })?;
    let owners: Vec<LeadOwner> = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("Invalid lead owners file {}: {}", path.display(), e))?;
    if owners.is_empty() {
        anyhow::bail!("No lead owners configured in {}", path.display());
    }
    tracing::info!(
        "Loaded {} lead owner(s) from {}",
        owners.len(),
        path.display()
    );
    Ok(owners)
}
