use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum SyncError {
    /// Transient provider failure (network error, timeout, 429, 5xx); safe to retry.
    TransientProvider(String),
    /// Access token rejected (401); refresh the credential and retry once.
    AuthExpired(String),
    /// Resource not found (missing recording or lead); a business outcome, not a failure.
    NotFound(String),
    /// Record failed validation (missing/un-normalizable phone, malformed timestamp).
    Validation(String),
    /// Unusable credentials or missing required configuration; aborts the run.
    FatalConfig(String),
    /// Permanent provider rejection (4xx other than 401/429); not retried.
    Provider(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<SyncError>,
        /// Additional context message.
        context: String,
    },
}

impl SyncError {
    /// Whether the retry loop may re-attempt the failed operation.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::TransientProvider(_) => true,
            SyncError::WithContext { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Whether the failure calls for a credential refresh.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            SyncError::AuthExpired(_) => true,
            SyncError::WithContext { source, .. } => source.is_auth_expired(),
            _ => false,
        }
    }

    /// Whether the whole run must abort rather than skip the current call.
    pub fn is_fatal(&self) -> bool {
        match self {
            SyncError::FatalConfig(_) | SyncError::AuthExpired(_) => true,
            SyncError::WithContext { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// Classify a non-success HTTP response, consuming the body for context.
    pub async fn from_response(operation: &str, response: reqwest::Response) -> SyncError {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        if status == reqwest::StatusCode::UNAUTHORIZED {
            SyncError::AuthExpired(format!("{} returned 401: {}", operation, error_text))
        } else if status == reqwest::StatusCode::NOT_FOUND {
            SyncError::NotFound(format!("{} returned 404: {}", operation, error_text))
        } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            SyncError::TransientProvider(format!(
                "{} returned {}: {}",
                operation, status, error_text
            ))
        } else {
            SyncError::Provider(format!("{} returned {}: {}", operation, status, error_text))
        }
    }
}

impl fmt::Display for SyncError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::TransientProvider(msg) => write!(f, "Transient provider error: {}", msg),
            SyncError::AuthExpired(msg) => write!(f, "Auth expired: {}", msg),
            SyncError::NotFound(msg) => write!(f, "Not found: {}", msg),
            SyncError::Validation(msg) => write!(f, "Validation error: {}", msg),
            SyncError::FatalConfig(msg) => write!(f, "Fatal configuration error: {}", msg),
            SyncError::Provider(msg) => write!(f, "Provider error: {}", msg),
            SyncError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::WithContext { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    /// Converts a `reqwest::Error` into a `SyncError`.
    ///
    /// Timeouts and connection failures are transient; everything else
    /// (body/decode errors, builder misuse) is a permanent provider error.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            SyncError::TransientProvider(err.to_string())
        } else {
            SyncError::Provider(err.to_string())
        }
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `SyncError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    ///
    /// # Arguments
    ///
    /// * `context` - The context message to add.
    fn context(self, context: impl Into<String>) -> Result<T, SyncError>;
}

impl<T> ResultExt<T> for Result<T, SyncError> {
    fn context(self, context: impl Into<String>) -> Result<T, SyncError> {
        self.map_err(|e| SyncError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }
}
