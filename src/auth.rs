use std::sync::RwLock;

/// Mutable access-token slot shared by reference with a gateway.
///
/// Both providers hand out short-lived bearer tokens; the gateways fetch one
/// lazily, and clear + re-fetch when a request comes back 401. The lock is
/// only held across non-await sections, so the single-task execution model
/// never contends on it.
pub struct TokenHolder {
    access_token: RwLock<Option<String>>,
}

impl TokenHolder {
    pub fn new() -> Self {
        Self {
            access_token: RwLock::new(None),
        }
    }

    /// Current bearer token, if one has been stored.
    pub fn bearer(&self) -> Option<String> {
        self.access_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Store a freshly issued token.
    pub fn store(&self, token: String) {
        *self.access_token.write().unwrap_or_else(|e| e.into_inner()) = Some(token);
    }

    /// Drop the current token so the next request re-authenticates.
    pub fn clear(&self) {
        *self.access_token.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl Default for TokenHolder {
    fn default() -> Self {
        Self::new()
    }
}
