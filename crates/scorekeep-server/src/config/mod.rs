use std::fmt::{Debug, Formatter};

pub const DEFAULT_API_PREFIX: &str = "/compute/api";

/// The single username/password pair accepted on the write path.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// How `DELETE .../{id}` picks the record to remove.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeleteMatch {
    /// Remove the element at position `id` in the stored sequence.
    #[default]
    Position,
    /// Remove the record whose `id` field equals `id`.
    Id,
}

impl DeleteMatch {
    pub fn parse(input: &str) -> Result<Self, String> {
        match input.trim().to_ascii_lowercase().as_str() {
            "position" | "index" => Ok(Self::Position),
            "id" => Ok(Self::Id),
            other => Err(format!(
                "unsupported delete match mode {other:?}; use position or id"
            )),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Id => "id",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_prefix: String,
    /// Scheme and authority used for score URIs, e.g. `https://scores.example`.
    /// Falls back to `http://` plus the request's `Host` header.
    pub public_base_url: Option<String>,
    pub max_body_bytes: usize,
    pub credentials: Credentials,
    pub delete_match: DeleteMatch,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            public_base_url: None,
            max_body_bytes: 16 * 1024,
            credentials: Credentials::default(),
            delete_match: DeleteMatch::default(),
        }
    }
}

pub fn validate_startup_config_contract(api: &ApiConfig) -> Result<(), String> {
    if api.credentials.username.is_empty() || api.credentials.password.is_empty() {
        return Err("credentials require a non-empty username and password".to_string());
    }
    if api.credentials.username.contains(':') {
        return Err("username must not contain ':' (basic auth separator)".to_string());
    }
    if !api.api_prefix.is_empty()
        && (!api.api_prefix.starts_with('/') || api.api_prefix.ends_with('/'))
    {
        return Err(format!(
            "api prefix {:?} must start with '/' and must not end with '/'",
            api.api_prefix
        ));
    }
    if api.max_body_bytes == 0 {
        return Err("max body bytes must be > 0".to_string());
    }
    if let Some(base) = &api.public_base_url {
        if !(base.starts_with("http://") || base.starts_with("https://")) || base.ends_with('/') {
            return Err(format!(
                "public base url {base:?} must be http(s)://host without a trailing '/'"
            ));
        }
    }
    Ok(())
}
