//! Run configuration.
//!
//! Defaults live here as constants and are applied when a [`HarvestConfig`]
//! is built; nothing is read from process-wide state afterwards.

use crate::nacos_api::token::SigningCredential;
use crate::nacos_api::types::HarvestError;
use std::path::PathBuf;
use std::time::Duration;

/// Number of configuration bodies fetched when no limit is given
pub const DEFAULT_MAX_CONFIG_COUNT: usize = 10;

/// Per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Everything a harvest run needs
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    host: String,
    credential: SigningCredential,
    output_dir: PathBuf,
    max_config_count: usize,
    request_timeout: Duration,
}

impl HarvestConfig {
    /// Configuration for `host` with the server-default credential,
    /// the current directory as output and the default limits
    pub fn new(host: &str) -> Result<Self, HarvestError> {
        Ok(Self {
            host: normalize_host(host)?,
            credential: SigningCredential::server_default(),
            output_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            max_config_count: DEFAULT_MAX_CONFIG_COUNT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }

    /// Set the signing credential (builder pattern)
    pub fn with_credential(mut self, credential: SigningCredential) -> Self {
        self.credential = credential;
        self
    }

    /// Set the report directory (builder pattern)
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Set the maximum number of configuration bodies to fetch (builder pattern)
    pub fn with_max_config_count(mut self, max_config_count: usize) -> Self {
        self.max_config_count = max_config_count;
        self
    }

    /// Set the per-request timeout (builder pattern)
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn credential(&self) -> &SigningCredential {
        &self.credential
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    pub fn max_config_count(&self) -> usize {
        self.max_config_count
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Turn a user-supplied host into a base URL
///
/// Adds `http://` when no scheme is given and drops trailing slashes. A path
/// prefix (e.g. behind a reverse proxy) is kept.
pub fn normalize_host(host: &str) -> Result<String, HarvestError> {
    let trimmed = host.trim();
    if trimmed.is_empty() {
        return Err(HarvestError::Config("host must not be empty".to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let url = url::Url::parse(&candidate)
        .map_err(|e| HarvestError::Config(format!("invalid host '{}': {}", host, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(HarvestError::Config(format!(
            "unsupported scheme '{}' in host '{}'",
            url.scheme(),
            host
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(HarvestError::Config(format!("host '{}' has no hostname", host)));
    }

    Ok(candidate.trim_end_matches('/').to_string())
}
