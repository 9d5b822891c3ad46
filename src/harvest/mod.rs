//! Harvest orchestration.
//!
//! A run walks `TOKEN_READY -> NAMESPACES_LISTED -> ITERATING -> DONE`, with
//! `AUTH_FAILED` as the alternate terminal state whenever the server refuses
//! the token. Each step issues at most one API call, so the budget check in
//! front of every step is the only gate on network traffic.

pub mod budget;

use crate::config::HarvestConfig;
use crate::nacos_api::client::{ConfigApi, NacosClient};
use crate::nacos_api::resources::{ConfigEntry, Namespace};
use crate::nacos_api::token::{forge, SigningCredential, Token};
use crate::nacos_api::types::{ApiOutcome, HarvestError};
use crate::report::ReportWriter;
use budget::HarvestBudget;
use chrono::Local;
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::io::AsyncWrite;

/// Call at which the server refused the token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStage {
    Namespaces,
    Configs { namespace: String },
    ConfigBody { namespace: String, data_id: String },
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestOutcome {
    /// Budget exhausted or everything reachable was fetched
    Completed,
    /// The token was rejected; results recorded before that point are kept
    AuthFailed(AuthStage),
}

/// Result of a finished run
#[derive(Debug, Clone)]
pub struct HarvestSummary {
    pub outcome: HarvestOutcome,
    /// Number of configuration bodies written to the report
    pub recorded: usize,
    pub token: Token,
    pub report_path: Option<PathBuf>,
}

impl HarvestSummary {
    pub fn auth_failed(&self) -> bool {
        matches!(self.outcome, HarvestOutcome::AuthFailed(_))
    }
}

/// Namespaces still to visit plus the entries left in the current one
#[derive(Debug)]
struct Traversal {
    pending: VecDeque<Namespace>,
    current: Option<Namespace>,
    entries: VecDeque<ConfigEntry>,
}

impl Traversal {
    fn new(namespaces: Vec<Namespace>) -> Self {
        Self {
            pending: namespaces.into(),
            current: None,
            entries: VecDeque::new(),
        }
    }
}

/// States after the token has been forged
#[derive(Debug)]
enum HarvestState {
    TokenReady,
    NamespacesListed(Vec<Namespace>),
    Iterating(Traversal),
    Done,
    AuthFailed(AuthStage),
}

/// Callback handed the forged token before any request is sent
pub type TokenObserver = Box<dyn FnOnce(&Token) + Send>;

/// Drives one harvest run against a [`ConfigApi`]
pub struct Harvester<A, W = tokio::fs::File> {
    api: A,
    credential: SigningCredential,
    budget: HarvestBudget,
    report: ReportWriter<W>,
    recorded: usize,
    on_token: Option<TokenObserver>,
}

impl<A, W> Harvester<A, W>
where
    A: ConfigApi,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        api: A,
        credential: SigningCredential,
        max_config_count: usize,
        report: ReportWriter<W>,
    ) -> Self {
        Self {
            api,
            credential,
            budget: HarvestBudget::new(max_config_count),
            report,
            recorded: 0,
            on_token: None,
        }
    }

    /// Observe the forged token as soon as it exists (builder pattern)
    pub fn with_token_observer(mut self, observer: impl FnOnce(&Token) + Send + 'static) -> Self {
        self.on_token = Some(Box::new(observer));
        self
    }

    /// Run to a terminal state
    ///
    /// The report is closed on every exit path, including transport errors.
    pub async fn run(mut self) -> Result<HarvestSummary, HarvestError> {
        let result = self.drive().await;
        let closed = self.report.close().await;

        let (token, outcome) = result?;
        closed?;

        Ok(HarvestSummary {
            outcome,
            recorded: self.recorded,
            token,
            report_path: self.report.path().map(PathBuf::from),
        })
    }

    async fn drive(&mut self) -> Result<(Token, HarvestOutcome), HarvestError> {
        // START -> TOKEN_READY
        let token = forge(&self.credential)?;
        tracing::info!("Token generated for principal '{}'", self.credential.principal());
        if let Some(observer) = self.on_token.take() {
            observer(&token);
        }
        self.report.write_token(&token).await?;

        let mut state = HarvestState::TokenReady;
        loop {
            state = match state {
                HarvestState::TokenReady => self.list_namespaces(&token).await?,
                HarvestState::NamespacesListed(namespaces) => {
                    HarvestState::Iterating(Traversal::new(namespaces))
                }
                HarvestState::Iterating(traversal) => self.advance(&token, traversal).await?,
                HarvestState::Done => {
                    self.report.write_total(self.recorded).await?;
                    tracing::info!("Harvest complete: {} configs retrieved", self.recorded);
                    return Ok((token, HarvestOutcome::Completed));
                }
                HarvestState::AuthFailed(stage) => {
                    self.report.write_auth_failure().await?;
                    tracing::warn!(
                        "Token rejected at {:?} after {} configs; the secret key may be invalid",
                        stage,
                        self.recorded
                    );
                    return Ok((token, HarvestOutcome::AuthFailed(stage)));
                }
            };
        }
    }

    async fn list_namespaces(&mut self, token: &Token) -> Result<HarvestState, HarvestError> {
        match self.api.list_namespaces(token).await? {
            ApiOutcome::Accepted(namespaces) => {
                self.report.write_namespaces_listed().await?;
                Ok(HarvestState::NamespacesListed(namespaces))
            }
            ApiOutcome::AuthRejected => Ok(HarvestState::AuthFailed(AuthStage::Namespaces)),
        }
    }

    /// One ITERATING step: fetch the next entry, or list the next namespace
    async fn advance(
        &mut self,
        token: &Token,
        mut traversal: Traversal,
    ) -> Result<HarvestState, HarvestError> {
        if self.budget.is_exhausted() {
            return Ok(HarvestState::Done);
        }

        if let Some(namespace) = traversal.current.clone() {
            if let Some(entry) = traversal.entries.pop_front() {
                return self.fetch_entry(token, namespace, entry, traversal).await;
            }
        }

        let Some(namespace) = traversal.pending.pop_front() else {
            return Ok(HarvestState::Done);
        };

        let limit = self.budget.remaining();
        tracing::info!(
            "Listing configs in namespace '{}' (limit {})",
            namespace.label(),
            limit
        );

        match self.api.list_configs(token, &namespace.id, limit).await? {
            ApiOutcome::Accepted(entries) => {
                traversal.entries = entries.into_iter().take(limit).collect();
                traversal.current = Some(namespace);
                Ok(HarvestState::Iterating(traversal))
            }
            ApiOutcome::AuthRejected => Ok(HarvestState::AuthFailed(AuthStage::Configs {
                namespace: namespace.id,
            })),
        }
    }

    async fn fetch_entry(
        &mut self,
        token: &Token,
        namespace: Namespace,
        entry: ConfigEntry,
        traversal: Traversal,
    ) -> Result<HarvestState, HarvestError> {
        let outcome = self
            .api
            .fetch_config_body(token, &namespace.id, &entry.data_id, &entry.group)
            .await?;

        match outcome {
            ApiOutcome::Accepted(content) => {
                self.report.write_entry(&namespace, &entry, &content).await?;
                self.budget.consume();
                self.recorded += 1;
                tracing::debug!(
                    "Recorded {}/{} from namespace '{}' ({} left in budget)",
                    entry.group,
                    entry.data_id,
                    namespace.label(),
                    self.budget.remaining()
                );
                Ok(HarvestState::Iterating(traversal))
            }
            ApiOutcome::AuthRejected => Ok(HarvestState::AuthFailed(AuthStage::ConfigBody {
                namespace: namespace.id,
                data_id: entry.data_id,
            })),
        }
    }
}

/// Run a full harvest described by `config` against the live service
///
/// # Example
///
/// ```no_run
/// use nacos_harvest::{harvest, HarvestConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = HarvestConfig::new("http://127.0.0.1:8848")?
///     .with_output_dir("/tmp/reports")
///     .with_max_config_count(5);
/// let summary = harvest(&config).await?;
/// println!("{} configs retrieved", summary.recorded);
/// # Ok(())
/// # }
/// ```
pub async fn harvest(config: &HarvestConfig) -> Result<HarvestSummary, HarvestError> {
    harvest_with(config, |_| {}).await
}

/// [`harvest`], handing the forged token to `on_token` before the first request
pub async fn harvest_with(
    config: &HarvestConfig,
    on_token: impl FnOnce(&Token) + Send + 'static,
) -> Result<HarvestSummary, HarvestError> {
    let client = NacosClient::with_timeout(config.host(), config.request_timeout())?;
    let report = ReportWriter::create(config.output_dir(), Local::now()).await?;

    tracing::info!(
        "Harvesting up to {} configs from {}",
        config.max_config_count(),
        client.base_url()
    );

    Harvester::new(
        client,
        config.credential().clone(),
        config.max_config_count(),
        report,
    )
    .with_token_observer(on_token)
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nacos_api::client::ApiFuture;
    use crate::nacos_api::types::ApiError;
    use crate::report::AUTH_FAILURE_LINE;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// In-memory service that records every call it receives
    #[derive(Default)]
    struct FakeApi {
        namespaces: Option<Vec<Namespace>>,
        configs: HashMap<String, Option<Vec<ConfigEntry>>>,
        reject_bodies: bool,
        fail_bodies: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.calls().iter().filter(|c| c.starts_with(prefix)).count()
        }

        fn with_namespace(mut self, id: &str, count: usize) -> Self {
            let entries = (0..count)
                .map(|i| ConfigEntry::new(format!("{}-{}.yaml", id, i), "DEFAULT_GROUP"))
                .collect();
            self.namespaces
                .get_or_insert_with(Vec::new)
                .push(Namespace::new(id));
            self.configs.insert(id.to_string(), Some(entries));
            self
        }
    }

    impl ConfigApi for FakeApi {
        fn list_namespaces<'a>(&'a self, _token: &'a Token) -> ApiFuture<'a, Vec<Namespace>> {
            Box::pin(async move {
                self.calls.lock().unwrap().push("namespaces".to_string());
                Ok(match &self.namespaces {
                    Some(namespaces) => ApiOutcome::Accepted(namespaces.clone()),
                    None => ApiOutcome::AuthRejected,
                })
            })
        }

        fn list_configs<'a>(
            &'a self,
            _token: &'a Token,
            namespace_id: &'a str,
            limit: usize,
        ) -> ApiFuture<'a, Vec<ConfigEntry>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push(format!("configs:{}:{}", namespace_id, limit));
                Ok(match self.configs.get(namespace_id).cloned().flatten() {
                    Some(entries) => ApiOutcome::Accepted(entries),
                    None => ApiOutcome::AuthRejected,
                })
            })
        }

        fn fetch_config_body<'a>(
            &'a self,
            _token: &'a Token,
            namespace_id: &'a str,
            data_id: &'a str,
            _group: &'a str,
        ) -> ApiFuture<'a, String> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push(format!("body:{}:{}", namespace_id, data_id));
                if self.fail_bodies {
                    return Err(ApiError::Network("Connection failed: refused".to_string()));
                }
                if self.reject_bodies {
                    return Ok(ApiOutcome::AuthRejected);
                }
                Ok(ApiOutcome::Accepted(format!("content of {}", data_id)))
            })
        }
    }

    async fn run_with(
        api: &FakeApi,
        max: usize,
        dir: &TempDir,
    ) -> (Result<HarvestSummary, HarvestError>, String) {
        let report = ReportWriter::create(dir.path(), Local::now()).await.unwrap();
        let path = report.path().unwrap().to_path_buf();
        let credential = SigningCredential::server_default();

        let result = Harvester::new(api, credential, max, report).run().await;
        let content = std::fs::read_to_string(path).unwrap();
        (result, content)
    }

    #[tokio::test]
    async fn test_budget_caps_fetches_across_namespaces() {
        let api = FakeApi::default()
            .with_namespace("alpha", 8)
            .with_namespace("beta", 8)
            .with_namespace("gamma", 8);
        let dir = TempDir::new().unwrap();

        let (result, content) = run_with(&api, 10, &dir).await;
        let summary = result.unwrap();

        assert_eq!(summary.outcome, HarvestOutcome::Completed);
        assert_eq!(summary.recorded, 10);
        assert_eq!(api.count("body:"), 10);
        assert_eq!(api.count("body:beta:"), 2);
        // gamma is never listed: the budget ran out inside beta
        let listings: Vec<String> = api
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("configs:"))
            .collect();
        assert_eq!(listings, vec!["configs:alpha:10", "configs:beta:2"]);
        assert!(content.ends_with("Total configs retrieved: 10\n"));
    }

    #[tokio::test]
    async fn test_traversal_preserves_server_order() {
        let api = FakeApi::default()
            .with_namespace("zeta", 2)
            .with_namespace("alpha", 1);
        let dir = TempDir::new().unwrap();

        let (result, _) = run_with(&api, 10, &dir).await;
        assert_eq!(result.unwrap().recorded, 3);
        assert_eq!(
            api.calls(),
            vec![
                "namespaces",
                "configs:zeta:10",
                "body:zeta:zeta-0.yaml",
                "body:zeta:zeta-1.yaml",
                "configs:alpha:8",
                "body:alpha:alpha-0.yaml",
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_namespaces_stop_everything() {
        let api = FakeApi::default();
        let dir = TempDir::new().unwrap();

        let (result, content) = run_with(&api, 10, &dir).await;
        let summary = result.unwrap();

        assert_eq!(summary.outcome, HarvestOutcome::AuthFailed(AuthStage::Namespaces));
        assert!(summary.auth_failed());
        assert_eq!(summary.recorded, 0);
        assert_eq!(api.calls(), vec!["namespaces"]);
        assert!(content.ends_with(&format!("\n\n{}\n", AUTH_FAILURE_LINE)));
        assert!(!content.contains("Total configs retrieved"));
    }

    #[tokio::test]
    async fn test_zero_budget_lists_namespaces_only() {
        let api = FakeApi::default().with_namespace("demo", 3);
        let dir = TempDir::new().unwrap();

        let (result, content) = run_with(&api, 0, &dir).await;
        assert_eq!(result.unwrap().recorded, 0);
        assert_eq!(api.calls(), vec!["namespaces"]);
        assert!(content.ends_with("Namespaces retrieved successfully.\nTotal configs retrieved: 0\n"));
    }

    #[tokio::test]
    async fn test_rejected_config_listing_keeps_earlier_entries() {
        let mut api = FakeApi::default().with_namespace("alpha", 2);
        api.namespaces.as_mut().unwrap().push(Namespace::new("locked"));
        api.configs.insert("locked".to_string(), None);
        let dir = TempDir::new().unwrap();

        let (result, content) = run_with(&api, 10, &dir).await;
        let summary = result.unwrap();

        assert_eq!(
            summary.outcome,
            HarvestOutcome::AuthFailed(AuthStage::Configs {
                namespace: "locked".to_string()
            })
        );
        assert_eq!(summary.recorded, 2);
        assert_eq!(content.matches("-------------------\n").count(), 2);
        assert!(content.ends_with(&format!("-------------------\n{}\n", AUTH_FAILURE_LINE)));
    }

    #[tokio::test]
    async fn test_rejected_body_ends_run() {
        let mut api = FakeApi::default().with_namespace("demo", 3);
        api.reject_bodies = true;
        let dir = TempDir::new().unwrap();

        let (result, _) = run_with(&api, 10, &dir).await;
        let summary = result.unwrap();
        assert_eq!(
            summary.outcome,
            HarvestOutcome::AuthFailed(AuthStage::ConfigBody {
                namespace: "demo".to_string(),
                data_id: "demo-0.yaml".to_string()
            })
        );
        assert_eq!(api.count("body:"), 1);
    }

    #[tokio::test]
    async fn test_transport_error_still_closes_report() {
        let mut api = FakeApi::default().with_namespace("demo", 3);
        api.fail_bodies = true;
        let dir = TempDir::new().unwrap();

        let (result, content) = run_with(&api, 10, &dir).await;
        assert!(matches!(result, Err(HarvestError::Api(ApiError::Network(_)))));
        assert!(content.starts_with("Token generated: "));
        assert!(content.ends_with("Namespaces retrieved successfully.\n"));
    }

    #[tokio::test]
    async fn test_token_observed_before_failed_request() {
        let mut api = FakeApi::default().with_namespace("demo", 1);
        api.fail_bodies = true;
        let dir = TempDir::new().unwrap();
        let report = ReportWriter::create(dir.path(), Local::now()).await.unwrap();
        let path = report.path().unwrap().to_path_buf();

        let seen = Arc::new(Mutex::new(None::<String>));
        let sink = Arc::clone(&seen);
        let result = Harvester::new(&api, SigningCredential::server_default(), 10, report)
            .with_token_observer(move |token| {
                *sink.lock().unwrap() = Some(token.to_string());
            })
            .run()
            .await;

        assert!(result.is_err());
        let token = seen.lock().unwrap().clone().expect("observer not called");
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.starts_with(&format!("Token generated: {}\n", token)));
    }
}
