use crate::nacos_api::resources::{ConfigEntry, DataEnvelope, Namespace};
use crate::nacos_api::token::Token;
use crate::nacos_api::types::{ApiError, ApiOutcome, HarvestError};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Namespace listing endpoint (console API)
pub const NAMESPACE_LIST_PATH: &str = "/nacos/v2/console/namespace/list";
/// Per-namespace configuration listing endpoint
pub const CONFIG_LIST_PATH: &str = "/nacos/v2/cs/history/configs";
/// Configuration body endpoint
pub const CONFIG_BODY_PATH: &str = "/nacos/v2/cs/config";

/// Query parameter carrying the access token on every call
const ACCESS_TOKEN_PARAM: &str = "accessToken";

/// Boxed future returned by [`ConfigApi`] calls
pub type ApiFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<ApiOutcome<T>, ApiError>> + Send + 'a>>;

/// Read-only view of the configuration service used by the harvester
///
/// Every call either yields data, reports that the token was rejected, or
/// fails with a transport-level [`ApiError`].
pub trait ConfigApi: Send + Sync {
    /// List namespaces in the order the server returns them
    fn list_namespaces<'a>(&'a self, token: &'a Token) -> ApiFuture<'a, Vec<Namespace>>;

    /// List at most `limit` configuration entries of a namespace
    fn list_configs<'a>(
        &'a self,
        token: &'a Token,
        namespace_id: &'a str,
        limit: usize,
    ) -> ApiFuture<'a, Vec<ConfigEntry>>;

    /// Fetch the raw content of one configuration item
    fn fetch_config_body<'a>(
        &'a self,
        token: &'a Token,
        namespace_id: &'a str,
        data_id: &'a str,
        group: &'a str,
    ) -> ApiFuture<'a, String>;
}

impl<T: ConfigApi + ?Sized> ConfigApi for &T {
    fn list_namespaces<'a>(&'a self, token: &'a Token) -> ApiFuture<'a, Vec<Namespace>> {
        (**self).list_namespaces(token)
    }

    fn list_configs<'a>(
        &'a self,
        token: &'a Token,
        namespace_id: &'a str,
        limit: usize,
    ) -> ApiFuture<'a, Vec<ConfigEntry>> {
        (**self).list_configs(token, namespace_id, limit)
    }

    fn fetch_config_body<'a>(
        &'a self,
        token: &'a Token,
        namespace_id: &'a str,
        data_id: &'a str,
        group: &'a str,
    ) -> ApiFuture<'a, String> {
        (**self).fetch_config_body(token, namespace_id, data_id, group)
    }
}

/// HTTP client for the Nacos administrative API
///
/// The token travels as the `accessToken` query parameter, which is how the
/// server's own console authenticates these endpoints.
#[derive(Debug, Clone)]
pub struct NacosClient {
    /// Normalized server base URL, without trailing slash
    base_url: String,
    /// HTTP client for making requests
    client: reqwest::Client,
}

impl NacosClient {
    /// Create a client with default transport settings
    ///
    /// # Example
    ///
    /// ```no_run
    /// use nacos_harvest::NacosClient;
    ///
    /// let client = NacosClient::new("http://127.0.0.1:8848");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::debug!("Creating NacosClient with base URL: {}", base_url);

        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Create a client whose requests time out after `timeout`
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, HarvestError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HarvestError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!(
            "Creating NacosClient with base URL: {} (timeout: {:?})",
            base_url,
            timeout
        );

        Ok(Self { base_url, client })
    }

    /// Get the base URL for this client
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a GET and hand back status plus body text
    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<(StatusCode, String), ApiError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("Calling API: {}", describe_request(&url, params));

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Request to {} failed: {}", url, e);
                ApiError::from(e)
            })?;

        let status = response.status();
        tracing::debug!("Received response with status: {}", status);

        let body = response.text().await.map_err(|e| {
            tracing::error!("Failed to read response body from {}: {}", url, e);
            ApiError::from(e)
        })?;

        Ok((status, body))
    }

    /// GET a listing endpoint and unwrap its `data` array
    async fn get_listing<T: DeserializeOwned>(
        &self,
        path: &'static str,
        params: &[(&str, &str)],
    ) -> Result<ApiOutcome<Vec<T>>, ApiError> {
        let (status, body) = self.get(path, params).await?;

        if is_auth_status(status) {
            tracing::warn!("{} answered HTTP {}: token rejected", path, status.as_u16());
            return Ok(ApiOutcome::AuthRejected);
        }

        if !status.is_success() {
            tracing::error!("{} failed: HTTP {} - {}", path, status.as_u16(), body);
            return Err(ApiError::Http {
                endpoint: path,
                status: status.as_u16(),
                body,
            });
        }

        let envelope: DataEnvelope<Vec<T>> = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse {} response: {} - Response body: {}", path, e, body);
            ApiError::Parse {
                endpoint: path,
                message: format!("{} - Body: {}", e, body),
            }
        })?;

        match envelope.data {
            Some(data) => Ok(ApiOutcome::Accepted(data)),
            None => {
                tracing::warn!(
                    "{} response has no data field (code={:?}, message={:?}): token rejected",
                    path,
                    envelope.code,
                    envelope.message
                );
                Ok(ApiOutcome::AuthRejected)
            }
        }
    }
}

impl ConfigApi for NacosClient {
    fn list_namespaces<'a>(&'a self, token: &'a Token) -> ApiFuture<'a, Vec<Namespace>> {
        Box::pin(async move {
            let outcome = self
                .get_listing::<Namespace>(NAMESPACE_LIST_PATH, &[(ACCESS_TOKEN_PARAM, token.as_str())])
                .await?;

            if let ApiOutcome::Accepted(namespaces) = &outcome {
                tracing::info!("Listed {} namespaces", namespaces.len());
            }
            Ok(outcome)
        })
    }

    fn list_configs<'a>(
        &'a self,
        token: &'a Token,
        namespace_id: &'a str,
        limit: usize,
    ) -> ApiFuture<'a, Vec<ConfigEntry>> {
        Box::pin(async move {
            let page_size = limit.to_string();
            let params = [
                ("namespaceId", namespace_id),
                ("pageNo", "1"),
                ("pageSize", page_size.as_str()),
                (ACCESS_TOKEN_PARAM, token.as_str()),
            ];

            let outcome = self.get_listing::<ConfigEntry>(CONFIG_LIST_PATH, &params).await?;

            Ok(outcome.map(|mut entries| {
                if entries.len() > limit {
                    tracing::debug!(
                        "Truncating {} configs in namespace '{}' to {}",
                        entries.len(),
                        namespace_id,
                        limit
                    );
                    entries.truncate(limit);
                }
                entries
            }))
        })
    }

    fn fetch_config_body<'a>(
        &'a self,
        token: &'a Token,
        namespace_id: &'a str,
        data_id: &'a str,
        group: &'a str,
    ) -> ApiFuture<'a, String> {
        Box::pin(async move {
            let params = [
                ("dataId", data_id),
                ("group", group),
                ("namespaceId", namespace_id),
                (ACCESS_TOKEN_PARAM, token.as_str()),
            ];

            let (status, body) = self.get(CONFIG_BODY_PATH, &params).await?;

            if is_auth_status(status) {
                tracing::warn!(
                    "Config {}/{} answered HTTP {}: token rejected",
                    group,
                    data_id,
                    status.as_u16()
                );
                return Ok(ApiOutcome::AuthRejected);
            }

            if !status.is_success() {
                // A vanished item must not end the run; keep whatever the server said.
                tracing::warn!(
                    "Config {}/{} in namespace '{}' answered HTTP {}; recording response body",
                    group,
                    data_id,
                    namespace_id,
                    status.as_u16()
                );
            }

            Ok(ApiOutcome::Accepted(body))
        })
    }
}

fn is_auth_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// Render a request for logging with the access token masked
fn describe_request(url: &str, params: &[(&str, &str)]) -> String {
    let query = params
        .iter()
        .map(|(name, value)| {
            if *name == ACCESS_TOKEN_PARAM {
                format!("{}=<redacted>", name)
            } else {
                format!("{}={}", name, value)
            }
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", url, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let client = NacosClient::new("http://127.0.0.1:8848/");
        assert_eq!(client.base_url(), "http://127.0.0.1:8848");
    }

    #[test]
    fn test_describe_request_redacts_token() {
        let described = describe_request(
            "http://h/nacos/v2/cs/config",
            &[("dataId", "app.yaml"), (ACCESS_TOKEN_PARAM, "eyJ.secret.sig")],
        );
        assert_eq!(
            described,
            "http://h/nacos/v2/cs/config?dataId=app.yaml&accessToken=<redacted>"
        );
    }

    #[test]
    fn test_auth_statuses() {
        assert!(is_auth_status(StatusCode::UNAUTHORIZED));
        assert!(is_auth_status(StatusCode::FORBIDDEN));
        assert!(!is_auth_status(StatusCode::NOT_FOUND));
        assert!(!is_auth_status(StatusCode::OK));
    }
}
