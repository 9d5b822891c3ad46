use std::fmt;

/// Harvest error type
///
/// Represents every failure that ends a harvest run abnormally. A rejected
/// token is not one of them: it is reported through [`ApiOutcome::AuthRejected`].
#[derive(Debug)]
pub enum HarvestError {
    /// Invalid host, secret or other configuration value
    Config(String),
    /// Token could not be built or verified
    Token(String),
    /// API request failed (network, HTTP, or response parsing error)
    Api(ApiError),
    /// Report file could not be created, written or closed
    Report(std::io::Error),
}

impl fmt::Display for HarvestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarvestError::Config(msg) => write!(f, "Configuration error: {}", msg),
            HarvestError::Token(msg) => write!(f, "Token error: {}", msg),
            HarvestError::Api(err) => write!(f, "API error: {}", err),
            HarvestError::Report(err) => write!(f, "Report error: {}", err),
        }
    }
}

impl std::error::Error for HarvestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HarvestError::Api(err) => Some(err),
            HarvestError::Report(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ApiError> for HarvestError {
    fn from(err: ApiError) -> Self {
        HarvestError::Api(err)
    }
}

impl From<std::io::Error> for HarvestError {
    fn from(err: std::io::Error) -> Self {
        HarvestError::Report(err)
    }
}

impl From<jsonwebtoken::errors::Error> for HarvestError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        HarvestError::Token(err.to_string())
    }
}

/// Failures talking to the configuration service
///
/// A refused token is not an error; see [`ApiOutcome::AuthRejected`].
#[derive(Debug)]
pub enum ApiError {
    /// The server could not be reached or stopped answering
    Network(String),
    /// An endpoint answered with a failure status other than 401/403
    Http {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
    /// A listing endpoint answered with something other than the data envelope
    Parse {
        endpoint: &'static str,
        message: String,
    },
    /// The request URL could not be built
    Request(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::Http {
                endpoint,
                status,
                body,
            } => write!(f, "{} answered HTTP {}: {}", endpoint, status, body),
            ApiError::Parse { endpoint, message } => {
                write!(f, "Unexpected response from {}: {}", endpoint, message)
            }
            ApiError::Request(msg) => write!(f, "Request error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timeout".to_string())
        } else if err.is_connect() {
            ApiError::Network(format!("Connection failed: {}", err))
        } else if err.is_builder() {
            ApiError::Request(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Result of a call the server may refuse because of the token
///
/// The service signals a rejected token by omitting the `data` field (or
/// answering 401/403), not by a transport failure, so rejection is an
/// ordinary value here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiOutcome<T> {
    /// The token was accepted and the call produced data
    Accepted(T),
    /// The token was not accepted
    AuthRejected,
}

impl<T> ApiOutcome<T> {
    /// Whether the server refused the token
    pub fn is_rejected(&self) -> bool {
        matches!(self, ApiOutcome::AuthRejected)
    }

    /// Transform the accepted value, leaving a rejection untouched
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiOutcome<U> {
        match self {
            ApiOutcome::Accepted(value) => ApiOutcome::Accepted(f(value)),
            ApiOutcome::AuthRejected => ApiOutcome::AuthRejected,
        }
    }

    /// The accepted value, if any
    pub fn accepted(self) -> Option<T> {
        match self {
            ApiOutcome::Accepted(value) => Some(value),
            ApiOutcome::AuthRejected => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_map_keeps_rejection() {
        let rejected: ApiOutcome<Vec<u8>> = ApiOutcome::AuthRejected;
        assert!(rejected.map(|v| v.len()).is_rejected());

        let accepted = ApiOutcome::Accepted(vec![1u8, 2, 3]).map(|v| v.len());
        assert_eq!(accepted, ApiOutcome::Accepted(3));
        assert_eq!(accepted.accepted(), Some(3));
    }

    #[test]
    fn test_error_display() {
        let err = HarvestError::from(ApiError::Http {
            endpoint: "/nacos/v2/cs/history/configs",
            status: 500,
            body: "boom".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "API error: /nacos/v2/cs/history/configs answered HTTP 500: boom"
        );

        let err = ApiError::Parse {
            endpoint: "/nacos/v2/console/namespace/list",
            message: "expected value at line 1 column 1".to_string(),
        };
        assert!(err.to_string().starts_with("Unexpected response from /nacos/v2/console/namespace/list"));

        let err = HarvestError::Config("host must not be empty".to_string());
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
