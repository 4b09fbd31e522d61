//! HTTP feed fetcher
//!
//! Plain GET against catalog URLs with a per-request timeout and optional
//! basic authentication. Every fetch runs under a [`RetryPolicy`]; a failure
//! that survives all attempts is returned as [`FetchError::RetriesExhausted`].

use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::AuthConfig;
use crate::utils::error::FetchError;
use crate::utils::retry::{retry, RetryPolicy};

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Feed fetcher shared by every adapter
pub struct FeedFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Basic auth credentials sent with every request
    auth: Option<AuthConfig>,

    /// Retry policy applied to each fetch
    policy: RetryPolicy,
}

impl FeedFetcher {
    /// Create a fetcher with the given request timeout
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(timeout: Duration, auth: Option<AuthConfig>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .user_agent(concat!("catalog-harvester/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            auth,
            policy: RetryPolicy::fetch(),
        })
    }

    /// Replace the retry policy
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch the body at `url`, retrying under the configured policy
    ///
    /// # Errors
    ///
    /// Returns `FetchError::RetriesExhausted` wrapping the last failure when
    /// every attempt failed, or the failure itself if the policy declined to
    /// retry it.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempts = 0;

        let result = retry(&self.policy, || {
            attempts += 1;
            self.fetch_once(url)
        })
        .await;

        result.map_err(|last| {
            if attempts >= self.policy.max_attempts {
                FetchError::RetriesExhausted {
                    attempts,
                    last: Box::new(last),
                }
            } else {
                last
            }
        })
    }

    /// Single GET, no retry
    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

        debug!(url = %parsed, "Fetching feed page");

        let mut request = self.client.get(parsed);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.username, auth.password.as_deref());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        debug!(url, bytes = body.len(), "Fetched feed page");
        Ok(body)
    }
}
