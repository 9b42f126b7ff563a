//! Asynchronous client for the synchronisation API.

use crate::Result;
use ldapsync_core::client::ClientConfig;
use ldapsync_core::config::SyncConfig;
use ldapsync_core::error::RATE_LIMIT_MESSAGE;
use ldapsync_core::{Error, NormalizedRecord};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, StatusCode};
use tracing::{debug, info};
use url::Url;

const USER_AGENT: &str = concat!("ldapsync/", env!("CARGO_PKG_VERSION"));

/// Path of the remote data endpoint, relative to the API base URL.
pub const REMOTE_DATA_PATH: &str = "api/v1/ldapsync/remote_data/";

/// Builder for [`SyncClient`].
#[derive(Debug)]
pub struct SyncClientBuilder {
    config: SyncConfig,
    http_config: ClientConfig,
}

impl SyncClientBuilder {
    /// Create a builder from a [`SyncConfig`].
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            http_config: ClientConfig::new(),
        }
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, http_config: ClientConfig) -> Self {
        self.http_config = http_config;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API URL is invalid or the HTTP client cannot be built.
    pub fn build(self) -> Result<SyncClient> {
        let endpoint = remote_data_url(&self.config.parse_api_url()?, &self.config)?;

        let http = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(self.http_config.timeout)
            .connect_timeout(self.http_config.connect_timeout)
            .pool_idle_timeout(self.http_config.pool_idle_timeout)
            .pool_max_idle_per_host(self.http_config.pool_max_idle_per_host)
            .build()
            .map_err(|err| {
                Error::ConfigError(format!("Failed to build sync API HTTP client: {err}"))
            })?;

        Ok(SyncClient {
            http,
            endpoint,
            authorization: self.config.authorization(),
            log_requests: self.http_config.enable_logging,
        })
    }
}

/// Client submitting exported records to the synchronisation API.
#[derive(Debug)]
pub struct SyncClient {
    http: Client,
    endpoint: Url,
    authorization: String,
    log_requests: bool,
}

impl SyncClient {
    /// Construct a client with default HTTP settings.
    ///
    /// # Errors
    ///
    /// See [`SyncClientBuilder::build`].
    pub fn new(config: SyncConfig) -> Result<Self> {
        SyncClientBuilder::new(config).build()
    }

    /// Start a builder.
    #[must_use]
    pub fn builder(config: SyncConfig) -> SyncClientBuilder {
        SyncClientBuilder::new(config)
    }

    /// Full submission URL, query string included.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Submit the records in a single POST and return the response body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RateLimited`] on `429`, [`Error::SubmissionFailed`] on
    /// any other non-success status, and a transport error if no response was
    /// received.
    pub async fn submit(&self, records: &[NormalizedRecord]) -> Result<String> {
        let body = serde_json::to_vec(records)?;

        if self.log_requests {
            debug!(
                url = %self.endpoint,
                records = records.len(),
                bytes = body.len(),
                "submitting records"
            );
        }

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, &self.authorization)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(map_status_to_error(status, text));
        }

        info!(status = status.as_u16(), "sync API accepted submission");
        Ok(text)
    }
}

fn remote_data_url(base: &Url, config: &SyncConfig) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    let mut url = base.join(REMOTE_DATA_PATH)?;
    url.query_pairs_mut()
        .append_pair("domain", &config.domain)
        .append_pair("test_run", if config.test_run { "1" } else { "0" });
    Ok(url)
}

fn map_status_to_error(status: StatusCode, text: String) -> Error {
    let reason = status.canonical_reason().unwrap_or_default().to_string();
    match status {
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited {
            status: status.as_u16(),
            reason,
            message: RATE_LIMIT_MESSAGE.to_string(),
        },
        _ => Error::SubmissionFailed {
            status: status.as_u16(),
            reason,
            body: text,
        },
    }
}
