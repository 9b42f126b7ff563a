//! Configuration of the remote synchronisation API.

use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use url::Url;
use validator::Validate;

/// Base URL of the hosted synchronisation API.
pub const DEFAULT_API_URL: &str = "https://admin.mailroute.net";

/// Configuration for submitting an export to the synchronisation API.
#[derive(Debug, Validate)]
pub struct SyncConfig {
    /// API base URL
    #[validate(url)]
    pub api_url: String,

    /// API username (usually an email address)
    #[validate(length(min = 1))]
    pub api_username: String,

    /// API key paired with the username
    pub api_key: SecretString,

    /// Domain whose users are synchronised
    #[validate(length(min = 1))]
    pub domain: String,

    /// Ask the server to validate the data without storing it
    pub test_run: bool,
}

impl SyncConfig {
    /// Create a new configuration for the default API endpoint.
    ///
    /// The domain is normalised with [`normalize_sync_domain`].
    ///
    /// # Errors
    ///
    /// Returns an error if the username or the normalised domain is empty.
    pub fn new(
        api_username: impl Into<String>,
        api_key: impl Into<String>,
        domain: &str,
    ) -> Result<Self, Error> {
        let config = Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_username: api_username.into(),
            api_key: SecretString::from(api_key.into()),
            domain: normalize_sync_domain(domain),
            test_run: false,
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid sync configuration: {e}")))?;

        Ok(config)
    }

    /// Override the API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not valid.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Result<Self, Error> {
        self.api_url = api_url.into();
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid sync configuration: {e}")))?;
        Ok(self)
    }

    /// Mark the submission as a test run.
    #[must_use]
    pub const fn with_test_run(mut self, test_run: bool) -> Self {
        self.test_run = test_run;
        self
    }

    /// Value of the `Authorization` header, `ApiKey <username>:<key>`.
    #[must_use]
    pub fn authorization(&self) -> String {
        format!(
            "ApiKey {}:{}",
            self.api_username,
            self.api_key.expose_secret()
        )
    }

    /// Parse and validate the API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_api_url(&self) -> Result<Url, Error> {
        Url::parse(&self.api_url).map_err(|e| Error::ConfigError(format!("Invalid API URL: {e}")))
    }
}

/// Reduce a user supplied domain to the bare name the API expects.
///
/// Leading and trailing slashes are trimmed, then every `http://` and every
/// `www.` is removed.
#[must_use]
pub fn normalize_sync_domain(raw: &str) -> String {
    raw.trim_matches('/')
        .replace("http://", "")
        .replace("www.", "")
}
