//! Configuration types for the directory export.

use crate::Result;
use ldapsync_core::Error;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use validator::Validate;

/// Default LDAP port.
pub const DEFAULT_LDAP_PORT: u16 = 389;
/// Default connection timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 5;
/// Default bind timeout (seconds).
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 5;
/// Default number of entries requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 500;
/// Domain controllers refuse pages above this size.
pub const MAX_PAGE_SIZE: u32 = 1000;
/// Attribute holding the primary email address.
pub const DEFAULT_MAIL_ATTRIBUTE: &str = "mail";
/// Attribute holding alias addresses when none are configured.
pub const DEFAULT_ALIASES_ATTRIBUTE: &str = "proxyAddresses";

/// Exchange search filter: mail-enabled users, groups, public folders and
/// dynamic distribution lists, minus discovery/federated/system mailboxes and
/// contacts.
pub const DEFAULT_USER_FILTER: &str = concat!(
    "(&(mailnickname=*)",
    "(!(mailnickname=discoverysearchmailbox*))",
    "(!(mailnickname=federatedemail*))",
    "(!(mailnickname=systemmailbox*))",
    "(|(objectClass=publicFolder)",
    "(&(objectCategory=person)(objectClass=user)(!(homeMDB=*))(!(msExchHomeServerName=*)))",
    "(&(objectCategory=person)(objectClass=user)(|(homeMDB=*)(msExchHomeServerName=*)))",
    "(objectCategory=person)",
    "(objectCategory=group)",
    "(objectClass=msExchDynamicDistributionList))",
    "(!(objectClass=contact)))"
);

/// Which directory attributes feed the email and alias fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFilter {
    mail_attr: String,
    aliases_attrs: Vec<String>,
}

impl AttributeFilter {
    /// Creates a filter; an empty alias list falls back to `proxyAddresses`.
    #[must_use]
    pub fn new(mail_attr: impl Into<String>, aliases_attrs: Vec<String>) -> Self {
        let aliases_attrs = if aliases_attrs.is_empty() {
            vec![DEFAULT_ALIASES_ATTRIBUTE.to_string()]
        } else {
            aliases_attrs
        };

        Self {
            mail_attr: mail_attr.into(),
            aliases_attrs,
        }
    }

    /// Attribute supplying the primary email.
    #[must_use]
    pub fn mail_attr(&self) -> &str {
        &self.mail_attr
    }

    /// Attributes supplying aliases, in declaration order.
    #[must_use]
    pub fn aliases_attrs(&self) -> &[String] {
        &self.aliases_attrs
    }

    /// Attribute list for the search request: mail first, then aliases, without repeats.
    #[must_use]
    pub fn search_attributes(&self) -> Vec<String> {
        let mut attributes: Vec<String> = Vec::with_capacity(self.aliases_attrs.len() + 1);
        for attribute in std::iter::once(&self.mail_attr).chain(&self.aliases_attrs) {
            if !attributes.contains(attribute) {
                attributes.push(attribute.clone());
            }
        }
        attributes
    }
}

impl Default for AttributeFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MAIL_ATTRIBUTE, Vec::new())
    }
}

/// Configuration for connecting to and searching the directory.
#[derive(Debug, Validate)]
pub struct DirectoryConfig {
    servers: Vec<String>,
    port: u16,
    use_ssl: bool,
    #[validate(length(min = 1))]
    base_dn: String,
    bind_principal: String,
    bind_credential: SecretString,
    #[validate(length(min = 1))]
    user_filter: String,
    attributes: AttributeFilter,
    #[validate(range(min = 1, max = 1000))]
    page_size: u32,
    #[validate(range(min = 1))]
    connection_timeout_secs: u64,
    #[validate(range(min = 1))]
    operation_timeout_secs: u64,
}

impl DirectoryConfig {
    /// Creates a directory configuration with the Exchange defaults.
    ///
    /// `servers` are domain controller host names or addresses, tried in order.
    /// The principal can be a DN (`cn=svc,dc=corp,dc=local`) or a UPN
    /// (`svc@corp.local`).
    ///
    /// # Errors
    ///
    /// Returns an error if the base DN is empty.
    pub fn new(
        servers: Vec<String>,
        base_dn: impl Into<String>,
        bind_principal: impl Into<String>,
        bind_credential: impl Into<String>,
    ) -> Result<Self> {
        let config = Self {
            servers,
            port: DEFAULT_LDAP_PORT,
            use_ssl: false,
            base_dn: base_dn.into(),
            bind_principal: bind_principal.into(),
            bind_credential: SecretString::from(bind_credential.into()),
            user_filter: DEFAULT_USER_FILTER.to_string(),
            attributes: AttributeFilter::default(),
            page_size: DEFAULT_PAGE_SIZE,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        };
        config.check()?;
        Ok(config)
    }

    /// Re-runs validation after builder overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] describing the offending fields, or when
    /// the search filter does not parse.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid directory configuration: {e}")))?;

        ldap3::parse_filter(&self.user_filter).map_err(|_| {
            Error::ConfigError(format!(
                "Invalid directory configuration: unparsable search filter `{}` \
                 (whitespace between filter components is not allowed)",
                self.user_filter
            ))
        })?;

        Ok(())
    }

    /// Candidate server URLs in failover order.
    #[must_use]
    pub fn server_urls(&self) -> Vec<String> {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        self.servers
            .iter()
            .map(|server| format!("{scheme}://{server}:{}", self.port))
            .collect()
    }

    /// Configured domain controllers.
    #[must_use]
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// TCP port used for every server.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Whether connections use LDAPS.
    #[must_use]
    pub const fn use_ssl(&self) -> bool {
        self.use_ssl
    }

    /// Search base.
    #[must_use]
    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    /// Bind principal.
    #[must_use]
    pub fn bind_principal(&self) -> &str {
        &self.bind_principal
    }

    /// Bind password.
    #[must_use]
    pub fn bind_credential(&self) -> &str {
        self.bind_credential.expose_secret()
    }

    /// Search filter.
    #[must_use]
    pub fn user_filter(&self) -> &str {
        &self.user_filter
    }

    /// Attribute mapping.
    #[must_use]
    pub const fn attributes(&self) -> &AttributeFilter {
        &self.attributes
    }

    /// Entries requested per page.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Returns the connection timeout duration.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Returns the bind timeout duration.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Overrides the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enables LDAPS. Server certificates are not verified.
    #[must_use]
    pub const fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    /// Overrides the search filter; `None` keeps the Exchange default.
    #[must_use]
    pub fn with_user_filter(mut self, filter: Option<String>) -> Self {
        if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
            self.user_filter = filter;
        }
        self
    }

    /// Overrides the attribute mapping.
    #[must_use]
    pub fn with_attributes(mut self, attributes: AttributeFilter) -> Self {
        self.attributes = attributes;
        self
    }

    /// Overrides the page size. Call [`check`](Self::check) afterwards.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Overrides the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout_secs(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }

    /// Overrides the bind timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout_secs(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }
}
