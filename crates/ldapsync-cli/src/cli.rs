//! Command-line arguments.

use clap::Parser;
use ldapsync_core::config::{SyncConfig, DEFAULT_API_URL};
use ldapsync_core::Result;
use ldapsync_directory::{
    AttributeFilter, DirectoryConfig, DEFAULT_LDAP_PORT, DEFAULT_MAIL_ATTRIBUTE, DEFAULT_PAGE_SIZE,
};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ldapsync")]
#[command(version)]
#[command(
    about = "Sync your Active Directory users with the Mailroute user base. \
             Only 2 sync requests per 12 hours allowed.",
    long_about = None
)]
pub struct Cli {
    /// Domain controller addresses, tried in order
    #[arg(
        value_name = "DC",
        required = true,
        num_args = 1..,
        env = "LDAPSYNC_DC_LIST",
        value_delimiter = ','
    )]
    pub dc_list: Vec<String>,

    /// Base DN (e.g. dc=ad,dc=yourdomain,dc=com)
    #[arg(short = 'd', long = "dn", env = "LDAPSYNC_BASE_DN")]
    pub dn: String,

    /// LDAP username (user@domain.com or cn=user,dc=domain,dc=com)
    #[arg(short, long, env = "LDAPSYNC_USER")]
    pub user: String,

    /// LDAP password
    #[arg(short, long, env = "LDAPSYNC_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// API username (user@domain.com)
    #[arg(long = "api-user", env = "LDAPSYNC_API_USER")]
    pub api_user: String,

    /// API key
    #[arg(long = "api-key", env = "LDAPSYNC_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Sync users for this domain
    #[arg(long = "sync-domain", env = "LDAPSYNC_SYNC_DOMAIN")]
    pub sync_domain: String,

    /// Use LDAPS
    #[arg(long, env = "LDAPSYNC_SSL")]
    pub ssl: bool,

    /// LDAP port
    #[arg(long, env = "LDAPSYNC_PORT", default_value_t = DEFAULT_LDAP_PORT)]
    pub port: u16,

    /// Mail attribute
    #[arg(long = "mail-attr", env = "LDAPSYNC_MAIL_ATTR", default_value = DEFAULT_MAIL_ATTRIBUTE)]
    pub mail_attr: String,

    /// Aliases attribute (repeatable; proxyAddresses when omitted)
    #[arg(long = "aliases-attr", env = "LDAPSYNC_ALIASES_ATTRS", value_delimiter = ',')]
    pub aliases_attrs: Vec<String>,

    /// LDAP search filter (leave empty for the MS Exchange default)
    #[arg(long = "search-string", env = "LDAPSYNC_SEARCH_STRING")]
    pub search_string: Option<String>,

    /// Entries requested per search page
    #[arg(
        long = "page-size",
        env = "LDAPSYNC_PAGE_SIZE",
        default_value_t = DEFAULT_PAGE_SIZE,
        value_parser = clap::value_parser!(u32).range(1..=1000)
    )]
    pub page_size: u32,

    /// Log file path; log messages go to stdout when unset
    #[arg(long, env = "LDAPSYNC_LOG")]
    pub log: Option<PathBuf>,

    /// Verbose output
    #[arg(short = 'v', long, env = "LDAPSYNC_VERBOSE")]
    pub verbose: bool,

    /// Test run (data is validated but not saved; API limits are ignored)
    #[arg(long, env = "LDAPSYNC_TEST")]
    pub test: bool,

    /// Synchronisation API base URL
    #[arg(long = "api-url", env = "LDAPSYNC_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,
}

impl Cli {
    /// Directory settings derived from the arguments.
    pub fn directory_config(&self) -> Result<DirectoryConfig> {
        let config = DirectoryConfig::new(
            self.dc_list.clone(),
            self.dn.clone(),
            self.user.clone(),
            self.password.clone(),
        )?
        .with_port(self.port)
        .with_ssl(self.ssl)
        .with_user_filter(self.search_string.clone())
        .with_attributes(AttributeFilter::new(
            self.mail_attr.clone(),
            self.aliases_attrs.clone(),
        ))
        .with_page_size(self.page_size);

        config.check()?;
        Ok(config)
    }

    /// Synchronisation API settings derived from the arguments.
    pub fn sync_config(&self) -> Result<SyncConfig> {
        Ok(
            SyncConfig::new(self.api_user.clone(), self.api_key.clone(), &self.sync_domain)?
                .with_api_url(self.api_url.clone())?
                .with_test_run(self.test),
        )
    }
}
