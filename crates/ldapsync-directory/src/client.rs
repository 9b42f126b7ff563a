//! Directory session handling and the paged search loop.

use crate::{
    config::DirectoryConfig,
    entry::RawEntry,
    error::{DirectoryError, DirectoryResult},
    search::{PageCursor, SearchPage, SearchRequest},
};
use async_trait::async_trait;
use ldap3::controls::{Control, ControlType, PagedResults};
use ldap3::{LdapConnAsync, LdapConnSettings, Scope};
use native_tls::TlsConnector;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapSession: Send {
    async fn simple_bind(&mut self, principal: &str, credential: &str) -> DirectoryResult<()>;
    async fn search_page(
        &mut self,
        request: &SearchRequest,
        cursor: &PageCursor,
    ) -> DirectoryResult<SearchPage>;
    async fn unbind(&mut self) -> DirectoryResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapConnector: Send + Sync {
    async fn connect(&self, url: &str) -> DirectoryResult<Box<dyn LdapSession>>;
}

/// An authenticated connection to one directory server.
///
/// Returned by [`DirectoryClient::bind`]; [`unbind`](Self::unbind) consumes
/// it, so no search can be issued afterwards.
pub struct DirectorySession {
    inner: Box<dyn LdapSession>,
    server: String,
}

impl DirectorySession {
    pub(crate) fn new(inner: Box<dyn LdapSession>, server: impl Into<String>) -> Self {
        Self {
            inner,
            server: server.into(),
        }
    }

    /// URL of the server this session is bound to.
    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Releases the connection.
    pub async fn unbind(mut self) {
        match self.inner.unbind().await {
            Ok(()) => debug!(server = %self.server, "unbound from directory server"),
            Err(err) => warn!(server = %self.server, "Error unbinding from LDAP server: {err}"),
        }
    }
}

/// Directory client with pluggable LDAP backend.
///
/// Keeps the most recent protocol failure as its last error; bind and search
/// failures are reported through empty results rather than `Err`.
pub struct DirectoryClient {
    config: Arc<DirectoryConfig>,
    connector: Box<dyn LdapConnector>,
    last_error: Option<DirectoryError>,
}

impl DirectoryClient {
    /// Creates a client that uses the real LDAP connector.
    #[must_use]
    pub fn new(config: DirectoryConfig) -> Self {
        let config = Arc::new(config);
        let connector: Box<dyn LdapConnector> = Box::new(RealLdapConnector::new(config.clone()));
        Self {
            config,
            connector,
            last_error: None,
        }
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_connector(config: DirectoryConfig, connector: Box<dyn LdapConnector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
            last_error: None,
        }
    }

    /// Directory configuration in use.
    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Most recent bind or search failure.
    #[must_use]
    pub const fn last_error(&self) -> Option<&DirectoryError> {
        self.last_error.as_ref()
    }

    /// Binds to the first configured server that accepts the credentials.
    ///
    /// Servers are tried in order. Every failure is logged and recorded as the
    /// last error. Returns `None` when the list is empty or every server fails.
    pub async fn bind(&mut self) -> Option<DirectorySession> {
        let servers = self.config.server_urls();
        if servers.is_empty() {
            warn!("no directory servers configured");
            return None;
        }

        if self.config.use_ssl() {
            warn!("TLS certificate verification disabled for directory connections");
        }

        for server in servers {
            match self.bind_server(&server).await {
                Ok(session) => {
                    info!(server = %server, "bound to directory server");
                    return Some(session);
                }
                Err(err) => {
                    warn!(server = %server, "Error connecting to LDAP server: {err}");
                    self.last_error = Some(err);
                }
            }
        }

        None
    }

    /// Runs a paged search and returns every entry collected.
    ///
    /// Pagination ends on an empty cursor, or once `page_size * pages`
    /// reaches `limit`. Any failure discards what was collected so far,
    /// records the last error and yields an empty vector.
    pub async fn fetch_all(
        &mut self,
        session: &mut DirectorySession,
        request: &SearchRequest,
        limit: Option<usize>,
    ) -> Vec<RawEntry> {
        let mut cursor = PageCursor::start();
        let mut entries = Vec::new();
        let mut pages = 0usize;

        loop {
            let page = match session.inner.search_page(request, &cursor).await {
                Ok(page) => page,
                Err(err) => {
                    warn!(page = pages + 1, error = ?err, "Error performing user paged search");
                    self.last_error = Some(err);
                    return Vec::new();
                }
            };

            pages += 1;
            debug!(page = pages, entries = page.entries.len(), "received search page");

            let next = page.next_cursor().cloned();
            entries.extend(page.entries);

            match next {
                Some(next) => cursor = next,
                None => break,
            }

            if request.page_limit_reached(pages, limit) {
                debug!(pages, ?limit, "search limit covered, stopping pagination");
                break;
            }
        }

        entries
    }

    async fn bind_server(&self, server: &str) -> DirectoryResult<DirectorySession> {
        let mut session = self.connector.connect(server).await?;
        session
            .simple_bind(self.config.bind_principal(), self.config.bind_credential())
            .await?;
        Ok(DirectorySession::new(session, server))
    }
}

/// Real LDAP connector backed by `ldap3`.
struct RealLdapConnector {
    config: Arc<DirectoryConfig>,
}

impl RealLdapConnector {
    fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LdapConnector for RealLdapConnector {
    async fn connect(&self, url: &str) -> DirectoryResult<Box<dyn LdapSession>> {
        let settings = build_ldap_settings(&self.config)?;
        let (conn, ldap) = LdapConnAsync::with_settings(settings, url).await?;
        ldap3::drive!(conn);
        Ok(Box::new(RealLdapSession {
            inner: ldap,
            operation_timeout: self.config.operation_timeout(),
        }))
    }
}

struct RealLdapSession {
    inner: ldap3::Ldap,
    operation_timeout: Duration,
}

#[async_trait]
impl LdapSession for RealLdapSession {
    async fn simple_bind(&mut self, principal: &str, credential: &str) -> DirectoryResult<()> {
        timeout(
            self.operation_timeout,
            self.inner.simple_bind(principal, credential),
        )
        .await
        .map_err(|_| DirectoryError::timeout("bind"))??
        .success()?;
        Ok(())
    }

    async fn search_page(
        &mut self,
        request: &SearchRequest,
        cursor: &PageCursor,
    ) -> DirectoryResult<SearchPage> {
        let control = PagedResults {
            size: i32::try_from(request.page_size()).unwrap_or(i32::MAX),
            cookie: cursor.as_bytes().to_vec(),
        };

        let (entries, result) = self
            .inner
            .with_controls(control)
            .search(
                request.base_dn(),
                Scope::Subtree,
                request.filter(),
                request.attributes().to_vec(),
            )
            .await?
            .success()?;

        let cursor = result.ctrls.iter().find_map(|ctrl| match ctrl {
            Control(Some(ControlType::PagedResults), raw) => {
                Some(PageCursor::from(raw.parse::<PagedResults>().cookie))
            }
            _ => None,
        });

        Ok(SearchPage {
            entries: entries.into_iter().map(RawEntry::from).collect(),
            cursor,
        })
    }

    async fn unbind(&mut self) -> DirectoryResult<()> {
        self.inner.unbind().await?;
        Ok(())
    }
}

fn build_ldap_settings(config: &DirectoryConfig) -> DirectoryResult<LdapConnSettings> {
    let mut settings = LdapConnSettings::new().set_conn_timeout(config.connection_timeout());

    if config.use_ssl() {
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|err| {
                DirectoryError::new(None, format!("failed to construct TLS connector: {err}"))
            })?;
        settings = settings.set_connector(connector).set_no_tls_verify(true);
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AttributeEntry;
    use std::collections::HashMap;

    fn sample_config() -> DirectoryConfig {
        DirectoryConfig::new(
            vec!["dc1.corp.local".to_string(), "dc2.corp.local".to_string()],
            "dc=corp,dc=local",
            "svc@corp.local",
            "secret",
        )
        .unwrap()
    }

    fn sample_request() -> SearchRequest {
        SearchRequest::from_config(&sample_config())
    }

    fn entries(prefix: &str, count: usize) -> Vec<RawEntry> {
        (0..count)
            .map(|i| {
                let mut attributes = HashMap::new();
                attributes.insert("mail".to_string(), vec![format!("{prefix}{i}@corp.local")]);
                RawEntry::from(AttributeEntry::new(
                    format!("cn={prefix}{i},dc=corp,dc=local"),
                    attributes,
                ))
            })
            .collect()
    }

    fn page(entries: Vec<RawEntry>, cookie: &[u8]) -> SearchPage {
        SearchPage {
            entries,
            cursor: Some(PageCursor::from(cookie.to_vec())),
        }
    }

    fn invalid_credentials() -> DirectoryError {
        DirectoryError::new(Some(49), "Invalid credentials")
    }

    #[tokio::test]
    async fn bind_with_empty_server_list_fails_without_connecting() {
        let mut connector = MockLdapConnector::new();
        connector.expect_connect().never();

        let config = DirectoryConfig::new(vec![], "dc=corp,dc=local", "svc", "secret").unwrap();
        let mut client = DirectoryClient::with_connector(config, Box::new(connector));

        assert!(client.bind().await.is_none());
        assert!(client.last_error().is_none());
    }

    #[tokio::test]
    async fn bind_fails_over_to_next_server() {
        let mut connector = MockLdapConnector::new();
        connector
            .expect_connect()
            .withf(|url| url == "ldap://dc1.corp.local:389")
            .times(1)
            .returning(|_| {
                Err(DirectoryError::from_text(
                    r#"{'desc': "Can't contact LDAP server"}"#,
                ))
            });

        let mut session = MockLdapSession::new();
        session
            .expect_simple_bind()
            .withf(|principal, credential| principal == "svc@corp.local" && credential == "secret")
            .times(1)
            .returning(|_, _| Ok(()));
        connector
            .expect_connect()
            .withf(|url| url == "ldap://dc2.corp.local:389")
            .times(1)
            .return_once(move |_| Ok(Box::new(session) as Box<dyn LdapSession>));

        let mut client = DirectoryClient::with_connector(sample_config(), Box::new(connector));
        let session = client.bind().await.expect("second server should bind");

        assert_eq!(session.server(), "ldap://dc2.corp.local:389");
        assert_eq!(
            client.last_error().map(|e| e.description.as_str()),
            Some("Can't contact LDAP server")
        );
    }

    #[tokio::test]
    async fn bind_returns_none_when_every_server_rejects() {
        let mut connector = MockLdapConnector::new();
        connector.expect_connect().times(2).returning(|_| {
            let mut session = MockLdapSession::new();
            session
                .expect_simple_bind()
                .returning(|_, _| Err(invalid_credentials()));
            Ok(Box::new(session) as Box<dyn LdapSession>)
        });

        let mut client = DirectoryClient::with_connector(sample_config(), Box::new(connector));

        assert!(client.bind().await.is_none());
        assert_eq!(client.last_error(), Some(&invalid_credentials()));
    }

    #[tokio::test]
    async fn fetch_all_stops_once_pages_cover_limit() {
        let mut inner = MockLdapSession::new();
        let mut pages = vec![
            page(entries("a", 500), b"p2"),
            page(entries("b", 500), b"p3"),
            page(entries("c", 200), b""),
        ]
        .into_iter();
        inner
            .expect_search_page()
            .times(2)
            .returning(move |_, _| Ok(pages.next().unwrap()));

        let mut client =
            DirectoryClient::with_connector(sample_config(), Box::new(MockLdapConnector::new()));
        let mut session = DirectorySession::new(Box::new(inner), "ldap://dc1.corp.local:389");

        let result = client
            .fetch_all(&mut session, &sample_request(), Some(600))
            .await;
        assert_eq!(result.len(), 1000);
    }

    #[tokio::test]
    async fn fetch_all_threads_cookie_until_last_page() {
        let mut inner = MockLdapSession::new();
        inner
            .expect_search_page()
            .withf(|_, cursor| cursor.is_empty())
            .times(1)
            .returning(|_, _| Ok(page(entries("a", 500), b"p2")));
        inner
            .expect_search_page()
            .withf(|_, cursor| cursor.as_bytes() == b"p2")
            .times(1)
            .returning(|_, _| Ok(page(entries("b", 500), b"p3")));
        inner
            .expect_search_page()
            .withf(|_, cursor| cursor.as_bytes() == b"p3")
            .times(1)
            .returning(|_, _| {
                Ok(SearchPage {
                    entries: entries("c", 200),
                    cursor: None,
                })
            });

        let mut client =
            DirectoryClient::with_connector(sample_config(), Box::new(MockLdapConnector::new()));
        let mut session = DirectorySession::new(Box::new(inner), "ldap://dc1.corp.local:389");

        let result = client.fetch_all(&mut session, &sample_request(), None).await;
        assert_eq!(result.len(), 1200);
        assert!(client.last_error().is_none());
    }

    #[tokio::test]
    async fn fetch_all_discards_earlier_pages_on_failure() {
        let mut inner = MockLdapSession::new();
        inner
            .expect_search_page()
            .withf(|_, cursor| cursor.is_empty())
            .times(1)
            .returning(|_, _| Ok(page(entries("a", 500), b"p2")));
        inner
            .expect_search_page()
            .withf(|_, cursor| cursor.as_bytes() == b"p2")
            .times(1)
            .returning(|_, _| Err(DirectoryError::new(Some(4), "Size limit exceeded")));

        let mut client =
            DirectoryClient::with_connector(sample_config(), Box::new(MockLdapConnector::new()));
        let mut session = DirectorySession::new(Box::new(inner), "ldap://dc1.corp.local:389");

        let result = client.fetch_all(&mut session, &sample_request(), None).await;
        assert!(result.is_empty());
        assert_eq!(
            client.last_error().map(|e| e.description.as_str()),
            Some("Size limit exceeded")
        );
    }

    #[tokio::test]
    async fn fetch_all_keeps_referrals_for_the_caller() {
        let mut inner = MockLdapSession::new();
        inner.expect_search_page().times(1).returning(|_, _| {
            let mut batch = entries("a", 2);
            batch.push(RawEntry::Referral);
            Ok(SearchPage {
                entries: batch,
                cursor: None,
            })
        });

        let mut client =
            DirectoryClient::with_connector(sample_config(), Box::new(MockLdapConnector::new()));
        let mut session = DirectorySession::new(Box::new(inner), "ldap://dc1.corp.local:389");

        let result = client.fetch_all(&mut session, &sample_request(), None).await;
        assert_eq!(result.len(), 3);
        assert_eq!(result.iter().filter(|e| e.is_referral()).count(), 1);
    }

    #[tokio::test]
    async fn unbind_consumes_session_and_ignores_errors() {
        let mut inner = MockLdapSession::new();
        inner
            .expect_unbind()
            .times(1)
            .returning(|| Err(DirectoryError::from_text("connection closed")));

        let session = DirectorySession::new(Box::new(inner), "ldap://dc1.corp.local:389");
        session.unbind().await;
    }

    #[test]
    fn ldap_settings_build_for_plain_and_ssl() {
        assert!(build_ldap_settings(&sample_config()).is_ok());
        assert!(build_ldap_settings(&sample_config().with_ssl(true)).is_ok());
    }
}
