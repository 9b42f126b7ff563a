//! Mailbox export: bind, search, normalise.

use crate::{
    client::DirectoryClient,
    entry::AttributeEntry,
    error::DirectoryError,
    normalize::{FieldValue, MailboxNormalizer},
    search::SearchRequest,
};
use crate::Result;
use ldapsync_core::NormalizedRecord;
use tracing::{debug, info, warn};

/// Produces normalised mailbox records from the directory.
pub struct Exporter {
    client: DirectoryClient,
    normalizer: MailboxNormalizer,
}

impl Exporter {
    /// Wraps a directory client.
    ///
    /// # Errors
    ///
    /// Returns an error if the record normaliser cannot be built.
    pub fn new(client: DirectoryClient) -> Result<Self> {
        Ok(Self {
            client,
            normalizer: MailboxNormalizer::new()?,
        })
    }

    /// Most recent directory failure seen while exporting.
    #[must_use]
    pub const fn last_error(&self) -> Option<&DirectoryError> {
        self.client.last_error()
    }

    /// Exports up to `limit` records using the configured page size.
    ///
    /// `None` and `Some(0)` both export every record.
    pub async fn export(&mut self, limit: Option<usize>) -> Vec<NormalizedRecord> {
        let request = SearchRequest::from_config(self.client.config());
        self.run(&request, limit).await
    }

    /// Exports up to `limit` records requesting `page_size` entries per page.
    pub async fn export_with_page_size(
        &mut self,
        limit: Option<usize>,
        page_size: u32,
    ) -> Vec<NormalizedRecord> {
        let request = SearchRequest::from_config(self.client.config()).with_page_size(page_size);
        self.run(&request, limit).await
    }

    async fn run(&mut self, request: &SearchRequest, limit: Option<usize>) -> Vec<NormalizedRecord> {
        let limit = limit.filter(|limit| *limit > 0);

        let Some(mut session) = self.client.bind().await else {
            return Vec::new();
        };

        let entries = self.client.fetch_all(&mut session, request, limit).await;
        session.unbind().await;
        debug!(entries = entries.len(), "directory search finished");

        let mut records = Vec::new();
        for entry in entries.into_iter().filter_map(|entry| entry.into_attributes()) {
            if limit.is_some_and(|limit| records.len() >= limit) {
                break;
            }
            if let Some(record) = self.record_from_entry(&entry) {
                records.push(record);
            }
        }

        info!(records = records.len(), "exported mailbox records");
        records
    }

    fn record_from_entry(&self, entry: &AttributeEntry) -> Option<NormalizedRecord> {
        let attributes = self.client.config().attributes();

        let mail = entry
            .values(attributes.mail_attr())
            .filter(|values| !values.is_empty())?;

        let mut aliases: Vec<String> = Vec::new();
        for attribute in attributes.aliases_attrs() {
            for alias in entry.values(attribute).unwrap_or_default() {
                if !aliases.contains(alias) {
                    aliases.push(alias.clone());
                }
            }
        }

        match self
            .normalizer
            .normalize_parts(FieldValue::List(mail.to_vec()), FieldValue::List(aliases))
        {
            Ok(record) if record.email.is_empty() => None,
            Ok(record) => Some(record),
            Err(err) => {
                warn!(dn = %entry.dn, "skipping entry that failed normalisation: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{LdapSession, MockLdapConnector, MockLdapSession};
    use crate::config::{AttributeFilter, DirectoryConfig};
    use crate::entry::RawEntry;
    use crate::search::{PageCursor, SearchPage};
    use std::collections::HashMap;

    fn entry(dn: &str, attributes: &[(&str, &[&str])]) -> RawEntry {
        let attributes: HashMap<String, Vec<String>> = attributes
            .iter()
            .map(|(name, values)| {
                (
                    (*name).to_string(),
                    values.iter().map(|v| (*v).to_string()).collect(),
                )
            })
            .collect();
        RawEntry::from(AttributeEntry::new(dn, attributes))
    }

    fn config() -> DirectoryConfig {
        DirectoryConfig::new(
            vec!["dc1.co.com".to_string()],
            "dc=co,dc=com",
            "svc@co.com",
            "secret",
        )
        .unwrap()
    }

    /// Exporter whose single server returns `pages` in order.
    fn exporter_with_pages(config: DirectoryConfig, pages: Vec<SearchPage>) -> Exporter {
        let mut connector = MockLdapConnector::new();
        connector.expect_connect().times(1).return_once(move |_| {
            let mut session = MockLdapSession::new();
            session.expect_simple_bind().returning(|_, _| Ok(()));
            let mut pages = pages.into_iter();
            session
                .expect_search_page()
                .returning(move |_, _| Ok(pages.next().unwrap()));
            session.expect_unbind().times(1).returning(|| Ok(()));
            Ok(Box::new(session) as Box<dyn LdapSession>)
        });

        Exporter::new(DirectoryClient::with_connector(config, Box::new(connector))).unwrap()
    }

    fn last_page(entries: Vec<RawEntry>) -> SearchPage {
        SearchPage {
            entries,
            cursor: None,
        }
    }

    #[tokio::test]
    async fn export_normalizes_and_skips_entries_without_mail() {
        let page = last_page(vec![
            entry(
                "cn=alice,dc=co,dc=com",
                &[
                    ("mail", &["Alice@Co.com"]),
                    ("proxyAddresses", &["smtp:alice.alt@co.com", "x400:garbage"]),
                ],
            ),
            entry("cn=printer,dc=co,dc=com", &[("cn", &["printer"])]),
        ]);
        let mut exporter = exporter_with_pages(config(), vec![page]);

        let records = exporter.export(None).await;
        assert_eq!(
            serde_json::to_string(&records).unwrap(),
            r#"[{"email":"alice@co.com","aliases":["alice.alt@co.com"]}]"#
        );
    }

    #[tokio::test]
    async fn export_skips_referrals_and_empty_mail() {
        let page = last_page(vec![
            RawEntry::Referral,
            entry("cn=empty,dc=co,dc=com", &[("mail", &[])]),
            entry("cn=blank,dc=co,dc=com", &[("mail", &[""])]),
            entry("cn=bob,dc=co,dc=com", &[("mail", &["bob@co.com"])]),
        ]);
        let mut exporter = exporter_with_pages(config(), vec![page]);

        let records = exporter.export(None).await;
        assert_eq!(records, vec![NormalizedRecord::new("bob@co.com", Vec::new())]);
    }

    #[tokio::test]
    async fn export_merges_alias_attributes_in_order() {
        let config = config().with_attributes(AttributeFilter::new(
            "mail",
            vec!["proxyAddresses".to_string(), "otherMailbox".to_string()],
        ));
        let page = last_page(vec![entry(
            "cn=carol,dc=co,dc=com",
            &[
                ("mail", &["carol@co.com"]),
                ("proxyAddresses", &["SMTP:carol@co.com", "smtp:c@co.com"]),
                ("otherMailbox", &["smtp:c@co.com", "carol.b@co.com", "CAROL"]),
            ],
        )]);
        let mut exporter = exporter_with_pages(config, vec![page]);

        let records = exporter.export(None).await;
        assert_eq!(
            records,
            vec![NormalizedRecord::new(
                "carol@co.com",
                vec!["c@co.com".to_string(), "carol.b@co.com".to_string()]
            )]
        );
    }

    #[tokio::test]
    async fn export_cuts_output_at_limit() {
        let batch = (0..5)
            .map(|i| {
                entry(
                    &format!("cn=user{i},dc=co,dc=com"),
                    &[("mail", &[format!("user{i}@co.com").as_str()])],
                )
            })
            .collect();
        let mut exporter = exporter_with_pages(config(), vec![last_page(batch)]);

        let records = exporter.export_with_page_size(Some(3), 10).await;
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].email, "user2@co.com");
    }

    #[tokio::test]
    async fn zero_limit_exports_everything() {
        let batch = (0..4)
            .map(|i| {
                entry(
                    &format!("cn=user{i},dc=co,dc=com"),
                    &[("mail", &[format!("user{i}@co.com").as_str()])],
                )
            })
            .collect();
        let pages = vec![
            SearchPage {
                entries: batch,
                cursor: Some(PageCursor::from(b"p2".to_vec())),
            },
            last_page(vec![entry("cn=last,dc=co,dc=com", &[("mail", &["last@co.com"])])]),
        ];
        let mut exporter = exporter_with_pages(config(), pages);

        let records = exporter.export_with_page_size(Some(0), 4).await;
        assert_eq!(records.len(), 5);
        assert_eq!(records[4].email, "last@co.com");
    }

    #[tokio::test]
    async fn export_returns_nothing_when_bind_fails() {
        let mut connector = MockLdapConnector::new();
        connector.expect_connect().times(1).returning(|_| {
            let mut session = MockLdapSession::new();
            session
                .expect_simple_bind()
                .returning(|_, _| Err(DirectoryError::new(Some(49), "Invalid credentials")));
            Ok(Box::new(session) as Box<dyn LdapSession>)
        });
        let mut exporter =
            Exporter::new(DirectoryClient::with_connector(config(), Box::new(connector))).unwrap();

        assert!(exporter.export(None).await.is_empty());
        assert_eq!(
            exporter.last_error().and_then(|e| e.code),
            Some(49)
        );
    }
}
