//! Search result entries.

use ldap3::{ResultEntry, SearchEntry};
use std::collections::HashMap;

/// An entry carrying attribute values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map (values preserve server order).
    pub attributes: HashMap<String, Vec<String>>,
}

impl AttributeEntry {
    /// Creates an entry from its DN and attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>, attributes: HashMap<String, Vec<String>>) -> Self {
        Self {
            dn: dn.into(),
            attributes,
        }
    }

    /// Returns all values for the attribute.
    ///
    /// Attribute names are case-insensitive in LDAP; an exact match wins,
    /// otherwise the first case-insensitive match is used.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes
            .get(attribute)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
                    .map(|(_, values)| values)
            })
            .map(Vec::as_slice)
    }

    /// Returns the first value of the attribute if present.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.values(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }
}

/// A raw search result, discriminated when the protocol response is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEntry {
    /// Regular entry with attributes.
    Attributes(AttributeEntry),
    /// Search continuation reference or intermediate message; carries no attributes.
    Referral,
}

impl RawEntry {
    /// Returns true for referral/control entries.
    #[must_use]
    pub const fn is_referral(&self) -> bool {
        matches!(self, Self::Referral)
    }

    /// Borrows the attribute entry, if any.
    #[must_use]
    pub const fn as_attributes(&self) -> Option<&AttributeEntry> {
        match self {
            Self::Attributes(entry) => Some(entry),
            Self::Referral => None,
        }
    }

    /// Consumes the entry, keeping only attribute entries.
    #[must_use]
    pub fn into_attributes(self) -> Option<AttributeEntry> {
        match self {
            Self::Attributes(entry) => Some(entry),
            Self::Referral => None,
        }
    }
}

impl From<AttributeEntry> for RawEntry {
    fn from(entry: AttributeEntry) -> Self {
        Self::Attributes(entry)
    }
}

impl From<ResultEntry> for RawEntry {
    fn from(entry: ResultEntry) -> Self {
        if entry.is_ref() || entry.is_intermediate() {
            return Self::Referral;
        }
        let entry = SearchEntry::construct(entry);
        Self::Attributes(AttributeEntry::new(entry.dn, entry.attrs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> AttributeEntry {
        let mut attributes = HashMap::new();
        attributes.insert("mail".to_string(), vec!["Alice@Co.com".to_string()]);
        attributes.insert(
            "proxyAddresses".to_string(),
            vec!["SMTP:Alice@Co.com".to_string(), "smtp:a@co.com".to_string()],
        );
        AttributeEntry::new("cn=alice,dc=co,dc=com", attributes)
    }

    #[test]
    fn values_prefer_exact_name() {
        let entry = sample_entry();
        assert_eq!(entry.values("proxyAddresses").map(<[String]>::len), Some(2));
        assert_eq!(entry.first("mail"), Some("Alice@Co.com"));
    }

    #[test]
    fn values_fall_back_to_case_insensitive_name() {
        let entry = sample_entry();
        assert_eq!(entry.values("proxyaddresses").map(<[String]>::len), Some(2));
        assert_eq!(entry.first("MAIL"), Some("Alice@Co.com"));
        assert!(entry.values("otherMailbox").is_none());
    }

    #[test]
    fn referral_has_no_attributes() {
        assert!(RawEntry::Referral.is_referral());
        assert!(RawEntry::Referral.as_attributes().is_none());
        assert!(RawEntry::Referral.into_attributes().is_none());

        let raw = RawEntry::from(sample_entry());
        assert!(!raw.is_referral());
        assert_eq!(raw.into_attributes(), Some(sample_entry()));
    }
}
