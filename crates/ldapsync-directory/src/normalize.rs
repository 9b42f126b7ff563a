//! Record normalisation.
//!
//! A [`FieldNormalizer`] maps raw field values through per-field rules in a
//! fixed header order. [`MailboxNormalizer`] is the `email`/`aliases`
//! instance used by the export, with the self-reference cleanup on top.

use crate::Result;
use ldapsync_core::{Error, NormalizedRecord};
use std::collections::{HashMap, HashSet};

/// Header field carrying the primary address.
pub const EMAIL_FIELD: &str = "email";
/// Header field carrying alias addresses.
pub const ALIASES_FIELD: &str = "aliases";

/// A raw field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Single string value.
    Text(String),
    /// Multi-valued attribute.
    List(Vec<String>),
}

impl FieldValue {
    /// Returns the values as a list; text becomes a one-element list.
    #[must_use]
    pub fn into_list(self) -> Vec<String> {
        match self {
            Self::Text(text) => vec![text],
            Self::List(values) => values,
        }
    }

    /// Returns the value as text; a list yields its first element.
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::List(values) => values.into_iter().next().unwrap_or_default(),
        }
    }

    fn trimmed(self) -> Self {
        match self {
            Self::Text(text) => Self::Text(text.trim().to_string()),
            list @ Self::List(_) => list,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

/// Pure preparation rule applied to one field.
pub type FieldRule = fn(FieldValue) -> FieldValue;

/// Applies per-field rules over a fixed, ordered header.
#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    header: Vec<String>,
    rules: HashMap<String, FieldRule>,
}

impl FieldNormalizer {
    /// Creates a normaliser.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the header names a field more than once.
    pub fn new<I, S>(header: I, rules: HashMap<String, FieldRule>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let header: Vec<String> = header.into_iter().map(Into::into).collect();
        check_header(&header)?;
        Ok(Self { header, rules })
    }

    /// Field names in output order.
    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Replaces the header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] on duplicate names; the old header is kept.
    pub fn set_header<I, S>(&mut self, header: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let header: Vec<String> = header.into_iter().map(Into::into).collect();
        check_header(&header)?;
        self.header = header;
        Ok(())
    }

    /// Normalises one row.
    ///
    /// Text values are trimmed, then the field's rule (if any) is applied.
    /// Output follows header order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] when the row's keys differ from the header.
    pub fn normalize(
        &self,
        mut raw: HashMap<String, FieldValue>,
    ) -> Result<Vec<(String, FieldValue)>> {
        let mut row = Vec::with_capacity(self.header.len());
        for name in &self.header {
            let value = raw
                .remove(name)
                .ok_or_else(|| Error::ValidationError(format!("missing field `{name}`")))?
                .trimmed();
            let value = match self.rules.get(name) {
                Some(rule) => rule(value),
                None => value,
            };
            row.push((name.clone(), value));
        }

        if !raw.is_empty() {
            let mut unexpected: Vec<String> = raw.into_keys().collect();
            unexpected.sort();
            return Err(Error::ValidationError(format!(
                "unexpected fields: {}",
                unexpected.join(", ")
            )));
        }

        Ok(row)
    }
}

fn check_header(header: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<&str> = Vec::new();
    for name in header {
        if !seen.insert(name.as_str()) && !duplicates.contains(&name.as_str()) {
            duplicates.push(name);
        }
    }

    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(Error::ConfigError(format!(
            "header contains duplicated entries: {}",
            duplicates.join(", ")
        )))
    }
}

/// First value, lowercased; empty when there is none.
#[must_use]
pub fn prepare_email(raw: FieldValue) -> FieldValue {
    FieldValue::Text(raw.into_text().to_lowercase())
}

/// Keeps SMTP-style addresses, lowercased, in input order.
///
/// X.400 addresses and values containing a space are dropped. For values
/// tagged `smtp:` (any case) only the part after the first tag is kept.
#[must_use]
pub fn prepare_aliases(raw: FieldValue) -> FieldValue {
    let aliases = raw
        .into_list()
        .into_iter()
        .filter_map(|address| {
            let address = address.to_lowercase();
            if address.contains("x400:") || address.contains(' ') {
                return None;
            }
            match address.split_once("smtp:") {
                Some((_, rest)) => Some(rest.to_string()),
                None => Some(address),
            }
        })
        .collect();
    FieldValue::List(aliases)
}

/// The `email`/`aliases` normaliser used by the export.
#[derive(Debug, Clone)]
pub struct MailboxNormalizer {
    fields: FieldNormalizer,
}

impl MailboxNormalizer {
    /// Creates the normaliser.
    ///
    /// # Errors
    ///
    /// Propagates header validation from [`FieldNormalizer::new`].
    pub fn new() -> Result<Self> {
        let mut rules: HashMap<String, FieldRule> = HashMap::new();
        rules.insert(EMAIL_FIELD.to_string(), prepare_email);
        rules.insert(ALIASES_FIELD.to_string(), prepare_aliases);

        Ok(Self {
            fields: FieldNormalizer::new([EMAIL_FIELD, ALIASES_FIELD], rules)?,
        })
    }

    /// Field names in output order.
    #[must_use]
    pub fn header(&self) -> &[String] {
        self.fields.header()
    }

    /// Normalises a raw `{email, aliases}` mapping.
    ///
    /// Aliases equal to the email, or to its local-part when the email has an
    /// `@`, are removed; remaining duplicates collapse to their first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] if the keys are not exactly `email` and `aliases`.
    pub fn normalize(&self, raw: HashMap<String, FieldValue>) -> Result<NormalizedRecord> {
        let mut email = String::new();
        let mut aliases = Vec::new();
        for (name, value) in self.fields.normalize(raw)? {
            match name.as_str() {
                EMAIL_FIELD => email = value.into_text(),
                ALIASES_FIELD => aliases = value.into_list(),
                _ => {}
            }
        }

        let mut record = NormalizedRecord::new(email, Vec::new());
        let local_part = record.local_part().map(str::to_owned);
        let mut seen = HashSet::new();
        record.aliases = aliases
            .into_iter()
            .filter(|alias| *alias != record.email)
            .filter(|alias| local_part.as_deref() != Some(alias.as_str()))
            .filter(|alias| seen.insert(alias.clone()))
            .collect();

        Ok(record)
    }

    /// Convenience wrapper building the raw mapping from parts.
    ///
    /// # Errors
    ///
    /// See [`normalize`](Self::normalize).
    pub fn normalize_parts(
        &self,
        email: FieldValue,
        aliases: FieldValue,
    ) -> Result<NormalizedRecord> {
        let mut raw = HashMap::with_capacity(2);
        raw.insert(EMAIL_FIELD.to_string(), email);
        raw.insert(ALIASES_FIELD.to_string(), aliases);
        self.normalize(raw)
    }
}
