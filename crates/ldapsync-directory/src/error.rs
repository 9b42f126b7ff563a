//! Directory protocol errors.
//!
//! Directory failures never propagate out of the export; they are logged and
//! kept as the client's last error for diagnostics.

use thiserror::Error;

/// Result alias for directory protocol operations.
pub(crate) type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// A failed directory operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{description}")]
pub struct DirectoryError {
    /// LDAP result code, when the server produced one.
    pub code: Option<u32>,
    /// Human-readable description.
    pub description: String,
    /// Diagnostic message supplied by the server, if any.
    pub detail: Option<String>,
}

impl DirectoryError {
    /// Creates an error with an explicit result code.
    #[must_use]
    pub fn new(code: Option<u32>, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            detail: None,
        }
    }

    /// Creates an error from an unstructured error message.
    #[must_use]
    pub fn from_text(raw: &str) -> Self {
        Self::new(None, describe_error_text(raw))
    }

    pub(crate) fn timeout(operation: &str) -> Self {
        Self::new(None, format!("Timed out during {operation}"))
    }

    fn from_result(result: &ldap3::LdapResult) -> Self {
        let text = result.text.trim();
        let description = match result_code_description(result.rc) {
            Some(description) => description.to_string(),
            None if !text.is_empty() => text.to_string(),
            None => format!("LDAP result code {}", result.rc),
        };

        Self {
            code: Some(result.rc),
            description,
            detail: (!text.is_empty()).then(|| text.to_string()),
        }
    }
}

impl From<ldap3::LdapError> for DirectoryError {
    fn from(err: ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { result } => Self::from_result(&result),
            other => Self::from_text(&other.to_string()),
        }
    }
}

/// Pulls the human-readable description out of a stringified error payload.
///
/// Payloads look like `{'info': '...', 'desc': 'Invalid credentials'}`; the
/// text following the `desc` marker is returned without its quotes and
/// closing brace. Text without a marker is returned trimmed.
#[must_use]
pub fn describe_error_text(raw: &str) -> String {
    let Some(position) = raw.find("desc") else {
        return raw.trim().to_string();
    };

    let rest = raw[position + "desc".len()..]
        .trim_start_matches(['\'', '"'])
        .trim_start();
    let rest = rest
        .strip_prefix(':')
        .or_else(|| rest.strip_prefix('='))
        .unwrap_or(rest)
        .trim();

    // A quoted value ends at its matching quote.
    if let Some(quote) = rest.chars().next().filter(|c| *c == '\'' || *c == '"') {
        if let Some(end) = rest[1..].find(quote) {
            return rest[1..=end].to_string();
        }
    }

    let description = rest
        .trim_end_matches('}')
        .trim_matches('"')
        .trim_matches('\'')
        .trim();

    if description.is_empty() {
        raw.trim().to_string()
    } else {
        description.to_string()
    }
}

fn result_code_description(rc: u32) -> Option<&'static str> {
    let description = match rc {
        1 => "Operations error",
        2 => "Protocol error",
        3 => "Time limit exceeded",
        4 => "Size limit exceeded",
        7 => "Authentication method not supported",
        8 => "Strong(er) authentication required",
        10 => "Referral",
        11 => "Administrative limit exceeded",
        12 => "Critical extension is unavailable",
        32 => "No such object",
        34 => "Invalid DN syntax",
        48 => "Inappropriate authentication",
        49 => "Invalid credentials",
        50 => "Insufficient access",
        51 => "Server is busy",
        52 => "Server is unavailable",
        53 => "Server is unwilling to perform",
        80 => "Other (e.g., implementation specific) error",
        _ => return None,
    };
    Some(description)
}
