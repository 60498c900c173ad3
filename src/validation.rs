//! Name and key checks applied to the `metadata` block before anything is
//! sent to the API server. Formats follow the apimachinery validation rules.
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

// DNS1123LabelMaxLength is a label's max length in DNS (RFC 1123)
const DNS_1123_LABEL_MAX_LEN: usize = 63;
// DNS1123SubdomainMaxLength is a subdomain's max length in DNS (RFC 1123)
const DNS_1123_SUBDOMAIN_MAX_LEN: usize = 253;
const DNS_1123_LABEL_FMT: &str = "[a-z0-9]([-a-z0-9]*[a-z0-9])?";
const DNS_1123_LABEL_ERR_MSG: &str = "a lowercase RFC 1123 label must consist of lower case alphanumeric characters or '-', and must start and end with an alphanumeric character";
const DNS_1123_SUBDOMAIN_ERR_MSG: &str = "a lowercase RFC 1123 subdomain must consist of lower case alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character";

const QUALIFIED_NAME_MAX_LEN: usize = 63;
const QUALIFIED_NAME_FMT: &str = "([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]";
const QUALIFIED_NAME_ERR_MSG: &str = "must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character";

const LABEL_VALUE_MAX_LEN: usize = 63;
const LABEL_VALUE_ERR_MSG: &str = "a valid label must be an empty string or consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character";

static DNS_1123_LABEL: LazyLock<Regex> = LazyLock::new(|| anchored(DNS_1123_LABEL_FMT));
static DNS_1123_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    anchored(&format!(
        "{DNS_1123_LABEL_FMT}(\\.{DNS_1123_LABEL_FMT})*"
    ))
});
static QUALIFIED_NAME: LazyLock<Regex> = LazyLock::new(|| anchored(QUALIFIED_NAME_FMT));

fn anchored(pattern: &str) -> Regex {
    // Patterns are compile-time constants.
    Regex::new(&format!("^{pattern}$")).expect("invalid validation pattern")
}

/// How a kind's `metadata.name` is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRule {
    /// RFC 1123 subdomain, the rule for most kinds.
    Subdomain,
    /// RFC 1123 label, e.g. namespaces.
    Label,
    /// Anything usable as a URL path segment, e.g. RBAC roles like `system:viewer`.
    PathSegment,
}

impl NameRule {
    pub fn check(self, attribute: &str, value: &str) -> Result<()> {
        match self {
            NameRule::Subdomain => is_dns_1123_subdomain(value),
            NameRule::Label => is_dns_1123_label(value),
            NameRule::PathSegment => is_path_segment_name(value),
        }
        .map_err(|message| Error::validation(attribute, format!("{value:?}: {message}")))
    }

    /// Validate a `generate_name` prefix. The server appends a random suffix,
    /// so a trailing '-' is allowed.
    pub fn check_prefix(self, attribute: &str, value: &str) -> Result<()> {
        let trimmed = value.strip_suffix('-').unwrap_or(value);
        if trimmed.is_empty() {
            return Err(Error::validation(attribute, "prefix must not be empty"));
        }
        self.check(attribute, trimmed)
    }
}

pub fn is_dns_1123_label(value: &str) -> Result<(), String> {
    if value.len() > DNS_1123_LABEL_MAX_LEN {
        Err(format!(
            "must be no more than {DNS_1123_LABEL_MAX_LEN} characters"
        ))
    } else if !DNS_1123_LABEL.is_match(value) {
        Err(DNS_1123_LABEL_ERR_MSG.to_string())
    } else {
        Ok(())
    }
}

pub fn is_dns_1123_subdomain(value: &str) -> Result<(), String> {
    if value.len() > DNS_1123_SUBDOMAIN_MAX_LEN {
        Err(format!(
            "must be no more than {DNS_1123_SUBDOMAIN_MAX_LEN} characters"
        ))
    } else if !DNS_1123_SUBDOMAIN.is_match(value) {
        Err(DNS_1123_SUBDOMAIN_ERR_MSG.to_string())
    } else {
        Ok(())
    }
}

pub fn is_path_segment_name(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("must not be empty".to_string());
    }
    if value == "." || value == ".." {
        return Err(format!("may not be '{value}'"));
    }
    match value.chars().find(|c| *c == '/' || *c == '%') {
        Some(c) => Err(format!("may not contain '{c}'")),
        None => Ok(()),
    }
}

/// Tests whether the value is what Kubernetes calls a "qualified name":
/// an optional DNS subdomain prefix and '/', followed by a name.
/// Label and annotation keys use this format.
pub fn is_qualified_name(value: &str) -> Result<(), String> {
    let name = match value.split_once('/') {
        None => value,
        Some((prefix, name)) => {
            if prefix.is_empty() {
                return Err("prefix part must not be empty".to_string());
            }
            is_dns_1123_subdomain(prefix).map_err(|e| format!("prefix part {e}"))?;
            name
        }
    };

    if name.is_empty() {
        return Err("name part must not be empty".to_string());
    }
    if name.len() > QUALIFIED_NAME_MAX_LEN {
        return Err(format!(
            "name part must be no more than {QUALIFIED_NAME_MAX_LEN} characters"
        ));
    }
    if !QUALIFIED_NAME.is_match(name) {
        return Err(format!("name part {QUALIFIED_NAME_ERR_MSG}"));
    }
    Ok(())
}

pub fn is_label_value(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    if value.len() > LABEL_VALUE_MAX_LEN {
        return Err(format!(
            "must be no more than {LABEL_VALUE_MAX_LEN} characters"
        ));
    }
    if !QUALIFIED_NAME.is_match(value) {
        return Err(LABEL_VALUE_ERR_MSG.to_string());
    }
    Ok(())
}
