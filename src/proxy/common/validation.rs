// Organisation number validation

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::ProxyError;

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]").unwrap());
static ORG_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}$|^\d{11}$").unwrap());
// Registry endpoints also take 12-digit personal identity numbers
static REGISTRY_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{10}$|^\d{11}$|^\d{12}$").unwrap());

/// Which identifier lengths an endpoint admits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    /// 10 or 11 digits
    Organisation,
    /// 10, 11 or 12 digits
    Registry,
}

impl IdentifierKind {
    fn pattern(&self) -> &'static Regex {
        match self {
            Self::Organisation => &ORG_NUMBER,
            Self::Registry => &REGISTRY_NUMBER,
        }
    }

    fn format_message(&self) -> &'static str {
        match self {
            Self::Organisation => "Organization number should be 10-11 digits",
            Self::Registry => "Organization number should be 10-12 digits",
        }
    }
}

/// Strip hyphens and whitespace
pub fn clean(raw: &str) -> String {
    SEPARATORS.replace_all(raw, "").into_owned()
}

/// Validate an already-extracted identifier, returning its cleaned form
pub fn validate(raw: &str, kind: IdentifierKind) -> Result<String, ProxyError> {
    let cleaned = clean(raw);
    if kind.pattern().is_match(&cleaned) {
        Ok(cleaned)
    } else {
        Err(ProxyError::validation(
            "Ogiltigt organisationsnummer format",
            kind.format_message(),
        ))
    }
}

/// Pull `field` out of a JSON request body and validate it.
///
/// Strings and numbers are accepted; missing, null, empty, `false` and `0` count as
/// absent.
pub fn extract_identifier(
    body: &Value,
    field: &str,
    kind: IdentifierKind,
) -> Result<String, ProxyError> {
    let raw = raw_identifier(body.get(field)).ok_or_else(|| {
        ProxyError::validation(
            "Organisationsnummer är obligatoriskt",
            format!("Please provide {} in request body", field),
        )
    })?;
    validate(&raw, kind)
}

/// Like [`extract_identifier`], taking the first present field of `aliases`
pub fn extract_first_identifier(
    body: &Value,
    aliases: &[&str],
    kind: IdentifierKind,
) -> Result<String, ProxyError> {
    let raw = aliases
        .iter()
        .find_map(|field| raw_identifier(body.get(*field)))
        .ok_or_else(|| {
            ProxyError::validation(
                "Organisationsnummer är obligatoriskt",
                "Organization number is required",
            )
        })?;
    validate(&raw, kind)
}

fn raw_identifier(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        other if is_present(other) => Some(other.to_string()),
        _ => None,
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => false,
    }
}
