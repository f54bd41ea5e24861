// Organisationer request encodings
// The registry has rejected some request shapes with 400 depending on deployment,
// so the handler walks this list in order until one is accepted.

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::proxy::upstream::Payload;

pub const VARIANT_COUNT: usize = 8;

/// One encoding of the organisationer request body
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadVariant {
    pub label: &'static str,
    pub payload: Payload,
}

impl PayloadVariant {
    fn json(label: &'static str, body: Value) -> Self {
        Self {
            label,
            payload: Payload::Json(body),
        }
    }

    fn form(label: &'static str, field: &str, value: &str) -> Self {
        Self {
            label,
            payload: Payload::form(&[(field, value)]),
        }
    }
}

/// The ordered probe list for `org_number`
pub fn variants(org_number: &str) -> Vec<PayloadVariant> {
    vec![
        PayloadVariant::json("bare string", json!(org_number)),
        PayloadVariant::json("bare string (text)", json!(org_number.to_string())),
        PayloadVariant::json("organisationsnummer", canonical_body(org_number)),
        PayloadVariant::json("organisationsnummer (text)", canonical_body(org_number)),
        PayloadVariant::json("orgNumber", json!({ "orgNumber": org_number })),
        PayloadVariant::json(
            "organizationNumber",
            json!({ "organizationNumber": org_number }),
        ),
        PayloadVariant::form("form organisationsnummer", "organisationsnummer", org_number),
        PayloadVariant::form(
            "form organisationsnummer (text)",
            "organisationsnummer",
            org_number,
        ),
    ]
}

/// Sent once more when every variant came back 400
pub fn fallback(org_number: &str) -> PayloadVariant {
    PayloadVariant::json("fallback organisationsnummer", canonical_body(org_number))
}

fn canonical_body(org_number: &str) -> Value {
    json!({ "organisationsnummer": org_number })
}

/// Probing stops on success or on anything other than a validation rejection
pub fn should_stop(status: StatusCode) -> bool {
    status == StatusCode::OK || status != StatusCode::BAD_REQUEST
}
