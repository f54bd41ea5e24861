// Compact document list for the ClientFlow front end

use serde_json::{json, Value};

/// Request body for the registry's JSON dokumentlista call
pub fn request_body(org_number: &str) -> Value {
    json!({ "identitetsbeteckning": org_number })
}

fn text(doc: &Value, key: &str) -> String {
    match doc.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Flatten the registry's `dokument` array.
///
/// `download_base` is the absolute URL of this service's document route; each entry
/// gets `{download_base}/{id}`.
pub fn format_documents(data: &Value, download_base: &str) -> Vec<Value> {
    let Some(documents) = data.get("dokument").and_then(|d| d.as_array()) else {
        return Vec::new();
    };
    let base = download_base.trim_end_matches('/');

    documents
        .iter()
        .map(|doc| {
            let id = text(doc, "dokumentId");
            let period = text(doc, "rapporteringsperiodTom");
            let format = text(doc, "filformat");
            json!({
                "id": id,
                "period": period,
                "format": format,
                "registreringstidpunkt": doc.get("registreringstidpunkt").cloned().unwrap_or(Value::Null),
                "downloadUrl": format!("{}/{}", base, urlencode_segment(&id)),
                "displayName": format!("Årsredovisning {} ({})", period, format),
            })
        })
        .collect()
}

fn urlencode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_documents() {
        let data = json!({
            "dokument": [
                {
                    "dokumentId": "doc-1",
                    "rapporteringsperiodTom": "2023-12-31",
                    "filformat": "PDF",
                    "registreringstidpunkt": "2024-03-01"
                },
                { "dokumentId": "doc 2" }
            ]
        });

        let docs = format_documents(&data, "http://localhost:3000/api/bolagsverket/dokument/");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["id"], "doc-1");
        assert_eq!(docs[0]["period"], "2023-12-31");
        assert_eq!(docs[0]["displayName"], "Årsredovisning 2023-12-31 (PDF)");
        assert_eq!(
            docs[0]["downloadUrl"],
            "http://localhost:3000/api/bolagsverket/dokument/doc-1"
        );
        assert_eq!(
            docs[1]["downloadUrl"],
            "http://localhost:3000/api/bolagsverket/dokument/doc%202"
        );
        assert!(docs[1]["registreringstidpunkt"].is_null());
    }

    #[test]
    fn test_missing_list_is_empty() {
        assert!(format_documents(&json!({"other": 1}), "http://x").is_empty());
        assert!(format_documents(&json!({"dokument": null}), "http://x").is_empty());
    }
}
