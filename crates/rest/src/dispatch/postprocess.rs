//! Response post-processing.
//!
//! Some publishers do not allow full-text snippets of their documents. For
//! those documents the full-text highlight keys are removed from the
//! backend's `highlighting` section.

use serde_json::Value;
use tracing::{debug, warn};

/// Removes `keys` from the highlights of documents by `publishers`.
///
/// Returns the rewritten body with `"filtered": "true"` added, or `None`
/// when the body is not a search response.
pub fn filter_highlights(body: &[u8], publishers: &[String], keys: &[String]) -> Option<Vec<u8>> {
    let mut response: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Cannot parse backend response for highlight filtering");
            return None;
        }
    };

    let docs = response.pointer("/response/docs")?.as_array()?;
    let blocked: Vec<String> = docs
        .iter()
        .filter(|doc| is_blocked(doc.get("publisher"), publishers))
        .filter_map(|doc| doc.get("id"))
        .map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();

    if let Some(highlighting) = response
        .get_mut("highlighting")
        .and_then(Value::as_object_mut)
    {
        for id in &blocked {
            if let Some(doc) = highlighting.get_mut(id).and_then(Value::as_object_mut) {
                for key in keys {
                    doc.remove(key);
                }
            }
        }
    }

    debug!(blocked = blocked.len(), "Filtered highlights");

    let object = response.as_object_mut()?;
    object.insert("filtered".to_string(), Value::String("true".to_string()));
    serde_json::to_vec(&response).ok()
}

fn is_blocked(publisher: Option<&Value>, publishers: &[String]) -> bool {
    let matches = |p: &str| publishers.iter().any(|b| b.eq_ignore_ascii_case(p));
    match publisher {
        Some(Value::String(p)) => matches(p),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}
