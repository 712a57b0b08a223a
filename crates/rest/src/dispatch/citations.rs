//! Identifier-to-bibcode resolution for citation queries.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::RestResult;

#[derive(Debug, Deserialize)]
struct SelectResponse {
    response: SelectDocs,
}

#[derive(Debug, Deserialize)]
struct SelectDocs {
    #[serde(default)]
    docs: Vec<BibcodeDoc>,
}

#[derive(Debug, Deserialize)]
struct BibcodeDoc {
    bibcode: Option<String>,
}

/// Looks up the canonical bibcode of a document identifier.
///
/// Returns `None` when the backend knows no such identifier or answers
/// with an error.
pub async fn lookup_bibcode(
    client: &reqwest::Client,
    search_url: &str,
    identifier: &str,
) -> RestResult<Option<String>> {
    let query = format!("identifier:\"{}\"", identifier);
    let response = client
        .post(search_url)
        .form(&[
            ("q", query.as_str()),
            ("fl", "bibcode"),
            ("rows", "1"),
            ("wt", "json"),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        warn!(identifier, status = %response.status(), "Bibcode lookup failed");
        return Ok(None);
    }

    let bibcode = match response.json::<SelectResponse>().await {
        Ok(body) => body.response.docs.into_iter().find_map(|d| d.bibcode),
        Err(e) => {
            warn!(identifier, error = %e, "Unreadable bibcode lookup response");
            None
        }
    };

    debug!(identifier, bibcode = ?bibcode, "Resolved identifier");
    Ok(bibcode)
}
