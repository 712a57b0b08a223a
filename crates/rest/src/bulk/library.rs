//! Library harvesting.
//!
//! The library service pages through a library's documents without a stable
//! sort order, so pages may overlap. Harvesting keeps requesting pages until
//! the reported size is reached or a page brings nothing new.

use std::collections::HashSet;

use axum::http::HeaderMap;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::UpstreamError;

const SERVICE: &str = "library";

#[derive(Debug, Deserialize)]
struct LibraryPage {
    #[serde(default)]
    documents: Vec<String>,
    #[serde(default)]
    metadata: LibraryMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct LibraryMetadata {
    num_documents: Option<usize>,
}

/// The identifiers collected from one library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryHarvest {
    /// Library id as given in the query.
    pub library_id: String,
    /// Unique identifiers, in the order first seen.
    pub documents: Vec<String>,
}

impl LibraryHarvest {
    /// Renders the harvest as a one-column CSV with a `bibcode` header.
    pub fn to_csv(&self) -> Result<Vec<u8>, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["bibcode"])?;
        for doc in &self.documents {
            writer.write_record([doc])?;
        }
        writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }
}

/// Collects every identifier of a library, `page_size` at a time.
pub async fn harvest_library(
    client: &reqwest::Client,
    endpoint: &str,
    library_id: &str,
    headers: &HeaderMap,
    page_size: usize,
) -> Result<LibraryHarvest, UpstreamError> {
    let url = format!("{}/{}", endpoint.trim_end_matches('/'), library_id);
    let mut seen = HashSet::new();
    let mut documents = Vec::new();
    let mut start = 0usize;

    loop {
        let response = client
            .get(&url)
            .headers(headers.clone())
            .query(&[("rows", page_size), ("start", start)])
            .send()
            .await
            .map_err(|source| UpstreamError::Transport {
                service: SERVICE,
                source,
            })?;

        if !response.status().is_success() {
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: response.status().as_u16(),
            });
        }

        let page: LibraryPage =
            response
                .json()
                .await
                .map_err(|e| UpstreamError::InvalidResponse {
                    service: SERVICE,
                    message: e.to_string(),
                })?;

        let before = documents.len();
        for doc in &page.documents {
            if seen.insert(doc.clone()) {
                documents.push(doc.clone());
            }
        }
        debug!(library_id, start, page = page.documents.len(), total = documents.len(), "Fetched library page");

        let complete = page
            .metadata
            .num_documents
            .is_some_and(|n| n <= documents.len());
        if complete
            || page.documents.len() < page_size
            || before == documents.len()
            || page.documents.is_empty()
        {
            break;
        }

        start += page_size;
    }

    info!(library_id, documents = documents.len(), "Harvested library");

    Ok(LibraryHarvest {
        library_id: library_id.to_string(),
        documents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_has_header_and_one_line_per_document() {
        let harvest = LibraryHarvest {
            library_id: "abc".to_string(),
            documents: vec!["2020ApJ...1..1A".to_string(), "2021MNRAS.2..2B".to_string()],
        };
        let csv = String::from_utf8(harvest.to_csv().unwrap()).unwrap();
        assert_eq!(csv, "bibcode\n2020ApJ...1..1A\n2021MNRAS.2..2B\n");
    }

    #[test]
    fn test_empty_library_is_header_only() {
        let harvest = LibraryHarvest {
            library_id: "abc".to_string(),
            documents: Vec::new(),
        };
        assert_eq!(harvest.to_csv().unwrap(), b"bibcode\n");
    }
}
