//! Axum extractors for the gateway.
//!
//! - [`InboundRequest`] - Parameters, files and headers of a search request

mod inbound;

pub use inbound::{DEFAULT_USER_ID, InboundRequest, USER_ID_HEADER, UploadedFile};
