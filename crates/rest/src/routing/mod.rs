//! Route configuration for the gateway.
//!
//! This module contains the routing configuration that maps HTTP paths
//! to handlers.

pub mod search_routes;

pub use search_routes::create_routes;
