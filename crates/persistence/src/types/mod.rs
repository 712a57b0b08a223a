//! Core types for the persistence layer.
//!
//! - [`FieldLimit`] - One access-control rule granting a restricted field

mod field_limit;

pub use field_limit::FieldLimit;
