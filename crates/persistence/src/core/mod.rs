//! Storage traits.
//!
//! - [`FieldLimitStore`] - read access to the access-control rules

mod limits;

pub use limits::FieldLimitStore;
