//! The access-control rule record.

use serde::{Deserialize, Serialize};

/// A rule that lets one user see one otherwise restricted field.
///
/// The rule only takes effect when it carries a filter expression: the
/// gateway restores the field into the response field list and adds the
/// filter to the filter queries, so the field is only ever visible on the
/// subset of documents the filter selects. A rule without a filter (or with
/// an empty one) leaves the field blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLimit {
    /// Row identifier, assigned by the store.
    pub id: i64,

    /// User identifier as known to the API (case-sensitive).
    #[serde(rename = "uid")]
    pub user_id: String,

    /// Lower-case name of the restricted field.
    pub field: String,

    /// Filter query that scopes the user's access.
    pub filter: Option<String>,
}

impl FieldLimit {
    /// Creates a rule record.
    pub fn new(
        id: i64,
        user_id: impl Into<String>,
        field: impl Into<String>,
        filter: Option<String>,
    ) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            field: field.into(),
            filter,
        }
    }

    /// Returns the filter expression when the rule grants access.
    pub fn effective_filter(&self) -> Option<&str> {
        self.filter.as_deref().filter(|f| !f.trim().is_empty())
    }

    /// Returns true if the rule restores its field.
    pub fn grants_access(&self) -> bool {
        self.effective_filter().is_some()
    }
}
