//! Access-control rule lookup trait.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::types::FieldLimit;

/// Read access to the per-user field rules.
///
/// The request path never writes rules; they are provisioned by an
/// administrative process. Every lookup runs in its own short read
/// transaction, so implementations hold no state between calls beyond a
/// connection pool.
///
/// # Example
///
/// ```ignore
/// use searchgate_persistence::core::FieldLimitStore;
///
/// async fn restored<S: FieldLimitStore>(store: &S) -> StorageResult<Vec<String>> {
///     let rules = store.limits_for("9", &["full".to_string()]).await?;
///     Ok(rules.into_iter().filter(|r| r.grants_access()).map(|r| r.field).collect())
/// }
/// ```
#[async_trait]
pub trait FieldLimitStore: Send + Sync {
    /// Returns a short name for the backend, used in logs.
    fn backend_name(&self) -> &'static str;

    /// Returns the rules of `user_id` for any of `fields`, ordered by row id.
    ///
    /// The user id is matched exactly; `fields` are expected lower-case.
    /// An empty `fields` slice yields no rules.
    async fn limits_for(&self, user_id: &str, fields: &[String]) -> StorageResult<Vec<FieldLimit>>;

    /// Verifies that the store can serve lookups.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
