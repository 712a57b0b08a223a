//! Field-level access control.
//!
//! A client asking for a deny-listed field gets it back only when the rule
//! store holds a rule for that user and field. The field is then restored in
//! the field list and the rule's filter is added to the filter queries, so the
//! field is visible on the rule's subset of documents only.

use searchgate_persistence::core::FieldLimitStore;
use tracing::debug;

use crate::error::RestResult;
use crate::payload::{ParamValue, RequestPayload};

/// Returns the filter-query key paired with a field-list key.
///
/// `fl` pairs with `fq`, `<prefix>.fl` with `<prefix>.fq`.
pub fn filter_key(field_list_key: &str) -> String {
    match field_list_key.rsplit_once('.') {
        Some((prefix, _)) => format!("{}.fq", prefix),
        None => "fq".to_string(),
    }
}

/// Restores restricted fields the user holds rules for.
///
/// Returns the number of rules that took effect.
pub async fn apply_protective_filters<S>(
    store: &S,
    payload: &mut RequestPayload,
    user_id: &str,
    restricted_fields: &[String],
    field_list_key: &str,
) -> RestResult<usize>
where
    S: FieldLimitStore + ?Sized,
{
    let fields: Vec<String> = restricted_fields.iter().map(|f| f.to_lowercase()).collect();
    let rules = store.limits_for(user_id, &fields).await?;

    let fq_key = filter_key(field_list_key);
    let mut field_list: Vec<String> = payload
        .first(field_list_key)
        .unwrap_or("id")
        .split(',')
        .map(str::to_string)
        .collect();
    let mut filters: Vec<String> = payload
        .get(&fq_key)
        .map(|v| v.values().to_vec())
        .unwrap_or_default();

    let mut applied = 0;
    for rule in &rules {
        let Some(filter) = rule.effective_filter() else {
            continue;
        };
        if !field_list.contains(&rule.field) {
            field_list.push(rule.field.clone());
        }
        filters.push(filter.to_string());
        applied += 1;
    }

    if applied > 0 {
        payload.set(field_list_key, field_list.join(","));
        payload.set(fq_key, ParamValue::Multi(filters));
    }

    debug!(
        user_id = %user_id,
        key = %field_list_key,
        requested = ?fields,
        applied,
        "Applied protective filters"
    );

    Ok(applied)
}
