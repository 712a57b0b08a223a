//! Ordered, multi-valued request parameters.
//!
//! Search parameters arrive as repeated `key=value` pairs from the query
//! string, form bodies, multipart text fields and JSON objects. The gateway
//! keeps them in arrival order, one entry per key, so the outbound request
//! is built from the same sequence the client sent.

use serde_json::Value;

/// The value(s) of a single parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// The key was given once.
    Single(String),
    /// The key was repeated, or a rewrite produced a list.
    Multi(Vec<String>),
}

impl ParamValue {
    /// Returns the first value, if any.
    pub fn first(&self) -> Option<&str> {
        match self {
            ParamValue::Single(v) => Some(v),
            ParamValue::Multi(vs) => vs.first().map(String::as_str),
        }
    }

    /// Returns all values as a slice.
    pub fn values(&self) -> &[String] {
        match self {
            ParamValue::Single(v) => std::slice::from_ref(v),
            ParamValue::Multi(vs) => vs,
        }
    }

    /// Consumes the value and returns every string in it.
    pub fn into_values(self) -> Vec<String> {
        match self {
            ParamValue::Single(v) => vec![v],
            ParamValue::Multi(vs) => vs,
        }
    }

    /// Returns true if this is a list value.
    pub fn is_multi(&self) -> bool {
        matches!(self, ParamValue::Multi(_))
    }

    fn push(&mut self, value: String) {
        match self {
            ParamValue::Single(existing) => {
                let first = std::mem::take(existing);
                *self = ParamValue::Multi(vec![first, value]);
            }
            ParamValue::Multi(vs) => vs.push(value),
        }
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Single(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::Multi(values)
    }
}

/// Insertion-ordered parameter map with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestPayload {
    entries: Vec<(String, ParamValue)>,
}

impl RequestPayload {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a payload from raw pairs, grouping repeated keys.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut payload = Self::new();
        for (k, v) in pairs {
            payload.append(k, v);
        }
        payload
    }

    /// Parses a url-encoded string (`a=1&b=2&a=3`).
    pub fn from_urlencoded(raw: &str) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(raw.as_bytes()).into_owned())
    }

    /// Builds a payload from a JSON object.
    ///
    /// Arrays become list values; scalars are rendered as strings and
    /// `null` members are skipped.
    pub fn from_json(object: &serde_json::Map<String, Value>) -> Self {
        let mut payload = Self::new();
        for (key, value) in object {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    let values = items.iter().filter_map(json_scalar).collect();
                    payload.set(key.clone(), ParamValue::Multi(values));
                }
                other => {
                    if let Some(v) = json_scalar(other) {
                        payload.set(key.clone(), v);
                    }
                }
            }
        }
        payload
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns a mutable reference to the value stored under `key`.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut ParamValue> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Returns the first value stored under `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParamValue::first)
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replaces the value of `key`, keeping its position, or appends it.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.get_mut(&key) {
            Some(slot) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Adds one value under `key`, turning an existing value into a list.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.get_mut(&key) {
            Some(slot) => slot.push(value),
            None => self.entries.push((key, ParamValue::Single(value))),
        }
    }

    /// Removes `key` and returns its value.
    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Copies every entry of `other` over this payload (later wins).
    pub fn merge(&mut self, other: RequestPayload) {
        for (k, v) in other.entries {
            self.set(k, v);
        }
    }

    /// Returns the keys in order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Returns every key that is `name` itself or ends with `.name`.
    ///
    /// `keys_matching("rows")` yields `rows` and `cites.rows` but not
    /// `arrows`.
    pub fn keys_matching(&self, name: &str) -> Vec<String> {
        let suffix = format!(".{}", name);
        self.entries
            .iter()
            .filter(|(k, _)| k == name || k.ends_with(&suffix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Iterates over entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Flattens the payload into `(key, value)` pairs for encoding.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .flat_map(|(k, v)| v.values().iter().map(move |x| (k.clone(), x.clone())))
            .collect()
    }

    /// Encodes the payload as `application/x-www-form-urlencoded`.
    pub fn to_urlencoded(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.to_pairs())
            .finish()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn json_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_keys_become_lists() {
        let payload = RequestPayload::from_urlencoded("q=star&fq=a&fq=b");
        assert_eq!(payload.get("q"), Some(&ParamValue::from("star")));
        assert_eq!(
            payload.get("fq").map(ParamValue::values),
            Some(&["a".to_string(), "b".to_string()][..])
        );
        assert_eq!(payload.keys(), vec!["q", "fq"]);
    }

    #[test]
    fn test_set_keeps_position() {
        let mut payload = RequestPayload::from_urlencoded("a=1&b=2&c=3");
        payload.set("b", "x");
        payload.set("d", "4");
        assert_eq!(payload.keys(), vec!["a", "b", "c", "d"]);
        assert_eq!(payload.first("b"), Some("x"));
    }

    #[test]
    fn test_remove() {
        let mut payload = RequestPayload::from_urlencoded("a=1&b=2");
        assert_eq!(payload.remove("a"), Some(ParamValue::from("1")));
        assert_eq!(payload.remove("a"), None);
        assert_eq!(payload.len(), 1);
    }

    #[test]
    fn test_keys_matching() {
        let payload = RequestPayload::from_urlencoded("rows=1&cites.rows=2&arrows=3&hl.fl=x");
        assert_eq!(payload.keys_matching("rows"), vec!["rows", "cites.rows"]);
        assert_eq!(payload.keys_matching("fl"), vec!["hl.fl"]);
    }

    #[test]
    fn test_from_json() {
        let value = serde_json::json!({"q": "star", "rows": 5, "fq": ["a", "b"], "x": null});
        let payload = RequestPayload::from_json(value.as_object().unwrap());
        assert_eq!(payload.first("rows"), Some("5"));
        assert!(payload.get("fq").unwrap().is_multi());
        assert!(!payload.contains_key("x"));
    }

    #[test]
    fn test_urlencoded_output() {
        let mut payload = RequestPayload::new();
        payload.set("q", "title:\"a b\"");
        payload.append("fq", "x");
        payload.append("fq", "y");
        assert_eq!(payload.to_urlencoded(), "q=title%3A%22a+b%22&fq=x&fq=y");
    }

    #[test]
    fn test_merge_later_wins() {
        let mut payload = RequestPayload::from_urlencoded("a=1&b=2");
        payload.merge(RequestPayload::from_urlencoded("b=3&c=4"));
        assert_eq!(payload.first("b"), Some("3"));
        assert_eq!(payload.keys(), vec!["a", "b", "c"]);
    }
}
