//! Raw query-string parameters

use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

/// Keys with a dedicated builder operation; never used as generic filters
pub const RESERVED_KEYS: [&str; 11] = [
    "search",
    "sort_by",
    "sort_order",
    "filter",
    "page",
    "limit",
    "min",
    "max",
    "ids",
    "exclude",
    "select",
];

/// Whether `key` is one of [`RESERVED_KEYS`]
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// A parameter given once, or several times (`a=1&a=2`, `a[]=1`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Many(Vec<String>),
}

impl ParamValue {
    /// The value if it was given exactly once
    pub fn as_single(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::Many(_) => None,
        }
    }

    /// All non-empty values
    pub fn values(&self) -> Vec<&str> {
        let values: Vec<&str> = match self {
            Self::Single(value) => vec![value.as_str()],
            Self::Many(values) => values.iter().map(String::as_str).collect(),
        };
        values.into_iter().filter(|value| !value.is_empty()).collect()
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Single(first) => *self = Self::Many(vec![std::mem::take(first), value]),
            Self::Many(values) => values.push(value),
        }
    }
}

/// Immutable, ordered mapping of query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, ParamValue)>,
}

impl QueryParams {
    /// Decode a raw query string (without the leading `?`)
    pub fn parse(query: &str) -> Self {
        url::form_urlencoded::parse(query.as_bytes())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect()
    }

    /// Raw value for `key`
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Non-empty single value for `key`
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(ParamValue::as_single)
            .filter(|value| !value.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, key: String, value: String) {
        let (key, many) = match key.strip_suffix("[]") {
            Some(stripped) => (stripped.to_string(), true),
            None => (key, false),
        };
        if key.is_empty() {
            return;
        }

        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some((_, existing)) => existing.push(value),
            None if many => self.entries.push((key, ParamValue::Many(vec![value]))),
            None => self.entries.push((key, ParamValue::Single(value))),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::default();
        for (key, value) in iter {
            params.insert(key.into(), value.into());
        }
        params
    }
}

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::parse(parts.uri.query().unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_parse_single_and_repeated() {
        let params = QueryParams::parse("search=ann&ids=a&ids=b&role=admin");
        assert_eq!(params.get_str("search"), Some("ann"));
        assert_eq!(
            params.get("ids"),
            Some(&ParamValue::Many(vec!["a".to_string(), "b".to_string()]))
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_bracket_suffix_forces_list() {
        let params = QueryParams::parse("exclude[]=email");
        assert_eq!(
            params.get("exclude"),
            Some(&ParamValue::Many(vec!["email".to_string()]))
        );
        assert_eq!(params.get_str("exclude"), None);
    }

    #[test]
    fn test_percent_decoding() {
        let params = QueryParams::parse("search=John%20Doe&email=a%40b.com");
        assert_eq!(params.get_str("search"), Some("John Doe"));
        assert_eq!(params.get_str("email"), Some("a@b.com"));
    }

    #[test]
    fn test_empty_values_are_absent() {
        let params = QueryParams::parse("search=&page=2");
        assert_eq!(params.get_str("search"), None);
        assert!(params.get("search").unwrap().values().is_empty());
        assert_eq!(params.get_str("page"), Some("2"));
    }

    #[test]
    fn test_reserved_keys() {
        assert!(is_reserved("sort_by"));
        assert!(is_reserved("select"));
        assert!(!is_reserved("email"));
    }

    #[tokio::test]
    async fn test_extractor_reads_uri_query() {
        let request = Request::builder()
            .uri("/api/users?page=2&limit=5")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let params = QueryParams::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(params.get_str("limit"), Some("5"));
    }
}
