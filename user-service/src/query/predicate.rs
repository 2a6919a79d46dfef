//! Filter predicates
//!
//! A [`Predicate`] renders to a MongoDB filter document and can also be
//! evaluated directly against a BSON document.

use mongodb::bson::{doc, Bson, Document};
use regex::RegexBuilder;
use std::cmp::Ordering;

/// Path segments deeper than this never match
const MAX_PATH_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `field == value`
    Eq { field: String, value: Bson },
    /// `field` is one of `values`
    In { field: String, values: Vec<Bson> },
    /// `min <= field <= max`, either bound optional
    Range {
        field: String,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// `field` contains `needle`, ignoring case; `needle` is literal text
    Contains { field: String, needle: String },
    /// `_id` is one of these raw identifiers, resolved when compiled
    Ids(Vec<String>),
    Or(Vec<Predicate>),
    And(Vec<Predicate>),
}

impl Predicate {
    /// MongoDB filter document
    pub fn to_document(&self) -> Document {
        match self {
            Self::Eq { field, value } => doc! { field.as_str(): value.clone() },
            Self::In { field, values } => doc! { field.as_str(): { "$in": values.clone() } },
            Self::Range { field, min, max } => {
                let mut bounds = Document::new();
                if let Some(min) = min {
                    bounds.insert("$gte", *min);
                }
                if let Some(max) = max {
                    bounds.insert("$lte", *max);
                }
                doc! { field.as_str(): bounds }
            }
            Self::Contains { field, needle } => doc! {
                field.as_str(): { "$regex": regex::escape(needle), "$options": "i" }
            },
            Self::Ids(ids) => doc! { "_id": { "$in": ids.clone() } },
            Self::Or(predicates) => doc! { "$or": to_documents(predicates) },
            Self::And(predicates) => doc! { "$and": to_documents(predicates) },
        }
    }

    /// Evaluate against a stored document
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Self::Eq { field, value } => {
                get_path(document, field).is_some_and(|actual| bson_eq(actual, value))
            }
            Self::In { field, values } => get_path(document, field)
                .is_some_and(|actual| values.iter().any(|value| bson_eq(actual, value))),
            Self::Range { field, min, max } => get_path(document, field)
                .and_then(as_f64)
                .is_some_and(|actual| {
                    min.map_or(true, |min| actual >= min) && max.map_or(true, |max| actual <= max)
                }),
            Self::Contains { field, needle } => match get_path(document, field) {
                Some(Bson::String(actual)) => RegexBuilder::new(&regex::escape(needle))
                    .case_insensitive(true)
                    .build()
                    .is_ok_and(|pattern| pattern.is_match(actual)),
                _ => false,
            },
            Self::Ids(ids) => match document.get("_id") {
                Some(Bson::ObjectId(oid)) => ids.iter().any(|id| *id == oid.to_hex()),
                Some(Bson::String(id)) => ids.contains(id),
                _ => false,
            },
            Self::Or(predicates) => predicates.iter().any(|p| p.matches(document)),
            Self::And(predicates) => predicates.iter().all(|p| p.matches(document)),
        }
    }
}

fn to_documents(predicates: &[Predicate]) -> Vec<Bson> {
    predicates
        .iter()
        .map(|p| Bson::Document(p.to_document()))
        .collect()
}

/// Equality with MongoDB semantics: numbers compare across types and an
/// array matches when any element does
fn bson_eq(actual: &Bson, expected: &Bson) -> bool {
    if let Bson::Array(items) = actual {
        if !matches!(expected, Bson::Array(_)) {
            return items.iter().any(|item| bson_eq(item, expected));
        }
    }
    match (as_f64(actual), as_f64(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => actual == expected,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

/// Value at a dotted path
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for (depth, segment) in segments.enumerate() {
        if depth >= MAX_PATH_DEPTH {
            return None;
        }
        current = match current {
            Bson::Document(nested) => nested.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Total order used for sorting: numbers across types, then by type rank
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.total_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 255,
        _ => 12,
    }
}
