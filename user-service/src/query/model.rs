//! Typed description of a queryable collection

use mongodb::bson::{oid::ObjectId, Bson};
use std::fmt::Debug;

/// Storage type of a field, used to coerce raw query values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    ObjectId,
    DateTime,
}

impl FieldKind {
    /// Convert a raw query value to this kind; values that do not parse
    /// stay strings
    pub fn coerce(self, raw: &str) -> Bson {
        match self {
            Self::Boolean => match raw {
                "true" => Bson::Boolean(true),
                "false" => Bson::Boolean(false),
                _ => Bson::String(raw.to_string()),
            },
            Self::Number => coerce_number(raw).unwrap_or_else(|| Bson::String(raw.to_string())),
            Self::ObjectId => ObjectId::parse_str(raw)
                .map(Bson::ObjectId)
                .unwrap_or_else(|_| Bson::String(raw.to_string())),
            Self::String | Self::DateTime => Bson::String(raw.to_string()),
        }
    }
}

fn coerce_number(raw: &str) -> Option<Bson> {
    let raw = raw.trim();
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Bson::Int64(int));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(Bson::Double)
}

/// A named, typed field of a model
pub trait Field: Copy + Eq + Debug + Send + Sync + 'static {
    /// Every field of the model
    const ALL: &'static [Self];

    fn name(self) -> &'static str;

    fn kind(self) -> FieldKind;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.name() == name)
    }
}

/// A field that can be range-filtered
pub trait NumericField: Copy + Debug + Send + Sync + 'static {
    fn name(self) -> &'static str;
}

/// A document type stored in one collection
pub trait Model: Send + Sync + 'static {
    /// Collection name
    const COLLECTION: &'static str;

    /// Default sort field
    const CREATED_AT: &'static str = "created_at";

    /// Internal revision field, always excluded from results
    const VERSION_KEY: &'static str = "__v";

    /// Fields clients may not filter or sort on
    const HIDDEN_FIELDS: &'static [&'static str] = &[];

    type Field: Field;

    type Numeric: NumericField;
}
