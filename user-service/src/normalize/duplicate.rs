//! Duplicate-key details from MongoDB diagnostics

use mongodb::bson::Bson;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::DuplicateKeyError;

static COLLECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"collection:\s*([^.]+)\.([^\s]+)").expect("valid collection pattern"));

static DUP_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"dup key:\s*\{(.+)\}").expect("valid dup key pattern"));

static KEY_VALUE_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"["']?([^"':\s]+(?:\.[^"':\s]+)*)["']?\s*:\s*(ObjectId\(["']?[a-f\d]{24}["']?\)|"[^"]+"|'[^']+'|[^,}]+)"#,
    )
    .expect("valid key/value pattern")
});

static OBJECT_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)ObjectId\(["']?([a-f\d]{24})["']?\)"#).expect("valid ObjectId pattern")
});

/// What a duplicate-key error says about the offending document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateInfo {
    /// Collection name, without the database prefix
    pub collection: Option<String>,
    pub field: String,
    pub value: String,
}

impl DuplicateInfo {
    /// Extract collection, field and value from a duplicate-key error.
    ///
    /// The structured `keyValue` document is used for the offending
    /// field when present; otherwise the `dup key: { .. }` section of the
    /// diagnostic text is parsed. A field named `date` is preferred over
    /// the first one found.
    pub fn extract(err: &DuplicateKeyError) -> Self {
        let (collection, parsed) = parse_message(&err.message);

        let structured: Vec<(String, String)> = err
            .key_value
            .iter()
            .flat_map(|doc| doc.iter())
            .map(|(key, value)| (key.clone(), bson_text(value)))
            .collect();

        let fields = if structured.is_empty() {
            parsed
        } else {
            structured.clone()
        };

        let field = if fields.iter().any(|(key, _)| key == "date") {
            "date".to_string()
        } else {
            fields
                .first()
                .map(|(key, _)| key.clone())
                .unwrap_or_else(|| "unknown".to_string())
        };

        let value = fields
            .iter()
            .chain(structured.iter())
            .find(|(key, _)| *key == field)
            .map(|(_, value)| value.clone())
            .unwrap_or_else(|| "duplicate".to_string());

        Self {
            collection,
            field,
            value,
        }
    }

    /// `User already exists with email: a@b.com`
    pub fn message(&self) -> String {
        let document = self
            .collection
            .as_deref()
            .map(singular_document_name)
            .unwrap_or_else(|| "Document".to_string());
        format!("{} already exists with {}: {}", document, self.field, self.value)
    }
}

/// Collection name and the `key: value` pairs of the `dup key` section
fn parse_message(message: &str) -> (Option<String>, Vec<(String, String)>) {
    let collection = COLLECTION
        .captures(message)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string());

    let fields = DUP_KEY
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|section| {
            KEY_VALUE_PAIR
                .captures_iter(section.as_str())
                .map(|pair| (pair[1].to_string(), unwrap_value(pair[2].trim())))
                .collect()
        })
        .unwrap_or_default();

    (collection, fields)
}

/// Strip `ObjectId(..)` or surrounding quotes
fn unwrap_value(raw: &str) -> String {
    if let Some(caps) = OBJECT_ID.captures(raw) {
        return caps[1].to_string();
    }
    let raw = raw
        .strip_prefix('"')
        .or_else(|| raw.strip_prefix('\''))
        .unwrap_or(raw);
    raw.strip_suffix('"')
        .or_else(|| raw.strip_suffix('\''))
        .unwrap_or(raw)
        .to_string()
}

fn bson_text(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    }
}

/// `users` -> `User`, `categories` -> `Category`
pub fn singular_document_name(collection: &str) -> String {
    let collection = collection.trim();
    let mut chars = collection.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => return "Document".to_string(),
    };
    singularize(&capitalized)
}

fn singularize(word: &str) -> String {
    let stem = |suffix: &str| word.len() - suffix.len();
    if ends_with_ignore_case(word, "ies") && word.len() > 3 {
        format!("{}y", &word[..stem("ies")])
    } else if ["sses", "xes", "ches", "shes"]
        .iter()
        .any(|suffix| ends_with_ignore_case(word, suffix))
    {
        word[..stem("es")].to_string()
    } else if ends_with_ignore_case(word, "s") && !ends_with_ignore_case(word, "ss") && word.len() > 1
    {
        word[..stem("s")].to_string()
    } else {
        word.to_string()
    }
}

fn ends_with_ignore_case(word: &str, suffix: &str) -> bool {
    word.len() >= suffix.len()
        && word.is_char_boundary(word.len() - suffix.len())
        && word[word.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}
