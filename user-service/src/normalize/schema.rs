//! Request schema issues flattened into dotted paths

use serde_json::Value;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

use super::ErrorSource;

/// Issue code for a value outside an enumerated set; the allowed values
/// are expected in the `values` parameter
pub const INVALID_VALUE: &str = "invalid_value";

/// Key validator uses for struct-level issues
const STRUCT_LEVEL: &str = "__all__";

/// One source per issue, ordered by path
pub fn flatten_schema_errors(errors: &ValidationErrors) -> Vec<ErrorSource> {
    let mut sources = Vec::new();
    collect(errors, &mut Vec::new(), &mut sources);
    sources
}

fn collect(errors: &ValidationErrors, prefix: &mut Vec<String>, out: &mut Vec<ErrorSource>) {
    let mut fields: Vec<(String, &ValidationErrorsKind)> = errors
        .errors()
        .iter()
        .map(|(field, kind)| (field.to_string(), kind))
        .collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    for (field, kind) in fields {
        let pushed = field != STRUCT_LEVEL;
        if pushed {
            prefix.push(field);
        }

        match kind {
            ValidationErrorsKind::Field(issues) => {
                let path = if prefix.is_empty() {
                    "body".to_string()
                } else {
                    prefix.join(".")
                };
                for issue in issues {
                    out.push(ErrorSource::new(path.clone(), issue_message(&path, issue)));
                }
            }
            ValidationErrorsKind::Struct(nested) => collect(nested, prefix, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    prefix.push(index.to_string());
                    collect(nested, prefix, out);
                    prefix.pop();
                }
            }
        }

        if pushed {
            prefix.pop();
        }
    }
}

fn issue_message(path: &str, issue: &ValidationError) -> String {
    if issue.code == INVALID_VALUE {
        if let Some(Value::Array(values)) = issue.params.get("values") {
            let allowed = values
                .iter()
                .map(|value| match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            return format!("Invalid value for “{}”. Expected one of: “{}”!", path, allowed);
        }
    }

    match &issue.message {
        Some(message) => message.to_string(),
        None => format!("Invalid value for “{}” ({})", path, issue.code),
    }
}
