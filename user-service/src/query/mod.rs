//! Query-string to document-store query translation
//!
//! [`QueryBuilder`] reads a request's [`QueryParams`] and folds the
//! requested operations into a [`Query`] value. Nothing touches the store:
//! [`Query::compile`] produces a [`CompiledQuery`] that a repository
//! executes once.
//!
//! ```rust,ignore
//! let compiled = QueryBuilder::new(Query::<User>::new(), &params)
//!     .search(&[UserField::FirstName, UserField::Email])
//!     .filter()
//!     .sort()
//!     .paginate()
//!     .exclude_fields(&[UserField::Password])
//!     .into_query()
//!     .compile()?;
//! ```

mod model;
mod params;
mod predicate;

use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

use crate::error::{CastError, Error, RangeValidationError, Result};

#[cfg(test)]
pub(crate) use model::testing;
pub use model::{Field, FieldKind, Model, NumericField};
pub use params::{is_reserved, ParamValue, QueryParams, RESERVED_KEYS};
pub use predicate::{compare_bson, get_path, Predicate};

/// Default page when `page` is absent or invalid
pub const DEFAULT_PAGE: u64 = 1;

/// Default page size when `limit` is absent or invalid
pub const DEFAULT_LIMIT: u64 = 10;

/// Largest skip or limit the store accepts (a signed 64-bit count)
pub const MAX_COUNT: u64 = i64::MAX as u64;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    /// `1` or `-1`, as MongoDB expects
    pub fn direction(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// Single-field sort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

/// Unexecuted query over the collection of `M`.
///
/// Every method consumes the query and returns the extended value.
pub struct Query<M: Model> {
    predicates: Vec<Predicate>,
    sort: Option<SortSpec>,
    skip: Option<u64>,
    limit: Option<u64>,
    excluded: Vec<String>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Default for Query<M> {
    fn default() -> Self {
        Self {
            predicates: Vec::new(),
            sort: None,
            skip: None,
            limit: None,
            excluded: Vec::new(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for Query<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("collection", &M::COLLECTION)
            .field("predicates", &self.predicates)
            .field("sort", &self.sort)
            .field("skip", &self.skip)
            .field("limit", &self.limit)
            .field("excluded", &self.excluded)
            .finish()
    }
}

impl<M: Model> Query<M> {
    /// Query matching every document
    pub fn new() -> Self {
        Self::default()
    }

    /// Narrow by `predicate`, conjoined with existing predicates
    pub fn find(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Replace the sort
    pub fn sort(mut self, spec: SortSpec) -> Self {
        self.sort = Some(spec);
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Replace the set of fields left out of results
    pub fn select(mut self, excluded: Vec<String>) -> Self {
        self.excluded = excluded;
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn sort_spec(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn skip_count(&self) -> Option<u64> {
        self.skip
    }

    pub fn limit_count(&self) -> Option<u64> {
        self.limit
    }

    pub fn excluded_fields(&self) -> &[String] {
        &self.excluded
    }

    /// Resolve identifiers and fold predicates into one filter.
    ///
    /// Fails with a cast error when an `ids` entry is not a valid ObjectId.
    pub fn compile(self) -> Result<CompiledQuery> {
        let mut predicates = self
            .predicates
            .into_iter()
            .map(resolve_ids)
            .collect::<Result<Vec<_>>>()?;

        let filter = match predicates.len() {
            0 => None,
            1 => predicates.pop(),
            _ => Some(Predicate::And(predicates)),
        };

        Ok(CompiledQuery {
            collection: M::COLLECTION,
            filter,
            sort: self.sort,
            skip: self.skip,
            limit: self.limit,
            excluded: self.excluded,
        })
    }
}

fn resolve_ids(predicate: Predicate) -> Result<Predicate> {
    match predicate {
        Predicate::Ids(ids) => {
            let values = ids
                .iter()
                .map(|id| {
                    ObjectId::parse_str(id)
                        .map(Bson::ObjectId)
                        .map_err(|_| Error::Cast(CastError::object_id("_id", id.as_str())))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Predicate::In {
                field: "_id".to_string(),
                values,
            })
        }
        Predicate::Or(nested) => Ok(Predicate::Or(
            nested.into_iter().map(resolve_ids).collect::<Result<_>>()?,
        )),
        Predicate::And(nested) => Ok(Predicate::And(
            nested.into_iter().map(resolve_ids).collect::<Result<_>>()?,
        )),
        other => Ok(other),
    }
}

/// A query ready for execution
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub collection: &'static str,
    pub filter: Option<Predicate>,
    pub sort: Option<SortSpec>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub excluded: Vec<String>,
}

impl CompiledQuery {
    /// MongoDB filter document, empty when unfiltered
    pub fn filter_document(&self) -> Document {
        self.filter
            .as_ref()
            .map(Predicate::to_document)
            .unwrap_or_default()
    }

    /// MongoDB sort document
    pub fn sort_document(&self) -> Option<Document> {
        self.sort
            .as_ref()
            .map(|spec| doc! { spec.field.as_str(): spec.order.direction() })
    }

    /// MongoDB exclusion projection
    pub fn projection(&self) -> Option<Document> {
        if self.excluded.is_empty() {
            return None;
        }
        Some(
            self.excluded
                .iter()
                .map(|field| (field.clone(), Bson::Int32(0)))
                .collect(),
        )
    }

    /// Run the query over in-memory documents
    pub fn apply(&self, documents: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut matched: Vec<Document> = documents
            .into_iter()
            .filter(|document| self.filter.as_ref().map_or(true, |f| f.matches(document)))
            .collect();

        if let Some(spec) = &self.sort {
            matched.sort_by(|a, b| {
                let ord = match (get_path(a, &spec.field), get_path(b, &spec.field)) {
                    (Some(x), Some(y)) => compare_bson(x, y),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => Ordering::Equal,
                };
                match spec.order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            });
        }

        let skip = usize::try_from(self.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = self
            .limit
            .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));

        matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|mut document| {
                for field in &self.excluded {
                    remove_path(&mut document, field);
                }
                document
            })
            .collect()
    }
}

fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Ok(nested) = document.get_document_mut(head) {
                remove_path(nested, rest);
            }
        }
    }
}

/// Folds query-string parameters into a [`Query`].
///
/// The documented order is search, filter, range, custom filters, ids,
/// sort, paginate, exclude fields. Each step reads only the parameters it
/// owns; absent or empty parameters leave the query unchanged.
pub struct QueryBuilder<'p, M: Model> {
    query: Query<M>,
    params: &'p QueryParams,
}

impl<M: Model> fmt::Debug for QueryBuilder<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("query", &self.query)
            .field("params", self.params)
            .finish()
    }
}

impl<'p, M: Model> QueryBuilder<'p, M> {
    pub fn new(query: Query<M>, params: &'p QueryParams) -> Self {
        Self { query, params }
    }

    fn map(self, f: impl FnOnce(Query<M>) -> Query<M>) -> Self {
        Self {
            query: f(self.query),
            params: self.params,
        }
    }

    /// Documents where any of `fields` contains `search`, ignoring case
    pub fn search(self, fields: &[M::Field]) -> Self {
        let params = self.params;
        let Some(keyword) = params.get_str("search") else {
            return self;
        };
        if fields.is_empty() {
            return self;
        }

        let any_field = Predicate::Or(
            fields
                .iter()
                .map(|field| Predicate::Contains {
                    field: field.name().to_string(),
                    needle: keyword.to_string(),
                })
                .collect(),
        );
        self.map(|query| query.find(any_field))
    }

    /// Equality on every non-reserved parameter; repeated parameters match
    /// any of their values
    pub fn filter(self) -> Self {
        let params = self.params;
        let predicates: Vec<Predicate> = params
            .iter()
            .filter(|(key, _)| !is_reserved(key) && queryable::<M>(key))
            .filter_map(|(key, value)| {
                let kind = M::Field::from_name(key)
                    .map(Field::kind)
                    .unwrap_or(FieldKind::String);
                let values = value.values();
                match (value, values.as_slice()) {
                    (_, []) => None,
                    (ParamValue::Single(_), [single]) => Some(Predicate::Eq {
                        field: key.to_string(),
                        value: kind.coerce(single),
                    }),
                    _ => Some(Predicate::In {
                        field: key.to_string(),
                        values: values.iter().map(|raw| kind.coerce(raw)).collect(),
                    }),
                }
            })
            .collect();

        self.map(|query| predicates.into_iter().fold(query, Query::find))
    }

    /// Sort by `sort_by` (default: creation time), ascending only when
    /// `sort_order=asc`
    pub fn sort(self) -> Self {
        let params = self.params;
        let field = params
            .get_str("sort_by")
            .filter(|field| queryable::<M>(field))
            .unwrap_or(M::CREATED_AT);
        let order = match params.get_str("sort_order") {
            Some("asc") => SortOrder::Ascending,
            _ => SortOrder::Descending,
        };
        let spec = SortSpec {
            field: field.to_string(),
            order,
        };
        self.map(|query| query.sort(spec))
    }

    /// Inclusive `min`/`max` range on a numeric field
    pub fn range(self, field: M::Numeric) -> Result<Self> {
        let params = self.params;
        let min = range_bound(params.get("min"), field)?;
        let max = range_bound(params.get("max"), field)?;

        if min.is_none() && max.is_none() {
            return Ok(self);
        }

        let predicate = Predicate::Range {
            field: field.name().to_string(),
            min,
            max,
        };
        Ok(self.map(|query| query.find(predicate)))
    }

    /// Equality on `field` with the value of parameter `key`
    pub fn custom_filter(self, field: M::Field, key: &str) -> Self {
        let params = self.params;
        let Some(raw) = params.get_str(key) else {
            return self;
        };
        let predicate = Predicate::Eq {
            field: field.name().to_string(),
            value: field.kind().coerce(raw),
        };
        self.map(|query| query.find(predicate))
    }

    /// Documents whose `_id` is listed in `ids`
    pub fn documents_by_ids(self) -> Self {
        let params = self.params;
        let ids: Vec<String> = params
            .get("ids")
            .map(|value| value.values().into_iter().map(str::to_string).collect())
            .unwrap_or_default();
        if ids.is_empty() {
            return self;
        }
        self.map(|query| query.find(Predicate::Ids(ids)))
    }

    /// Skip and limit from 1-indexed `page` and `limit`
    pub fn paginate(self) -> Self {
        let params = self.params;
        let page = positive(params.get_str("page")).unwrap_or(DEFAULT_PAGE);
        let limit = positive(params.get_str("limit")).unwrap_or(DEFAULT_LIMIT);
        let skip = (page - 1).saturating_mul(limit).min(MAX_COUNT);
        self.map(|query| query.skip(skip).limit(limit))
    }

    /// Leave out the version key, `fixed` fields and fields named in
    /// `exclude`; a leading `-` on a name is accepted
    pub fn exclude_fields(self, fixed: &[M::Field]) -> Self {
        let params = self.params;
        let requested = params.get("exclude").map(ParamValue::values).unwrap_or_default();

        let mut excluded: Vec<String> = Vec::new();
        let names = std::iter::once(M::VERSION_KEY)
            .chain(fixed.iter().map(|field| field.name()))
            .chain(requested);
        for name in names {
            let name = name.trim().trim_start_matches('-');
            if !name.is_empty() && !excluded.iter().any(|existing| existing == name) {
                excluded.push(name.to_string());
            }
        }

        self.map(|query| query.select(excluded))
    }

    /// The accumulated query
    pub fn into_query(self) -> Query<M> {
        self.query
    }
}

fn range_bound<F: NumericField>(value: Option<&ParamValue>, field: F) -> Result<Option<f64>> {
    let invalid = || {
        Error::Range(RangeValidationError {
            field: field.name().to_string(),
        })
    };

    let Some(value) = value else {
        return Ok(None);
    };
    match value.values().as_slice() {
        [] => Ok(None),
        [raw] => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|bound| !bound.is_nan())
            .map(Some)
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
        .map(|n| n.min(MAX_COUNT))
}

/// Whether a client-named field may be filtered or sorted on
///
/// Operator segments (`$where`, `a.$gt`) and the model's hidden fields
/// (and their subpaths) are refused.
fn queryable<M: Model>(key: &str) -> bool {
    if key.is_empty() || key.split('.').any(|segment| segment.starts_with('$')) {
        return false;
    }
    !M::HIDDEN_FIELDS.iter().any(|hidden| {
        key == *hidden
            || key
                .strip_prefix(hidden)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}
