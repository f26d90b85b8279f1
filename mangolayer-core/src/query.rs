//! Generic resource queries and their translation into the store's native dialect.
//!
//! A generic [`Query`] is a flat JSON object. Five reserved control keys steer
//! projection, ordering and paging; every other key is a predicate on a document
//! field, either a literal (equality) or an operator object:
//!
//! ```ignore
//! use serde_json::json;
//!
//! // name equals "Alice", age greater than 18, newest first, second page of ten
//! let query = json!({
//!     "name": "Alice",
//!     "age": { "$gt": 18 },
//!     "$sort": { "created_at": -1 },
//!     "$skip": 10,
//!     "$limit": 10,
//! });
//! ```
//!
//! [`translate`] maps such a query onto a [`NativeQuery`]: a Mango selector plus
//! `sort`, `fields`, `skip`, `limit` and `use_index`.

use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::{Map, Value};

use crate::error::{ServiceError, ServiceResult};

/// A generic resource query.
pub type Query = Map<String, Value>;

/// Control key carrying the field projection list.
pub const SELECT: &str = "$select";
/// Control key carrying the `field -> direction` sort mapping.
pub const SORT: &str = "$sort";
/// Control key carrying the number of documents to skip.
pub const SKIP: &str = "$skip";
/// Control key carrying the maximum number of documents to return.
pub const LIMIT: &str = "$limit";
/// Control key carrying a secondary index hint.
pub const INDEX: &str = "$index";

/// Every reserved control key. None of these ever reaches a native selector.
pub const CONTROL_KEYS: [&str; 5] = [SELECT, SORT, SKIP, LIMIT, INDEX];

/// Returns `true` if `key` is one of the reserved [`CONTROL_KEYS`].
pub fn is_control_key(key: &str) -> bool {
    CONTROL_KEYS.contains(&key)
}

/// Returns the data predicates of `query`, without any control key.
pub fn data_predicates(query: &Query) -> Query {
    query
        .iter()
        .filter(|(key, _)| !is_control_key(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

impl SortDirection {
    /// The direction's name in the native dialect.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// A single-field sort specification.
///
/// Serializes as a one-entry object, `{ "<field>": "asc" | "desc" }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Sort { field: field.into(), direction }
    }
}

impl Serialize for Sort {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.field, self.direction.as_str())?;
        map.end()
    }
}

/// A query in the store's native dialect.
///
/// Serializes to the body of a Mango `_find` request; absent parts are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NativeQuery {
    /// Data-field predicates.
    pub selector: Map<String, Value>,
    /// Fields to project, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    /// Ordered sort specification, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<Sort>>,
    /// Number of documents to skip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
    /// Maximum number of documents to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Index to force, either a design document name or `[ddoc, name]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_index: Option<Value>,
}

impl NativeQuery {
    /// Creates a query with the given selector and nothing else.
    pub fn with_selector(selector: Map<String, Value>) -> Self {
        NativeQuery { selector, ..Default::default() }
    }
}

/// Translates a generic query into a [`NativeQuery`].
///
/// Control keys map onto their native counterparts; every other key is copied into
/// the selector verbatim. An empty selector is returned as-is: choosing a default
/// predicate is the caller's concern.
///
/// # Errors
///
/// Returns [`ServiceError::BadRequest`] if `$select`, `$sort`, `$skip` or `$limit`
/// is malformed.
pub fn translate(query: &Query) -> ServiceResult<NativeQuery> {
    let mut native = NativeQuery::default();

    for (key, value) in query {
        match key.as_str() {
            SELECT => native.fields = Some(convert_select(value)?),
            INDEX => native.use_index = Some(value.clone()),
            SORT => native.sort = Some(convert_sort(value)?),
            SKIP => native.skip = Some(coerce_integer(SKIP, value)?),
            LIMIT => native.limit = Some(coerce_integer(LIMIT, value)?),
            _ => {
                native.selector.insert(key.clone(), value.clone());
            }
        }
    }

    Ok(native)
}

/// Converts a `field -> direction` mapping into an ordered sort list.
///
/// Positive directions sort ascending, negative descending; zero or unparseable
/// directions are dropped. Directions may be numbers or numeric strings.
///
/// # Errors
///
/// Returns [`ServiceError::BadRequest`] if `sort` is not an object.
pub fn convert_sort(sort: &Value) -> ServiceResult<Vec<Sort>> {
    let fields = sort.as_object().ok_or_else(|| {
        ServiceError::BadRequest(format!("{SORT} must be an object, got {sort}"))
    })?;

    Ok(fields
        .iter()
        .filter_map(|(field, direction)| match sort_sign(direction) {
            Some(sign) if sign > 0.0 => Some(Sort::new(field.clone(), SortDirection::Asc)),
            Some(sign) if sign < 0.0 => Some(Sort::new(field.clone(), SortDirection::Desc)),
            _ => None,
        })
        .collect())
}

fn sort_sign(direction: &Value) -> Option<f64> {
    match direction {
        Value::Number(number) => number.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Converts a `$select` value into a field list.
///
/// # Errors
///
/// Returns [`ServiceError::BadRequest`] unless `select` is a string or a list of strings.
pub fn convert_select(select: &Value) -> ServiceResult<Vec<String>> {
    match select {
        Value::String(field) => Ok(vec![field.clone()]),
        Value::Array(fields) => fields
            .iter()
            .map(|field| {
                field.as_str().map(str::to_string).ok_or_else(|| {
                    ServiceError::BadRequest(format!(
                        "{SELECT} entries must be strings, got {field}"
                    ))
                })
            })
            .collect(),
        other => Err(ServiceError::BadRequest(format!(
            "{SELECT} must be a list of field names, got {other}"
        ))),
    }
}

/// Coerces a control value into a non-negative integer.
///
/// Numbers are truncated; strings are parsed from their leading digits, so `"10"`
/// and `"10abc"` both give 10.
///
/// # Errors
///
/// Returns [`ServiceError::BadRequest`] naming `key` if the value is negative or
/// has no numeric reading.
pub fn coerce_integer(key: &str, value: &Value) -> ServiceResult<usize> {
    let invalid = || {
        ServiceError::BadRequest(format!("{key} must be a non-negative integer, got {value}"))
    };

    match value {
        Value::Number(number) => {
            if let Some(n) = number.as_u64() {
                return usize::try_from(n).map_err(|_| invalid());
            }
            match number.as_f64() {
                Some(n) if n >= 0.0 && n.is_finite() => Ok(n.trunc() as usize),
                _ => Err(invalid()),
            }
        }
        Value::String(s) => {
            let digits: String = s
                .trim_start()
                .trim_start_matches('+')
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            digits.parse::<usize>().map_err(|_| invalid())
        }
        _ => Err(invalid()),
    }
}
