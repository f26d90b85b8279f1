//! Mango selector evaluation for in-memory document filtering.
//!
//! Values are compared with CouchDB's collation: `null < false < true < numbers <
//! strings < arrays < objects`, arrays element-wise, objects key by key.

use serde_json::{Map, Value};
use std::cmp::Ordering;

use mangolayer_core::{
    document::Document,
    error::{ServiceError, ServiceResult},
};

/// Collation-ordered view over a JSON value.
#[derive(Debug)]
pub(crate) enum Collated<'a> {
    Null,
    Bool(bool),
    Number(f64),
    String(&'a str),
    Array(Vec<Collated<'a>>),
    Object(Vec<(&'a str, Collated<'a>)>),
}

impl<'a> From<&'a Value> for Collated<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Collated::Null,
            Value::Bool(value) => Collated::Bool(*value),
            Value::Number(value) => Collated::Number(value.as_f64().unwrap_or(f64::NAN)),
            Value::String(value) => Collated::String(value),
            Value::Array(items) => Collated::Array(items.iter().map(Collated::from).collect()),
            Value::Object(map) => Collated::Object(
                map.iter()
                    .map(|(k, v)| (k.as_str(), Collated::from(v)))
                    .collect(),
            ),
        }
    }
}

impl<'a> Collated<'a> {
    fn rank(&self) -> u8 {
        match self {
            Collated::Null => 0,
            Collated::Bool(_) => 1,
            Collated::Number(_) => 2,
            Collated::String(_) => 3,
            Collated::Array(_) => 4,
            Collated::Object(_) => 5,
        }
    }

    pub(crate) fn collate(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Collated::Bool(a), Collated::Bool(b)) => a.cmp(b),
            (Collated::Number(a), Collated::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Collated::String(a), Collated::String(b)) => a.cmp(b),
            (Collated::Array(a), Collated::Array(b)) => {
                for (left, right) in a.iter().zip(b.iter()) {
                    match left.collate(right) {
                        Ordering::Equal => continue,
                        ordering => return ordering,
                    }
                }
                a.len().cmp(&b.len())
            }
            (Collated::Object(a), Collated::Object(b)) => {
                for ((left_key, left), (right_key, right)) in a.iter().zip(b.iter()) {
                    match left_key.cmp(right_key).then_with(|| left.collate(right)) {
                        Ordering::Equal => continue,
                        ordering => return ordering,
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Compares two JSON values by collation.
pub(crate) fn collate(left: &Value, right: &Value) -> Ordering {
    Collated::from(left).collate(&Collated::from(right))
}

fn equals(left: &Value, right: &Value) -> bool {
    collate(left, right) == Ordering::Equal
}

/// Looks up a dotted field path.
pub(crate) fn lookup<'v>(document: &'v Document, path: &str) -> Option<&'v Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Evaluates a Mango selector against one document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns whether the document satisfies every clause of `selector`.
    pub fn evaluate(&self, selector: &Map<String, Value>) -> ServiceResult<bool> {
        for (key, condition) in selector {
            let matched = match key.as_str() {
                "$and" => self.all(selectors(key, condition)?)?,
                "$or" => self.any(selectors(key, condition)?)?,
                "$nor" => !self.any(selectors(key, condition)?)?,
                "$not" => !self.evaluate(as_selector(key, condition)?)?,
                operator if operator.starts_with('$') => {
                    return Err(unsupported(operator));
                }
                path => condition_matches(lookup(self.document, path), condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn all(&self, selectors: Vec<&Map<String, Value>>) -> ServiceResult<bool> {
        for selector in selectors {
            if !self.evaluate(selector)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn any(&self, selectors: Vec<&Map<String, Value>>) -> ServiceResult<bool> {
        for selector in selectors {
            if self.evaluate(selector)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Keeps the documents matching `selector`, preserving order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = Document>,
        selector: &Map<String, Value>,
    ) -> ServiceResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(&document).evaluate(selector)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }
}

fn selectors<'v>(
    operator: &str,
    value: &'v Value,
) -> ServiceResult<Vec<&'v Map<String, Value>>> {
    value
        .as_array()
        .ok_or_else(|| {
            ServiceError::BadRequest(format!("{operator} requires an array of selectors"))
        })?
        .iter()
        .map(|selector| as_selector(operator, selector))
        .collect()
}

fn as_selector<'v>(operator: &str, value: &'v Value) -> ServiceResult<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ServiceError::BadRequest(format!("{operator} requires a selector object")))
}

fn unsupported(operator: &str) -> ServiceError {
    ServiceError::BadRequest(format!("Unknown operator {operator}"))
}

/// Matches a field value (absent if `None`) against a condition.
///
/// A condition is either a literal, compared for equality, or an object whose
/// `$`-keys are operators and whose other keys are nested sub-paths.
fn condition_matches(value: Option<&Value>, condition: &Value) -> ServiceResult<bool> {
    let clauses = match condition {
        Value::Object(clauses) if !clauses.is_empty() => clauses,
        literal => return Ok(value.is_some_and(|value| equals(value, literal))),
    };

    for (key, argument) in clauses {
        let matched = if key.starts_with('$') {
            operator_matches(value, key, argument)?
        } else {
            let nested = value.and_then(Value::as_object).and_then(|map| map.get(key));
            condition_matches(nested, argument)?
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn operator_matches(
    value: Option<&Value>,
    operator: &str,
    argument: &Value,
) -> ServiceResult<bool> {
    let compare = |accept: fn(Ordering) -> bool| {
        value.is_some_and(|value| accept(collate(value, argument)))
    };

    Ok(match operator {
        "$eq" => compare(Ordering::is_eq),
        "$ne" => compare(Ordering::is_ne),
        "$gt" => compare(Ordering::is_gt),
        "$gte" => compare(Ordering::is_ge),
        "$lt" => compare(Ordering::is_lt),
        "$lte" => compare(Ordering::is_le),
        "$exists" => {
            let should_exist = argument
                .as_bool()
                .ok_or_else(|| ServiceError::BadRequest("$exists requires a boolean".to_string()))?;
            value.is_some() == should_exist
        }
        "$in" => {
            let candidates = array_argument(operator, argument)?;
            value.is_some_and(|value| contains_any(value, candidates))
        }
        "$nin" => {
            let candidates = array_argument(operator, argument)?;
            value.is_some_and(|value| !contains_any(value, candidates))
        }
        "$type" => {
            let expected = argument
                .as_str()
                .ok_or_else(|| ServiceError::BadRequest("$type requires a string".to_string()))?;
            value.is_some_and(|value| type_name(value) == expected)
        }
        "$size" => {
            let size = argument
                .as_u64()
                .ok_or_else(|| {
                    ServiceError::BadRequest("$size requires a non-negative integer".to_string())
                })?;
            matches!(value, Some(Value::Array(items)) if items.len() as u64 == size)
        }
        "$all" => {
            let required = array_argument(operator, argument)?;
            match value {
                Some(Value::Array(items)) => required
                    .iter()
                    .all(|needle| items.iter().any(|item| equals(item, needle))),
                _ => false,
            }
        }
        "$mod" => {
            let (divisor, remainder) = match array_argument(operator, argument)?.as_slice() {
                [divisor, remainder] => (divisor.as_i64(), remainder.as_i64()),
                _ => (None, None),
            };
            let (Some(divisor), Some(remainder)) = (divisor, remainder) else {
                return Err(ServiceError::BadRequest(
                    "$mod requires [divisor, remainder] integers".to_string(),
                ));
            };
            if divisor == 0 {
                return Err(ServiceError::BadRequest("$mod divisor must not be zero".to_string()));
            }
            value
                .and_then(Value::as_i64)
                .is_some_and(|n| n.wrapping_rem(divisor) == remainder)
        }
        "$elemMatch" => match value {
            Some(Value::Array(items)) => {
                let mut matched = false;
                for item in items {
                    if condition_matches(Some(item), argument)? {
                        matched = true;
                        break;
                    }
                }
                matched
            }
            _ => false,
        },
        "$allMatch" => match value {
            Some(Value::Array(items)) if !items.is_empty() => {
                let mut matched = true;
                for item in items {
                    if !condition_matches(Some(item), argument)? {
                        matched = false;
                        break;
                    }
                }
                matched
            }
            _ => false,
        },
        "$not" => !condition_matches(value, argument)?,
        "$and" | "$or" | "$nor" => {
            let conditions = array_argument(operator, argument)?;
            let mut results = Vec::with_capacity(conditions.len());
            for condition in conditions {
                results.push(condition_matches(value, condition)?);
            }
            match operator {
                "$and" => results.iter().all(|matched| *matched),
                "$or" => results.iter().any(|matched| *matched),
                _ => !results.iter().any(|matched| *matched),
            }
        }
        other => return Err(unsupported(other)),
    })
}

fn array_argument<'v>(operator: &str, argument: &'v Value) -> ServiceResult<&'v Vec<Value>> {
    argument
        .as_array()
        .ok_or_else(|| ServiceError::BadRequest(format!("{operator} requires an array")))
}

/// Whether `value`, or any element of it if it is an array, equals a candidate.
fn contains_any(value: &Value, candidates: &[Value]) -> bool {
    let hit = |item: &Value| candidates.iter().any(|candidate| equals(item, candidate));

    match value {
        Value::Array(items) => hit(value) || items.iter().any(hit),
        _ => hit(value),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
