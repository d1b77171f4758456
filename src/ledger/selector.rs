//! Evaluation of rich query documents against JSON values.
//!
//! A query document has the shape
//! `{"selector": {...}, "sort": [{"asset.timestamp": "asc"}]}`. Selector
//! fields are dotted paths or nested objects; a value is matched by equality
//! unless it is an operator object (`$eq`, `$ne`, `$in`, `$gt`, `$gte`, `$lt`,
//! `$lte`). Rows are ordered by the sort fields and then by ledger key, which
//! makes the order total and deterministic.

use std::cmp::Ordering;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, ThothError};

#[derive(Debug, Clone, PartialEq, Eq)]
struct SortField {
    path: Vec<String>,
    descending: bool,
}

/// A parsed rich query document.
#[derive(Debug, Clone)]
pub struct RichQuery {
    selector: Map<String, Value>,
    sort: Vec<SortField>,
}

/// Position of a row in query order. Serialized into bookmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowPosition {
    #[serde(rename = "s")]
    pub sort_values: Vec<Value>,
    #[serde(rename = "k")]
    pub key: String,
}

impl RichQuery {
    /// Parses a query document.
    ///
    /// # Errors
    ///
    /// Returns [`ThothError::BadRequest`] if the document is not JSON, has no
    /// `selector` object, or carries a malformed `sort` clause.
    pub fn parse(document: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(document)
            .map_err(|e| ThothError::BadRequest(format!("invalid query document: {}", e)))?;

        let selector = match value.get("selector") {
            Some(Value::Object(selector)) => selector.clone(),
            _ => {
                return Err(ThothError::BadRequest(
                    "query document requires a selector object".to_string(),
                ));
            }
        };

        let sort = match value.get("sort") {
            None => Vec::new(),
            Some(Value::Array(fields)) => fields
                .iter()
                .map(parse_sort_field)
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(ThothError::BadRequest(
                    "query sort clause must be an array".to_string(),
                ));
            }
        };

        Ok(Self { selector, sort })
    }

    /// Returns `true` when `document` satisfies the selector.
    pub fn matches(&self, document: &Value) -> bool {
        matches_object(&self.selector, document)
    }

    /// Computes the position of a row in query order.
    pub fn position(&self, key: &str, document: &Value) -> RowPosition {
        RowPosition {
            sort_values: self
                .sort
                .iter()
                .map(|field| lookup(document, &field.path).cloned().unwrap_or(Value::Null))
                .collect(),
            key: key.to_string(),
        }
    }

    /// Orders two row positions: sort fields first, ledger key last.
    pub fn compare(&self, a: &RowPosition, b: &RowPosition) -> Ordering {
        for (index, field) in self.sort.iter().enumerate() {
            let left = a.sort_values.get(index).unwrap_or(&Value::Null);
            let right = b.sort_values.get(index).unwrap_or(&Value::Null);
            let ordering = collate(left, right);
            let ordering = if field.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.key.cmp(&b.key)
    }
}

fn parse_sort_field(field: &Value) -> Result<SortField> {
    match field {
        Value::String(path) => Ok(SortField {
            path: split_path(path),
            descending: false,
        }),
        Value::Object(spec) if spec.len() == 1 => {
            let (path, direction) = spec
                .iter()
                .next()
                .ok_or_else(|| ThothError::BadRequest("empty sort field".to_string()))?;
            let descending = match direction.as_str() {
                Some("asc") => false,
                Some("desc") => true,
                _ => {
                    return Err(ThothError::BadRequest(format!(
                        "sort direction of {} must be \"asc\" or \"desc\"",
                        path
                    )));
                }
            };
            Ok(SortField {
                path: split_path(path),
                descending,
            })
        }
        other => Err(ThothError::BadRequest(format!(
            "invalid sort field {}",
            other
        ))),
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

fn lookup<'v>(document: &'v Value, path: &[String]) -> Option<&'v Value> {
    path.iter()
        .try_fold(document, |current, segment| current.get(segment.as_str()))
}

fn is_operator_object(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty() && map.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn matches_object(selector: &Map<String, Value>, document: &Value) -> bool {
    selector.iter().all(|(field, condition)| {
        let path = split_path(field);
        let candidate = lookup(document, &path);
        matches_condition(condition, candidate)
    })
}

fn matches_condition(condition: &Value, candidate: Option<&Value>) -> bool {
    if is_operator_object(condition) {
        let Value::Object(operators) = condition else {
            return false;
        };
        return operators
            .iter()
            .all(|(operator, operand)| matches_operator(operator, operand, candidate));
    }

    match (condition, candidate) {
        (Value::Object(nested), Some(candidate @ Value::Object(_))) => {
            matches_object(nested, candidate)
        }
        (_, Some(candidate)) => candidate == condition,
        (_, None) => false,
    }
}

fn matches_operator(operator: &str, operand: &Value, candidate: Option<&Value>) -> bool {
    match operator {
        "$eq" => candidate == Some(operand),
        "$ne" => candidate != Some(operand),
        "$in" => match (operand, candidate) {
            (Value::Array(options), Some(candidate)) => options.contains(candidate),
            _ => false,
        },
        "$gt" => candidate.is_some_and(|c| collate(c, operand) == Ordering::Greater),
        "$gte" => candidate.is_some_and(|c| collate(c, operand) != Ordering::Less),
        "$lt" => candidate.is_some_and(|c| collate(c, operand) == Ordering::Less),
        "$lte" => candidate.is_some_and(|c| collate(c, operand) != Ordering::Greater),
        _ => false,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: null < booleans < numbers < strings <
/// arrays < objects, values of the same type compared naturally.
pub fn collate(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ordering = collate(left, right);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            // Objects have no natural order; compare their canonical text.
            Value::Object(x.clone())
                .to_string()
                .cmp(&Value::Object(y.clone()).to_string())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Encodes a row position as an opaque, URL-safe bookmark.
pub fn encode_bookmark(position: &RowPosition) -> Result<String> {
    let raw = serde_json::to_vec(position)?;
    Ok(URL_SAFE_NO_PAD.encode(raw))
}

/// Decodes a bookmark produced by [`encode_bookmark`].
///
/// # Errors
///
/// Returns [`ThothError::BadRequest`] if the bookmark was not issued by this
/// ledger.
pub fn decode_bookmark(bookmark: &str) -> Result<RowPosition> {
    let invalid = || ThothError::BadRequest(format!("invalid bookmark {:?}", bookmark));

    let raw = URL_SAFE_NO_PAD.decode(bookmark).map_err(|_| invalid())?;
    serde_json::from_slice(&raw).map_err(|_| invalid())
}
