use crate::errors::{Result, ThothError};

const MIN_UNICODE_RUNE: char = '\u{0}';
const MAX_UNICODE_RUNE: char = '\u{10FFFF}';
const NAMESPACE: &str = "\u{0}";

fn validate_component(component: &str) -> Result<()> {
    if component.contains(MIN_UNICODE_RUNE) || component.contains(MAX_UNICODE_RUNE) {
        return Err(ThothError::BadRequest(format!(
            "composite key component {:?} contains a reserved character",
            component
        )));
    }
    Ok(())
}

/// Encodes `object_type` and `attributes` into a single ledger key.
///
/// The key is `\0 object_type \0 attr1 \0 attr2 \0 ...`, so that every prefix of
/// the attribute list is also a byte prefix of the encoded key.
///
/// # Errors
///
/// Returns [`ThothError::BadRequest`] if `object_type` is empty or if any
/// component contains `U+0000` or `U+10FFFF`.
///
/// # Examples
///
/// ```
/// use thoth::ledger::{create_composite_key, split_composite_key};
///
/// let key = create_composite_key("plan~status~task", &["p1", "WAITING", "t1"]).unwrap();
/// let (object_type, attributes) = split_composite_key(&key).unwrap();
/// assert_eq!(object_type, "plan~status~task");
/// assert_eq!(attributes, vec!["p1", "WAITING", "t1"]);
/// ```
pub fn create_composite_key(object_type: &str, attributes: &[&str]) -> Result<String> {
    if object_type.is_empty() {
        return Err(ThothError::BadRequest(
            "composite key object type must not be empty".to_string(),
        ));
    }
    validate_component(object_type)?;

    let mut key = String::with_capacity(
        2 + object_type.len() + attributes.iter().map(|a| a.len() + 1).sum::<usize>(),
    );
    key.push_str(NAMESPACE);
    key.push_str(object_type);
    key.push(MIN_UNICODE_RUNE);
    for attribute in attributes {
        validate_component(attribute)?;
        key.push_str(attribute);
        key.push(MIN_UNICODE_RUNE);
    }
    Ok(key)
}

/// Splits a key built by [`create_composite_key`] back into its parts.
///
/// # Errors
///
/// Returns [`ThothError::BadRequest`] if `key` is not a composite key.
pub fn split_composite_key(key: &str) -> Result<(String, Vec<String>)> {
    let body = key
        .strip_prefix(NAMESPACE)
        .and_then(|rest| rest.strip_suffix(MIN_UNICODE_RUNE))
        .ok_or_else(|| ThothError::BadRequest(format!("{:?} is not a composite key", key)))?;

    let mut components = body.split(MIN_UNICODE_RUNE);
    let object_type = components
        .next()
        .filter(|object_type| !object_type.is_empty())
        .ok_or_else(|| ThothError::BadRequest(format!("{:?} has no object type", key)))?;

    Ok((
        object_type.to_string(),
        components.map(str::to_string).collect(),
    ))
}

/// Returns `true` when `key` belongs to the composite key namespace.
pub fn is_composite_key(key: &str) -> bool {
    key.starts_with(NAMESPACE)
}
