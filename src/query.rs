//! Query string serialization for read requests.
//!
//! Filters and limiters are rendered as compact JSON and percent-escaped with
//! the same unreserved set as ECMAScript's `encodeURIComponent`, which is what
//! the backend's query parser expects.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::types::{Filter, QueryLimiters};

/// Characters escaped in a query component.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-escape a single query component.
pub fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}

/// Render a value as compact JSON and escape it. Empty objects and arrays
/// render as the empty string.
fn encode_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_value(value)?;
    let empty = match &json {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    if empty {
        return Ok(String::new());
    }
    Ok(encode_component(&json.to_string()))
}

/// Build the query string for a read request.
///
/// Parameters appear in the fixed order `where`, `limit`, `skip`, `sort`,
/// `populate`. Returns `?`-prefixed parameters joined by `&`, or the empty
/// string when nothing contributes.
pub fn serialize_query(filter: &Filter, limiters: &QueryLimiters) -> Result<String> {
    let mut parts = Vec::new();

    if !filter.is_empty() {
        parts.push(format!("where={}", encode_json(filter)?));
    }

    if let Some(limit) = limiters.limit.filter(|l| *l > 0) {
        parts.push(format!("limit={}", limit));
    }

    if let Some(skip) = limiters.skip.filter(|s| *s > 0) {
        parts.push(format!("skip={}", skip));
    }

    if let Some(sort) = limiters.sort.as_ref().filter(|s| !s.is_empty()) {
        parts.push(format!("sort={}", encode_json(sort)?));
    }

    if let Some(populate) = &limiters.populate {
        parts.push(format!("populate={}", encode_json(&populate.relation_names())?));
    }

    if parts.is_empty() {
        return Ok(String::new());
    }

    Ok(format!("?{}", parts.join("&")))
}
