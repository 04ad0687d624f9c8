//! Core types shared by the request, response and streaming layers.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::Error;

/// Criteria selecting which records an operation applies to.
///
/// Passed through to the backend unvalidated; key order is preserved.
pub type Filter = Map<String, Value>;

/// Header name to value mapping for a single request.
pub type Headers = BTreeMap<String, String>;

/// Marker value requesting that every relation be expanded.
pub const POPULATE_ALL: &str = "*";

/// HTTP methods the connector issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// Upper-case method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
        match input.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            _ => Err(Error::Configuration(format!(
                "Unsupported HTTP method: {}",
                input
            ))),
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relation population directive.
#[derive(Clone, Debug, PartialEq)]
pub enum Populate {
    /// Expand every relation.
    All,
    /// Expand the named relations. Only the keys are transmitted.
    Relations(Map<String, Value>),
}

impl Populate {
    /// Relation names as sent on the wire.
    pub fn relation_names(&self) -> Vec<String> {
        match self {
            Populate::All => vec![POPULATE_ALL.to_string()],
            Populate::Relations(map) => map.keys().cloned().collect(),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if s == POPULATE_ALL => Some(Populate::All),
            Value::Object(map) => Some(Populate::Relations(map.clone())),
            Value::Array(names) => Some(Populate::Relations(
                names
                    .iter()
                    .filter_map(|n| n.as_str())
                    .map(|n| (n.to_string(), Value::Bool(true)))
                    .collect(),
            )),
            _ => None,
        }
    }
}

/// Pagination, sorting and population directives accompanying a read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryLimiters {
    /// Maximum number of records.
    pub limit: Option<u64>,
    /// Number of records to skip.
    pub skip: Option<u64>,
    /// Field to direction mapping.
    pub sort: Option<Map<String, Value>>,
    /// Relations to expand.
    pub populate: Option<Populate>,
    /// Batch addressed by a batch stream.
    pub batch_number: Option<u64>,
}

impl QueryLimiters {
    /// Create empty limiters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Add a sort direction for a field. Directions are passed through as given.
    pub fn sort_by(mut self, field: impl Into<String>, direction: impl Into<Value>) -> Self {
        self.sort
            .get_or_insert_with(Map::new)
            .insert(field.into(), direction.into());
        self
    }

    pub fn populate_all(mut self) -> Self {
        self.populate = Some(Populate::All);
        self
    }

    /// Add a relation to expand. The criteria stay local and are not transmitted.
    pub fn populate(mut self, relation: impl Into<String>, criteria: impl Into<Value>) -> Self {
        match &mut self.populate {
            Some(Populate::Relations(map)) => {
                map.insert(relation.into(), criteria.into());
            }
            _ => {
                let mut map = Map::new();
                map.insert(relation.into(), criteria.into());
                self.populate = Some(Populate::Relations(map));
            }
        }
        self
    }

    pub fn batch(mut self, batch_number: u64) -> Self {
        self.batch_number = Some(batch_number);
        self
    }

    /// Lift limiter keys (`limit`, `skip`, `sort`, `populate`, `batchNumber`)
    /// out of a loosely-typed payload. Unrecognised or malformed keys are ignored.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        Self {
            limit: obj.get("limit").and_then(as_count),
            skip: obj.get("skip").and_then(as_count),
            sort: obj.get("sort").and_then(|s| s.as_object().cloned()),
            populate: obj.get("populate").and_then(Populate::from_value),
            batch_number: obj.get("batchNumber").and_then(as_count),
        }
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Descriptor of the REST collection an operation addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelConfig {
    /// Resource collection name, e.g. `user`.
    pub model_name: String,
}

impl ModelConfig {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
        }
    }
}

/// A to-many association on one record, e.g. the `roles` of user `4`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelCollection {
    /// Model owning the association.
    pub model: String,
    /// Identifier of the owning record.
    pub instance: String,
    /// Association name.
    pub name: String,
}

impl ModelCollection {
    pub fn new(
        model: impl Into<String>,
        instance: impl std::fmt::Display,
        name: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            instance: instance.to_string(),
            name: name.into(),
        }
    }
}

/// A fully specified request, built fresh for every call.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    /// Serialized JSON body; never set for GET.
    pub body: Option<String>,
}

/// Totals returned once a stream has been fully consumed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Bytes received (incremental reads) or text length (fallback path).
    pub length: usize,
    /// All decoded text, in arrival order.
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_round_trip() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_populate_builder_keeps_relations() {
        let limiters = QueryLimiters::new()
            .populate("owner", json!({"active": true}))
            .populate("tags", json!({}));
        assert_eq!(
            limiters.populate.unwrap().relation_names(),
            vec!["owner".to_string(), "tags".to_string()]
        );
    }

    #[test]
    fn test_populate_all_overrides_names() {
        let limiters = QueryLimiters::new().populate("owner", json!({})).populate_all();
        assert_eq!(limiters.populate.unwrap().relation_names(), vec!["*"]);
    }

    #[test]
    fn test_from_value_lifts_limiter_keys() {
        let limiters = QueryLimiters::from_value(&json!({
            "name": "x",
            "limit": 10,
            "skip": "5",
            "sort": {"name": "ASC"},
            "populate": "*",
            "batchNumber": 2
        }));
        assert_eq!(limiters.limit, Some(10));
        assert_eq!(limiters.skip, Some(5));
        assert_eq!(limiters.sort.unwrap()["name"], json!("ASC"));
        assert_eq!(limiters.populate, Some(Populate::All));
        assert_eq!(limiters.batch_number, Some(2));
    }

    #[test]
    fn test_from_value_ignores_non_objects() {
        assert_eq!(QueryLimiters::from_value(&json!([1, 2])), QueryLimiters::default());
        let limiters = QueryLimiters::from_value(&json!({"limit": -3, "populate": 4}));
        assert_eq!(limiters.limit, None);
        assert_eq!(limiters.populate, None);
    }
}
