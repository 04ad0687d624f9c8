//! Translation of abstract model operations into outbound HTTP requests.
//!
//! Routes follow the `<base-url><model>/<suffix>` convention of the backend
//! API. Read operations carry their filter in the query string; every other
//! method carries its payload as a JSON body.

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::query::serialize_query;
use crate::types::{
    Filter, Headers, HttpMethod, ModelCollection, ModelConfig, OutboundRequest, QueryLimiters,
};

/// Cross-origin directive attached when CORS mode is enabled.
const CORS_HEADER: (&str, &str) = ("Access-Control-Allow-Origin", "*");

/// An abstract operation against a model collection.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    /// Read a single record; targets `<id>` when the filter is an id alone.
    FindOne {
        filter: Filter,
        limiters: QueryLimiters,
    },
    Find {
        filter: Filter,
        limiters: QueryLimiters,
    },
    Create {
        values: Value,
    },
    CreateMany {
        values: Vec<Value>,
    },
    /// Update one record addressed by the id inside `values`.
    Save {
        values: Value,
    },
    /// Update every record matching `query`.
    Update {
        query: Filter,
        update: Value,
    },
    /// Delete one record; `target` is an id or a record carrying one.
    Destroy {
        target: Value,
    },
    DestroyAll {
        filter: Filter,
    },
    Count {
        filter: Filter,
    },
    Schema,
    Sum {
        attribute: String,
        filter: Filter,
    },
    Avg {
        attribute: String,
        filter: Filter,
    },
    FindOrCreate {
        criteria: Filter,
        initial_values: Value,
    },
    StreamEach {
        filter: Filter,
        limiters: QueryLimiters,
    },
    /// Stream the batch named by `limiters.batch_number`.
    StreamBatch {
        filter: Filter,
        limiters: QueryLimiters,
    },
    AddToCollection {
        collection: ModelCollection,
        value: Value,
    },
    RemoveFromCollection {
        collection: ModelCollection,
        value: Value,
    },
    /// Caller-supplied path, appended to the model route or used as an
    /// absolute URL when no model is given.
    Raw {
        path: String,
        payload: Value,
        method: HttpMethod,
    },
}

/// Extract a record identifier from a bare id or from the `id` field of a
/// record. Null, `false`, zero and empty strings count as missing.
pub fn identifier_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Object(map) => map.get("id").and_then(|id| match id {
            Value::Object(_) => None,
            scalar => identifier_of(scalar),
        }),
        _ => None,
    }
}

/// Identifier a single-record read should target, present only when the
/// filter consists of a scalar `id` and nothing else.
pub fn lookup_identifier(filter: &Filter) -> Option<String> {
    if filter.len() != 1 {
        return None;
    }
    filter.get("id").and_then(|id| match id {
        Value::String(_) | Value::Number(_) => identifier_of(id),
        _ => None,
    })
}

/// Builds [`OutboundRequest`]s for a single backend.
#[derive(Clone, Debug)]
pub struct RequestBuilder {
    base_url: String,
    cors: bool,
}

impl RequestBuilder {
    /// `base_url` is used verbatim as the route prefix, so it normally ends
    /// with `/`.
    pub fn new(base_url: impl Into<String>, cors: bool) -> Self {
        Self {
            base_url: base_url.into(),
            cors,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cors(&self) -> bool {
        self.cors
    }

    /// Collection route `<base-url><model>/`.
    pub fn route(&self, model: Option<&ModelConfig>) -> Result<String> {
        let model = model.ok_or_else(|| {
            Error::Configuration("Model configuration details are required".to_string())
        })?;
        if model.model_name.is_empty() {
            return Err(Error::Configuration(
                "Model name must not be empty".to_string(),
            ));
        }
        Ok(format!("{}{}/", self.base_url, model.model_name))
    }

    /// Headers for one request: JSON content negotiation, then the caller's
    /// auth headers, then the CORS directive when enabled.
    pub fn headers(&self, auth: &Headers) -> Headers {
        let mut headers = Headers::new();
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.extend(auth.iter().map(|(k, v)| (k.clone(), v.clone())));
        if self.cors {
            headers.insert(CORS_HEADER.0.to_string(), CORS_HEADER.1.to_string());
        }
        headers
    }

    /// Produce the request for `operation`.
    ///
    /// Fails before anything is sent when the model is missing or a
    /// single-record operation has no identifier.
    pub fn build(
        &self,
        operation: &Operation,
        model: Option<&ModelConfig>,
        auth: &Headers,
    ) -> Result<OutboundRequest> {
        match operation {
            Operation::FindOne { filter, limiters } => {
                let route = self.route(model)?;
                match lookup_identifier(filter) {
                    Some(id) => self.read(route + &id, &Filter::new(), limiters, auth),
                    None => self.read(route, filter, limiters, auth),
                }
            }
            Operation::Find { filter, limiters } => {
                self.read(self.route(model)?, filter, limiters, auth)
            }
            Operation::Create { values } => {
                self.write(HttpMethod::Post, self.route(model)?, values, auth)
            }
            Operation::CreateMany { values } => {
                self.write(HttpMethod::Post, self.route(model)?, values, auth)
            }
            Operation::Save { values } => {
                let route = self.route(model)?;
                let id = require_identifier(values, model)?;
                self.write(HttpMethod::Put, route + &id, values, auth)
            }
            Operation::Update { query, update } => self.write(
                HttpMethod::Put,
                self.route(model)?,
                &json!({ "query": query, "update": update }),
                auth,
            ),
            Operation::Destroy { target } => {
                let route = self.route(model)?;
                let id = require_identifier(target, model)?;
                self.write(HttpMethod::Delete, route + &id, &json!({}), auth)
            }
            Operation::DestroyAll { filter } => {
                self.write(HttpMethod::Delete, self.route(model)?, filter, auth)
            }
            Operation::Count { filter } => {
                let url = self.route(model)? + "count";
                self.read(url, filter, &QueryLimiters::default(), auth)
            }
            Operation::Schema => {
                let url = self.route(model)? + "schema";
                self.read(url, &Filter::new(), &QueryLimiters::default(), auth)
            }
            Operation::Sum { attribute, filter } => {
                let url = format!("{}sum/{}", self.route(model)?, attribute);
                self.read(url, filter, &QueryLimiters::default(), auth)
            }
            Operation::Avg { attribute, filter } => {
                let url = format!("{}avg/{}", self.route(model)?, attribute);
                self.read(url, filter, &QueryLimiters::default(), auth)
            }
            Operation::FindOrCreate {
                criteria,
                initial_values,
            } => self.write(
                HttpMethod::Post,
                self.route(model)? + "seek",
                &json!({ "criteria": criteria, "initialValues": initial_values }),
                auth,
            ),
            Operation::StreamEach { filter, limiters } => {
                let url = self.route(model)? + "stream";
                self.read(url, filter, limiters, auth)
            }
            Operation::StreamBatch { filter, limiters } => {
                let route = self.route(model)?;
                let batch = limiters.batch_number.ok_or_else(|| {
                    Error::Configuration("A batch stream requires a batch number".to_string())
                })?;
                self.read(format!("{}stream-batch/{}", route, batch), filter, limiters, auth)
            }
            Operation::AddToCollection { collection, value } => {
                let url = self.collection_url(collection, value)?;
                self.write(HttpMethod::Put, url, &json!({}), auth)
            }
            Operation::RemoveFromCollection { collection, value } => {
                let url = self.collection_url(collection, value)?;
                self.write(HttpMethod::Delete, url, &json!({}), auth)
            }
            Operation::Raw {
                path,
                payload,
                method,
            } => {
                let url = match model {
                    Some(_) => self.route(model)? + path,
                    None => path.clone(),
                };
                if *method == HttpMethod::Get {
                    let empty = Filter::new();
                    let filter = payload.as_object().unwrap_or(&empty);
                    self.read(url, filter, &QueryLimiters::from_value(payload), auth)
                } else {
                    self.write(*method, url, payload, auth)
                }
            }
        }
    }

    fn collection_url(&self, collection: &ModelCollection, value: &Value) -> Result<String> {
        let model = ModelConfig::new(collection.model.clone());
        let route = self.route(Some(&model))?;
        let member = require_identifier(value, Some(&model))?;
        Ok(format!(
            "{}{}/{}/{}",
            route, collection.instance, collection.name, member
        ))
    }

    fn read(
        &self,
        url: String,
        filter: &Filter,
        limiters: &QueryLimiters,
        auth: &Headers,
    ) -> Result<OutboundRequest> {
        let query = serialize_query(filter, limiters)?;
        Ok(OutboundRequest {
            method: HttpMethod::Get,
            url: url + &query,
            headers: self.headers(auth),
            body: None,
        })
    }

    fn write<T: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        url: String,
        payload: &T,
        auth: &Headers,
    ) -> Result<OutboundRequest> {
        Ok(OutboundRequest {
            method,
            url,
            headers: self.headers(auth),
            body: Some(serde_json::to_string(payload)?),
        })
    }
}

fn require_identifier(value: &Value, model: Option<&ModelConfig>) -> Result<String> {
    identifier_of(value).ok_or_else(|| Error::MissingIdentifier {
        model: model.map(|m| m.model_name.clone()).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://api.test/";

    fn builder() -> RequestBuilder {
        RequestBuilder::new(BASE, false)
    }

    fn user() -> ModelConfig {
        ModelConfig::new("user")
    }

    fn filter(value: Value) -> Filter {
        value.as_object().cloned().unwrap()
    }

    fn build(op: Operation) -> OutboundRequest {
        builder().build(&op, Some(&user()), &Headers::new()).unwrap()
    }

    #[test]
    fn test_identifier_of() {
        assert_eq!(identifier_of(&json!(7)), Some("7".to_string()));
        assert_eq!(identifier_of(&json!("abc")), Some("abc".to_string()));
        assert_eq!(identifier_of(&json!({"id": 9, "name": "x"})), Some("9".to_string()));
        assert_eq!(identifier_of(&json!({"name": "x"})), None);
        assert_eq!(identifier_of(&json!({"id": null})), None);
        assert_eq!(identifier_of(&json!({"id": {"id": 1}})), None);
        assert_eq!(identifier_of(&json!("")), None);
        assert_eq!(identifier_of(&json!(0)), None);
    }

    #[test]
    fn test_lookup_identifier_requires_lone_scalar_id() {
        assert_eq!(lookup_identifier(&filter(json!({"id": 7}))), Some("7".into()));
        assert_eq!(lookup_identifier(&filter(json!({"id": 7, "status": "x"}))), None);
        assert_eq!(lookup_identifier(&filter(json!({"id": [1, 2]}))), None);
        assert_eq!(lookup_identifier(&filter(json!({"name": "x"}))), None);
    }

    #[test]
    fn test_route_requires_model() {
        let err = builder()
            .build(&Operation::Schema, None, &Headers::new())
            .unwrap_err();
        assert!(err.is_configuration());

        let err = builder()
            .build(&Operation::Schema, Some(&ModelConfig::new("")), &Headers::new())
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_find_one_by_id_targets_id_path() {
        let req = build(Operation::FindOne {
            filter: filter(json!({"id": 7})),
            limiters: QueryLimiters::default(),
        });
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://api.test/user/7");
        assert_eq!(req.body, None);
    }

    #[test]
    fn test_find_one_with_criteria_keeps_id_in_filter() {
        let req = build(Operation::FindOne {
            filter: filter(json!({"id": 7, "status": "x"})),
            limiters: QueryLimiters::default(),
        });
        assert!(req.url.starts_with("http://api.test/user/?where="));
        assert!(req.url.contains("%22id%22%3A7"));
    }

    #[test]
    fn test_find_appends_query_string() {
        let req = build(Operation::Find {
            filter: Filter::new(),
            limiters: QueryLimiters::new().limit(5),
        });
        assert_eq!(req.url, "http://api.test/user/?limit=5");
    }

    #[test]
    fn test_route_table() {
        let cases = vec![
            (
                Operation::Create { values: json!({"name": "a"}) },
                HttpMethod::Post,
                "http://api.test/user/",
            ),
            (
                Operation::CreateMany { values: vec![json!({"name": "a"})] },
                HttpMethod::Post,
                "http://api.test/user/",
            ),
            (
                Operation::Save { values: json!({"id": 3, "name": "a"}) },
                HttpMethod::Put,
                "http://api.test/user/3",
            ),
            (
                Operation::Update { query: Filter::new(), update: json!({}) },
                HttpMethod::Put,
                "http://api.test/user/",
            ),
            (
                Operation::Destroy { target: json!(3) },
                HttpMethod::Delete,
                "http://api.test/user/3",
            ),
            (
                Operation::DestroyAll { filter: Filter::new() },
                HttpMethod::Delete,
                "http://api.test/user/",
            ),
            (
                Operation::Count { filter: Filter::new() },
                HttpMethod::Get,
                "http://api.test/user/count",
            ),
            (Operation::Schema, HttpMethod::Get, "http://api.test/user/schema"),
            (
                Operation::Sum { attribute: "age".into(), filter: Filter::new() },
                HttpMethod::Get,
                "http://api.test/user/sum/age",
            ),
            (
                Operation::Avg { attribute: "age".into(), filter: Filter::new() },
                HttpMethod::Get,
                "http://api.test/user/avg/age",
            ),
            (
                Operation::FindOrCreate { criteria: Filter::new(), initial_values: json!({}) },
                HttpMethod::Post,
                "http://api.test/user/seek",
            ),
            (
                Operation::StreamEach { filter: Filter::new(), limiters: QueryLimiters::new() },
                HttpMethod::Get,
                "http://api.test/user/stream",
            ),
            (
                Operation::StreamBatch { filter: Filter::new(), limiters: QueryLimiters::new().batch(2) },
                HttpMethod::Get,
                "http://api.test/user/stream-batch/2",
            ),
            (
                Operation::AddToCollection {
                    collection: ModelCollection::new("user", 4, "roles"),
                    value: json!({"id": 9}),
                },
                HttpMethod::Put,
                "http://api.test/user/4/roles/9",
            ),
            (
                Operation::RemoveFromCollection {
                    collection: ModelCollection::new("user", 4, "roles"),
                    value: json!(9),
                },
                HttpMethod::Delete,
                "http://api.test/user/4/roles/9",
            ),
        ];

        for (op, method, url) in cases {
            let req = build(op.clone());
            assert_eq!(req.method, method, "{:?}", op);
            assert_eq!(req.url, url, "{:?}", op);
            assert_eq!(req.body.is_some(), method != HttpMethod::Get, "{:?}", op);
        }
    }

    #[test]
    fn test_write_bodies() {
        let req = build(Operation::Update {
            query: filter(json!({"state": "open"})),
            update: json!({"state": "closed"}),
        });
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"query": {"state": "open"}, "update": {"state": "closed"}}));

        let req = build(Operation::FindOrCreate {
            criteria: filter(json!({"email": "a@b"})),
            initial_values: json!({"email": "a@b", "name": "A"}),
        });
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({"criteria": {"email": "a@b"}, "initialValues": {"email": "a@b", "name": "A"}})
        );

        let req = build(Operation::Destroy { target: json!({"id": 3}) });
        assert_eq!(req.body.as_deref(), Some("{}"));
    }

    #[test]
    fn test_non_get_ignores_query_string() {
        let req = build(Operation::DestroyAll {
            filter: filter(json!({"state": "old"})),
        });
        assert_eq!(req.url, "http://api.test/user/");
        assert_eq!(req.body.as_deref(), Some(r#"{"state":"old"}"#));
    }

    #[test]
    fn test_missing_identifier() {
        let err = builder()
            .build(
                &Operation::Save { values: json!({"name": "no id"}) },
                Some(&user()),
                &Headers::new(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::MissingIdentifier { ref model } if model == "user"));

        let err = builder()
            .build(
                &Operation::AddToCollection {
                    collection: ModelCollection::new("user", 4, "roles"),
                    value: json!({}),
                },
                None,
                &Headers::new(),
            )
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_stream_batch_requires_number() {
        let err = builder()
            .build(
                &Operation::StreamBatch { filter: Filter::new(), limiters: QueryLimiters::new() },
                Some(&user()),
                &Headers::new(),
            )
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_raw_paths() {
        let req = build(Operation::Raw {
            path: "custom/action".into(),
            payload: json!({"active": true, "limit": 3}),
            method: HttpMethod::Get,
        });
        assert!(req.url.starts_with("http://api.test/user/custom/action?where="));
        assert!(req.url.ends_with("&limit=3"));

        let req = builder()
            .build(
                &Operation::Raw {
                    path: "http://other.test/ping".into(),
                    payload: json!({"x": 1}),
                    method: HttpMethod::Post,
                },
                None,
                &Headers::new(),
            )
            .unwrap();
        assert_eq!(req.url, "http://other.test/ping");
        assert_eq!(req.body.as_deref(), Some(r#"{"x":1}"#));
    }

    #[test]
    fn test_headers_merge_auth_and_cors() {
        let mut auth = Headers::new();
        auth.insert("authentication".into(), "Bearer t".into());

        let plain = RequestBuilder::new(BASE, false).headers(&auth);
        assert_eq!(plain["Accept"], "application/json");
        assert_eq!(plain["Content-Type"], "application/json");
        assert_eq!(plain["authentication"], "Bearer t");
        assert!(!plain.contains_key("Access-Control-Allow-Origin"));

        let cors = RequestBuilder::new(BASE, true).headers(&Headers::new());
        assert_eq!(cors["Access-Control-Allow-Origin"], "*");
        assert!(!cors.contains_key("authentication"));
    }

    #[test]
    fn test_each_request_owns_its_headers() {
        let b = builder();
        let auth = Headers::new();
        let mut first = b.build(&Operation::Schema, Some(&user()), &auth).unwrap();
        first.headers.insert("X-Mutated".into(), "1".into());
        let second = b.build(&Operation::Schema, Some(&user()), &auth).unwrap();
        assert!(!second.headers.contains_key("X-Mutated"));
    }
}
