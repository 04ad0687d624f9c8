//! The model connector.
//!
//! [`DataConnector`] is the capability a model layer programs against.
//! [`HttpConnector`] implements it by translating each operation into a REST
//! call, sending it through a [`Transport`] and decoding the reply.

use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use async_stream::stream;
use async_trait::async_trait;
use futures::Stream;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::auth::{AuthProvider, CookieAuthProvider};
use crate::config::ConnectorConfig;
use crate::error::Result;
use crate::request::{Operation, RequestBuilder, lookup_identifier};
use crate::response::{resolve, unwrap_first};
use crate::stream::ChunkDecoder;
use crate::transport::{ReqwestTransport, Transport, TransportResponse};
use crate::types::{
    Filter, Headers, HttpMethod, ModelCollection, ModelConfig, QueryLimiters, StreamSummary,
};

/// Consumer of single streamed records.
pub type EachRecord<'a> = Box<dyn FnMut(Value) -> BoxFuture<'a, ()> + Send + 'a>;

/// Consumer of streamed record batches.
pub type EachBatch<'a> = Box<dyn FnMut(Vec<Value>) -> BoxFuture<'a, ()> + Send + 'a>;

/// Route of a model together with the transport used to reach it, for
/// callers that build requests by hand.
#[derive(Clone)]
pub struct RawRoute {
    pub url: String,
    pub transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for RawRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawRoute").field("url", &self.url).finish_non_exhaustive()
    }
}

/// Storage-agnostic CRUD, aggregate and streaming contract.
///
/// Non-streaming operations return the decoded reply: `None` when the backend
/// answered `No Content`, otherwise the JSON value (or the raw text as a
/// string when the body was not JSON).
#[async_trait]
pub trait DataConnector: Send + Sync {
    /// Route and transport for a model.
    fn raw(&self, model: Option<&ModelConfig>) -> Result<RawRoute>;

    /// Fetch one record. When `filter` is a lone `id`, the record path is
    /// targeted and an array reply is unwrapped to its first element.
    async fn find_one(
        &self,
        filter: Filter,
        limiters: QueryLimiters,
        model: &ModelConfig,
    ) -> Result<Option<Value>>;

    async fn find(
        &self,
        filter: Filter,
        limiters: QueryLimiters,
        model: &ModelConfig,
    ) -> Result<Option<Value>>;

    /// Update the record identified by `values.id`.
    async fn save(&self, values: Value, model: &ModelConfig) -> Result<Option<Value>>;

    async fn update(&self, query: Filter, update: Value, model: &ModelConfig)
    -> Result<Option<Value>>;

    async fn count(&self, filter: Filter, model: &ModelConfig) -> Result<Option<Value>>;

    /// Delete one record; `target` is an id or a record carrying one.
    async fn destroy(&self, target: Value, model: &ModelConfig) -> Result<Option<Value>>;

    async fn create(&self, values: Value, model: &ModelConfig) -> Result<Option<Value>>;

    async fn create_many(&self, values: Vec<Value>, model: &ModelConfig) -> Result<Option<Value>>;

    async fn destroy_all(&self, filter: Filter, model: &ModelConfig) -> Result<Option<Value>>;

    async fn add_to_collection(
        &self,
        value: Value,
        collection: &ModelCollection,
    ) -> Result<Option<Value>>;

    async fn remove_from_collection(
        &self,
        value: Value,
        collection: &ModelCollection,
    ) -> Result<Option<Value>>;

    /// Attribute schema of a model.
    async fn attr(&self, model: &ModelConfig) -> Result<Option<Value>>;

    async fn sum(&self, attribute: &str, filter: Filter, model: &ModelConfig)
    -> Result<Option<Value>>;

    async fn avg(&self, attribute: &str, filter: Filter, model: &ModelConfig)
    -> Result<Option<Value>>;

    /// Stream one batch. Each chunk that parses as JSON is delivered as a
    /// batch: arrays as they are, any other value wrapped in a one-element
    /// batch. Chunks that do not parse are skipped.
    async fn stream_batch<'a>(
        &self,
        filter: Filter,
        limiters: QueryLimiters,
        model: &ModelConfig,
        on_batch: EachBatch<'a>,
    ) -> Result<StreamSummary>;

    /// Stream records one at a time. Chunks that do not parse are skipped.
    async fn stream_each<'a>(
        &self,
        filter: Filter,
        limiters: QueryLimiters,
        model: &ModelConfig,
        on_record: EachRecord<'a>,
    ) -> Result<StreamSummary>;

    async fn find_or_create(
        &self,
        criteria: Filter,
        initial_values: Value,
        model: &ModelConfig,
    ) -> Result<Option<Value>>;

    /// Free-form request. `method` defaults to GET and `payload` to `{}`.
    async fn query(
        &self,
        path: &str,
        payload: Option<Value>,
        method: Option<HttpMethod>,
        model: Option<&ModelConfig>,
    ) -> Result<Option<Value>>;
}

/// [`DataConnector`] speaking to a REST backend over HTTP.
///
/// # Example
///
/// ```ignore
/// use model_connect_http::{ConnectorConfig, DataConnector, HttpConnector, ModelConfig, QueryLimiters};
///
/// let connector = HttpConnector::new(ConnectorConfig::new("https://api.example.com/"));
/// let users = connector
///     .find(Default::default(), QueryLimiters::new().limit(10), &ModelConfig::new("user"))
///     .await?;
/// ```
pub struct HttpConnector {
    builder: RequestBuilder,
    transport: Arc<dyn Transport>,
    auth_provider: Arc<dyn AuthProvider>,
    auth: RwLock<Option<Arc<Headers>>>,
}

impl HttpConnector {
    /// Create a connector using `reqwest` and the session cookie named in
    /// `config`.
    pub fn new(config: ConnectorConfig) -> Self {
        let transport = ReqwestTransport::new().incremental(config.incremental);
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a connector over a custom transport.
    pub fn with_transport(config: ConnectorConfig, transport: Arc<dyn Transport>) -> Self {
        let auth_provider = CookieAuthProvider::from_env(config.auth_cookie, config.cookie_env);
        Self {
            builder: RequestBuilder::new(config.base_url, config.cors),
            transport,
            auth_provider: Arc::new(auth_provider),
            auth: RwLock::new(None),
        }
    }

    /// Replace the source of auth headers.
    pub fn with_auth_provider(mut self, provider: impl AuthProvider + 'static) -> Self {
        self.auth_provider = Arc::new(provider);
        self.auth = RwLock::new(None);
        self
    }

    /// Override the auth headers sent with every subsequent request.
    ///
    /// Requests already in flight keep the set they were built with.
    pub fn set_auth_headers(&self, headers: Headers) {
        // Only whole sets are ever stored, so a poisoned lock still holds a
        // consistent value.
        let mut auth = self.auth.write().unwrap_or_else(PoisonError::into_inner);
        *auth = Some(Arc::new(headers));
    }

    /// Current auth headers. The provider is consulted until it yields a
    /// non-empty set, which is then kept until overridden.
    pub fn auth_headers(&self) -> Arc<Headers> {
        if let Some(headers) = self.auth.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return headers.clone();
        }
        let headers = self.auth_provider.headers();
        if headers.is_empty() {
            return Arc::new(headers);
        }
        let mut auth = self.auth.write().unwrap_or_else(PoisonError::into_inner);
        auth.get_or_insert_with(|| Arc::new(headers)).clone()
    }

    /// The request builder this connector uses.
    pub fn request_builder(&self) -> &RequestBuilder {
        &self.builder
    }

    async fn dispatch(
        &self,
        operation: Operation,
        model: Option<&ModelConfig>,
    ) -> Result<TransportResponse> {
        let request = self.builder.build(&operation, model, &self.auth_headers())?;
        tracing::debug!(method = %request.method, url = %request.url, "Sending request");
        self.transport.send(request).await
    }

    async fn execute(
        &self,
        operation: Operation,
        model: Option<&ModelConfig>,
    ) -> Result<Option<Value>> {
        let response = self.dispatch(operation, model).await?;
        resolve(response).await
    }

    /// Stream records as an async stream instead of through a callback.
    ///
    /// Chunks that do not parse as JSON are skipped; the stream ends after the
    /// first read error.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures::StreamExt;
    ///
    /// let mut records = connector.record_stream(filter, limiters, &model).await?;
    /// while let Some(record) = records.next().await {
    ///     println!("{}", record?);
    /// }
    /// ```
    pub async fn record_stream(
        &self,
        filter: Filter,
        limiters: QueryLimiters,
        model: &ModelConfig,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<Value>> + Send>>> {
        let response = self
            .dispatch(Operation::StreamEach { filter, limiters }, Some(model))
            .await?;
        let mut decoder = ChunkDecoder::new(response)?;

        let s = stream! {
            loop {
                match decoder.next_chunk().await {
                    Ok(Some(chunk)) => match serde_json::from_str::<Value>(&chunk) {
                        Ok(record) => yield Ok(record),
                        Err(e) => tracing::debug!(error = %e, "Dropping unparsable chunk"),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(s))
    }
}

/// Parse every chunk of `response` as JSON, shape it with `shape` and hand
/// it to `deliver`, awaiting each delivery before the next read.
async fn drain<'a, T>(
    response: TransportResponse,
    shape: fn(Value) -> T,
    deliver: &mut (dyn FnMut(T) -> BoxFuture<'a, ()> + Send + 'a),
) -> Result<StreamSummary>
where
    T: Send,
{
    let mut decoder = ChunkDecoder::new(response)?;
    while let Some(chunk) = decoder.next_chunk().await? {
        match serde_json::from_str::<Value>(&chunk) {
            Ok(value) => deliver(shape(value)).await,
            Err(e) => tracing::debug!(error = %e, "Dropping unparsable chunk"),
        }
    }
    Ok(decoder.into_summary())
}

/// A batch chunk is normally an array of records; any other JSON value is a
/// batch of one.
fn into_batch(value: Value) -> Vec<Value> {
    match value {
        Value::Array(records) => records,
        record => vec![record],
    }
}

#[async_trait]
impl DataConnector for HttpConnector {
    fn raw(&self, model: Option<&ModelConfig>) -> Result<RawRoute> {
        Ok(RawRoute {
            url: self.builder.route(model)?,
            transport: self.transport.clone(),
        })
    }

    async fn find_one(
        &self,
        filter: Filter,
        limiters: QueryLimiters,
        model: &ModelConfig,
    ) -> Result<Option<Value>> {
        let by_id = lookup_identifier(&filter).is_some();
        let value = self
            .execute(Operation::FindOne { filter, limiters }, Some(model))
            .await?;
        Ok(if by_id { unwrap_first(value) } else { value })
    }

    async fn find(
        &self,
        filter: Filter,
        limiters: QueryLimiters,
        model: &ModelConfig,
    ) -> Result<Option<Value>> {
        self.execute(Operation::Find { filter, limiters }, Some(model))
            .await
    }

    async fn save(&self, values: Value, model: &ModelConfig) -> Result<Option<Value>> {
        self.execute(Operation::Save { values }, Some(model)).await
    }

    async fn update(
        &self,
        query: Filter,
        update: Value,
        model: &ModelConfig,
    ) -> Result<Option<Value>> {
        self.execute(Operation::Update { query, update }, Some(model))
            .await
    }

    async fn count(&self, filter: Filter, model: &ModelConfig) -> Result<Option<Value>> {
        self.execute(Operation::Count { filter }, Some(model)).await
    }

    async fn destroy(&self, target: Value, model: &ModelConfig) -> Result<Option<Value>> {
        self.execute(Operation::Destroy { target }, Some(model)).await
    }

    async fn create(&self, values: Value, model: &ModelConfig) -> Result<Option<Value>> {
        self.execute(Operation::Create { values }, Some(model)).await
    }

    async fn create_many(&self, values: Vec<Value>, model: &ModelConfig) -> Result<Option<Value>> {
        self.execute(Operation::CreateMany { values }, Some(model))
            .await
    }

    async fn destroy_all(&self, filter: Filter, model: &ModelConfig) -> Result<Option<Value>> {
        self.execute(Operation::DestroyAll { filter }, Some(model))
            .await
    }

    async fn add_to_collection(
        &self,
        value: Value,
        collection: &ModelCollection,
    ) -> Result<Option<Value>> {
        let operation = Operation::AddToCollection {
            collection: collection.clone(),
            value,
        };
        self.execute(operation, None).await
    }

    async fn remove_from_collection(
        &self,
        value: Value,
        collection: &ModelCollection,
    ) -> Result<Option<Value>> {
        let operation = Operation::RemoveFromCollection {
            collection: collection.clone(),
            value,
        };
        self.execute(operation, None).await
    }

    async fn attr(&self, model: &ModelConfig) -> Result<Option<Value>> {
        self.execute(Operation::Schema, Some(model)).await
    }

    async fn sum(
        &self,
        attribute: &str,
        filter: Filter,
        model: &ModelConfig,
    ) -> Result<Option<Value>> {
        let operation = Operation::Sum {
            attribute: attribute.to_string(),
            filter,
        };
        self.execute(operation, Some(model)).await
    }

    async fn avg(
        &self,
        attribute: &str,
        filter: Filter,
        model: &ModelConfig,
    ) -> Result<Option<Value>> {
        let operation = Operation::Avg {
            attribute: attribute.to_string(),
            filter,
        };
        self.execute(operation, Some(model)).await
    }

    async fn stream_batch<'a>(
        &self,
        filter: Filter,
        limiters: QueryLimiters,
        model: &ModelConfig,
        mut on_batch: EachBatch<'a>,
    ) -> Result<StreamSummary> {
        let response = self
            .dispatch(Operation::StreamBatch { filter, limiters }, Some(model))
            .await?;
        drain(response, into_batch, &mut *on_batch).await
    }

    async fn stream_each<'a>(
        &self,
        filter: Filter,
        limiters: QueryLimiters,
        model: &ModelConfig,
        mut on_record: EachRecord<'a>,
    ) -> Result<StreamSummary> {
        let response = self
            .dispatch(Operation::StreamEach { filter, limiters }, Some(model))
            .await?;
        drain(response, std::convert::identity, &mut *on_record).await
    }

    async fn find_or_create(
        &self,
        criteria: Filter,
        initial_values: Value,
        model: &ModelConfig,
    ) -> Result<Option<Value>> {
        let operation = Operation::FindOrCreate {
            criteria,
            initial_values,
        };
        self.execute(operation, Some(model)).await
    }

    async fn query(
        &self,
        path: &str,
        payload: Option<Value>,
        method: Option<HttpMethod>,
        model: Option<&ModelConfig>,
    ) -> Result<Option<Value>> {
        let operation = Operation::Raw {
            path: path.to_string(),
            payload: payload.unwrap_or_else(|| Value::Object(Filter::new())),
            method: method.unwrap_or(HttpMethod::Get),
        };
        self.execute(operation, model).await
    }
}
