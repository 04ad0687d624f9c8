//! # model-connect-http
//!
//! Async connector that turns a storage-agnostic model interface (find,
//! create, update, destroy, aggregate, stream) into REST calls against a
//! single backend API, and rebuilds typed results from the replies,
//! including bodies delivered in chunks.
//!
//! ## Quick Start
//!
//! ```ignore
//! use model_connect_http::{ConnectorConfig, DataConnector, HttpConnector, ModelConfig, QueryLimiters};
//! use futures::FutureExt;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connector = HttpConnector::new(ConnectorConfig::new("https://api.example.com/"));
//!     let user = ModelConfig::new("user");
//!
//!     let filter = json!({ "state": "active" }).as_object().cloned().unwrap_or_default();
//!     let page = connector
//!         .find(filter, QueryLimiters::new().limit(20).sort_by("name", "ASC"), &user)
//!         .await?;
//!
//!     connector
//!         .stream_each(
//!             Default::default(),
//!             QueryLimiters::new(),
//!             &user,
//!             Box::new(|record| async move { println!("{record}") }.boxed()),
//!         )
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Routes
//!
//! Every model lives under `<base-url><model>/`. Reads are GETs with the
//! filter and limiters in the query string (`where`, `limit`, `skip`, `sort`,
//! `populate`); writes carry a JSON body. Single-record operations address
//! `<model>/<id>` and fail before any request is sent when no id is present.
//!
//! ## Streaming
//!
//! Streamed bodies are read one unit at a time and handed over in order, one
//! chunk in flight at a time. When the transport cannot read incrementally,
//! the full body is split into newline-delimited records instead.

pub mod auth;
pub mod config;
pub mod connector;
pub mod error;
pub mod query;
pub mod registry;
pub mod request;
pub mod response;
pub mod stream;
pub mod transport;
pub mod types;

// Re-export main types at crate root
pub use auth::{AuthProvider, CookieAuthProvider, NoAuth, StaticAuth};
pub use config::ConnectorConfig;
pub use connector::{DataConnector, EachBatch, EachRecord, HttpConnector, RawRoute};
pub use error::{Error, Result};
pub use registry::{ConnectorRegistry, connect, connect_with_transport};
pub use request::{Operation, RequestBuilder};
pub use stream::{ChunkDecoder, decode};
pub use transport::{ReqwestTransport, ResponseBody, Transport, TransportResponse};
pub use types::{
    Filter, Headers, HttpMethod, ModelCollection, ModelConfig, OutboundRequest, Populate,
    QueryLimiters, StreamSummary,
};

// Re-export the serializer for callers building URLs by hand
pub use query::serialize_query;
