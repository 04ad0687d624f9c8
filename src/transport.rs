//! HTTP transport boundary.
//!
//! The connector never talks to the network directly. It hands a finished
//! [`OutboundRequest`] to a [`Transport`] and receives a [`TransportResponse`]
//! whose body is either readable incrementally or only as a whole payload.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::Method;

use crate::error::{Error, Result};
use crate::types::{Headers, HttpMethod, OutboundRequest};

/// Incrementally readable response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Body of a completed response.
pub enum ResponseBody {
    /// Body supports incremental reads.
    Incremental(ByteStream),
    /// Body only available as the full payload.
    Buffered(Bytes),
    /// Response carried no body.
    Empty,
}

impl ResponseBody {
    /// Read the whole body, draining an incremental stream if needed.
    pub async fn into_bytes(self) -> Result<Bytes> {
        match self {
            ResponseBody::Incremental(mut stream) => {
                let mut buf = Vec::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(Bytes::from(buf))
            }
            ResponseBody::Buffered(bytes) => Ok(bytes),
            ResponseBody::Empty => Ok(Bytes::new()),
        }
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::Incremental(_) => f.write_str("Incremental(..)"),
            ResponseBody::Buffered(b) => write!(f, "Buffered({} bytes)", b.len()),
            ResponseBody::Empty => f.write_str("Empty"),
        }
    }
}

/// Status, headers and body of a completed request.
#[derive(Debug)]
pub struct TransportResponse {
    pub status: u16,
    /// Reason phrase, e.g. `No Content`.
    pub status_text: String,
    pub headers: Headers,
    pub body: ResponseBody,
}

impl TransportResponse {
    /// Build a response with a buffered body and the canonical reason phrase.
    pub fn buffered(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: reason_phrase(status),
            headers: Headers::new(),
            body: ResponseBody::Buffered(body.into()),
        }
    }

    /// Build a successful response whose body arrives as the given chunks.
    pub fn incremental<I>(status: u16, chunks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
    {
        let chunks: Vec<Result<Bytes>> = chunks.into_iter().map(|c| Ok(c.into())).collect();
        Self {
            status,
            status_text: reason_phrase(status),
            headers: Headers::new(),
            body: ResponseBody::Incremental(Box::pin(futures::stream::iter(chunks))),
        }
    }

    /// True when the status is in the 2xx range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn reason_phrase(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or_default()
        .to_string()
}

/// Capability to issue a request and return its response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    incremental: bool,
}

impl ReqwestTransport {
    /// Create a transport with a default `reqwest` client.
    pub fn new() -> Self {
        Self::with_http_client(reqwest::Client::new())
    }

    /// Create a transport with a custom reqwest client.
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_http_client(http: reqwest::Client) -> Self {
        Self {
            http,
            incremental: true,
        }
    }

    /// When disabled, bodies are read in full and handed over as
    /// [`ResponseBody::Buffered`].
    pub fn incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse> {
        let mut builder = self
            .http
            .request(to_reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();

        let body = if self.incremental {
            ResponseBody::Incremental(Box::pin(response.bytes_stream().map_err(Error::from)))
        } else {
            ResponseBody::Buffered(response.bytes().await?)
        };

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_phrase() {
        assert_eq!(TransportResponse::buffered(204, "").status_text, "No Content");
        assert_eq!(TransportResponse::buffered(599, "").status_text, "");
    }

    #[test]
    fn test_ok_range() {
        assert!(TransportResponse::buffered(200, "").ok());
        assert!(TransportResponse::buffered(299, "").ok());
        assert!(!TransportResponse::buffered(300, "").ok());
        assert!(!TransportResponse::buffered(500, "").ok());
    }

    #[tokio::test]
    async fn test_into_bytes_drains_stream() {
        let response = TransportResponse::incremental(200, ["ab", "cd"]);
        let bytes = response.body.into_bytes().await.unwrap();
        assert_eq!(&bytes[..], b"abcd");
    }
}
