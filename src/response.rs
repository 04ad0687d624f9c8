//! Resolution of completed, non-streaming responses.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::transport::TransportResponse;

/// Status text the backend uses for an empty result.
const NO_CONTENT: &str = "No Content";

/// Turn a completed response into its decoded value.
///
/// - A failing status becomes [`Error::Transport`]; the body is never read.
/// - A `No Content` status resolves to `None` without decoding.
/// - Otherwise the body is decoded as JSON, falling back to the raw text as a
///   [`Value::String`] when it is not JSON.
pub async fn resolve(response: TransportResponse) -> Result<Option<Value>> {
    if !response.ok() {
        tracing::error!(
            status = response.status,
            status_text = %response.status_text,
            "HTTP response error"
        );
        return Err(Error::Transport {
            status: response.status,
            status_text: response.status_text,
        });
    }

    if response.status_text == NO_CONTENT {
        return Ok(None);
    }

    let bytes = response.body.into_bytes().await?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(_) => Ok(Some(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))),
    }
}

/// Unwrap an array result to its first element, or `None` when empty.
/// Non-array values pass through unchanged.
pub fn unwrap_first(value: Option<Value>) -> Option<Value> {
    match value {
        Some(Value::Array(items)) => items.into_iter().next(),
        other => other,
    }
}
