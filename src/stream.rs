//! Incremental decoding of streamed response bodies.
//!
//! A streamed response is read one unit at a time, decoded to text and handed
//! to the caller in arrival order. Multi-byte characters split across reads are
//! held back until complete. Bodies that cannot be read incrementally are read
//! in full and split into newline-delimited segments instead.

use std::future::Future;

use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::{Error, Result};
use crate::transport::{ByteStream, ResponseBody, TransportResponse};
use crate::types::StreamSummary;

/// Stateful UTF-8 decoder that tolerates sequences split across chunks.
///
/// Invalid sequences decode to U+FFFD.
#[derive(Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(bytes);

        let mut out = String::with_capacity(buf.len());
        let mut input = &buf[..];
        loop {
            match std::str::from_utf8(input) {
                Ok(s) => {
                    out.push_str(s);
                    break;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(n) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[n..];
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more bytes.
                            self.pending = rest.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush a dangling incomplete sequence at end of stream.
    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        self.pending.clear();
        Some(char::REPLACEMENT_CHARACTER.to_string())
    }
}

enum Source {
    Incremental(ByteStream),
    Buffered(Bytes),
    Segments(std::vec::IntoIter<String>),
    Done,
}

/// Pull-based decoder over a streamed response.
///
/// Each call to [`ChunkDecoder::next_chunk`] performs at most one read from
/// the body, so chunks come out strictly in order.
///
/// # Example
///
/// ```ignore
/// let mut decoder = ChunkDecoder::new(response)?;
/// while let Some(chunk) = decoder.next_chunk().await? {
///     println!("{chunk}");
/// }
/// let summary = decoder.summary();
/// ```
pub struct ChunkDecoder {
    source: Source,
    utf8: Utf8Decoder,
    summary: StreamSummary,
}

impl ChunkDecoder {
    /// Prepare to read a response.
    ///
    /// Fails with [`Error::Transport`] on a failing status and with
    /// [`Error::StreamUnsupported`] when the response has no body.
    pub fn new(response: TransportResponse) -> Result<Self> {
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

        let source = match response.body {
            ResponseBody::Incremental(stream) => Source::Incremental(stream),
            ResponseBody::Buffered(bytes) => Source::Buffered(bytes),
            ResponseBody::Empty => {
                return Err(Error::StreamUnsupported(
                    "response carried no body".to_string(),
                ));
            }
        };

        Ok(Self {
            source,
            utf8: Utf8Decoder::default(),
            summary: StreamSummary::default(),
        })
    }

    /// Read and decode the next chunk.
    ///
    /// Returns:
    /// - `Ok(Some(text))` - newly decoded text
    /// - `Ok(None)` - end of stream
    /// - `Err(e)` - read error
    pub async fn next_chunk(&mut self) -> Result<Option<String>> {
        loop {
            match &mut self.source {
                Source::Incremental(stream) => match stream.next().await {
                    Some(Ok(bytes)) => {
                        self.summary.length += bytes.len();
                        let text = self.utf8.decode(&bytes);
                        // A read holding only part of a character yields no
                        // text and no chunk; record consumers would drop an
                        // empty chunk anyway.
                        if text.is_empty() {
                            continue;
                        }
                        self.summary.text.push_str(&text);
                        return Ok(Some(text));
                    }
                    Some(Err(e)) => {
                        self.source = Source::Done;
                        return Err(e);
                    }
                    None => {
                        self.source = Source::Done;
                        if let Some(tail) = self.utf8.finish() {
                            self.summary.text.push_str(&tail);
                            return Ok(Some(tail));
                        }
                        tracing::debug!(length = self.summary.length, "Stream complete");
                        return Ok(None);
                    }
                },
                Source::Buffered(bytes) => {
                    let text = String::from_utf8_lossy(bytes).into_owned();
                    let segments: Vec<String> = text
                        .split('\n')
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                    self.summary.length = text.len();
                    self.summary.text = text;
                    self.source = Source::Segments(segments.into_iter());
                }
                Source::Segments(segments) => match segments.next() {
                    Some(segment) => return Ok(Some(segment)),
                    None => {
                        self.source = Source::Done;
                        tracing::debug!(length = self.summary.length, "Stream complete");
                        return Ok(None);
                    }
                },
                Source::Done => return Ok(None),
            }
        }
    }

    /// Totals accumulated so far.
    pub fn summary(&self) -> &StreamSummary {
        &self.summary
    }

    /// Consume the decoder, returning its totals.
    pub fn into_summary(self) -> StreamSummary {
        self.summary
    }

    /// Convert into a stream of decoded chunks. The stream ends after the
    /// first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<String>> + Send {
        let mut decoder = self;
        stream! {
            loop {
                match decoder.next_chunk().await {
                    Ok(Some(chunk)) => yield Ok(chunk),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }
}

/// Read a streamed response to the end, awaiting `on_chunk` for every decoded
/// chunk before the next read is issued.
pub async fn decode<F, Fut>(response: TransportResponse, mut on_chunk: F) -> Result<StreamSummary>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut decoder = ChunkDecoder::new(response)?;
    while let Some(chunk) = decoder.next_chunk().await? {
        on_chunk(chunk).await;
    }
    Ok(decoder.into_summary())
}
