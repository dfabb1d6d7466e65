//! Incremental UTF-8 decoding of a streamed reply body.
//!
//! Turns a stream of byte chunks into a stream of text fragments. A multi-byte
//! character split across two reads is held back until its remaining bytes
//! arrive, so no fragment ever ends mid-character.
//!
//! Outcomes, in order of precedence:
//! - transport error from the body: passed through unchanged, then exhausted
//! - invalid bytes: valid prefix first, then `ClientError::Decode`, then exhausted
//! - end of data with a held-back partial character: `ClientError::Decode`
//! - end of data otherwise: `None`

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use convo_types::{ClientError, Result};

pub struct StreamDecoder<S> {
    inner: S,
    /// Bytes of a character still waiting for its continuation bytes
    tail: Vec<u8>,
    pending: VecDeque<Result<String>>,
    done: bool,
    fragments: usize,
}

impl<S> StreamDecoder<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            tail: Vec::new(),
            pending: VecDeque::new(),
            done: false,
            fragments: 0,
        }
    }

    /// Number of fragments handed out so far.
    pub fn fragments_yielded(&self) -> usize {
        self.fragments
    }

    pub fn is_exhausted(&self) -> bool {
        self.done && self.pending.is_empty()
    }

    fn decode_chunk(&mut self, chunk: Vec<u8>) {
        let mut bytes = if self.tail.is_empty() {
            chunk
        } else {
            let mut joined = std::mem::take(&mut self.tail);
            joined.extend_from_slice(&chunk);
            joined
        };

        match std::str::from_utf8(&bytes) {
            Ok(text) => {
                if !text.is_empty() {
                    self.pending.push_back(Ok(text.to_string()));
                }
            }
            Err(err) => {
                let valid_len = err.valid_up_to();
                if valid_len > 0 {
                    // valid_up_to guarantees the prefix is well-formed
                    let text = String::from_utf8_lossy(&bytes[..valid_len]).into_owned();
                    self.pending.push_back(Ok(text));
                }
                match err.error_len() {
                    Some(_) => {
                        self.pending.push_back(Err(ClientError::Decode(format!(
                            "invalid UTF-8 at byte {valid_len} of chunk"
                        ))));
                        self.done = true;
                    }
                    None => {
                        bytes.drain(..valid_len);
                        self.tail = bytes;
                    }
                }
            }
        }
    }

    fn finish(&mut self) {
        if !self.tail.is_empty() {
            self.pending.push_back(Err(ClientError::Decode(format!(
                "stream ended inside a character ({} dangling bytes)",
                self.tail.len()
            ))));
            self.tail.clear();
        }
        self.done = true;
    }
}

impl<S> Stream for StreamDecoder<S>
where
    S: Stream<Item = Result<Vec<u8>>> + Unpin,
{
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                if item.is_ok() {
                    self.fragments += 1;
                }
                return Poll::Ready(Some(item));
            }
            if self.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => self.decode_chunk(chunk),
                Poll::Ready(Some(Err(e))) => {
                    self.tail.clear();
                    self.done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => self.finish(),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
