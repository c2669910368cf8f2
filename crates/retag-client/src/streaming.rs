//! SSE stream decoding for OpenAI-compatible chat completion responses.
//!
//! Network chunks do not respect line boundaries, so bytes are buffered until
//! a full line is available. Only `data:` lines are interpreted; comments,
//! `event:`/`id:` fields and blank separators are ignored. `data: [DONE]` ends
//! the stream.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use retag_core::{GenerationError, TokenStream};
use serde::Deserialize;

use crate::openai::{OpenAIErrorDetail, classify_error_message};

/// One streamed chat completion chunk.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    /// Some providers report failures in-band after the stream opened.
    error: Option<OpenAIErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

/// Result of decoding one SSE line.
#[derive(Debug, PartialEq)]
enum Frame {
    Content(String),
    Done,
    Error(GenerationError),
}

/// Incremental line splitter for an SSE byte stream.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Appends `bytes` and returns frames for every complete line.
    fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(frame) = decode_line(&String::from_utf8_lossy(&line)) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Decodes whatever is left once the body has ended.
    fn finish(&mut self) -> Option<Frame> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&String::from_utf8_lossy(&rest))
    }
}

fn decode_line(line: &str) -> Option<Frame> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(Frame::Done);
    }

    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => {
            if let Some(error) = chunk.error {
                return Some(Frame::Error(classify_error_message(error.message)));
            }
            let content: String = chunk
                .choices
                .into_iter()
                .filter_map(|choice| choice.delta.content)
                .collect();
            (!content.is_empty()).then_some(Frame::Content(content))
        }
        Err(e) => Some(Frame::Error(GenerationError::InvalidResponse(format!(
            "Failed to parse SSE chunk: {}",
            e
        )))),
    }
}

struct SseState {
    inner: std::pin::Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, GenerationError>>,
    finished: bool,
}

impl SseState {
    /// Queues decoded frames. Returns true once the stream should end.
    fn push_frames(&mut self, frames: impl IntoIterator<Item = Frame>) -> bool {
        for frame in frames {
            match frame {
                Frame::Content(text) => self.pending.push_back(Ok(text)),
                Frame::Done => return true,
                Frame::Error(e) => {
                    self.pending.push_back(Err(e));
                    return true;
                }
            }
        }
        false
    }
}

/// Turns a raw SSE byte stream into a stream of content deltas.
///
/// The returned stream yields at most one error, after which it ends.
pub fn parse_sse_stream<S>(body: S, timeout_secs: u64) -> TokenStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let state = SseState {
        inner: Box::pin(body),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    let tokens = stream::unfold(state, move |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(bytes)) => {
                    let frames = state.decoder.feed(&bytes);
                    state.finished = state.push_frames(frames);
                }
                Some(Err(e)) => {
                    let error = if e.is_timeout() {
                        GenerationError::Timeout(timeout_secs)
                    } else {
                        GenerationError::Network(format!("Stream error: {}", e))
                    };
                    state.pending.push_back(Err(error));
                    state.finished = true;
                }
                None => {
                    let frames = state.decoder.finish();
                    state.push_frames(frames);
                    state.finished = true;
                }
            }
        }
    });

    Box::pin(tokens)
}
