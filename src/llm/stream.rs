//! Streaming reply generation
//!
//! `POST {"message": ..}` answers with an SSE body. Each `data:` payload is
//! either raw text or `{"token": ".."}`; `[DONE]` ends the reply.

use super::sse::{SseDecoder, SseFrame};
use crate::utils::http::check_status;
use crate::utils::until_cancelled;
use crate::{MurmurError, Result};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One ordered fragment of the reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
}

pub type TextStream = BoxStream<'static, Result<TextChunk>>;

pub trait ResponseStreamer: Send + Sync {
    /// Stream the reply to `message`.
    ///
    /// The stream is cold: no request is made until it is first polled. Once
    /// `cancel` fires it ends with `Cancelled` and yields nothing further.
    fn stream_response(&self, message: &str, cancel: CancellationToken) -> TextStream;
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TokenFrame {
    token: String,
}

/// Text carried by one data payload
pub fn payload_text(payload: String) -> String {
    if payload.starts_with('{') {
        if let Ok(frame) = serde_json::from_str::<TokenFrame>(&payload) {
            return frame.token;
        }
    }
    payload
}

#[derive(Debug, Clone)]
pub struct ResponseStreamClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ResponseStreamClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }
}

impl ResponseStreamer for ResponseStreamClient {
    fn stream_response(&self, message: &str, cancel: CancellationToken) -> TextStream {
        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        let request = GenerateRequest {
            message: message.to_string(),
        };

        let stream = async_stream::try_stream! {
            debug!("Requesting reply for {} chars", request.message.len());
            let send = http
                .post(&endpoint)
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .json(&request)
                .send();
            let response = until_cancelled(&cancel, send)
                .await?
                .map_err(|e| MurmurError::GenerationFailed(format!("request failed: {}", e)))?;
            let response = until_cancelled(&cancel, check_status(response))
                .await?
                .map_err(MurmurError::GenerationFailed)?;

            let mut body = response.bytes_stream();
            let mut decoder = SseDecoder::new();
            let mut index = 0usize;
            let mut done = false;

            while !done {
                let bytes = match until_cancelled(&cancel, body.next()).await? {
                    Some(bytes) => bytes,
                    None => break,
                };
                let bytes = bytes
                    .map_err(|e| MurmurError::GenerationFailed(format!("stream interrupted: {}", e)))?;

                for frame in decoder.push(&bytes)? {
                    match frame {
                        SseFrame::Done => {
                            done = true;
                            break;
                        }
                        SseFrame::Data(payload) => {
                            let text = payload_text(payload);
                            if !text.is_empty() {
                                yield TextChunk { index, text };
                                index += 1;
                            }
                        }
                    }
                }
            }

            if !done {
                if let Some(SseFrame::Data(payload)) = decoder.finish()? {
                    let text = payload_text(payload);
                    if !text.is_empty() {
                        yield TextChunk { index, text };
                        index += 1;
                    }
                }
            }

            info!("Reply stream finished after {} chunks", index);
        };

        Box::pin(stream)
    }
}
