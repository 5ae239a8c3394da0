//! Text-to-speech over the backend's synthesis endpoint
//!
//! `POST {text, output_format?}` answers with a chunked body of raw s16le PCM.
//! Each body chunk becomes one element of the returned [`AudioStream`]. A
//! response declaring compressed audio is refused; the sink only renders PCM.

use crate::audio::AudioStream;
use crate::utils::http::check_status;
use crate::utils::until_cancelled;
use crate::{MurmurError, Result};
use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub trait SpeechSynthesizer: Send + Sync {
    /// Start synthesizing `text`.
    ///
    /// Empty or whitespace-only text is rejected with `InvalidArgument`
    /// before anything is sent. The returned stream is lazy and stops
    /// yielding once `cancel` fires.
    fn synthesize(&self, text: &str, cancel: CancellationToken) -> Result<AudioStream>;
}

#[derive(Debug, Serialize)]
struct SynthesisRequest {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_format: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SpeechSynthesisClient {
    http: reqwest::Client,
    endpoint: String,
    output_format: Option<String>,
}

impl SpeechSynthesisClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            output_format: None,
        }
    }

    /// Ask the backend for a specific encoding, e.g. `pcm_22050`
    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }
}

fn ensure_pcm(response: reqwest::Response) -> Result<reqwest::Response> {
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if is_compressed_audio(content_type) {
        return Err(MurmurError::SynthesisFailed(format!(
            "unsupported audio encoding {}; expected raw PCM",
            content_type
        )));
    }
    Ok(response)
}

/// Audio content types that are not raw PCM
fn is_compressed_audio(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.strip_prefix("audio/") {
        Some(subtype) => !matches!(subtype, "pcm" | "l16" | "raw" | "x-raw"),
        None => false,
    }
}

impl SpeechSynthesizer for SpeechSynthesisClient {
    fn synthesize(&self, text: &str, cancel: CancellationToken) -> Result<AudioStream> {
        if text.trim().is_empty() {
            return Err(MurmurError::InvalidArgument("synthesis text is empty".into()));
        }

        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        let request = SynthesisRequest {
            text: text.to_string(),
            output_format: self.output_format.clone(),
        };

        let stream = async_stream::try_stream! {
            debug!("Requesting synthesis of {} chars", request.text.len());
            let send = http.post(&endpoint).json(&request).send();
            let response = until_cancelled(&cancel, send)
                .await?
                .map_err(|e| MurmurError::SynthesisFailed(format!("request failed: {}", e)))?;
            let response = until_cancelled(&cancel, check_status(response))
                .await?
                .map_err(MurmurError::SynthesisFailed)?;
            let response = ensure_pcm(response)?;

            let mut body = response.bytes_stream();
            let mut total = 0usize;
            while let Some(chunk) = until_cancelled(&cancel, body.next()).await? {
                let chunk = chunk
                    .map_err(|e| MurmurError::SynthesisFailed(format!("stream interrupted: {}", e)))?;
                if chunk.is_empty() {
                    continue;
                }
                total += chunk.len();
                yield chunk;
            }
            info!("Synthesis stream finished ({} bytes)", total);
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressed_content_types() {
        assert!(is_compressed_audio("audio/mpeg"));
        assert!(is_compressed_audio("Audio/MPEG; charset=binary"));
        assert!(is_compressed_audio("audio/ogg"));
        assert!(!is_compressed_audio("audio/pcm"));
        assert!(!is_compressed_audio("audio/L16; rate=22050"));
        assert!(!is_compressed_audio("application/octet-stream"));
        assert!(!is_compressed_audio(""));
    }

    #[test]
    fn test_format_hint_is_optional() {
        let bare = SynthesisRequest {
            text: "hi".into(),
            output_format: None,
        };
        assert_eq!(serde_json::to_value(&bare).unwrap(), serde_json::json!({ "text": "hi" }));

        let hinted = SynthesisRequest {
            text: "hi".into(),
            output_format: Some("pcm_22050".into()),
        };
        assert_eq!(
            serde_json::to_value(&hinted).unwrap(),
            serde_json::json!({ "text": "hi", "output_format": "pcm_22050" })
        );
    }

    #[test]
    fn test_blank_text_rejected_without_request() {
        let client = SpeechSynthesisClient::new(reqwest::Client::new(), "http://127.0.0.1:9/tts");
        for text in ["", "   ", "\n\t"] {
            let result = client.synthesize(text, CancellationToken::new());
            assert!(matches!(result, Err(MurmurError::InvalidArgument(_))));
        }
    }
}
