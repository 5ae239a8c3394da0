//! Speech-to-text over the backend's transcription proxy
//!
//! The proxy forwards to a prerecorded-audio recognizer and relays its JSON:
//! `{"results":{"channels":[{"alternatives":[{"transcript":"..","confidence":0.9}]}]}}`.
//! A transcript that is empty after trimming is reported as
//! [`TranscriptOutcome::Empty`], not as an error.

use crate::audio::Clip;
use crate::utils::http::check_status;
use crate::{MurmurError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// How the clip is sent to the transcription endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// Request body is the WAV file itself
    Raw,
    /// `multipart/form-data` with the clip in the `audio` field
    #[default]
    Multipart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub confidence: Option<f32>,
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptOutcome {
    Transcribed(Transcript),
    /// The recognizer heard no speech
    Empty,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a finalized clip. Takes ownership; the clip is not reused.
    async fn transcribe(&self, clip: Clip) -> Result<TranscriptOutcome>;
}

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: ListenResults,
    #[serde(default)]
    is_final: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    #[serde(default)]
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Parse a recognizer response body
pub fn parse_transcript(body: &[u8]) -> Result<TranscriptOutcome> {
    let response: ListenResponse = serde_json::from_slice(body)
        .map_err(|e| MurmurError::TranscriptionFailed(format!("malformed response: {}", e)))?;

    let best = response
        .results
        .channels
        .into_iter()
        .next()
        .and_then(|channel| channel.alternatives.into_iter().next());

    let Some(best) = best else {
        return Ok(TranscriptOutcome::Empty);
    };

    let text = best.transcript.trim();
    if text.is_empty() {
        return Ok(TranscriptOutcome::Empty);
    }

    Ok(TranscriptOutcome::Transcribed(Transcript {
        text: text.to_string(),
        confidence: best.confidence,
        is_final: response.is_final.unwrap_or(true),
    }))
}

#[derive(Debug, Clone)]
pub struct TranscriptionClient {
    http: reqwest::Client,
    endpoint: String,
    upload: UploadMode,
    timeout: Duration,
}

impl TranscriptionClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        upload: UploadMode,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            upload,
            timeout,
        }
    }

    fn request(&self, clip: Clip) -> Result<reqwest::RequestBuilder> {
        let builder = self.http.post(&self.endpoint).timeout(self.timeout);
        let content_type = clip.content_type();

        Ok(match self.upload {
            UploadMode::Raw => builder
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(clip.into_bytes()),
            UploadMode::Multipart => {
                let part = Part::bytes(clip.into_bytes().to_vec())
                    .file_name("recording.wav")
                    .mime_str(content_type)
                    .map_err(|e| MurmurError::TranscriptionFailed(e.to_string()))?;
                builder.multipart(Form::new().part("audio", part))
            }
        })
    }
}

#[async_trait]
impl Transcriber for TranscriptionClient {
    async fn transcribe(&self, clip: Clip) -> Result<TranscriptOutcome> {
        debug!(
            "Uploading {} byte clip ({:?}) as {:?}",
            clip.len(),
            clip.duration(),
            self.upload
        );

        let response = self
            .request(clip)?
            .send()
            .await
            .map_err(|e| MurmurError::TranscriptionFailed(format!("request failed: {}", e)))?;

        let response = check_status(response)
            .await
            .map_err(MurmurError::TranscriptionFailed)?;

        let body = response
            .bytes()
            .await
            .map_err(|e| MurmurError::TranscriptionFailed(format!("reading response: {}", e)))?;

        let outcome = parse_transcript(&body)?;
        match &outcome {
            TranscriptOutcome::Transcribed(t) => info!("Transcribed: \"{}\"", t.text),
            TranscriptOutcome::Empty => info!("No speech detected"),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_transcript_is_empty() {
        let body = br#"{"results":{"channels":[{"alternatives":[{"transcript":"  "}]}]}}"#;
        assert_eq!(parse_transcript(body).unwrap(), TranscriptOutcome::Empty);
    }

    #[test]
    fn test_no_channels_is_empty() {
        let body = br#"{"results":{"channels":[]}}"#;
        assert_eq!(parse_transcript(body).unwrap(), TranscriptOutcome::Empty);
    }

    #[test]
    fn test_first_alternative_wins() {
        let body = br#"{"results":{"channels":[{"alternatives":[
            {"transcript":" what time is it ","confidence":0.93},
            {"transcript":"what thyme is it","confidence":0.41}
        ]}]}}"#;

        let outcome = parse_transcript(body).unwrap();
        assert_eq!(
            outcome,
            TranscriptOutcome::Transcribed(Transcript {
                text: "what time is it".into(),
                confidence: Some(0.93),
                is_final: true,
            })
        );
    }

    #[test]
    fn test_malformed_body_is_transcription_failure() {
        let err = parse_transcript(b"<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, MurmurError::TranscriptionFailed(_)));

        let err = parse_transcript(br#"{"error":"no results"}"#).unwrap_err();
        assert!(matches!(err, MurmurError::TranscriptionFailed(_)));
    }
}
