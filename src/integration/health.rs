//! Backend health probe
//!
//! The backend answers `{"status": "ok", "services": {...}}` where each
//! service flag is either a bool or `"available"` / `"unavailable"`. A missing
//! flag counts as available.

use crate::utils::http::check_status;
use crate::{MurmurError, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ServiceFlag {
    Bool(bool),
    Text(String),
}

impl ServiceFlag {
    fn is_available(&self) -> bool {
        match self {
            ServiceFlag::Bool(up) => *up,
            ServiceFlag::Text(text) => text.eq_ignore_ascii_case("available"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Services {
    #[serde(alias = "sttProvider", alias = "deepgram", default)]
    stt: Option<ServiceFlag>,
    #[serde(alias = "ttsProvider", alias = "elevenlabs", default)]
    tts: Option<ServiceFlag>,
    #[serde(alias = "llmProvider", alias = "gemini", default)]
    llm: Option<ServiceFlag>,
}

#[derive(Debug, Deserialize)]
struct HealthPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    services: Services,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    pub stt: bool,
    pub tts: bool,
    pub llm: bool,
}

impl HealthReport {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let payload: HealthPayload = serde_json::from_slice(body)
            .map_err(|e| MurmurError::Io(format!("malformed health response: {}", e)))?;
        debug!("Backend status: {:?}", payload.status);

        let up = |flag: &Option<ServiceFlag>| flag.as_ref().map_or(true, ServiceFlag::is_available);
        Ok(Self {
            stt: up(&payload.services.stt),
            tts: up(&payload.services.tts),
            llm: up(&payload.services.llm),
        })
    }

    pub fn all_available(&self) -> bool {
        self.stt && self.tts && self.llm
    }

    /// One warning line per unavailable service
    pub fn warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if !self.stt {
            warnings.push("Speech recognition service unavailable");
        }
        if !self.tts {
            warnings.push("TTS service unavailable");
        }
        if !self.llm {
            warnings.push("AI service unavailable");
        }
        warnings
    }
}

#[derive(Debug, Clone)]
pub struct HealthClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HealthClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            url: url.into(),
            timeout,
        }
    }

    pub async fn check(&self) -> Result<HealthReport> {
        let response = self
            .http
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| MurmurError::Io(format!("health check failed: {}", e)))?;

        let response = check_status(response).await.map_err(MurmurError::Io)?;
        let body = response
            .bytes()
            .await
            .map_err(|e| MurmurError::Io(format!("health check failed: {}", e)))?;

        let report = HealthReport::parse(&body)?;
        info!("Backend health: {:?}", report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_named_string_flags() {
        let report = HealthReport::parse(
            br#"{"status":"ok","services":{"elevenlabs":"unavailable","deepgram":"available","gemini":"available"}}"#,
        )
        .unwrap();
        assert_eq!(report, HealthReport { stt: true, tts: false, llm: true });
        assert_eq!(report.warnings(), vec!["TTS service unavailable"]);
    }

    #[test]
    fn test_bool_flags() {
        let report =
            HealthReport::parse(br#"{"services":{"stt":true,"tts":true,"llm":false}}"#).unwrap();
        assert!(!report.all_available());
        assert_eq!(report.warnings(), vec!["AI service unavailable"]);
    }

    #[test]
    fn test_provider_suffixed_flags() {
        let report = HealthReport::parse(
            br#"{"services":{"sttProvider":false,"ttsProvider":true,"llmProvider":true}}"#,
        )
        .unwrap();
        assert_eq!(report, HealthReport { stt: false, tts: true, llm: true });
    }

    #[test]
    fn test_missing_services_count_as_available() {
        let report = HealthReport::parse(br#"{"status":"healthy"}"#).unwrap();
        assert!(report.all_available());
        assert!(report.warnings().is_empty());
    }
}
