//! Configuration for the session
//!
//! Loaded from TOML; every field has a default so an empty file (or no file)
//! is a valid configuration. A few endpoints can be overridden from the
//! environment.

use crate::speech::UploadMode;
use crate::utils::http::join_url;
use crate::{MurmurError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_BACKEND_URL: &str = "MURMUR_BACKEND_URL";
pub const ENV_TOKEN_URL: &str = "MURMUR_TOKEN_URL";
pub const ENV_ROOM_URL: &str = "MURMUR_ROOM_URL";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backend: BackendConfig,
    pub capture: CaptureConfig,
    pub playback: PlaybackConfig,
    pub room: RoomConfig,
    pub policy: PolicyConfig,
}

/// HTTP backend serving transcription, generation, synthesis and health
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub transcribe_path: String,
    pub generate_path: String,
    pub synthesize_path: String,
    pub health_path: String,
    /// Timeout for one-shot requests; streaming bodies are not bounded
    pub request_timeout_secs: u64,
    /// `/deepgram-proxy` reads the multipart `audio` field; `/api/deepgram-proxy` takes a raw body
    pub upload: UploadMode,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            transcribe_path: "/deepgram-proxy".to_string(),
            generate_path: "/stream".to_string(),
            synthesize_path: "/tts".to_string(),
            health_path: "/health".to_string(),
            request_timeout_secs: 30,
            upload: UploadMode::Multipart,
        }
    }
}

impl BackendConfig {
    pub fn transcribe_url(&self) -> String {
        join_url(&self.base_url, &self.transcribe_path)
    }

    pub fn generate_url(&self) -> String {
        join_url(&self.base_url, &self.generate_path)
    }

    pub fn synthesize_url(&self) -> String {
        join_url(&self.base_url, &self.synthesize_path)
    }

    pub fn health_url(&self) -> String {
        join_url(&self.base_url, &self.health_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Recording stops on its own after this long
    pub max_duration_ms: u64,
    /// Preferred microphone rate; the device default is used when unsupported
    pub sample_rate: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_duration_ms: 8000,
            sample_rate: 16000,
        }
    }
}

impl CaptureConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::from_millis(self.max_duration_ms)
    }
}

/// Format of synthesized audio: mono s16le PCM at this rate.
///
/// Synthesis requests ask for `pcm_<rate>`. A backend that relays compressed
/// audio (`audio/mpeg` and the like) fails the turn rather than being played.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub sample_rate: u32,
}

impl PlaybackConfig {
    pub fn output_format(&self) -> String {
        format!("pcm_{}", self.sample_rate)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub enabled: bool,
    pub url: String,
    pub token_url: String,
    pub room_name: String,
    pub identity_prefix: String,
    /// Upper bound on a single track publish or unpublish
    pub call_timeout_ms: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            token_url: "http://localhost:8081".to_string(),
            room_name: "voiceroom".to_string(),
            identity_prefix: "user-".to_string(),
            call_timeout_ms: 5000,
        }
    }
}

impl RoomConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Speak whatever was generated before a generation stream failed
    pub speak_partial_reply: bool,
}

impl SessionConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| MurmurError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MurmurError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Apply `MURMUR_*` environment overrides
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            self.backend.base_url = url;
        }
        if let Some(url) = lookup(ENV_TOKEN_URL) {
            self.room.token_url = url;
        }
        if let Some(url) = lookup(ENV_ROOM_URL) {
            self.room.url = url;
            self.room.enabled = true;
        }
        self
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend.base_url = url.into();
        self
    }

    pub fn with_max_capture(mut self, max: Duration) -> Self {
        self.capture.max_duration_ms = max.as_millis() as u64;
        self
    }

    pub fn with_room(mut self, url: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.room.enabled = true;
        self.room.url = url.into();
        self.room.token_url = token_url.into();
        self
    }

    pub fn with_partial_replies(mut self, speak: bool) -> Self {
        self.policy.speak_partial_reply = speak;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let base = &self.backend.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(MurmurError::Config(format!(
                "backend.base_url must be an http(s) URL, got {:?}",
                base
            )));
        }
        if self.backend.request_timeout_secs == 0 {
            return Err(MurmurError::Config("backend.request_timeout_secs must be positive".into()));
        }
        if self.capture.max_duration_ms == 0 {
            return Err(MurmurError::Config("capture.max_duration_ms must be positive".into()));
        }
        if self.capture.sample_rate == 0 || self.playback.sample_rate == 0 {
            return Err(MurmurError::Config("sample rates must be positive".into()));
        }
        if self.room.enabled {
            if self.room.url.is_empty() {
                return Err(MurmurError::Config("room.url is required when the room is enabled".into()));
            }
            if self.room.room_name.is_empty() {
                return Err(MurmurError::Config("room.room_name must not be empty".into()));
            }
            if self.room.call_timeout_ms == 0 {
                return Err(MurmurError::Config("room.call_timeout_ms must be positive".into()));
            }
        }
        Ok(())
    }
}
