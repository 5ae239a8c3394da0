//! Access-token fetch from the token service

use crate::{MurmurError, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Token plus the room and identity it was issued for
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RoomToken {
    pub token: String,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub identity: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl TokenClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// `GET {base}/get-token?identity=..&room=..`
    pub async fn fetch(&self, identity: &str, room: &str) -> Result<RoomToken> {
        let url = format!("{}/get-token", self.base_url);
        debug!("Requesting room token for {} in {}", identity, room);

        let response = self
            .http
            .get(&url)
            .query(&[("identity", identity), ("room", room)])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| MurmurError::RoomUnavailable(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MurmurError::RoomUnavailable(format!(
                "token service returned HTTP {}",
                status.as_u16()
            )));
        }

        let token: RoomToken = response
            .json()
            .await
            .map_err(|e| MurmurError::RoomUnavailable(format!("malformed token response: {}", e)))?;

        if token.token.is_empty() {
            return Err(MurmurError::RoomUnavailable("token service returned an empty token".into()));
        }

        info!("Received room token ({} bytes)", token.token.len());
        Ok(token)
    }
}

/// Identity like `user-48213`: the prefix followed by five random digits
pub fn random_identity(prefix: &str) -> String {
    format!("{}{:05}", prefix, Uuid::new_v4().as_u128() % 100_000)
}
