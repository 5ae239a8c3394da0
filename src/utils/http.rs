//! Shared reqwest plumbing for the backend clients

use std::time::Duration;

const ERROR_BODY_LIMIT: usize = 200;

/// Client shared by every backend call. Streaming bodies have no total
/// timeout; one-shot requests set their own per-request timeout.
pub fn build_client(connect_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

/// Pass successful responses through; describe failures as `HTTP 502: <body>`
pub async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body = truncate(body.trim(), ERROR_BODY_LIMIT);
    if body.is_empty() {
        Err(format!("HTTP {}", status.as_u16()))
    } else {
        Err(format!("HTTP {}: {}", status.as_u16(), body))
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Join a base URL and a path with exactly one slash between them
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://localhost:8080/", "/stream"), "http://localhost:8080/stream");
        assert_eq!(join_url("http://localhost:8080", "tts"), "http://localhost:8080/tts");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
