//! Lightweight reachability check against the Ollama server.
//!
//! The probe hits the endpoint's origin (`http://host:port/`), not the
//! generation path; a healthy server answers with "Ollama is running".

use reqwest::Client;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

static PROBE_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .pool_max_idle_per_host(1)
        .build()
        .unwrap_or_default()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 2xx with the expected banner
    Running,
    /// 2xx, but something other than Ollama answered
    ReachableUnexpected,
    InvalidUrl,
    HttpError(u16),
    Timeout,
    NetworkFailure(String),
}

impl ProbeOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Running | ProbeOutcome::ReachableUnexpected)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Running => write!(f, "Ollama is running."),
            ProbeOutcome::ReachableUnexpected => {
                write!(f, "Endpoint reachable, but the response was not from Ollama.")
            }
            ProbeOutcome::InvalidUrl => write!(f, "Invalid endpoint URL."),
            ProbeOutcome::HttpError(code) => write!(f, "Endpoint reachable, but returned HTTP {}.", code),
            ProbeOutcome::Timeout => write!(f, "Ollama not reachable (timed out)."),
            ProbeOutcome::NetworkFailure(_) => write!(f, "Ollama not reachable."),
        }
    }
}

/// `scheme://host[:port]` of the generation endpoint.
pub fn origin_of(endpoint: &str) -> Option<String> {
    let url = Url::parse(endpoint.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    Some(url.origin().ascii_serialization())
}

pub async fn probe(endpoint: &str) -> ProbeOutcome {
    probe_with_timeout(endpoint, PROBE_TIMEOUT).await
}

pub async fn probe_with_timeout(endpoint: &str, timeout: Duration) -> ProbeOutcome {
    let Some(origin) = origin_of(endpoint) else {
        debug!("probe skipped, invalid endpoint: {}", endpoint);
        return ProbeOutcome::InvalidUrl;
    };

    match tokio::time::timeout(timeout, fetch_banner(&origin)).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            debug!("probe of {} failed: {}", origin, e);
            if e.is_timeout() {
                ProbeOutcome::Timeout
            } else {
                ProbeOutcome::NetworkFailure(e.to_string())
            }
        }
        Err(_) => ProbeOutcome::Timeout,
    }
}

async fn fetch_banner(origin: &str) -> Result<ProbeOutcome, reqwest::Error> {
    let resp = PROBE_CLIENT.get(origin).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Ok(ProbeOutcome::HttpError(status.as_u16()));
    }
    let body = resp.text().await?;
    if body.to_lowercase().contains("ollama is running") {
        Ok(ProbeOutcome::Running)
    } else {
        Ok(ProbeOutcome::ReachableUnexpected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::CannedServer;

    #[test]
    fn test_origin_strips_path() {
        assert_eq!(
            origin_of("http://localhost:11434/api/generate").as_deref(),
            Some("http://localhost:11434")
        );
        assert_eq!(origin_of("  https://example.com/x ").as_deref(), Some("https://example.com"));
        assert_eq!(origin_of("localhost:11434"), None);
        assert_eq!(origin_of("not a url"), None);
    }

    #[tokio::test]
    async fn test_running_banner() {
        let server = CannedServer::start(vec![(200, "Ollama is running".into())]);
        let outcome = probe(&server.generate_url()).await;
        assert_eq!(outcome, ProbeOutcome::Running);
        assert!(outcome.is_reachable());
    }

    #[tokio::test]
    async fn test_unexpected_content_still_reachable() {
        let server = CannedServer::start(vec![(200, "<html>nginx</html>".into())]);
        let outcome = probe(&server.generate_url()).await;
        assert_eq!(outcome, ProbeOutcome::ReachableUnexpected);
        assert!(outcome.is_reachable());
    }

    #[tokio::test]
    async fn test_http_error_is_unreachable() {
        let server = CannedServer::start(vec![(500, "boom".into())]);
        let outcome = probe(&server.generate_url()).await;
        assert_eq!(outcome, ProbeOutcome::HttpError(500));
        assert!(!outcome.is_reachable());
    }

    #[tokio::test]
    async fn test_invalid_url() {
        assert_eq!(probe("::nope::").await, ProbeOutcome::InvalidUrl);
    }

    #[tokio::test]
    async fn test_refused_connection() {
        // Bind then drop to get a port nobody listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let outcome = probe_with_timeout(
            &format!("http://127.0.0.1:{}/api/generate", port),
            Duration::from_secs(2),
        )
        .await;
        assert!(matches!(
            outcome,
            ProbeOutcome::NetworkFailure(_) | ProbeOutcome::Timeout
        ));
    }
}
