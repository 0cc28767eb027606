// src/fetch/client.rs
// =============================================================================
// The Fetcher: one retrieval of one URL, over HTTP(S) or from disk.
//
// Key functionality:
// - GET with a per-request timeout and a fixed redirect hop limit
// - robots.txt check before touching a path (see robots.rs)
// - Maps every failure mode onto a small FetchError enum
// - probe(): cheap reachability check used by subdomain discovery
//
// There are no retries here. Retrying is a scheduling decision and lives in
// the crawl scheduler.
// =============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use super::local::read_local;
use super::robots::RobotsCache;
use super::{FetchKind, FetchResult};
use crate::config::{MirrorConfig, MAX_REDIRECTS};
use crate::error::{FetchError, MirrorError};

// Settings that never change during a run.
#[derive(Debug, Clone)]
struct FetchSettings {
    user_agent: String,
    probe_timeout: Duration,
    respect_robots: bool,
    local_root: Option<PathBuf>,
}

/// Performs single retrievals. Cheap to clone: the HTTP client and the
/// robots cache are reference counted.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    settings: Arc<FetchSettings>,
    robots: Arc<RobotsCache>,
}

impl Fetcher {
    // Builds the HTTP client from the run configuration.
    pub fn new(config: &MirrorConfig) -> Result<Self, MirrorError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| MirrorError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::from_client(client, config))
    }

    // Uses an already configured client. Tests use this to point hostnames
    // at a local mock server.
    pub fn from_client(client: Client, config: &MirrorConfig) -> Self {
        Self {
            client,
            settings: Arc::new(FetchSettings {
                user_agent: config.user_agent.clone(),
                probe_timeout: config.probe_timeout,
                respect_robots: config.respect_robots,
                local_root: config.local_root.clone(),
            }),
            robots: Arc::new(RobotsCache::new()),
        }
    }

    // Same client and settings, empty robots cache. Every crawl session
    // gets its own.
    pub fn for_session(&self) -> Self {
        Self {
            client: self.client.clone(),
            settings: Arc::clone(&self.settings),
            robots: Arc::new(RobotsCache::new()),
        }
    }

    // Same client, file:// reads confined to `root`. Used when the seed is a
    // local file and no --local-root was given.
    pub fn with_local_root(&self, root: PathBuf) -> Self {
        let mut settings = (*self.settings).clone();
        settings.local_root = Some(root);
        Self {
            client: self.client.clone(),
            settings: Arc::new(settings),
            robots: Arc::clone(&self.robots),
        }
    }

    pub fn local_root(&self) -> Option<&PathBuf> {
        self.settings.local_root.as_ref()
    }

    pub fn robots(&self) -> &RobotsCache {
        &self.robots
    }

    // Retrieves `url`. `kind` only affects logging: pages and assets go
    // through the same checks.
    pub async fn fetch(&self, url: &Url, kind: FetchKind) -> Result<FetchResult, FetchError> {
        if url.scheme() == "file" {
            let root = self.settings.local_root.as_ref().ok_or(FetchError::Forbidden)?;
            return read_local(url, root).await;
        }
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::NetworkFailure(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        if self.settings.respect_robots
            && !self
                .robots
                .is_allowed(&self.client, url, &self.settings.user_agent)
                .await
        {
            return Err(FetchError::RobotsDisallowed);
        }

        debug!(url = %url, ?kind, "GET");
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(categorize_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(analyze_status(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let final_url = response.url().clone();
        let bytes = response.bytes().await.map_err(categorize_error)?;

        Ok(FetchResult {
            bytes: bytes.to_vec(),
            content_type,
            final_url,
        })
    }

    // Reachability check: returns the status code of a GET without reading
    // the body. Uses the short probe timeout and skips robots.txt.
    pub async fn probe(&self, url: &Url) -> Result<u16, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .timeout(self.settings.probe_timeout)
            .send()
            .await
            .map_err(categorize_error)?;
        Ok(response.status().as_u16())
    }
}

// Non-2xx statuses, sorted into the buckets callers care about.
fn analyze_status(status: StatusCode) -> FetchError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => FetchError::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Forbidden,
        other => FetchError::HttpStatus(other.as_u16()),
    }
}

// Categorizes reqwest errors:
// - timeouts
// - redirect loops / too many hops
// - everything else (DNS, refused connections, TLS, resets) is a network failure
fn categorize_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_redirect() {
        FetchError::NetworkFailure("too many redirects".to_string())
    } else if error.is_connect() {
        FetchError::NetworkFailure(format!("connection failed: {}", error))
    } else {
        FetchError::NetworkFailure(error.to_string())
    }
}
