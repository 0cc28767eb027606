// src/crawl/subdomains.rs
// =============================================================================
// Subdomain discovery for a root domain.
//
// Candidates come from two places:
// - a short list of names most sites use (www, blog, docs, ...)
// - hostnames the root crawl actually saw in links
//
// Each candidate gets one quick GET. Anything answering below 400 is
// reachable and becomes a site of its own; everything else (DNS failure,
// refused connection, 404, timeout) is dropped without an error.
// =============================================================================

use std::collections::BTreeSet;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument};
use url::Url;

use super::scheduler::WorkerPool;
use crate::fetch::Fetcher;

pub const COMMON_SUBDOMAINS: [&str; 6] = ["www", "blog", "docs", "api", "support", "help"];

// Probes in flight at once (still bounded by the worker pool).
pub const PROBE_CONCURRENCY: usize = 8;

/// How candidate URLs are built: scheme and optional explicit port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub scheme: String,
    pub port: Option<u16>,
}

impl Default for ProbeTarget {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            port: None,
        }
    }
}

impl ProbeTarget {
    pub fn new(scheme: &str) -> Self {
        Self {
            scheme: scheme.to_ascii_lowercase(),
            port: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn url_for(&self, host: &str) -> Option<Url> {
        let raw = match self.port {
            Some(port) => format!("{}://{}:{}/", self.scheme, host, port),
            None => format!("{}://{}/", self.scheme, host),
        };
        Url::parse(&raw).ok()
    }
}

// Common names plus observed subdomains, without the root itself.
pub fn candidates(root_domain: &str, observed: &BTreeSet<String>) -> BTreeSet<String> {
    let root = root_domain.trim().trim_end_matches('.').to_ascii_lowercase();
    let suffix = format!(".{}", root);

    COMMON_SUBDOMAINS
        .iter()
        .map(|name| format!("{}.{}", name, root))
        .chain(
            observed
                .iter()
                .map(|host| host.to_ascii_lowercase())
                .filter(|host| host.ends_with(&suffix)),
        )
        .filter(|host| *host != root)
        .collect()
}

pub struct SubdomainProber {
    fetcher: Fetcher,
    pool: WorkerPool,
}

impl SubdomainProber {
    pub fn new(fetcher: &Fetcher, pool: WorkerPool) -> Self {
        Self {
            fetcher: fetcher.clone(),
            pool,
        }
    }

    // Returns the reachable candidates, sorted by hostname.
    #[instrument(skip(self, observed, target), fields(observed = observed.len()))]
    pub async fn probe(
        &self,
        root_domain: &str,
        observed: &BTreeSet<String>,
        target: &ProbeTarget,
    ) -> Vec<Url> {
        let hosts = candidates(root_domain, observed);
        debug!(candidates = hosts.len(), "probing subdomains");

        let mut reachable: Vec<(String, Url)> = stream::iter(hosts)
            .map(|host| async move {
                let url = target.url_for(&host)?;
                self.is_reachable(&url).await.then_some((host, url))
            })
            .buffer_unordered(PROBE_CONCURRENCY)
            .filter_map(|found| async move { found })
            .collect()
            .await;
        reachable.sort_by(|a, b| a.0.cmp(&b.0));

        info!(found = reachable.len(), "subdomain probe finished");
        reachable.into_iter().map(|(_, url)| url).collect()
    }

    async fn is_reachable(&self, url: &Url) -> bool {
        let _permit = self.pool.acquire().await;
        match self.fetcher.probe(url).await {
            Ok(status) if status < 400 => true,
            Ok(status) => {
                debug!(%url, status, "subdomain not reachable");
                false
            }
            Err(e) => {
                debug!(%url, error = %e, "subdomain not reachable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MirrorConfig;
    use std::net::SocketAddr;
    use wiremock::matchers::header;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_candidates_merge_common_and_observed() {
        let observed: BTreeSet<String> = ["shop.example.com", "docs.example.com", "cdn.other.org", "example.com"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let hosts = candidates("Example.com", &observed);

        assert!(hosts.contains("shop.example.com"));
        assert!(hosts.contains("www.example.com"));
        assert!(!hosts.contains("cdn.other.org"));
        assert!(!hosts.contains("example.com"));
        assert_eq!(hosts.len(), 7);
    }

    #[test]
    fn test_probe_target_urls() {
        assert_eq!(
            ProbeTarget::default().url_for("docs.example.com").unwrap().as_str(),
            "https://docs.example.com/"
        );
        assert_eq!(
            ProbeTarget::new("HTTP").with_port(8080).url_for("docs.example.com").unwrap().as_str(),
            "http://docs.example.com:8080/"
        );
    }

    // Every candidate resolves to the mock server; only www and docs answer.
    #[tokio::test]
    async fn test_only_reachable_subdomains_returned() {
        let server = MockServer::start().await;
        let port = server.address().port();
        for host in ["www.example.com", "docs.example.com"] {
            Mock::given(header("host", format!("{}:{}", host, port).as_str()))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;
        }

        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let mut builder = reqwest::Client::builder();
        for name in COMMON_SUBDOMAINS {
            builder = builder.resolve(&format!("{}.example.com", name), addr);
        }
        let config = MirrorConfig::default();
        let fetcher = Fetcher::from_client(builder.build().unwrap(), &config);
        let prober = SubdomainProber::new(&fetcher, WorkerPool::new(4));

        let found = prober
            .probe("example.com", &BTreeSet::new(), &ProbeTarget::new("http").with_port(port))
            .await;
        let hosts: Vec<&str> = found.iter().filter_map(Url::host_str).collect();
        assert_eq!(hosts, vec!["docs.example.com", "www.example.com"]);
    }

    #[tokio::test]
    async fn test_unresolvable_candidates_dropped_quietly() {
        let config = MirrorConfig {
            probe_timeout: std::time::Duration::from_millis(500),
            ..MirrorConfig::default()
        };
        let fetcher = Fetcher::new(&config).unwrap();
        let prober = SubdomainProber::new(&fetcher, WorkerPool::new(2));
        let found = prober
            .probe("does-not-exist.invalid", &BTreeSet::new(), &ProbeTarget::default())
            .await;
        assert!(found.is_empty());
    }
}
