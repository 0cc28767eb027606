// src/mirror.rs
// =============================================================================
// Mirroring sites end to end: seed -> crawl session -> site writer.
//
// One Mirror serves a whole run. It owns the HTTP client and the worker pool,
// so every site in a batch or subdomain run shares the same concurrency
// limit. Each site still gets its own crawl session (frontier, visited set,
// robots cache).
//
// Modes:
// - extract:    one page and its assets
// - batch:      extract for many URLs at once
// - crawl:      budgeted BFS over one site
// - subdomains: crawl a domain, probe its subdomains, crawl each one found
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use url::Url;

use crate::config::{CrawlBudget, MirrorConfig};
use crate::crawl::normalize::{from_local_path, normalize};
use crate::crawl::{CrawlSession, ProbeTarget, SubdomainProber, WorkerPool};
use crate::error::MirrorError;
use crate::extract::Scope;
use crate::fetch::Fetcher;
use crate::site::{SessionState, Site, SiteSummary, SiteWriter};

/// A parsed starting point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    pub url: Url,
    // Directory file:// reads are confined to, for local seeds.
    pub local_root: Option<PathBuf>,
}

impl Seed {
    // Accepts a URL, a bare host ("example.com"), or a path to a local file
    // or directory. A directory stands for its index.html.
    pub fn parse(input: &str) -> Result<Self, MirrorError> {
        let trimmed = input.trim();
        let path = Path::new(trimmed);

        if !trimmed.is_empty() && !trimmed.contains("://") && path.exists() {
            let file = if path.is_dir() {
                path.join("index.html")
            } else {
                path.to_path_buf()
            };
            let url = from_local_path(&file)?;
            return Ok(Self {
                local_root: parent_dir(&url),
                url,
            });
        }

        let url = normalize(trimmed, None)?;
        let local_root = if url.scheme() == "file" {
            parent_dir(&url)
        } else {
            None
        };
        Ok(Self { url, local_root })
    }
}

fn parent_dir(url: &Url) -> Option<PathBuf> {
    url.to_file_path()
        .ok()
        .and_then(|path| path.parent().map(Path::to_path_buf))
}

// Reads a batch file: one URL per line, blank lines and # comments skipped.
pub fn read_url_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read URL file {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

pub struct Mirror {
    config: MirrorConfig,
    fetcher: Fetcher,
    pool: WorkerPool,
    cancel: CancellationToken,
}

impl Mirror {
    pub fn new(config: MirrorConfig, cancel: CancellationToken) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::new(&config).context("failed to set up the HTTP client")?;
        Ok(Self::with_fetcher(config, fetcher, cancel))
    }

    pub fn with_fetcher(config: MirrorConfig, fetcher: Fetcher, cancel: CancellationToken) -> Self {
        let pool = WorkerPool::new(config.concurrency);
        Self {
            config,
            fetcher,
            pool,
            cancel,
        }
    }

    // One page (depth 0) and its assets.
    pub async fn extract(&self, seed: &Seed, name: Option<String>) -> SiteSummary {
        let scope = Scope::single(&seed.url);
        let site = self.run_session(seed, CrawlBudget::single_page(), &scope).await;
        self.finish(&site, name).await
    }

    // Extracts every input concurrently. All sessions share the worker pool.
    // An input that does not parse becomes a failed summary of its own and
    // the rest carry on. With a name, sites are written as name_1, name_2...
    // in input order.
    pub async fn batch(&self, inputs: &[String], name: Option<&str>) -> Vec<SiteSummary> {
        info!(count = inputs.len(), "batch started");
        let jobs = inputs.iter().enumerate().map(|(i, input)| async move {
            match Seed::parse(input) {
                Ok(seed) => {
                    let site_name = name.map(|name| format!("{}_{}", name, i + 1));
                    self.extract(&seed, site_name).await
                }
                Err(e) => {
                    warn!(input = %input, error = %e, "skipping batch entry");
                    SiteSummary::failed_before_crawl(input, e.to_string())
                }
            }
        });
        join_all(jobs).await
    }

    // Budgeted BFS crawl of one site. `allow_hosts` widens the same-site
    // scope beyond the seed's own host.
    pub async fn crawl(&self, seed: &Seed, allow_hosts: &[String], name: Option<String>) -> SiteSummary {
        let scope = Scope::single(&seed.url).with_hosts(allow_hosts);
        let site = self.run_session(seed, self.config.budget, &scope).await;
        self.finish(&site, name).await
    }

    // Crawls the root domain, probes for subdomains, then crawls each one
    // that answered. The root site comes first, subdomains by hostname.
    #[instrument(skip(self, target))]
    pub async fn subdomains(&self, domain: &str, target: &ProbeTarget) -> Result<Vec<SiteSummary>> {
        let root_domain = normalize(domain, None)?
            .host_str()
            .map(str::to_string)
            .with_context(|| format!("'{}' has no host name", domain))?;
        let root_url = target
            .url_for(&root_domain)
            .with_context(|| format!("cannot build a URL for '{}'", root_domain))?;
        let root = Seed {
            url: root_url,
            local_root: None,
        };

        let scope = Scope::single(&root.url);
        let root_site = self.run_session(&root, self.config.budget, &scope).await;
        let mut summaries = vec![self.finish(&root_site, None).await];
        if root_site.state == SessionState::Cancelled {
            return Ok(summaries);
        }

        let prober = SubdomainProber::new(&self.fetcher, self.pool.clone());
        let found = prober
            .probe(&root_domain, &root_site.subdomains_found, target)
            .await;
        info!(count = found.len(), "reachable subdomains");

        let seeds: Vec<Seed> = found
            .into_iter()
            .map(|url| Seed {
                url,
                local_root: None,
            })
            .collect();
        summaries.extend(join_all(seeds.iter().map(|seed| self.crawl(seed, &[], None))).await);
        Ok(summaries)
    }

    async fn run_session(&self, seed: &Seed, budget: CrawlBudget, scope: &Scope) -> Site {
        let fetcher = match (&seed.local_root, self.fetcher.local_root()) {
            (Some(root), None) => self.fetcher.with_local_root(root.clone()),
            _ => self.fetcher.clone(),
        };
        let config = self.config.with_budget(budget);
        CrawlSession::new(&fetcher, self.pool.clone(), &config, self.cancel.clone())
            .run(seed.url.clone(), scope)
            .await
    }

    // Writes the site, or in a dry run only plans it.
    async fn finish(&self, site: &Site, name: Option<String>) -> SiteSummary {
        let writer = SiteWriter::new(&self.config.output_dir).with_name(name);

        if self.config.dry_run {
            let plan = writer.plan(site);
            let mut summary = site.summary(Some(plan.site_dir), None);
            summary.planned_files = plan.files.into_iter().map(|f| f.relative_path).collect();
            return summary;
        }

        match writer.write(site).await {
            Ok(dir) => site.summary(Some(dir), None),
            Err(e) => {
                error!(site = %site.root_url, error = %e, "failed to write site");
                site.summary(None, Some(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use wiremock::matchers::{header, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html")
    }

    fn config(output: &Path) -> MirrorConfig {
        MirrorConfig {
            output_dir: output.to_path_buf(),
            ..MirrorConfig::default()
        }
    }

    fn mirror(config: MirrorConfig) -> Mirror {
        Mirror::new(config, CancellationToken::new()).unwrap()
    }

    fn seed_at(server: &MockServer, route: &str) -> Seed {
        Seed::parse(&format!("{}{}", server.uri(), route)).unwrap()
    }

    #[test]
    fn test_seed_parse_url_and_bare_host() {
        let seed = Seed::parse("https://example.com/docs").unwrap();
        assert_eq!(seed.url.as_str(), "https://example.com/docs");
        assert!(seed.local_root.is_none());

        let seed = Seed::parse("example.com").unwrap();
        assert_eq!(seed.url.as_str(), "https://example.com/");
        assert!(Seed::parse("  ").is_err());
    }

    #[test]
    fn test_seed_parse_local_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>hi</p>").unwrap();

        let seed = Seed::parse(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(seed.url.scheme(), "file");
        assert!(seed.url.path().ends_with("/index.html"));
        assert_eq!(seed.local_root, Some(dir.path().canonicalize().unwrap()));
    }

    #[test]
    fn test_read_url_file_skips_comments_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("urls.txt");
        std::fs::write(&file, "# sites\nhttps://a.example\n\n  https://b.example  \n# end\n").unwrap();
        assert_eq!(
            read_url_file(&file).unwrap(),
            vec!["https://a.example", "https://b.example"]
        );
        assert!(read_url_file(&dir.path().join("missing.txt")).is_err());
    }

    #[tokio::test]
    async fn test_crawl_writes_browsable_site() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(html(r#"<link rel="stylesheet" href="/style.css"><a href="/about">About</a>"#))
            .mount(&server)
            .await;
        Mock::given(path("/about"))
            .respond_with(html(r#"<a href="/">Home</a>"#))
            .mount(&server)
            .await;
        Mock::given(path("/style.css"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("p{}", "text/css"))
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let summary = mirror(config(out.path()))
            .crawl(&seed_at(&server, "/"), &[], Some("demo".into()))
            .await;

        assert_eq!(summary.pages_fetched, 2);
        assert_eq!(summary.assets_fetched, 1);
        assert_eq!(summary.state, SessionState::Completed);
        assert!(summary.is_clean());
        let dir = summary.output_path.unwrap();
        assert_eq!(dir, out.path().join("demo"));
        assert!(dir.join("index.html").exists());
    }

    #[tokio::test]
    async fn test_extract_fetches_only_seed() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(html(r#"<a href="/about">About</a>"#))
            .mount(&server)
            .await;
        Mock::given(path("/about"))
            .respond_with(html("<p>about</p>"))
            .expect(0)
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let summary = mirror(config(out.path()))
            .extract(&seed_at(&server, "/"), None)
            .await;
        assert_eq!(summary.pages_fetched, 1);
    }

    #[tokio::test]
    async fn test_batch_mirrors_each_seed() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(html("<p>one</p>"))
            .mount(&server)
            .await;
        Mock::given(path("/two"))
            .respond_with(html("<p>two</p>"))
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let inputs = vec![format!("{}/", server.uri()), format!("{}/two", server.uri())];
        let summaries = mirror(config(out.path())).batch(&inputs, None).await;

        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.pages_fetched == 1));
        assert_ne!(summaries[0].output_path, summaries[1].output_path);
    }

    #[tokio::test]
    async fn test_batch_bad_entry_does_not_stop_the_rest() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(html("<p>one</p>"))
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let inputs = vec![
            "http://exa mple.com".to_string(),
            format!("{}/", server.uri()),
        ];
        let summaries = mirror(config(out.path())).batch(&inputs, Some("docs")).await;

        assert_eq!(summaries.len(), 2);
        let bad = &summaries[0];
        assert_eq!(bad.root_url, "http://exa mple.com");
        assert_eq!(bad.state, SessionState::Idle);
        assert_eq!(bad.failures.len(), 1);
        assert_eq!(bad.failures[0].kind, crate::error::FailureKind::ParseFailure);
        assert!(!bad.is_clean());

        let good = &summaries[1];
        assert!(good.is_clean());
        assert_eq!(good.pages_fetched, 1);
        // Numbered by input position, so the good entry is the second.
        assert_eq!(good.output_path, Some(out.path().join("docs_2")));
        assert!(out.path().join("docs_2").join("index.html").exists());
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(html(r#"<img src="/logo.png">"#))
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let config = MirrorConfig {
            dry_run: true,
            ..config(out.path())
        };
        let summary = mirror(config).extract(&seed_at(&server, "/"), None).await;

        assert!(summary.planned_files.contains(&"index.html".to_string()));
        assert!(summary.planned_files.iter().any(|f| f.starts_with("assets/images/logo-")));
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_reported_in_summary() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(html("<p>page</p>"))
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let blocker = out.path().join("not_a_dir");
        std::fs::write(&blocker, "file").unwrap();
        let summary = mirror(config(&blocker)).extract(&seed_at(&server, "/"), None).await;

        assert!(summary.write_error.is_some());
        assert!(summary.output_path.is_none());
        assert!(!summary.is_clean());
    }

    #[tokio::test]
    async fn test_local_site_mirrored() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("outside.html"), "<p>secret</p>").unwrap();
        let src = tmp.path().join("site");
        std::fs::create_dir(&src).unwrap();
        std::fs::write(
            src.join("index.html"),
            r#"<link rel="stylesheet" href="style.css"><a href="about.html">About</a><a href="../outside.html">Out</a>"#,
        )
        .unwrap();
        std::fs::write(src.join("about.html"), "<p>about</p>").unwrap();
        std::fs::write(src.join("style.css"), "p{}").unwrap();

        let out = tempfile::tempdir().unwrap();
        let seed = Seed::parse(src.join("index.html").to_str().unwrap()).unwrap();
        let summary = mirror(config(out.path())).crawl(&seed, &[], None).await;

        assert_eq!(summary.pages_fetched, 2);
        assert_eq!(summary.assets_fetched, 1);
        // ../outside.html exists but lies outside the local root.
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].kind, crate::error::FailureKind::Forbidden);
        let dir = summary.output_path.unwrap();
        let index = std::fs::read_to_string(dir.join("index.html")).unwrap();
        assert!(index.contains("./assets/css/style-"), "{}", index);
    }

    // The root links to shop.example.com; www answers the probe too. Every
    // name resolves to the one mock server and is told apart by Host header.
    #[tokio::test]
    async fn test_subdomains_mode_mirrors_root_and_reachable_subdomains() {
        let server = MockServer::start().await;
        let port = server.address().port();
        let host = |name: &str| format!("{}:{}", name, port);

        Mock::given(header("host", host("example.com").as_str()))
            .respond_with(html(&format!(
                r#"<a href="http://shop.example.com:{}/">Shop</a>"#,
                port
            )))
            .mount(&server)
            .await;
        for name in ["www.example.com", "shop.example.com"] {
            Mock::given(header("host", host(name).as_str()))
                .respond_with(html("<p>sub</p>"))
                .mount(&server)
                .await;
        }

        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let mut builder = reqwest::Client::builder().resolve("example.com", addr);
        for name in ["www", "blog", "docs", "api", "support", "help", "shop"] {
            builder = builder.resolve(&format!("{}.example.com", name), addr);
        }

        let out = tempfile::tempdir().unwrap();
        let config = config(out.path()).with_budget(CrawlBudget::new(Some(5), Some(1)));
        let fetcher = Fetcher::from_client(builder.build().unwrap(), &config);
        let mirror = Mirror::with_fetcher(config, fetcher, CancellationToken::new());

        let summaries = mirror
            .subdomains("example.com", &ProbeTarget::new("http").with_port(port))
            .await
            .unwrap();
        let roots: Vec<String> = summaries.iter().map(|s| s.root_url.clone()).collect();
        assert_eq!(
            roots,
            vec![
                format!("http://example.com:{}/", port),
                format!("http://shop.example.com:{}/", port),
                format!("http://www.example.com:{}/", port),
            ]
        );
        assert!(summaries.iter().all(|s| s.pages_fetched == 1));
    }
}
