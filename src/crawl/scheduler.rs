// src/crawl/scheduler.rs
// =============================================================================
// A crawl session: breadth-first expansion of one seed under a budget.
//
// How it works:
// 1. The coordinator (run) owns the Frontier and the Site
// 2. It takes one BFS level from the frontier and spawns one worker per task
// 3. Each worker fetches (retrying transient failures), resolves links when
//    the page is HTML, and hands back a PageReport
// 4. Reports are absorbed in dispatch order, children enqueued at depth + 1
// 5. Repeat until the frontier is empty or the session is cancelled
// 6. Download every asset the pages referenced
//
// Concurrency:
// - WorkerPool is a semaphore; every fetch holds a permit. Sessions in one
//   run share the pool, so it is the global limit.
// - Workers never touch the frontier. Check-and-mark happens only here.
// - Cancellation stops dispatch at once. Workers already spawned finish or
//   time out on their own and their results are dropped.
// =============================================================================

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::frontier::{CrawlTask, Enqueue, Frontier};
use crate::config::{CrawlBudget, MirrorConfig};
use crate::error::{FailureKind, FetchError};
use crate::extract::{resolve, Resolved, Scope};
use crate::fetch::{FetchKind, FetchResult, Fetcher};
use crate::site::{AssetRef, AssetStatus, Page, PageOutcome, SessionState, Site};

// Assets on a host that timed out or refused connections this recently are
// not attempted.
pub const HOST_FAILURE_COOLDOWN: Duration = Duration::from_secs(60);

// Wait before retry n is n * RETRY_BACKOFF.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Bounds the number of fetches in flight.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    // The semaphore is never closed, so this only returns None if that
    // changes.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).acquire_owned().await.ok()
    }
}

/// Hosts that recently timed out or could not be reached.
#[derive(Debug)]
struct FailedHosts {
    hosts: Mutex<HashMap<String, Instant>>,
    cooldown: Duration,
}

impl FailedHosts {
    fn new(cooldown: Duration) -> Self {
        Self {
            hosts: Mutex::new(HashMap::new()),
            cooldown,
        }
    }

    fn record(&self, host: &str) {
        if let Ok(mut hosts) = self.hosts.lock() {
            hosts.insert(host.to_string(), Instant::now());
        }
    }

    fn recently_failed(&self, host: &str) -> bool {
        self.hosts
            .lock()
            .map(|hosts| {
                hosts
                    .get(host)
                    .is_some_and(|at| at.elapsed() < self.cooldown)
            })
            .unwrap_or(false)
    }
}

/// What a worker hands back for one crawl task.
#[derive(Debug)]
struct PageReport {
    page: Page,
    // Set when redirects led somewhere else.
    final_url: Option<Url>,
    asset_refs: Vec<AssetRef>,
    subdomains: BTreeSet<String>,
}

impl PageReport {
    fn failed(url: Url, depth: usize, error: &FetchError) -> Self {
        Self {
            page: Page {
                url,
                depth,
                outcome: PageOutcome::Failed {
                    kind: error.kind(),
                    message: error.to_string(),
                },
            },
            final_url: None,
            asset_refs: Vec::new(),
            subdomains: BTreeSet::new(),
        }
    }
}

// Everything a spawned worker needs. Cheap to clone.
#[derive(Debug, Clone)]
struct Worker {
    fetcher: Fetcher,
    pool: WorkerPool,
    failed_hosts: Arc<FailedHosts>,
    retries: u32,
    backoff: Duration,
}

impl Worker {
    // One fetch plus up to `retries` more for transient failures. The permit
    // is held per attempt, not across the backoff sleep.
    async fn fetch(&self, url: &Url, kind: FetchKind) -> Result<FetchResult, FetchError> {
        let mut attempt = 0;
        loop {
            let result = {
                let _permit = self.pool.acquire().await;
                self.fetcher.fetch(url, kind).await
            };
            match result {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    debug!(%url, attempt, error = %e, "retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => {
                    if e.is_host_failure() {
                        if let Some(host) = url.host_str() {
                            self.failed_hosts.record(host);
                        }
                    }
                    return Err(e);
                }
            }
        }
    }

    // Fetch, then resolve when the content is HTML.
    async fn crawl_page(self, task: CrawlTask, scope: Arc<Scope>) -> PageReport {
        let result = match self.fetch(&task.url, FetchKind::Page).await {
            Ok(result) => result,
            Err(e) => {
                warn!(url = %task.url, error = %e, "page failed");
                return PageReport::failed(task.url, task.depth, &e);
            }
        };

        let is_html = result.is_html();
        // A seed that redirects to another host (example.com -> www.example.com)
        // makes that host part of the site.
        let widened = (task.depth == 0 && !scope.contains(&result.final_url)).then(|| {
            let mut seed_scope = Scope::clone(&scope);
            seed_scope.allow(&result.final_url);
            seed_scope
        });
        let scope = widened.as_ref().unwrap_or(scope.as_ref());
        let resolved = if is_html {
            resolve(&String::from_utf8_lossy(&result.bytes), &result.final_url, scope)
        } else {
            Resolved::default()
        };
        debug!(
            url = %task.url,
            origin = %task.origin,
            depth = task.depth,
            links = resolved.outbound_links.len(),
            assets = resolved.asset_refs.len(),
            "page fetched"
        );

        let final_url = (result.final_url != task.url).then(|| result.final_url.clone());
        PageReport {
            page: Page {
                url: task.url,
                depth: task.depth,
                outcome: PageOutcome::Fetched {
                    content: result.bytes,
                    content_type: result.content_type,
                    is_html,
                    outbound_links: resolved.outbound_links,
                    references: resolved.references,
                },
            },
            final_url,
            asset_refs: resolved.asset_refs,
            subdomains: resolved.subdomains,
        }
    }

    async fn download_asset(self, url: Url) -> (Url, AssetStatus) {
        if let Some(host) = url.host_str() {
            if self.failed_hosts.recently_failed(host) {
                debug!(%url, "skipping asset on failed host");
                let status = AssetStatus::Failed {
                    kind: FailureKind::NetworkFailure,
                    message: "host recently failed".to_string(),
                };
                return (url, status);
            }
        }

        let status = match self.fetch(&url, FetchKind::Asset).await {
            Ok(result) => AssetStatus::Downloaded(result.bytes),
            Err(e) => {
                warn!(%url, error = %e, "asset failed");
                AssetStatus::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        };
        (url, status)
    }
}

/// Crawls one site. Create one per seed.
pub struct CrawlSession {
    worker: Worker,
    budget: CrawlBudget,
    cancel: CancellationToken,
    download_assets: bool,
}

impl CrawlSession {
    pub fn new(
        fetcher: &Fetcher,
        pool: WorkerPool,
        config: &MirrorConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            worker: Worker {
                fetcher: fetcher.for_session(),
                pool,
                failed_hosts: Arc::new(FailedHosts::new(HOST_FAILURE_COOLDOWN)),
                retries: config.retries,
                backoff: RETRY_BACKOFF,
            },
            budget: config.budget,
            cancel,
            download_assets: !config.dry_run,
        }
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.worker.backoff = backoff;
        self
    }

    // Runs the session to a terminal state. Never fails: per-page and
    // per-asset problems are recorded in the returned Site.
    #[instrument(skip_all, fields(seed = %seed))]
    pub async fn run(&self, seed: Url, scope: &Scope) -> Site {
        let mut site = Site::new(seed.clone());
        site.state = SessionState::Running;
        info!(
            max_pages = ?self.budget.max_pages,
            max_depth = ?self.budget.max_depth,
            "crawl started"
        );

        let mut scope = scope.clone();
        let origin = seed.to_string();
        let mut frontier = Frontier::new(self.budget);
        frontier.enqueue(seed, 0, &origin);

        let mut cancelled = false;
        while !frontier.is_empty() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let level = frontier.next_level();
            debug!(
                depth = level.first().map(|t| t.depth),
                tasks = level.len(),
                dispatched = frontier.dispatched(),
                "dispatching level"
            );
            let dispatched: Vec<(Url, usize)> =
                level.iter().map(|t| (t.url.clone(), t.depth)).collect();
            let level_scope = Arc::new(scope.clone());
            let handles: Vec<_> = level
                .into_iter()
                .map(|task| {
                    tokio::spawn(self.worker.clone().crawl_page(task, Arc::clone(&level_scope)))
                })
                .collect();

            let results = tokio::select! {
                results = join_all(handles) => results,
                _ = self.cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
            };

            // Dispatch order, not completion order: keeps Site.pages and
            // the next level deterministic.
            for ((url, depth), result) in dispatched.into_iter().zip(results) {
                let report = result.unwrap_or_else(|e| {
                    let error = FetchError::NetworkFailure(format!("worker failed: {}", e));
                    PageReport::failed(url, depth, &error)
                });
                absorb(&mut site, &mut frontier, &mut scope, &origin, report);
            }
        }
        if cancelled {
            debug!(dropped = frontier.len(), "queued tasks dropped");
        }

        site.state = if cancelled {
            SessionState::Cancelled
        } else if frontier.budget_hit() {
            SessionState::BudgetExhausted
        } else {
            SessionState::Completed
        };

        if !cancelled && self.download_assets && !self.fetch_assets(&mut site).await {
            site.state = SessionState::Cancelled;
        }

        info!(
            state = site.state.label(),
            pages = site.pages.len(),
            assets = site.assets_fetched(),
            robots_origins = self.worker.fetcher.robots().cached_origins(),
            "crawl finished"
        );
        site
    }

    // Downloads every pending asset through the pool. Returns false when the
    // session was cancelled part way.
    async fn fetch_assets(&self, site: &mut Site) -> bool {
        let pending: Vec<Url> = site
            .assets
            .iter()
            .filter(|(_, asset)| asset.status == AssetStatus::Pending)
            .map(|(url, _)| url.clone())
            .collect();
        if pending.is_empty() {
            return true;
        }
        debug!(count = pending.len(), "downloading assets");

        // Downloads run as spawned tasks, started as the buffer makes room.
        // On cancel the handles are dropped, which detaches the tasks: a
        // request already sent finishes or times out by itself.
        let results: Vec<(Url, AssetStatus)> = stream::iter(pending)
            .map(|url| {
                let handle = tokio::spawn(self.worker.clone().download_asset(url.clone()));
                async move {
                    handle.await.unwrap_or_else(|e| {
                        let status = AssetStatus::Failed {
                            kind: FailureKind::NetworkFailure,
                            message: format!("worker failed: {}", e),
                        };
                        (url, status)
                    })
                }
            })
            .buffer_unordered(self.worker.pool.size())
            .take_until(self.cancel.cancelled())
            .collect()
            .await;

        for (url, status) in results {
            if let Some(asset) = site.assets.get_mut(&url) {
                asset.status = status;
            }
        }
        !self.cancel.is_cancelled()
    }
}

// Folds one worker report into the site and the frontier.
fn absorb(
    site: &mut Site,
    frontier: &mut Frontier,
    scope: &mut Scope,
    origin: &str,
    report: PageReport,
) {
    if let Some(final_url) = &report.final_url {
        frontier.mark_visited(final_url);
        if report.page.depth == 0 && scope.allow(final_url) {
            info!(host = ?final_url.host_str(), "seed redirected, host added to the site");
        }
    }
    for asset in report.asset_refs {
        site.add_asset(asset);
    }
    site.subdomains_found.extend(report.subdomains);

    if let PageOutcome::Fetched { outbound_links, .. } = &report.page.outcome {
        let depth = report.page.depth + 1;
        for link in outbound_links {
            match frontier.enqueue(link.clone(), depth, origin) {
                Enqueue::Queued | Enqueue::Duplicate => {}
                refused => debug!(url = %link, depth, reason = ?refused, "not enqueued"),
            }
        }
    }
    site.pages.push(report.page);
}
