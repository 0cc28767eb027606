// src/crawl/mod.rs
// =============================================================================
// This module handles website crawling.
//
// Features:
// - Breadth-first crawling starting from a URL, one level at a time
// - Page and depth budgets
// - Same-site restriction (external links are never crawled)
// - Concurrent fetching through a shared worker pool
// - Subdomain discovery for whole-domain mirrors
//
// Submodules:
// - normalize: canonical URL form, the key for deduplication
// - frontier: the BFS queue and visited set
// - scheduler: the crawl session and its worker pool
// - subdomains: candidate generation and probing
//
// Rust concepts:
// - Async programming: For concurrent network requests
// - Collections: HashSet for tracking visited URLs, VecDeque for queue
// =============================================================================

mod frontier;
pub mod normalize;
mod scheduler;
mod subdomains;

pub use scheduler::{CrawlSession, WorkerPool};
pub use subdomains::{ProbeTarget, SubdomainProber};
