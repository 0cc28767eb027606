// src/config.rs
// =============================================================================
// Runtime configuration for a mirror run.
//
// There is no config file: everything comes from the command line (see
// cli.rs) and falls back to the defaults below. The structs here are what the
// rest of the program actually reads, so the crawler never depends on clap.
//
// Rust concepts:
// - Option<usize>: "no limit" is None rather than a magic number
// - Copy types: CrawlBudget is small enough to pass around by value
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

use crate::error::MirrorError;

pub const DEFAULT_OUTPUT_DIR: &str = "extracted_sites";
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RETRIES: u32 = 1;
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_REDIRECTS: usize = 5;

// Identifies the crawler to servers and to robots.txt groups.
pub fn default_user_agent() -> String {
    format!("site-mirror/{}", env!("CARGO_PKG_VERSION"))
}

/// Page and depth ceilings for one crawl session. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrawlBudget {
    pub max_pages: Option<usize>,
    pub max_depth: Option<usize>,
}

impl CrawlBudget {
    pub fn new(max_pages: Option<usize>, max_depth: Option<usize>) -> Self {
        Self {
            max_pages,
            max_depth,
        }
    }

    // Budget for "extract one page": the seed and nothing else.
    pub fn single_page() -> Self {
        Self {
            max_pages: Some(1),
            max_depth: Some(0),
        }
    }

    pub fn allows_depth(&self, depth: usize) -> bool {
        self.max_depth.map_or(true, |max| depth <= max)
    }

    pub fn allows_pages(&self, count: usize) -> bool {
        self.max_pages.map_or(true, |max| count <= max)
    }
}

/// Everything a mirror run needs besides the seeds themselves.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub output_dir: PathBuf,
    pub budget: CrawlBudget,
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
    pub session_timeout: Option<Duration>,
    pub retries: u32,
    pub user_agent: String,
    pub respect_robots: bool,
    pub local_root: Option<PathBuf>,
    pub dry_run: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            budget: CrawlBudget::default(),
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            probe_timeout: PROBE_TIMEOUT,
            session_timeout: None,
            retries: DEFAULT_RETRIES,
            user_agent: default_user_agent(),
            respect_robots: true,
            local_root: None,
            dry_run: false,
        }
    }
}

impl MirrorConfig {
    pub fn validate(&self) -> Result<(), MirrorError> {
        if self.concurrency == 0 {
            return Err(MirrorError::Config("concurrency must be at least 1".into()));
        }
        if self.budget.max_pages == Some(0) {
            return Err(MirrorError::Config("max pages must be at least 1".into()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(MirrorError::Config("user agent must not be empty".into()));
        }
        Ok(())
    }

    pub fn with_budget(&self, budget: CrawlBudget) -> Self {
        Self {
            budget,
            ..self.clone()
        }
    }
}
