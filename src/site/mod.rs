// src/site/mod.rs
// =============================================================================
// The result of crawling one seed, and how it is written to disk.
//
// A Site owns everything a session produced:
// - pages, in breadth-first discovery order (failed ones included)
// - assets, one entry per canonical URL
// - subdomains noticed along the way
// - the terminal state of the session
//
// Submodules:
// - paths: deterministic slugs and file names
// - writer: renders a Site into <output_root>/<slug>/
// =============================================================================

pub mod paths;
mod writer;

pub use writer::SiteWriter;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Serialize;
use url::Url;

use crate::error::FailureKind;
use crate::extract::{AssetKind, Reference};

/// Where a crawl session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    BudgetExhausted,
    Cancelled,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Completed => "completed",
            SessionState::BudgetExhausted => "budget exhausted",
            SessionState::Cancelled => "cancelled",
        }
    }
}

/// A downloadable asset and where it will live in the output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub original_url: Url,
    // Relative to the site directory, e.g. "assets/css/site-0123456789ab.css".
    pub local_path: String,
    pub kind: AssetKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetStatus {
    Pending,
    Downloaded(Vec<u8>),
    Failed { kind: FailureKind, message: String },
}

#[derive(Debug, Clone)]
pub struct Asset {
    pub reference: AssetRef,
    pub status: AssetStatus,
}

impl Asset {
    pub fn is_downloaded(&self) -> bool {
        matches!(self.status, AssetStatus::Downloaded(_))
    }
}

/// What happened when a page was fetched.
#[derive(Debug, Clone)]
pub enum PageOutcome {
    Fetched {
        content: Vec<u8>,
        content_type: Option<String>,
        is_html: bool,
        outbound_links: Vec<Url>,
        references: Vec<Reference>,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub depth: usize,
    pub outcome: PageOutcome,
}

impl Page {
    pub fn is_fetched(&self) -> bool {
        matches!(self.outcome, PageOutcome::Fetched { .. })
    }

    pub fn is_html(&self) -> bool {
        matches!(self.outcome, PageOutcome::Fetched { is_html: true, .. })
    }
}

/// Aggregate result of crawling one seed.
#[derive(Debug, Clone)]
pub struct Site {
    pub root_url: Url,
    pub pages: Vec<Page>,
    pub assets: BTreeMap<Url, Asset>,
    pub subdomains_found: BTreeSet<String>,
    pub state: SessionState,
}

impl Site {
    pub fn new(root_url: Url) -> Self {
        Self {
            root_url,
            pages: Vec::new(),
            assets: BTreeMap::new(),
            subdomains_found: BTreeSet::new(),
            state: SessionState::Idle,
        }
    }

    // Registers an asset reference. A URL seen before keeps its first entry,
    // so every page referencing it shares one downloaded copy.
    pub fn add_asset(&mut self, reference: AssetRef) {
        self.assets
            .entry(reference.original_url.clone())
            .or_insert(Asset {
                reference,
                status: AssetStatus::Pending,
            });
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages.iter().filter(|p| p.is_fetched()).count()
    }

    pub fn assets_fetched(&self) -> usize {
        self.assets.values().filter(|a| a.is_downloaded()).count()
    }

    // Every failed page and asset, pages first.
    pub fn failures(&self) -> Vec<FailureRecord> {
        let pages = self.pages.iter().filter_map(|p| match &p.outcome {
            PageOutcome::Failed { kind, message } => Some(FailureRecord {
                url: p.url.to_string(),
                resource: ResourceType::Page,
                kind: *kind,
                message: message.clone(),
            }),
            PageOutcome::Fetched { .. } => None,
        });
        let assets = self.assets.values().filter_map(|a| match &a.status {
            AssetStatus::Failed { kind, message } => Some(FailureRecord {
                url: a.reference.original_url.to_string(),
                resource: ResourceType::Asset,
                kind: *kind,
                message: message.clone(),
            }),
            _ => None,
        });
        pages.chain(assets).collect()
    }

    pub fn summary(&self, output_path: Option<PathBuf>, write_error: Option<String>) -> SiteSummary {
        SiteSummary {
            root_url: self.root_url.to_string(),
            state: self.state,
            pages_fetched: self.pages_fetched(),
            assets_fetched: self.assets_fetched(),
            failures: self.failures(),
            output_path,
            write_error,
            planned_files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Page,
    Asset,
}

/// One failed page or asset, as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub url: String,
    pub resource: ResourceType,
    pub kind: FailureKind,
    pub message: String,
}

/// Per-site report handed back to the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct SiteSummary {
    pub root_url: String,
    pub state: SessionState,
    pub pages_fetched: usize,
    pub assets_fetched: usize,
    pub failures: Vec<FailureRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_error: Option<String>,
    // Filled only by dry runs: the files that would have been written.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned_files: Vec<String>,
}

impl SiteSummary {
    // A summary for an input that never got as far as crawling, because it
    // could not be turned into a URL.
    pub fn failed_before_crawl(input: &str, message: String) -> Self {
        Self {
            root_url: input.to_string(),
            state: SessionState::Idle,
            pages_fetched: 0,
            assets_fetched: 0,
            failures: vec![FailureRecord {
                url: input.to_string(),
                resource: ResourceType::Page,
                kind: FailureKind::ParseFailure,
                message,
            }],
            output_path: None,
            write_error: None,
            planned_files: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.write_error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_add_asset_deduplicates() {
        let mut site = Site::new(url("https://example.com/"));
        let css = url("https://example.com/style.css");
        let reference = AssetRef {
            local_path: paths::asset_path(&css, AssetKind::Css),
            original_url: css.clone(),
            kind: AssetKind::Css,
        };
        site.add_asset(reference.clone());
        site.assets.get_mut(&css).unwrap().status = AssetStatus::Downloaded(b"body{}".to_vec());
        site.add_asset(reference);

        assert_eq!(site.assets.len(), 1);
        assert_eq!(site.assets_fetched(), 1);
    }

    #[test]
    fn test_summary_counts_and_failures() {
        let mut site = Site::new(url("https://example.com/"));
        site.pages.push(Page {
            url: url("https://example.com/"),
            depth: 0,
            outcome: PageOutcome::Fetched {
                content: Vec::new(),
                content_type: Some("text/html".into()),
                is_html: true,
                outbound_links: Vec::new(),
                references: Vec::new(),
            },
        });
        site.pages.push(Page {
            url: url("https://example.com/missing"),
            depth: 1,
            outcome: PageOutcome::Failed {
                kind: FailureKind::NotFound,
                message: "not found".into(),
            },
        });
        site.state = SessionState::Completed;

        let summary = site.summary(None, None);
        assert_eq!(summary.pages_fetched, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].kind, FailureKind::NotFound);
        assert!(!summary.is_clean());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["state"], "completed");
        assert_eq!(json["failures"][0]["kind"], "not_found");
    }
}
