// src/fetch/mod.rs
// =============================================================================
// This module retrieves raw bytes for a URL.
//
// Submodules:
// - client: the Fetcher (HTTP GET, timeouts, redirects, status mapping)
// - robots: robots.txt parsing and the per-session cache
// - local: file:// reads confined to a base directory
// =============================================================================

mod client;
mod local;
mod robots;

pub use client::Fetcher;

use url::Url;

/// What a fetch is for. Pages may be crawled further, assets never are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Page,
    Asset,
}

/// A successful retrieval.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    // Where we ended up after redirects.
    pub final_url: Url,
}

impl FetchResult {
    // HTML is recognised by content type, or by a leading '<' when the
    // server did not send one.
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(ct) => {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            }
            None => self
                .bytes
                .iter()
                .find(|b| !b.is_ascii_whitespace())
                .is_some_and(|b| *b == b'<'),
        }
    }
}
