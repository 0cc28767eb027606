// src/extract/mod.rs
// =============================================================================
// This module turns fetched HTML into classified references.
//
// Submodules:
// - links: LinkKind / AssetKind / Scope, the classification vocabulary
// - html: the resolver that scans a page with scraper
// =============================================================================

mod html;
mod links;

pub use html::{resolve, Resolved};
pub use links::{AssetKind, Reference, Scope, REFERENCE_SELECTORS};
