// src/extract/html.rs
// =============================================================================
// The asset resolver: finds every reference in an HTML page.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
// - Is built on html5ever (Mozilla's HTML parser)
//
// For each selector in REFERENCE_SELECTORS we read the URL attribute,
// resolve it against the page (or its <base href>), and classify it as a
// same-site page, an asset, or an external link. Assets get their local
// output path right away, so the full rewrite mapping exists before a single
// file is written.
// =============================================================================

use std::collections::{BTreeSet, HashSet};

use scraper::{Html, Selector};
use tracing::warn;
use url::Url;

use super::links::{
    host_key, is_skippable, AssetKind, LinkKind, Reference, Role, Scope, REFERENCE_SELECTORS,
};
use crate::crawl::normalize::{is_fetchable, normalize, split_fragment};
use crate::site::{paths, AssetRef};

/// Everything the resolver found in one page.
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    // Same-site pages to crawl, in document order, without duplicates.
    pub outbound_links: Vec<Url>,
    // Assets to download, one per canonical URL.
    pub asset_refs: Vec<AssetRef>,
    // Every resolvable attribute value, one per distinct raw value.
    pub references: Vec<Reference>,
    // Subdomains of the scope's root domain seen in links.
    pub subdomains: BTreeSet<String>,
}

// Scans `html` (fetched from `page_url`) for links and assets.
//
// Parameters:
//   html: the page content
//   page_url: canonical URL the page was fetched from (after redirects)
//   scope: which hosts count as the same site
pub fn resolve(html: &str, page_url: &Url, scope: &Scope) -> Resolved {
    let document = Html::parse_document(html);
    let base = document_base(&document, page_url);

    let mut resolved = Resolved::default();
    let mut seen_raw = HashSet::new();
    let mut seen_pages = HashSet::new();
    let mut seen_assets = HashSet::new();

    for entry in REFERENCE_SELECTORS {
        let selector = match Selector::parse(entry.selector) {
            Ok(selector) => selector,
            Err(e) => {
                warn!(selector = entry.selector, error = ?e, "invalid selector");
                continue;
            }
        };

        for element in document.select(&selector) {
            let Some(raw) = element.value().attr(entry.attribute) else {
                continue;
            };
            let raw = raw.trim();
            if is_skippable(raw) {
                continue;
            }
            let Ok((url, fragment)) = split_fragment(raw, Some(&base)) else {
                continue;
            };
            if !is_fetchable(&url) {
                continue;
            }

            let kind = classify(&url, entry.role, scope);
            match kind {
                LinkKind::Page => {
                    if seen_pages.insert(url.clone()) {
                        resolved.outbound_links.push(url.clone());
                    }
                }
                LinkKind::Asset(asset_kind) => {
                    if seen_assets.insert(url.clone()) {
                        resolved.asset_refs.push(AssetRef {
                            local_path: paths::asset_path(&url, asset_kind),
                            original_url: url.clone(),
                            kind: asset_kind,
                        });
                    }
                }
                LinkKind::External => {}
            }

            if entry.role == Role::Link {
                if let Some(host) = url.host_str() {
                    if scope.is_new_subdomain(host) {
                        resolved.subdomains.insert(host.to_string());
                    }
                }
            }

            if seen_raw.insert(raw.to_string()) {
                resolved.references.push(Reference {
                    raw: raw.to_string(),
                    url,
                    fragment,
                    kind,
                });
            }
        }
    }

    resolved
}

// Decides what one resolved reference is.
//
// Rules:
// - asset attributes (src of img/script, stylesheet href...) are assets
// - an <a href> is a page when it stays in scope, unless its path has an
//   asset extension (a linked PDF is downloaded, not crawled)
// - everything else is external
pub fn classify(url: &Url, role: Role, scope: &Scope) -> LinkKind {
    match role {
        Role::Asset(kind) => LinkKind::Asset(kind),
        Role::Link => {
            if !scope.contains(url) {
                return LinkKind::External;
            }
            match AssetKind::from_path(url.path()) {
                Some(kind) => LinkKind::Asset(kind),
                None => LinkKind::Page,
            }
        }
    }
}

// Resolution base: <base href> when present and valid, else the page URL.
fn document_base(document: &Html, page_url: &Url) -> Url {
    let Ok(selector) = Selector::parse("base[href]") else {
        return page_url.clone();
    };
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| normalize(href, Some(page_url)).ok())
        .filter(|base| host_key(base).is_some() || base.scheme() == "file")
        .unwrap_or_else(|| page_url.clone())
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why is the raw attribute value kept in Reference?
//    - The writer streams the page through lol_html and sees attribute values
//      exactly as written. Looking them up by raw value avoids resolving
//      every link a second time.
//
// 2. Why does a page keep references to external links?
//    - Relative links to pages we did not crawl must become absolute, or they
//      would point at files that do not exist in the mirror.
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://example.com/docs/").unwrap()
    }

    fn scope() -> Scope {
        Scope::single(&Url::parse("https://example.com/").unwrap())
    }

    #[test]
    fn test_same_site_and_external_links() {
        let html = r#"
            <a href="/about">About</a>
            <a href="https://other.org/">Other</a>
            <a href="intro">Intro</a>
        "#;
        let resolved = resolve(html, &page(), &scope());
        let links: Vec<&str> = resolved.outbound_links.iter().map(Url::as_str).collect();
        assert_eq!(links, vec!["https://example.com/about", "https://example.com/docs/intro"]);

        let external = resolved
            .references
            .iter()
            .find(|r| r.raw == "https://other.org/")
            .unwrap();
        assert_eq!(external.kind, LinkKind::External);
    }

    #[test]
    fn test_assets_are_classified_by_element() {
        let html = r#"
            <link rel="stylesheet" href="/css/site.css">
            <link rel="shortcut icon" href="/favicon.ico">
            <script src="https://cdn.other.org/app.js"></script>
            <img src="img/logo.png">
            <video poster="/poster.jpg" src="/clip.mp4"></video>
        "#;
        let resolved = resolve(html, &page(), &scope());
        let kinds: Vec<AssetKind> = resolved.asset_refs.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AssetKind::Css,
                AssetKind::Image,
                AssetKind::Js,
                AssetKind::Image,
                AssetKind::Image,
                AssetKind::Other,
            ]
        );
        assert!(resolved.outbound_links.is_empty());
        // Cross-host assets are still downloaded.
        assert!(resolved
            .asset_refs
            .iter()
            .any(|a| a.original_url.as_str() == "https://cdn.other.org/app.js"));
    }

    #[test]
    fn test_same_asset_twice_yields_one_ref() {
        let html = r#"
            <link rel="stylesheet" href="/style.css">
            <link rel="stylesheet" href="https://example.com/style.css">
        "#;
        let resolved = resolve(html, &page(), &scope());
        assert_eq!(resolved.asset_refs.len(), 1);
        assert_eq!(resolved.references.len(), 2);
        assert!(resolved.asset_refs[0].local_path.starts_with("assets/css/style-"));
    }

    #[test]
    fn test_linked_pdf_is_asset_not_page() {
        let html = r#"<a href="/paper.pdf">Paper</a>"#;
        let resolved = resolve(html, &page(), &scope());
        assert!(resolved.outbound_links.is_empty());
        assert_eq!(resolved.asset_refs[0].kind, AssetKind::Other);
    }

    #[test]
    fn test_skips_special_schemes_and_fragments() {
        let html = r##"
            <a href="#top">Top</a>
            <a href="mailto:test@example.com">Mail</a>
            <a href="javascript:void(0)">JS</a>
            <img src="data:image/png;base64,AAAA">
        "##;
        let resolved = resolve(html, &page(), &scope());
        assert!(resolved.references.is_empty());
    }

    #[test]
    fn test_fragment_kept_on_reference_not_on_url() {
        let html = r#"<a href="/about#team">Team</a>"#;
        let resolved = resolve(html, &page(), &scope());
        assert_eq!(resolved.outbound_links[0].as_str(), "https://example.com/about");
        assert_eq!(resolved.references[0].fragment.as_deref(), Some("team"));
    }

    #[test]
    fn test_base_href_changes_resolution() {
        let html = r#"<head><base href="https://example.com/v2/"></head><a href="guide">Guide</a>"#;
        let resolved = resolve(html, &page(), &scope());
        assert_eq!(resolved.outbound_links[0].as_str(), "https://example.com/v2/guide");
    }

    #[test]
    fn test_collects_subdomains() {
        let html = r#"
            <a href="https://docs.example.com/">Docs</a>
            <a href="https://blog.example.com/post">Blog</a>
            <a href="https://example.org/">Elsewhere</a>
        "#;
        let resolved = resolve(html, &page(), &scope());
        let subs: Vec<&str> = resolved.subdomains.iter().map(String::as_str).collect();
        assert_eq!(subs, vec!["blog.example.com", "docs.example.com"]);
        assert!(resolved.outbound_links.is_empty());
    }

    #[test]
    fn test_links_to_same_page_deduplicated() {
        let html = r#"<a href="/a">1</a><a href="/a#x">2</a><a href="/a">3</a>"#;
        let resolved = resolve(html, &page(), &scope());
        assert_eq!(resolved.outbound_links.len(), 1);
        assert_eq!(resolved.references.len(), 2);
    }
}
