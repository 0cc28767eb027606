// src/site/paths.rs
// =============================================================================
// Deterministic output names.
//
// Everything here is a pure function of a URL, so mirroring the same site
// twice produces the same file names and the same rewritten links:
//   site slug:  example.com_docs
//   seed page:  index.html
//   page:       about-1a2b3c4d.html
//   asset:      assets/css/site-0f1e2d3c4b5a.css
//
// Hashes are SHA-256 over the canonical URL, hex encoded and truncated.
// The readable part is only a courtesy for humans; the hash is what keeps
// names unique.
// =============================================================================

use sha2::{Digest, Sha256};
use url::Url;

use crate::extract::AssetKind;

const PAGE_HASH_LEN: usize = 8;
const ASSET_HASH_LEN: usize = 12;
const MAX_READABLE_LEN: usize = 60;
const MAX_STEM_LEN: usize = 40;

// Hex SHA-256 of the URL, cut to `len` characters.
pub fn stable_hash(url: &Url, len: usize) -> String {
    let digest = Sha256::digest(url.as_str().as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..len.min(hex.len())].to_string()
}

// Keeps [A-Za-z0-9._-], turns every other run of characters into one '_'.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches(|c| c == '_' || c == '.').to_string()
}

// Directory name for a site: host (and port) plus path.
pub fn site_slug(root: &Url) -> String {
    let mut raw = String::new();
    if let Some(host) = root.host_str() {
        raw.push_str(host);
        if let Some(port) = root.port() {
            raw.push_str(&format!("_{}", port));
        }
    }
    let path = root.path().trim_matches('/');
    if root.scheme() == "file" {
        // A local seed like /home/me/site/index.html: name it after its
        // directory, not the whole absolute path.
        let dir = path.rsplit('/').nth(1).unwrap_or("local");
        raw.push_str(&format!("local_{}", dir));
    } else if !path.is_empty() {
        raw.push('_');
        raw.push_str(path);
    }

    let slug = sanitize(&raw);
    if slug.is_empty() {
        "site".to_string()
    } else {
        slug
    }
}

// File name for a page, relative to the site directory.
pub fn page_file_name(url: &Url, root: &Url, is_html: bool) -> String {
    if url == root {
        return "index.html".to_string();
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    let last_ext = segments
        .last()
        .and_then(|seg| seg.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| is_simple_extension(ext));

    let mut readable: Vec<String> = Vec::new();
    if url.host_str() != root.host_str() || url.port() != root.port() {
        readable.push(url.host_str().unwrap_or("").to_string());
    }
    let tail = segments.len().saturating_sub(3);
    for &seg in &segments[tail..] {
        let seg = seg
            .strip_suffix(".html")
            .or_else(|| seg.strip_suffix(".htm"))
            .unwrap_or(seg);
        readable.push(seg.to_string());
    }

    let mut readable = sanitize(&readable.join("_"));
    if readable.len() > MAX_READABLE_LEN {
        readable = readable[readable.len() - MAX_READABLE_LEN..].to_string();
    }
    if readable.is_empty() {
        readable = "page".to_string();
    }

    let ext = match (is_html, last_ext) {
        (true, _) => "html".to_string(),
        (false, Some(ext)) => ext,
        (false, None) => "bin".to_string(),
    };
    format!("{}-{}.{}", readable, stable_hash(url, PAGE_HASH_LEN), ext)
}

// Path of an asset relative to the site directory, e.g.
// "assets/images/logo-0123456789ab.png".
pub fn asset_path(url: &Url, kind: AssetKind) -> String {
    let last = url
        .path_segments()
        .and_then(|s| s.filter(|seg| !seg.is_empty()).last())
        .unwrap_or("");
    let (stem, ext) = match last.rsplit_once('.') {
        Some((stem, ext)) if is_simple_extension(ext) => (stem, Some(ext.to_ascii_lowercase())),
        _ => (last, None),
    };

    let mut stem = sanitize(stem);
    stem.truncate(MAX_STEM_LEN);
    if stem.is_empty() {
        stem = kind.fallback_stem().to_string();
    }

    let hash = stable_hash(url, ASSET_HASH_LEN);
    let name = match ext.or_else(|| kind.default_extension().map(str::to_string)) {
        Some(ext) => format!("{}-{}.{}", stem, hash, ext),
        None => format!("{}-{}", stem, hash),
    };
    format!("assets/{}/{}", kind.dir(), name)
}

fn is_simple_extension(ext: &str) -> bool {
    (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric())
}
