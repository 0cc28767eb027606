// src/crawl/normalize.rs
// =============================================================================
// URL canonicalization.
//
// Two URLs are "the same page" for deduplication only if their canonical
// forms are equal. The canonical form is:
// - absolute (relative references resolved against a base)
// - https:// added when the input has no scheme at all
// - lower-case host, default port dropped, ./ and ../ segments resolved
//   (the url crate does all of this while parsing)
// - no #fragment (query strings are kept: ?page=2 is a different page)
//
// Trailing slashes on non-root paths are kept. /docs and /docs/ resolve
// relative links differently, so treating them as one page would break
// rewriting.
// =============================================================================

use std::path::Path;

use url::Url;

use crate::error::MirrorError;

// Canonicalizes `raw`, resolving it against `base` when one is given.
//
// Examples:
//   normalize("Example.COM", None)            -> https://example.com/
//   normalize("/a/../b#top", Some(page_url))  -> https://<page host>/b
pub fn normalize(raw: &str, base: Option<&Url>) -> Result<Url, MirrorError> {
    let trimmed = raw.trim();
    let parse_error = |source| MirrorError::Parse {
        input: raw.to_string(),
        source,
    };

    if trimmed.is_empty() {
        return Err(parse_error(url::ParseError::EmptyHost));
    }

    let mut url = match base {
        Some(base) => base.join(trimmed).map_err(parse_error)?,
        None => {
            if trimmed.contains("://") || trimmed.starts_with("file:") {
                Url::parse(trimmed).map_err(parse_error)?
            } else {
                Url::parse(&format!("https://{}", trimmed)).map_err(parse_error)?
            }
        }
    };

    url.set_fragment(None);
    Ok(url)
}

// Like normalize, but also hands back the fragment that was stripped.
// The writer re-attaches it when it rewrites a link to a local page.
pub fn split_fragment(raw: &str, base: Option<&Url>) -> Result<(Url, Option<String>), MirrorError> {
    let fragment = raw
        .trim()
        .split_once('#')
        .map(|(_, fragment)| fragment.to_string())
        .filter(|fragment| !fragment.is_empty());
    let url = normalize(raw, base)?;
    Ok((url, fragment))
}

// Turns a filesystem path into a canonical file:// URL.
pub fn from_local_path(path: &Path) -> Result<Url, MirrorError> {
    let absolute = path
        .canonicalize()
        .map_err(|e| MirrorError::io(path, e))?;
    Url::from_file_path(&absolute).map_err(|_| MirrorError::Parse {
        input: path.display().to_string(),
        source: url::ParseError::RelativeUrlWithoutBase,
    })
}

// Schemes the crawler knows how to fetch.
pub fn is_fetchable(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https" | "file")
}
