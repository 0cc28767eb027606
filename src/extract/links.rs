// src/extract/links.rs
// =============================================================================
// The vocabulary of link classification.
//
// Every reference found in a page ends up as exactly one LinkKind:
// - Page:     same-site hyperlink, a candidate for further crawling
// - Asset:    stylesheet / script / image / media, downloaded but not crawled
// - External: anything else, left pointing at the original web address
//
// The classification happens once, in the resolver. The scheduler and the
// writer only ever match on the enum.
// =============================================================================

use std::collections::BTreeSet;

use url::Url;

/// Asset flavours. Decides the output subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Css,
    Js,
    Image,
    Other,
}

impl AssetKind {
    // Subdirectory under assets/.
    pub fn dir(&self) -> &'static str {
        match self {
            AssetKind::Css => "css",
            AssetKind::Js => "js",
            AssetKind::Image => "images",
            AssetKind::Other => "other",
        }
    }

    // Name used when the URL has no usable last path segment.
    pub fn fallback_stem(&self) -> &'static str {
        match self {
            AssetKind::Css => "style",
            AssetKind::Js => "script",
            AssetKind::Image => "image",
            AssetKind::Other => "file",
        }
    }

    pub fn default_extension(&self) -> Option<&'static str> {
        match self {
            AssetKind::Css => Some("css"),
            AssetKind::Js => Some("js"),
            AssetKind::Image | AssetKind::Other => None,
        }
    }

    // Guesses the kind from a path's extension. None means "not an asset
    // extension we know", i.e. probably a page.
    pub fn from_path(path: &str) -> Option<AssetKind> {
        let last = path.rsplit('/').next().unwrap_or("");
        let (_, ext) = last.rsplit_once('.')?;
        Some(match ext.to_ascii_lowercase().as_str() {
            "css" => AssetKind::Css,
            "js" | "mjs" => AssetKind::Js,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "ico" | "bmp" | "avif" => {
                AssetKind::Image
            }
            "pdf" | "zip" | "gz" | "tgz" | "tar" | "rar" | "7z" | "mp4" | "webm" | "mp3" | "ogg"
            | "wav" | "woff" | "woff2" | "ttf" | "otf" | "eot" | "doc" | "docx" | "xls"
            | "xlsx" | "ppt" | "pptx" | "csv" => AssetKind::Other,
            _ => return None,
        })
    }
}

/// Closed classification of one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Page,
    Asset(AssetKind),
    External,
}

/// One attribute value found in a page, resolved and classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    // Attribute value as written in the page (trimmed).
    pub raw: String,
    // Canonical absolute URL it resolves to.
    pub url: Url,
    pub fragment: Option<String>,
    pub kind: LinkKind,
}

/// What an element/attribute pair references when it is not a plain link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Link,
    Asset(AssetKind),
}

/// A CSS selector, the attribute holding the URL, and what it points to.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceSelector {
    pub selector: &'static str,
    pub attribute: &'static str,
    pub role: Role,
}

const fn sel(selector: &'static str, attribute: &'static str, role: Role) -> ReferenceSelector {
    ReferenceSelector {
        selector,
        attribute,
        role,
    }
}

// Everything the resolver scans and the writer rewrites. Both sides read this
// one table so they can never disagree about which attributes are links.
pub const REFERENCE_SELECTORS: &[ReferenceSelector] = &[
    sel("a[href]", "href", Role::Link),
    sel("area[href]", "href", Role::Link),
    sel("link[rel~=stylesheet][href]", "href", Role::Asset(AssetKind::Css)),
    sel("link[rel~=icon][href]", "href", Role::Asset(AssetKind::Image)),
    sel("script[src]", "src", Role::Asset(AssetKind::Js)),
    sel("img[src]", "src", Role::Asset(AssetKind::Image)),
    sel("input[type=image][src]", "src", Role::Asset(AssetKind::Image)),
    sel("video[poster]", "poster", Role::Asset(AssetKind::Image)),
    sel("video[src]", "src", Role::Asset(AssetKind::Other)),
    sel("audio[src]", "src", Role::Asset(AssetKind::Other)),
    sel("source[src]", "src", Role::Asset(AssetKind::Other)),
    sel("embed[src]", "src", Role::Asset(AssetKind::Other)),
];

// Attribute values that are never URLs we can mirror.
pub fn is_skippable(raw: &str) -> bool {
    let lower = raw.trim().to_ascii_lowercase();
    lower.is_empty()
        || lower.starts_with('#')
        || ["mailto:", "tel:", "javascript:", "data:", "about:", "blob:"]
            .iter()
            .any(|scheme| lower.starts_with(scheme))
}

/// The set of hosts whose links count as "same site".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    hosts: BTreeSet<String>,
    root_domain: String,
    local: bool,
}

impl Scope {
    // Scope holding only the seed's own host.
    pub fn single(root: &Url) -> Self {
        let mut hosts = BTreeSet::new();
        if let Some(key) = host_key(root) {
            hosts.insert(key);
        }
        let host = root.host_str().unwrap_or("");
        Self {
            hosts,
            root_domain: host.strip_prefix("www.").unwrap_or(host).to_string(),
            local: root.scheme() == "file",
        }
    }

    // Extra hosts that also count as same-site.
    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.hosts
            .extend(hosts.into_iter().map(|h| h.as_ref().trim().to_ascii_lowercase()));
        self
    }

    // Adds the host of `url`. Returns false when it was already in scope.
    pub fn allow(&mut self, url: &Url) -> bool {
        match host_key(url) {
            Some(key) => self.hosts.insert(key),
            None => false,
        }
    }

    pub fn root_domain(&self) -> &str {
        &self.root_domain
    }

    pub fn contains(&self, url: &Url) -> bool {
        match url.scheme() {
            "http" | "https" => host_key(url).is_some_and(|key| self.hosts.contains(&key)),
            "file" => self.local,
            _ => false,
        }
    }

    // True for hosts like docs.example.com when the root domain is
    // example.com. The root itself and already-allowed hosts do not count.
    pub fn is_new_subdomain(&self, host: &str) -> bool {
        !self.root_domain.is_empty()
            && host.ends_with(&format!(".{}", self.root_domain))
            && !self.hosts.contains(host)
    }
}

// "example.com" or "localhost:8080": host plus an explicit port if any.
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}
