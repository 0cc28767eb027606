// src/site/writer.rs
// =============================================================================
// Renders a crawled Site into a browsable directory.
//
// Two steps:
// 1. plan(): a pure function from Site to OutputPlan. It decides every file
//    name and which URLs are served locally. Dry runs stop here.
// 2. write(): creates the directories, writes the downloaded assets, then
//    streams each HTML page through lol_html to point its links at the copy.
//
// Link rewriting rules, per scanned attribute:
// - target mirrored (page fetched or asset downloaded)  ->  ./local/path
// - anything else we could resolve                      ->  absolute URL
// - values we never resolved (mailto:, #top, ...)       ->  left alone
// <base> elements are dropped because every rewritten link is already
// either local or absolute.
// =============================================================================

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lol_html::{element, HtmlRewriter, Settings};
use tracing::{debug, info, warn};
use url::Url;

use super::{paths, AssetStatus, PageOutcome, ResourceType, Site};
use crate::error::MirrorError;
use crate::extract::{AssetKind, Reference, REFERENCE_SELECTORS};

/// One file the writer will produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub url: Url,
    pub resource: ResourceType,
    // Relative to the site directory.
    pub relative_path: String,
}

/// The complete output layout of a Site.
#[derive(Debug, Clone)]
pub struct OutputPlan {
    pub site_dir: PathBuf,
    pub files: Vec<PlannedFile>,
    // Canonical URL -> "./relative/path" for everything served locally.
    pub local_links: HashMap<Url, String>,
}

impl OutputPlan {
    pub fn local_link(&self, url: &Url) -> Option<&str> {
        self.local_links.get(url).map(String::as_str)
    }
}

pub struct SiteWriter {
    output_root: PathBuf,
    name: Option<String>,
}

impl SiteWriter {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            name: None,
        }
    }

    // Overrides the directory name derived from the seed URL.
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name
            .map(|n| paths::sanitize(&n))
            .filter(|n| !n.is_empty());
        self
    }

    pub fn site_dir(&self, site: &Site) -> PathBuf {
        let slug = match &self.name {
            Some(name) => name.clone(),
            None => paths::site_slug(&site.root_url),
        };
        self.output_root.join(slug)
    }

    // Decides every output file without touching the disk.
    //
    // Pages are listed when fetched. Assets are listed unless their download
    // failed, so a dry run (where nothing was downloaded) still shows them.
    // Only downloaded assets are linked locally.
    pub fn plan(&self, site: &Site) -> OutputPlan {
        let mut files = Vec::new();
        let mut local_links = HashMap::new();

        for page in &site.pages {
            if !page.is_fetched() {
                continue;
            }
            let name = paths::page_file_name(&page.url, &site.root_url, page.is_html());
            local_links.insert(page.url.clone(), format!("./{}", name));
            files.push(PlannedFile {
                url: page.url.clone(),
                resource: ResourceType::Page,
                relative_path: name,
            });
        }

        for (url, asset) in &site.assets {
            if matches!(asset.status, AssetStatus::Failed { .. }) {
                continue;
            }
            if asset.is_downloaded() {
                local_links.insert(url.clone(), format!("./{}", asset.reference.local_path));
            }
            files.push(PlannedFile {
                url: url.clone(),
                resource: ResourceType::Asset,
                relative_path: asset.reference.local_path.clone(),
            });
        }

        OutputPlan {
            site_dir: self.site_dir(site),
            files,
            local_links,
        }
    }

    // Writes the whole site. Returns the site directory.
    //
    // Any filesystem error aborts this site and is returned as
    // MirrorError::Io; other sites in the same run are unaffected.
    pub async fn write(&self, site: &Site) -> Result<PathBuf, MirrorError> {
        let plan = self.plan(site);
        let site_dir = plan.site_dir.clone();

        for kind in [AssetKind::Css, AssetKind::Js, AssetKind::Image] {
            let dir = site_dir.join("assets").join(kind.dir());
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| MirrorError::io(&dir, e))?;
        }

        let mut assets_written = 0;
        for asset in site.assets.values() {
            let AssetStatus::Downloaded(bytes) = &asset.status else {
                continue;
            };
            let path = site_dir.join(&asset.reference.local_path);
            write_file(&path, bytes).await?;
            assets_written += 1;
        }

        let mut pages_written = 0;
        for page in &site.pages {
            let PageOutcome::Fetched {
                content,
                is_html,
                references,
                ..
            } = &page.outcome
            else {
                continue;
            };
            let Some(link) = plan.local_link(&page.url) else {
                continue;
            };
            let path = site_dir.join(link.trim_start_matches("./"));

            let body = if *is_html {
                match rewrite_html(content, references, &plan) {
                    Ok(rewritten) => rewritten,
                    Err(e) => {
                        warn!(url = %page.url, error = %e, "rewrite failed, writing original HTML");
                        content.clone()
                    }
                }
            } else {
                content.clone()
            };
            write_file(&path, &body).await?;
            pages_written += 1;
        }

        info!(
            dir = %site_dir.display(),
            pages = pages_written,
            assets = assets_written,
            "site written"
        );
        Ok(site_dir)
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), MirrorError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| MirrorError::io(parent, e))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| MirrorError::io(path, e))?;
    debug!(path = %path.display(), bytes = bytes.len(), "wrote file");
    Ok(())
}

// Streams one page through lol_html, replacing every reference the resolver
// recorded with its local or absolute form.
fn rewrite_html(
    content: &[u8],
    references: &[Reference],
    plan: &OutputPlan,
) -> Result<Vec<u8>, lol_html::errors::RewritingError> {
    let by_raw: HashMap<&str, &Reference> =
        references.iter().map(|r| (r.raw.as_str(), r)).collect();

    let lookup = |value: &str| -> Option<String> {
        let value = value.trim();
        let reference = by_raw
            .get(value)
            .or_else(|| by_raw.get(decode_entities(value).as_str()))?;
        Some(rewritten_target(reference, plan))
    };

    let mut handlers = Vec::with_capacity(REFERENCE_SELECTORS.len() + 1);
    for entry in REFERENCE_SELECTORS {
        let attribute = entry.attribute;
        let lookup = &lookup;
        handlers.push(element!(entry.selector, move |el| {
            if let Some(value) = el.get_attribute(attribute) {
                if let Some(target) = lookup(&value) {
                    el.set_attribute(attribute, &target)?;
                }
            }
            Ok(())
        }));
    }
    handlers.push(element!("base", |el| {
        el.remove();
        Ok(())
    }));

    let mut output = Vec::with_capacity(content.len());
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );
    rewriter.write(content)?;
    rewriter.end()?;
    Ok(output)
}

fn rewritten_target(reference: &Reference, plan: &OutputPlan) -> String {
    let target = match plan.local_link(&reference.url) {
        Some(local) => local.to_string(),
        None => reference.url.to_string(),
    };
    match &reference.fragment {
        Some(fragment) => format!("{}#{}", target, fragment),
        None => target,
    }
}

// lol_html hands us attribute values as written in the source, while the
// resolver (html5ever) saw them decoded. Handles the named entities that show
// up in URLs plus every decimal and hex character reference. Anything else is
// left as written.
fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }

    let mut decoded = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let entity = rest[1..]
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&rest[1..=end]).map(|c| (c, end + 2)));
        match entity {
            Some((c, consumed)) => {
                decoded.push(c);
                rest = &rest[consumed..];
            }
            None => {
                decoded.push('&');
                rest = &rest[1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

// "amp", "#38", "#x26" -> the character they stand for.
fn decode_entity(name: &str) -> Option<char> {
    let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else if let Some(dec) = name.strip_prefix('#') {
        dec.parse::<u32>().ok()?
    } else {
        return match name {
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "lt" => Some('<'),
            "gt" => Some('>'),
            _ => None,
        };
    };
    char::from_u32(code)
}
