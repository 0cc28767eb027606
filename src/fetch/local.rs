// src/fetch/local.rs
// =============================================================================
// "Fetching" file:// URLs: a filesystem read confined to a base directory.
//
// Mirroring a local HTML tree works exactly like mirroring a website, except
// the bytes come from disk. Errors are mapped onto the same FetchError
// variants the HTTP path uses, so the scheduler cannot tell the difference.
// =============================================================================

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use url::Url;

use super::FetchResult;
use crate::error::FetchError;

// Reads the file behind `url`, refusing anything outside `root`.
//
// Directories are served by their index.html, like a web server would.
pub async fn read_local(url: &Url, root: &Path) -> Result<FetchResult, FetchError> {
    let path = url.to_file_path().map_err(|_| FetchError::NotFound)?;
    let path = resolve_inside(&path, root).await?;

    let path = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => path.join("index.html"),
        Ok(_) => path,
        Err(e) => return Err(map_io_error(e)),
    };

    let bytes = tokio::fs::read(&path).await.map_err(map_io_error)?;
    Ok(FetchResult {
        bytes,
        content_type: content_type_for(&path).map(str::to_string),
        final_url: Url::from_file_path(&path).unwrap_or_else(|_| url.clone()),
    })
}

// Canonicalizes `path` and checks it is still under `root` (so ../../etc
// links cannot read outside the tree being mirrored).
async fn resolve_inside(path: &Path, root: &Path) -> Result<PathBuf, FetchError> {
    let root = tokio::fs::canonicalize(root).await.map_err(map_io_error)?;
    let resolved = tokio::fs::canonicalize(path).await.map_err(map_io_error)?;
    if resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(FetchError::Forbidden)
    }
}

fn map_io_error(e: std::io::Error) -> FetchError {
    match e.kind() {
        ErrorKind::NotFound => FetchError::NotFound,
        ErrorKind::PermissionDenied => FetchError::Forbidden,
        _ => FetchError::NetworkFailure(e.to_string()),
    }
}

pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "json" => "application/json",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_file_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.html"), "<p>hi</p>").unwrap();
        let url = Url::from_file_path(dir.path().join("page.html")).unwrap();

        let result = read_local(&url, dir.path()).await.unwrap();
        assert_eq!(result.bytes, b"<p>hi</p>");
        assert_eq!(result.content_type.as_deref(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_directory_serves_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/index.html"), "<p>docs</p>").unwrap();
        let url = Url::from_file_path(dir.path().join("docs")).unwrap();

        let result = read_local(&url, dir.path()).await.unwrap();
        assert_eq!(result.bytes, b"<p>docs</p>");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::from_file_path(dir.path().join("nope.html")).unwrap();
        assert_eq!(read_local(&url, dir.path()).await.unwrap_err(), FetchError::NotFound);
    }

    #[tokio::test]
    async fn test_file_outside_root_is_forbidden() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("site");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(outer.path().join("secret.txt"), "x").unwrap();
        let url = Url::from_file_path(outer.path().join("secret.txt")).unwrap();

        assert_eq!(read_local(&url, &root).await.unwrap_err(), FetchError::Forbidden);
    }
}
