//! Input discovery: list the page images to process.
//!
//! Only files directly inside the input directory count, matched
//! case-insensitively against a fixed allow-list of raster suffixes. The
//! listing is sorted by file name so fan-out order (and therefore the
//! merged ledger) is deterministic.

use crate::error::ExtractError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Raster page formats the pipeline accepts.
const IMAGE_SUFFIXES: [&str; 3] = ["png", "jpg", "jpeg"];

/// True when the path carries one of the accepted image suffixes.
pub fn is_page_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_SUFFIXES.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// List page images in `input_dir`, sorted by file name.
///
/// An empty directory is not an error: the run still produces a
/// header-only ledger.
pub async fn list_pages(input_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let meta = tokio::fs::metadata(input_dir)
        .await
        .map_err(|_| ExtractError::InputDirNotFound {
            path: input_dir.to_path_buf(),
        })?;
    if !meta.is_dir() {
        return Err(ExtractError::NotADirectory {
            path: input_dir.to_path_buf(),
        });
    }

    let mut entries =
        tokio::fs::read_dir(input_dir)
            .await
            .map_err(|e| ExtractError::InputListFailed {
                path: input_dir.to_path_buf(),
                source: e,
            })?;

    let mut pages = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ExtractError::InputListFailed {
            path: input_dir.to_path_buf(),
            source: e,
        })?
    {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && is_page_image(&path) {
            pages.push(path);
        }
    }

    pages.sort();
    debug!("Discovered {} page image(s) in {}", pages.len(), input_dir.display());
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_match_is_case_insensitive() {
        assert!(is_page_image(Path::new("a.png")));
        assert!(is_page_image(Path::new("a.PNG")));
        assert!(is_page_image(Path::new("a.Jpg")));
        assert!(is_page_image(Path::new("a.JPEG")));
        assert!(!is_page_image(Path::new("a.tiff")));
        assert!(!is_page_image(Path::new("a.png.txt")));
        assert!(!is_page_image(Path::new("png")));
    }

    #[tokio::test]
    async fn lists_only_image_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.JPG", "notes.txt", "c.jpeg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();

        let pages = list_pages(dir.path()).await.unwrap();
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.png", "c.jpeg"]);
    }

    #[tokio::test]
    async fn missing_directory_is_fatal() {
        let err = list_pages(Path::new("/no/such/dir")).await.unwrap_err();
        assert!(matches!(err, ExtractError::InputDirNotFound { .. }));
    }

    #[tokio::test]
    async fn file_instead_of_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("single.png");
        std::fs::write(&file, b"x").unwrap();
        let err = list_pages(&file).await.unwrap_err();
        assert!(matches!(err, ExtractError::NotADirectory { .. }));
    }

    #[tokio::test]
    async fn empty_directory_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pages = list_pages(dir.path()).await.unwrap();
        assert!(pages.is_empty());
    }
}
