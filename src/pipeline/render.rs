//! Rasterization seam: PDF path in, ordered page images out.
//!
//! Rasterization is an external collaborator, not part of this crate's
//! core: the default [`PopplerRasterizer`] shells out to `pdftoppm`, and
//! callers can inject any [`Rasterizer`] (tests use
//! [`crate::testing::MockRasterizer`]).
//!
//! The rendered images live in a `TempDir` owned by
//! [`RasterizedDocument`]. The guard guarantees cleanup on every exit path,
//! success or failure, including panics; a failed run must not leave
//! hundreds of page PNGs behind.

use crate::error::ExtractError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Ordered reference to one rasterized page. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-based, matching the source PDF page order.
    pub page_number: u32,
    pub path: PathBuf,
}

/// The rendered pages of one document plus their backing temp directory.
pub struct RasterizedDocument {
    images: Vec<PageImage>,
    /// Kept alive so the rendered PNGs survive until the run finishes;
    /// dropped (and deleted) with this struct. Deletion failures are the
    /// OS's problem, never the run's.
    _temp_dir: TempDir,
}

impl RasterizedDocument {
    pub fn images(&self) -> &[PageImage] {
        &self.images
    }

    pub fn page_count(&self) -> usize {
        self.images.len()
    }
}

/// Renders a PDF into one image file per page, in page order.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render `pdf_path` into `output_dir` at the given DPI and return the
    /// image paths in page order.
    async fn render(
        &self,
        pdf_path: &Path,
        output_dir: &Path,
        dpi: u32,
    ) -> Result<Vec<PathBuf>, ExtractError>;
}

/// Default rasterizer: poppler's `pdftoppm -png`.
pub struct PopplerRasterizer;

#[async_trait]
impl Rasterizer for PopplerRasterizer {
    async fn render(
        &self,
        pdf_path: &Path,
        output_dir: &Path,
        dpi: u32,
    ) -> Result<Vec<PathBuf>, ExtractError> {
        let prefix = output_dir.join("page");
        let output = tokio::process::Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg(pdf_path)
            .arg(&prefix)
            .output()
            .await
            .map_err(|e| ExtractError::RasterizationFailed {
                detail: format!("failed to launch pdftoppm: {e}"),
            })?;

        if !output.status.success() {
            return Err(ExtractError::RasterizationFailed {
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let mut paths: Vec<PathBuf> = Vec::new();
        let mut entries = tokio::fs::read_dir(output_dir).await.map_err(|e| {
            ExtractError::RasterizationFailed {
                detail: format!("failed to list rendered pages: {e}"),
            }
        })?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            ExtractError::RasterizationFailed {
                detail: format!("failed to list rendered pages: {e}"),
            }
        })? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "png") {
                paths.push(path);
            }
        }
        // pdftoppm zero-pads page indices to a uniform width, so the
        // lexicographic order is the page order.
        paths.sort();
        debug!(pages = paths.len(), "pdftoppm render complete");
        Ok(paths)
    }
}

/// Render a document into a temp directory and number its pages 1-based.
pub async fn rasterize(
    rasterizer: &dyn Rasterizer,
    pdf_path: &Path,
    dpi: u32,
) -> Result<RasterizedDocument, ExtractError> {
    let temp_dir = TempDir::new().map_err(|e| ExtractError::RasterizationFailed {
        detail: format!("failed to create temp image dir: {e}"),
    })?;

    let paths = rasterizer.render(pdf_path, temp_dir.path(), dpi).await?;
    let images: Vec<PageImage> = paths
        .into_iter()
        .enumerate()
        .map(|(index, path)| PageImage {
            page_number: index as u32 + 1,
            path,
        })
        .collect();

    info!(pages = images.len(), dpi, "document rasterized");
    Ok(RasterizedDocument {
        images,
        _temp_dir: temp_dir,
    })
}
