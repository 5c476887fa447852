pub mod cache;
pub mod config;
pub mod document;
pub mod geometry;
pub mod gesture;
pub mod history;
pub mod hit;
pub mod model;
pub mod notice;
pub mod persist;
pub mod redraw;
pub mod session;
pub mod store;

use std::path::{Path, PathBuf};

use anyhow::Result;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use cache::{CacheKey, Invalidation};
pub use config::EditorConfig;
pub use document::{Document, IndexedPage, MovedPage};
pub use geometry::{Point, Rect, Rotation};
pub use gesture::{Drag, Tool};
pub use history::{Edit, History};
pub use hit::Hit;
pub use model::{
    Annotation, AnnotationKind, Color, HighlightAnnotation, Page, PageSource, ShapeAnnotation,
    ShapeKind, TextAnnotation,
};
pub use notice::{Notice, NoticeKind, SessionEvent, Severity};
pub use persist::{FileStateStore, MemoryStateStore, PersistedDocumentState, StateStore};
pub use session::{Command, Session};

pub type DocumentId = Uuid;
pub type PageId = Uuid;
pub type AnnotationId = Uuid;

static DOCUMENT_NAMESPACE: Lazy<Uuid> = Lazy::new(|| {
    Uuid::parse_str("3f1d6a0e-52c4-5b8e-9a71-0c2e4d8b6f19").unwrap_or(Uuid::NAMESPACE_URL)
});

/// Stable id for a document file: the same path always maps to the same id.
pub fn document_id_for_path(path: &Path) -> DocumentId {
    let resolved = path
        .canonicalize()
        .or_else(|_| {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                std::env::current_dir().map(|cwd| cwd.join(path))
            }
        })
        .unwrap_or_else(|_| path.to_path_buf());
    let rendered = resolved.to_string_lossy();
    Uuid::new_v5(&DOCUMENT_NAMESPACE, rendered.as_bytes())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub path: PathBuf,
    pub page_count: usize,
}

impl DocumentInfo {
    pub fn for_path(path: &Path, page_count: usize) -> Self {
        Self {
            id: document_id_for_path(path),
            path: path.to_path_buf(),
            page_count,
        }
    }
}

/// What the rasterizer is asked to produce for one page surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterRequest {
    pub key: CacheKey,
    pub page_width: f64,
    pub page_height: f64,
    pub scale: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Turns a page into pixels. Lives outside the core; the core only keys and invalidates.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, request: &RasterRequest) -> Result<RenderImage>;
}

/// Loads a document from storage. The only async seam of the core.
#[async_trait::async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn open(&self, path: &Path) -> Result<(DocumentInfo, Document)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn document_id_is_stable_for_same_path() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("sample.folio.json");
        std::fs::write(&file_path, b"{}").unwrap();

        let first = document_id_for_path(&file_path);
        let second = document_id_for_path(&file_path);

        assert_eq!(first, second);
        assert_eq!(first.get_version_num(), 5);
    }

    #[test]
    fn different_paths_get_different_ids() {
        let dir = tempdir().unwrap();
        let a = document_id_for_path(&dir.path().join("a.json"));
        let b = document_id_for_path(&dir.path().join("b.json"));
        assert_ne!(a, b);
    }
}
