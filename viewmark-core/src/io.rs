//! # Bookmark documents
//!
//! Saved views persist as one pretty-printed JSON document per project:
//!
//! ```json
//! { "version": 1, "next_id": 4, "next_view_number": 4, "views": [ ... ] }
//! ```
//!
//! `next_id` and `next_view_number` are the high-water marks of the id allocator and the auto-name counter,
//! kept so neither is ever reissued after a delete.

use std::path::Path;

use crate::id::ViewId;
use crate::store::{SavedView, SavedViewStore};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StoreDocument {
    pub version: u32,
    #[serde(default)]
    pub next_id: u64,
    #[serde(default = "default_next_view_number")]
    pub next_view_number: u64,
    #[serde(default)]
    pub views: Vec<SavedView>,
}
impl StoreDocument {
    pub const CURRENT_VERSION: u32 = 1;
}
impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            next_id: 1,
            next_view_number: default_next_view_number(),
            views: Vec::new(),
        }
    }
}

fn default_next_view_number() -> u64 {
    1
}

#[derive(thiserror::Error, Debug)]
pub enum DocumentError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported document version {0}")]
    UnsupportedVersion(u32),
    #[error("{0} appears more than once")]
    DuplicateId(ViewId),
    #[error("id {0} leaves no room for new views")]
    IdSpaceExhausted(u64),
}

/// Parse a document, without validating its contents.
/// # Errors
/// Forwards IO errors, or the document isn't valid JSON of the right shape.
pub fn read_path(path: impl AsRef<Path>) -> Result<StoreDocument, DocumentError> {
    let file = std::io::BufReader::new(std::fs::File::open(path)?);
    Ok(serde_json::from_reader(file)?)
}

/// Write a document. The previous file at `path`, if any, is replaced only once the new one is completely
/// written.
/// # Errors
/// Forwards IO errors.
pub fn write_path(path: impl AsRef<Path>, document: &StoreDocument) -> Result<(), DocumentError> {
    use std::io::Write;
    let path = path.as_ref();
    let partial = path.with_extension("json.partial");
    {
        let mut file = std::io::BufWriter::new(std::fs::File::create(&partial)?);
        serde_json::to_writer_pretty(&mut file, document)?;
        file.write_all(b"\n")?;
        file.flush()?;
    }
    std::fs::rename(&partial, path)?;
    Ok(())
}

/// Read and validate a document into a store.
/// # Errors
/// See [`read_path`] and [`SavedViewStore::from_document`].
pub fn load(path: impl AsRef<Path>) -> Result<SavedViewStore, DocumentError> {
    SavedViewStore::from_document(read_path(path)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::snapshot::RememberMask;
    use crate::test_support::sample_snapshot;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("viewmark-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn write_then_load() {
        let mut store = SavedViewStore::default();
        let a = store
            .create_from(&sample_snapshot(), RememberMask::PERSPECTIVE, Some("Top"))
            .unwrap();
        store
            .create_from(&sample_snapshot(), RememberMask::all(), None)
            .unwrap();
        store.delete(a).unwrap();

        let path = temp_path("write_then_load");
        write_path(&path, &store.to_document()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains(r#""version": 1"#));
        assert!(text.contains(r#""mask": "PERSPECTIVE | SHADING | OVERLAYS | COMPOSITION""#));

        let loaded = load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded.to_document(), store.to_document());
    }
    #[test]
    fn minimal_document() {
        let doc: StoreDocument = serde_json::from_str(r#"{ "version": 1 }"#).unwrap();
        assert_eq!(doc.next_view_number, 1);
        let store = SavedViewStore::from_document(doc).unwrap();
        assert!(store.is_empty());
    }
    #[test]
    fn missing_file() {
        assert!(matches!(
            read_path(temp_path("does-not-exist")),
            Err(DocumentError::Io(_))
        ));
    }
    #[test]
    fn malformed_file() {
        let path = temp_path("malformed");
        std::fs::write(&path, "{ not json").unwrap();
        let result = read_path(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(DocumentError::Json(_))));
    }
}
