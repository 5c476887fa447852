use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{DocumentId, DocumentInfo, PageId};

/// Per-document view state that outlives a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedDocumentState {
    #[serde(default)]
    pub selected_page: Option<PageId>,
    pub scale: f64,
    #[serde(default)]
    pub dark_mode: bool,
}

impl Default for PersistedDocumentState {
    fn default() -> Self {
        Self {
            selected_page: None,
            scale: 1.0,
            dark_mode: false,
        }
    }
}

pub trait StateStore: Send + Sync {
    fn load(&self, doc: &DocumentInfo) -> Result<Option<PersistedDocumentState>>;
    /// Stores `state`. Default state is stored as absence.
    fn save(&self, doc: &DocumentInfo, state: &PersistedDocumentState) -> Result<()>;
}

/// One JSON file per document, named by its id. Files are only touched when the
/// state actually changes.
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create state directory at {:?}", root))?;
        Ok(Self { root })
    }

    fn state_path(&self, doc: &DocumentInfo) -> PathBuf {
        self.root.join(format!("{}.json", doc.id))
    }

    fn forget(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(?path, "state reset to defaults, file removed");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove state file {:?}", path)),
        }
    }
}

impl StateStore for FileStateStore {
    fn load(&self, doc: &DocumentInfo) -> Result<Option<PersistedDocumentState>> {
        let path = self.state_path(doc);
        let payload = match fs::read_to_string(&path) {
            Ok(payload) => payload,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read state file {:?}", path))
            }
        };
        serde_json::from_str(&payload)
            .map(Some)
            .with_context(|| format!("failed to decode state file {:?}", path))
    }

    fn save(&self, doc: &DocumentInfo, state: &PersistedDocumentState) -> Result<()> {
        let path = self.state_path(doc);
        if *state == PersistedDocumentState::default() {
            return self.forget(&path);
        }
        // An unreadable old file is simply overwritten.
        if matches!(self.load(doc), Ok(Some(ref stored)) if stored == state) {
            trace!(id = %doc.id, "state unchanged, skipping write");
            return Ok(());
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(state)?)
            .with_context(|| format!("failed to write temp state file {:?}", tmp))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move state file into place at {:?}", path))?;
        debug!(id = %doc.id, ?path, "view state saved");
        Ok(())
    }
}

/// In-process store for hosts without a state directory, and for tests.
#[derive(Default)]
pub struct MemoryStateStore {
    states: Mutex<HashMap<DocumentId, PersistedDocumentState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, doc: &DocumentInfo) -> Result<Option<PersistedDocumentState>> {
        Ok(self.states.lock().get(&doc.id).cloned())
    }

    fn save(&self, doc: &DocumentInfo, state: &PersistedDocumentState) -> Result<()> {
        let mut states = self.states.lock();
        if *state == PersistedDocumentState::default() {
            states.remove(&doc.id);
        } else {
            states.insert(doc.id, state.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;
    use uuid::Uuid;

    #[test]
    fn file_state_store_restores_state_with_stable_id() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("sample.folio.json");
        std::fs::write(&file_path, b"{}").unwrap();
        let info = DocumentInfo::for_path(&file_path, 3);

        let store = FileStateStore::new(dir.path().join("state")).unwrap();
        let state = PersistedDocumentState {
            selected_page: Some(Uuid::new_v4()),
            scale: 1.5,
            dark_mode: true,
        };
        store.save(&info, &state).unwrap();

        let reopened = DocumentInfo::for_path(&file_path, 3);
        let restored = store.load(&reopened).unwrap().unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn unknown_document_has_no_state() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().to_path_buf()).unwrap();
        let info = DocumentInfo::for_path(&dir.path().join("never-saved.json"), 1);
        assert!(store.load(&info).unwrap().is_none());
    }

    #[test]
    fn corrupt_state_file_reports_its_path() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().to_path_buf()).unwrap();
        let info = DocumentInfo::for_path(&dir.path().join("doc.json"), 1);
        std::fs::write(dir.path().join(format!("{}.json", info.id)), b"not json").unwrap();

        let err = store.load(&info).unwrap_err();
        assert!(format!("{err:#}").contains("failed to decode state file"));
    }

    #[test]
    fn memory_store_keeps_only_non_default_state() {
        let store = MemoryStateStore::new();
        let info = DocumentInfo::for_path(std::path::Path::new("/tmp/memory.json"), 2);
        assert!(store.load(&info).unwrap().is_none());

        let zoomed = PersistedDocumentState {
            scale: 2.0,
            ..PersistedDocumentState::default()
        };
        store.save(&info, &zoomed).unwrap();
        assert_eq!(store.load(&info).unwrap(), Some(zoomed));

        store.save(&info, &PersistedDocumentState::default()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn resetting_to_defaults_removes_the_state_file() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().to_path_buf()).unwrap();
        let info = DocumentInfo::for_path(&dir.path().join("doc.json"), 1);
        let file = dir.path().join(format!("{}.json", info.id));

        let dark = PersistedDocumentState {
            dark_mode: true,
            ..PersistedDocumentState::default()
        };
        store.save(&info, &dark).unwrap();
        assert!(file.exists());

        store.save(&info, &PersistedDocumentState::default()).unwrap();
        assert!(!file.exists());
        assert!(store.load(&info).unwrap().is_none());
        // Nothing to remove the second time.
        store.save(&info, &PersistedDocumentState::default()).unwrap();
    }

    #[test]
    fn corrupt_state_file_is_replaced_on_save() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().to_path_buf()).unwrap();
        let info = DocumentInfo::for_path(&dir.path().join("doc.json"), 1);
        std::fs::write(dir.path().join(format!("{}.json", info.id)), b"{").unwrap();

        let state = PersistedDocumentState {
            scale: 0.5,
            ..PersistedDocumentState::default()
        };
        store.save(&info, &state).unwrap();
        assert_eq!(store.load(&info).unwrap(), Some(state));
    }
}
