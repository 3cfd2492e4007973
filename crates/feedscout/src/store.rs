use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write signature store {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode signature store: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    seen: Vec<String>,
}

/// Signatures of items that were already opened, in insertion order.
///
/// Membership is a hash lookup; the ring keeps insertion order so the store
/// can drop its oldest entries once it holds twice `max_size` signatures.
#[derive(Debug)]
pub struct ProcessedSignatureStore {
    path: Option<PathBuf>,
    max_size: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl ProcessedSignatureStore {
    pub fn in_memory(max_size: usize) -> Self {
        Self {
            path: None,
            max_size: max_size.max(1),
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    /// Opens the store at `path`. A missing or unreadable file yields an
    /// empty store.
    pub fn load(path: impl Into<PathBuf>, max_size: usize) -> Self {
        let path = path.into();
        let mut store = Self::in_memory(max_size);
        match read_signatures(&path) {
            Ok(Some(seen)) => {
                for signature in seen {
                    store.mark(&signature);
                }
                log::info!(
                    "loaded {} processed signatures from {}",
                    store.len(),
                    path.display()
                );
            }
            Ok(None) => log::debug!("no signature store at {}", path.display()),
            Err(err) => log::warn!(
                "ignoring unreadable signature store {}: {err}",
                path.display()
            ),
        }
        store.path = Some(path);
        store
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn seen(&self, signature: &str) -> bool {
        !signature.is_empty() && self.members.contains(signature)
    }

    pub fn mark(&mut self, signature: &str) {
        let signature = signature.trim();
        if signature.is_empty() || self.members.contains(signature) {
            return;
        }
        self.members.insert(signature.to_string());
        self.order.push_back(signature.to_string());
        if self.order.len() > self.max_size * 2 {
            while self.order.len() > self.max_size {
                if let Some(oldest) = self.order.pop_front() {
                    self.members.remove(&oldest);
                }
            }
        }
    }

    /// Rewrites the file with the newest `max_size` signatures.
    pub fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let skip = self.order.len().saturating_sub(self.max_size);
        let file = StoreFile {
            seen: self.order.iter().skip(skip).cloned().collect(),
        };
        let encoded = serde_json::to_vec_pretty(&file)?;
        fs::write(path, encoded).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })
    }

    /// Like [`persist`](Self::persist), but failures are only logged.
    pub fn save(&self) {
        if let Err(err) = self.persist() {
            log::warn!("signature store not saved: {err}");
        }
    }
}

fn read_signatures(path: &Path) -> Result<Option<Vec<String>>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    let file: StoreFile = serde_json::from_str(&contents)?;
    Ok(Some(file.seen))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_signature_is_never_seen() {
        let mut store = ProcessedSignatureStore::in_memory(10);
        store.mark("");
        assert!(!store.seen(""));
        assert!(store.is_empty());
    }

    #[test]
    fn growth_is_trimmed_to_newest_entries() {
        let mut store = ProcessedSignatureStore::in_memory(3);
        for i in 0..6 {
            store.mark(&format!("sig{i}"));
        }
        assert_eq!(store.len(), 6);
        store.mark("sig6");
        assert_eq!(store.len(), 3);
        assert!(!store.seen("sig3"));
        assert!(store.seen("sig4") && store.seen("sig5") && store.seen("sig6"));
    }

    #[test]
    fn duplicate_marks_keep_one_entry() {
        let mut store = ProcessedSignatureStore::in_memory(3);
        store.mark("a");
        store.mark("a");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn marked_signature_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("processed.json");
        let mut store = ProcessedSignatureStore::load(&path, 100);
        store.mark("deadbeef");
        store.persist().unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["seen"], serde_json::json!(["deadbeef"]));

        let reloaded = ProcessedSignatureStore::load(&path, 100);
        assert!(reloaded.seen("deadbeef"));
    }

    #[test]
    fn saved_file_keeps_only_max_size_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.json");
        let mut store = ProcessedSignatureStore::load(&path, 2);
        for sig in ["a", "b", "c", "d"] {
            store.mark(sig);
        }
        store.save();
        let reloaded = ProcessedSignatureStore::load(&path, 2);
        assert!(!reloaded.seen("a") && !reloaded.seen("b"));
        assert!(reloaded.seen("c") && reloaded.seen("d"));
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.json");
        fs::write(&path, "{not json").unwrap();
        let store = ProcessedSignatureStore::load(&path, 10);
        assert!(store.is_empty());
        assert_eq!(store.path(), Some(path.as_path()));
    }
}
