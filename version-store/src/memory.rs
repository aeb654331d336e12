use crate::FileEntry;
use crate::Result;
use crate::VersionStore;
use crate::VersionStoreError;
use crate::VersionedFile;
use crate::path_matches;
use async_trait::async_trait;
use corpus_model::VersionId;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

/// Snapshots held in memory. Every snapshot is also addressable by its own
/// version id; named references can be added with [`set_ref`].
///
/// [`set_ref`]: InMemoryVersionStore::set_ref
#[derive(Default)]
pub struct InMemoryVersionStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    refs: HashMap<String, VersionId>,
    snapshots: HashMap<VersionId, BTreeMap<String, Vec<u8>>>,
}

impl InMemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a frozen snapshot. Re-adding an existing version replaces nothing.
    pub fn add_snapshot<I, P, B>(&self, version: impl Into<VersionId>, files: I)
    where
        I: IntoIterator<Item = (P, B)>,
        P: Into<String>,
        B: Into<Vec<u8>>,
    {
        let version = version.into();
        let files = files
            .into_iter()
            .map(|(path, bytes)| (path.into(), bytes.into()))
            .collect();
        self.write().snapshots.entry(version).or_insert(files);
    }

    pub fn set_ref(&self, name: impl Into<String>, version: impl Into<VersionId>) {
        self.write().refs.insert(name.into(), version.into());
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl VersionStore for InMemoryVersionStore {
    async fn resolve_version(&self, reference: &str) -> Result<Option<VersionId>> {
        let inner = self.read();
        if let Some(version) = inner.refs.get(reference) {
            return Ok(Some(version.clone()));
        }
        let direct = VersionId::from(reference);
        Ok(inner.snapshots.contains_key(&direct).then_some(direct))
    }

    async fn list_files(&self, version: &VersionId, pattern: &str) -> Result<Vec<VersionedFile>> {
        let inner = self.read();
        let snapshot = inner
            .snapshots
            .get(version)
            .ok_or_else(|| VersionStoreError::UnknownVersion(version.to_string()))?;
        Ok(snapshot
            .iter()
            .filter(|(path, _)| path_matches(pattern, path))
            .map(|(path, bytes)| VersionedFile {
                path: path.clone(),
                bytes: bytes.clone(),
            })
            .collect())
    }

    async fn read_file(&self, version: &VersionId, path: &str) -> Result<Option<Vec<u8>>> {
        let inner = self.read();
        let snapshot = inner
            .snapshots
            .get(version)
            .ok_or_else(|| VersionStoreError::UnknownVersion(version.to_string()))?;
        Ok(snapshot.get(path).cloned())
    }

    async fn list_entries(&self, version: &VersionId, pattern: &str) -> Result<Vec<FileEntry>> {
        let inner = self.read();
        let snapshot = inner
            .snapshots
            .get(version)
            .ok_or_else(|| VersionStoreError::UnknownVersion(version.to_string()))?;
        Ok(snapshot
            .iter()
            .filter(|(path, _)| path_matches(pattern, path))
            .map(|(path, bytes)| FileEntry {
                path: path.clone(),
                size: bytes.len() as u64,
            })
            .collect())
    }
}
