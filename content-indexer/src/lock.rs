use crate::error::IndexerError;
use crate::error::Result;
use corpus_model::VersionId;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use tracing::debug;

/// Versions with a build in flight in this process.
#[derive(Debug, Default)]
pub struct InFlightBuilds {
    versions: Mutex<HashSet<VersionId>>,
}

impl InFlightBuilds {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claims `version`, failing with [`IndexerError::VersionLocked`] when
    /// it is already claimed. The claim ends when the guard drops.
    pub fn acquire(self: &Arc<Self>, version: &VersionId) -> Result<BuildGuard> {
        if !self.lock().insert(version.clone()) {
            return Err(IndexerError::VersionLocked(version.clone()));
        }
        debug!("Acquired build lock for {version}");
        Ok(BuildGuard {
            registry: Arc::clone(self),
            version: version.clone(),
        })
    }

    pub fn is_locked(&self, version: &VersionId) -> bool {
        self.lock().contains(version)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, version: &VersionId) {
        self.lock().remove(version);
        debug!("Released build lock for {version}");
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<VersionId>> {
        match self.versions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Holds one version's build claim.
#[derive(Debug)]
pub struct BuildGuard {
    registry: Arc<InFlightBuilds>,
    version: VersionId,
}

impl BuildGuard {
    pub fn version(&self) -> &VersionId {
        &self.version
    }
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        self.registry.release(&self.version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn second_claim_is_rejected_until_release() {
        let builds = InFlightBuilds::new();
        let v1 = VersionId::from("v1");

        let guard = builds.acquire(&v1).unwrap();
        assert_matches!(builds.acquire(&v1), Err(IndexerError::VersionLocked(v)) if v == v1);
        assert!(builds.is_locked(&v1));

        drop(guard);
        assert!(!builds.is_locked(&v1));
        assert!(builds.acquire(&v1).is_ok());
    }

    #[test]
    fn different_versions_do_not_contend() {
        let builds = InFlightBuilds::new();
        let _a = builds.acquire(&VersionId::from("a")).unwrap();
        let _b = builds.acquire(&VersionId::from("b")).unwrap();
        assert_eq!(builds.len(), 2);
    }

    #[test]
    fn release_runs_on_panic() {
        let builds = InFlightBuilds::new();
        let version = VersionId::from("v");
        let shared = Arc::clone(&builds);
        let claimed = version.clone();
        let result = std::thread::spawn(move || {
            let _guard = shared.acquire(&claimed).unwrap();
            panic!("build blew up");
        })
        .join();
        assert!(result.is_err());
        assert!(!builds.is_locked(&version));
    }
}
