//! Single-slot holder of the current artifact.
//!
//! Readers clone an `Arc` and keep working on that snapshot; a replacement
//! swaps the pointer under a short write lock, so nobody observes a
//! half-built artifact.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::ArtifactResult;
use crate::models::Artifact;

#[derive(Debug, Default)]
pub struct ArtifactStore {
    current: RwLock<Option<Arc<Artifact>>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with an artifact loaded from disk.
    pub fn from_file(path: &Path) -> ArtifactResult<Self> {
        let store = Self::new();
        store.load_file(path)?;
        Ok(store)
    }

    /// Snapshot of the current artifact.
    pub fn current(&self) -> Option<Arc<Artifact>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Publish `artifact`, returning the one it replaced.
    pub fn replace(&self, artifact: Artifact) -> Option<Arc<Artifact>> {
        self.publish(Arc::new(artifact))
    }

    /// Publish an already shared artifact, returning the one it replaced.
    pub fn publish(&self, next: Arc<Artifact>) -> Option<Arc<Artifact>> {
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        slot.replace(next)
    }

    /// Load and publish a saved artifact.
    pub fn load_file(&self, path: &Path) -> ArtifactResult<Arc<Artifact>> {
        let artifact = Arc::new(Artifact::load(path)?);
        tracing::info!(
            path = %path.display(),
            records = artifact.data.len(),
            "Loaded artifact"
        );
        self.publish(Arc::clone(&artifact));
        Ok(artifact)
    }
}
