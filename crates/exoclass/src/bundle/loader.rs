//! Lazy, fail-soft, load-once bundle access.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use super::Bundle;
use crate::error::LoadError;

/// Where bundle bytes come from.
pub trait BundleSource: Send + Sync {
    /// Location reported in health output and error messages.
    fn path(&self) -> &Path;

    /// Read the complete bundle document.
    fn read(&self) -> io::Result<Vec<u8>>;
}

/// Bundle stored in a file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BundleSource for FileSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}

/// Observable loader state, without forcing a load.
#[derive(Debug, Clone)]
pub enum LoadState {
    NotLoaded,
    Loaded,
    Failed(LoadError),
}

/// Loads the bundle on first use and caches the outcome, success or
/// failure, for the life of the process.
pub struct BundleLoader {
    source: Box<dyn BundleSource>,
    cell: OnceLock<Result<Arc<Bundle>, LoadError>>,
}

impl fmt::Debug for BundleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleLoader")
            .field("path", &self.path())
            .field("state", &self.state())
            .finish()
    }
}

impl BundleLoader {
    pub fn new(source: impl BundleSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cell: OnceLock::new(),
        }
    }

    /// Loader around a bundle that is already in memory. `path` is only
    /// reported; nothing is read.
    pub fn preloaded(path: impl Into<PathBuf>, bundle: Bundle) -> Self {
        Self {
            source: Box::new(FileSource::new(path)),
            cell: OnceLock::from(Ok(Arc::new(bundle))),
        }
    }

    /// Loader reading from a file path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(FileSource::new(path))
    }

    pub fn path(&self) -> &Path {
        self.source.path()
    }

    /// The bundle, loading it if this is the first call.
    ///
    /// Concurrent first callers block on a single load. A failed load is
    /// returned again on every call; there is no retry.
    pub fn get(&self) -> Result<Arc<Bundle>, LoadError> {
        self.cell.get_or_init(|| self.load()).clone()
    }

    /// Whether a bundle is cached. Never triggers a load.
    pub fn is_loaded(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }

    pub fn state(&self) -> LoadState {
        match self.cell.get() {
            None => LoadState::NotLoaded,
            Some(Ok(_)) => LoadState::Loaded,
            Some(Err(err)) => LoadState::Failed(err.clone()),
        }
    }

    fn load(&self) -> Result<Arc<Bundle>, LoadError> {
        let path = self.source.path();
        tracing::info!(path = %path.display(), "loading pipeline bundle");
        let started = Instant::now();

        let result = self
            .source
            .read()
            .map_err(|err| LoadError::new(path, err))
            .and_then(|bytes| Bundle::from_slice(&bytes).map_err(|err| LoadError::new(path, err)));

        match result {
            Ok(bundle) => {
                tracing::info!(
                    path = %path.display(),
                    n_features = bundle.n_features(),
                    classes = ?bundle.class_labels(),
                    probabilistic = bundle.is_probabilistic(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "pipeline bundle loaded"
                );
                Ok(Arc::new(bundle))
            }
            Err(err) => {
                tracing::error!(error = %err, "pipeline bundle unavailable");
                Err(err)
            }
        }
    }
}
