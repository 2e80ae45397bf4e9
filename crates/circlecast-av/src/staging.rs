//! Staged temporary files for a single conversion request.
//!
//! A [`StagingStore`] hands out [`StagedFile`]s: uniquely named files inside a
//! staging directory, each owned by exactly one pipeline run. A staged file is
//! deleted by [`StagedFile::release`] or, failing that, when it is dropped, so
//! early returns, panics and cancelled tasks cannot leak it. Files orphaned
//! by a killed process are removed later by [`StagingStore::sweep`].

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempPath;

/// Every staged file name starts with this.
const NAME_PREFIX: &str = "circlecast-";

/// What a staged file is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The downloaded source video.
    Input,
    /// The transcoder's product.
    Output,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Input => "input",
            Role::Output => "output",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allocates staged files inside one directory.
///
/// Names are random and created with exclusive-create semantics, so
/// concurrent requests never collide and no locking is needed.
#[derive(Debug, Clone)]
pub struct StagingStore {
    root: PathBuf,
}

impl StagingStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> circlecast_core::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The staging directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Delete staged files left behind by a process that did not exit
    /// cleanly.
    ///
    /// The directory may be shared with other circlecast processes, so only
    /// files last modified at least `older_than` ago are removed.
    pub fn sweep(&self, older_than: Duration) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return 0;
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(NAME_PREFIX) {
                continue;
            }
            // A clock skewed into the future counts as fresh.
            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.elapsed().ok());
            if !age.is_some_and(|age| age >= older_than) {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("failed to remove stale {:?}: {e}", entry.path()),
            }
        }
        removed
    }

    /// Allocate a fresh, empty file for `role`.
    pub fn acquire(&self, role: Role) -> circlecast_core::Result<StagedFile> {
        let path = tempfile::Builder::new()
            .prefix(&format!("{NAME_PREFIX}{role}-"))
            .suffix(".mp4")
            .tempfile_in(&self.root)?
            .into_temp_path();

        tracing::trace!("staged {role} file {}", path.display());

        Ok(StagedFile {
            role,
            path: path.to_path_buf(),
            guard: Some(path),
        })
    }
}

/// An exclusively owned temporary file.
pub struct StagedFile {
    role: Role,
    path: PathBuf,
    /// Deletes the file on drop; `None` once released.
    guard: Option<TempPath>,
}

impl StagedFile {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether [`release`](Self::release) has already run.
    pub fn is_released(&self) -> bool {
        self.guard.is_none()
    }

    /// Delete the backing file.
    ///
    /// Idempotent and infallible: a file that is already gone counts as
    /// released, any other failure is logged and swallowed.
    pub fn release(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        match guard.close() {
            Ok(()) => tracing::trace!("released {} file {}", self.role, self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "failed to release {} file {}: {e}",
                self.role,
                self.path.display()
            ),
        }
    }

    /// Size of the backing file, or `None` if it does not exist.
    pub async fn size(&self) -> Option<u64> {
        tokio::fs::metadata(&self.path).await.ok().map(|m| m.len())
    }
}

impl fmt::Debug for StagedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedFile")
            .field("role", &self.role)
            .field("path", &self.path)
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.release();
    }
}
