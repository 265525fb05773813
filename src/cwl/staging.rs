// src/cwl/staging.rs
//
// =============================================================================
// CTAPROD: FAKE FILE STAGER
// =============================================================================
//
// Command-line binding stats every File input. At submission time the real
// data lives on the grid, so zero-byte placeholders are created at each
// File's location for the duration of one synthesis call.
//
// Rules:
// 1. Locations map under the staging root: a leading '/' or 'file://' is
//    stripped, '..' is rejected.
// 2. `StagedFiles` removes exactly what it created, on release or on drop.
// 3. A file that already exists is used as-is and never removed.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::StagingError;

// ============================================================================
// 1. STAGER
// ============================================================================

#[derive(Debug, Clone)]
pub struct FakeFileStager {
    root: PathBuf,
}

impl FakeFileStager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the placeholder for `location` lives on disk.
    pub fn staged_path(&self, location: &str) -> Result<PathBuf, StagingError> {
        let trimmed = location.strip_prefix("file://").unwrap_or(location);
        let relative = Path::new(trimmed.trim_start_matches('/'));

        if relative.as_os_str().is_empty() {
            return Err(StagingError::InvalidLocation {
                location: location.to_string(),
                reason: "empty location",
            });
        }
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(StagingError::InvalidLocation {
                location: location.to_string(),
                reason: "'..' is not allowed",
            });
        }

        Ok(self.root.join(relative))
    }

    /// Creates parent directories and an empty file at `location`.
    /// An existing file is left untouched.
    pub fn stage(&self, location: &str) -> Result<PathBuf, StagingError> {
        let path = self.staged_path(location)?;
        let io_err = |source| StagingError::Io {
            location: location.to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;
        Ok(path)
    }

    /// Removes the placeholder at `location`.
    pub fn unstage(&self, location: &str) -> Result<(), StagingError> {
        let path = self.staged_path(location)?;
        fs::remove_file(&path).map_err(|source| StagingError::Io {
            location: location.to_string(),
            source,
        })
    }

    /// Stages every location and returns a guard that undoes it.
    /// On failure, whatever was already staged is removed again.
    pub fn stage_all<'a, I>(&'a self, locations: I) -> Result<StagedFiles<'a>, StagingError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut guard = StagedFiles {
            stager: self,
            created_files: Vec::new(),
            created_dirs: Vec::new(),
            released: false,
        };

        for location in locations {
            let location = location.as_ref();
            if guard.created_files.iter().any(|(l, _)| l == location) {
                continue;
            }

            let path = self.staged_path(location)?;
            if path.exists() {
                log::debug!("Input {} already present, not staging", path.display());
                continue;
            }

            guard.created_dirs.extend(missing_ancestors(&path));
            self.stage(location)?;
            log::debug!("Staged placeholder {}", path.display());
            guard.created_files.push((location.to_string(), path));
        }

        Ok(guard)
    }
}

/// Ancestors of `path` that do not exist yet, deepest first.
fn missing_ancestors(path: &Path) -> Vec<PathBuf> {
    path.ancestors()
        .skip(1)
        .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
        .map(Path::to_path_buf)
        .collect()
}

// ============================================================================
// 2. SCOPED GUARD
// ============================================================================

/// Placeholders created by one `stage_all` call.
pub struct StagedFiles<'a> {
    stager: &'a FakeFileStager,
    created_files: Vec<(String, PathBuf)>,
    created_dirs: Vec<PathBuf>,
    released: bool,
}

impl StagedFiles<'_> {
    /// Paths of the placeholders this guard created.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.created_files.iter().map(|(_, p)| p.as_path())
    }

    pub fn len(&self) -> usize {
        self.created_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.created_files.is_empty()
    }

    /// Removes the placeholders, reporting the first failure.
    pub fn release(mut self) -> Result<(), StagingError> {
        self.released = true;
        self.cleanup()
    }

    fn cleanup(&mut self) -> Result<(), StagingError> {
        let mut first_err = None;

        for (location, _) in self.created_files.drain(..) {
            if let Err(e) = self.stager.unstage(&location) {
                let already_gone = matches!(
                    &e,
                    StagingError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound
                );
                if !already_gone && first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }

        // Children before parents, across all staged files.
        self.created_dirs
            .sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in self.created_dirs.drain(..) {
            if let Err(e) = fs::remove_dir(&dir) {
                log::debug!("Leaving staging dir {}: {}", dir.display(), e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for StagedFiles<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.cleanup() {
            log::warn!("Failed to remove staged placeholder: {}", e);
        }
    }
}
