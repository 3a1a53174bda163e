//! Scoped staging of downloaded media.
//!
//! [`StagingArea::acquire`] opens a private temp directory wrapped in a
//! [`StagedMedia`] guard. Everything staged through the guard lives in that
//! directory and is deleted when the guard drops, whichever way the owning
//! operation exits.

use std::path::{Path, PathBuf};

use {
    tempfile::TempDir,
    tracing::{debug, warn},
};

use crate::{
    error::{Error, Result},
    image_ops,
};

/// Parent location for staging directories.
#[derive(Debug, Clone, Default)]
pub struct StagingArea {
    root: Option<PathBuf>,
}

impl StagingArea {
    /// Stage under `root`, or the system temp dir when `None`.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Open a new scoped acquisition.
    pub fn acquire(&self, label: &str) -> Result<StagedMedia> {
        let mut builder = tempfile::Builder::new();
        let prefix = format!("postwatch-{label}-");
        builder.prefix(&prefix);

        let dir = match &self.root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| {
                    Error::staging(format!("create staging root {}", root.display()), e)
                })?;
                builder.tempdir_in(root)
            },
            None => builder.tempdir(),
        }
        .map_err(|e| Error::staging("create staging directory", e))?;

        debug!(dir = %dir.path().display(), "acquired media staging directory");
        Ok(StagedMedia {
            dir: Some(dir),
            files: Vec::new(),
        })
    }
}

/// One file written into a [`StagedMedia`] directory.
#[derive(Debug, Clone)]
pub struct StagedFile {
    path: PathBuf,
    file_name: String,
    len: usize,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the staged bytes back for upload.
    pub async fn read(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::staging(format!("read {}", self.path.display()), e))
    }
}

/// Guard over a staging directory. Dropping it removes the directory.
#[derive(Debug)]
pub struct StagedMedia {
    dir: Option<TempDir>,
    files: Vec<StagedFile>,
}

impl StagedMedia {
    /// Directory holding the staged files, `None` once released.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write `bytes` as the next file, named by position and sniffed format.
    pub async fn stage(&mut self, bytes: &[u8]) -> Result<&StagedFile> {
        if bytes.is_empty() {
            return Err(Error::Empty);
        }
        let Some(dir) = self.dir.as_ref() else {
            return Err(Error::staging(
                "stage media",
                std::io::Error::other("staging directory already released"),
            ));
        };

        let file_name = format!(
            "{:02}.{}",
            self.files.len(),
            image_ops::extension_for(bytes)
        );
        let path = dir.path().join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Error::staging(format!("write {}", path.display()), e))?;

        debug!(
            file = %file_name,
            bytes = bytes.len(),
            media_type = image_ops::media_type_for(bytes),
            "staged media"
        );
        self.files.push(StagedFile {
            path,
            file_name,
            len: bytes.len(),
        });
        let last = self.files.len() - 1;
        Ok(&self.files[last])
    }
}

impl Drop for StagedMedia {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => debug!(
                dir = %path.display(),
                files = self.files.len(),
                "released staged media"
            ),
            Err(e) => warn!(dir = %path.display(), error = %e, "failed to remove staged media"),
        }
    }
}
