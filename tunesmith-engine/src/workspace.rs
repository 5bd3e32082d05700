use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tunesmith_core::types::{Attachment, SessionId};

use crate::synth::{MUSIC_FILE_NAME, RENDER_FILE_NAME};

/// Names the renderer writes to; attachments may not take them.
const RESERVED_NAMES: [&str; 2] = [MUSIC_FILE_NAME, RENDER_FILE_NAME];

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("attachment name has no usable file name: {0:?}")]
    InvalidName(String),

    #[error("attachment name {0:?} is reserved for the rendered music")]
    ReservedName(String),
}

fn io_err(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> WorkspaceError {
    let path = path.to_path_buf();
    move |source| WorkspaceError::Io {
        action,
        path,
        source,
    }
}

/// The session's uploads directory: attachments under their original names plus the
/// rendered `music.mid`. Nothing else writes here.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(io_err("create workspace", &root))?;
        Ok(Self { root })
    }

    /// A private subdirectory of `base` named after the session.
    pub fn for_session(base: &Path, id: &SessionId) -> Result<Self, WorkspaceError> {
        Self::open(base.join(id.to_string()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Writes an attachment under its original file name, replacing any earlier copy.
    ///
    /// Directory components in the name are dropped. The render artifact names are refused.
    pub fn persist(&self, attachment: &Attachment) -> Result<PathBuf, WorkspaceError> {
        let file_name = Path::new(&attachment.name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| WorkspaceError::InvalidName(attachment.name.clone()))?;
        if RESERVED_NAMES
            .iter()
            .any(|r| r.eq_ignore_ascii_case(file_name))
        {
            return Err(WorkspaceError::ReservedName(file_name.to_string()));
        }

        let path = self.path_for(file_name);
        fs::write(&path, &attachment.bytes).map_err(io_err("write attachment", &path))?;
        Ok(path)
    }

    /// Entries currently in the workspace, sorted by path.
    pub fn files(&self) -> Result<Vec<PathBuf>, WorkspaceError> {
        let entries = fs::read_dir(&self.root).map_err(io_err("list workspace", &self.root))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err("list workspace", &self.root))?;
            files.push(entry.path());
        }
        files.sort();
        Ok(files)
    }

    /// Deletes everything in the workspace and leaves the directory in place.
    /// Returns the number of entries removed.
    pub fn clear(&self) -> Result<usize, WorkspaceError> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(io_err("create workspace", &self.root))?;
            return Ok(0);
        }

        let files = self.files()?;
        for path in &files {
            if path.is_dir() {
                fs::remove_dir_all(path).map_err(io_err("remove directory", path))?;
            } else {
                fs::remove_file(path).map_err(io_err("remove file", path))?;
            }
        }
        Ok(files.len())
    }
}
