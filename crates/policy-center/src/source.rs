//! External configuration sources and their change stamps.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::errors::PolicyError;

/// Cheap fingerprint of a source's content, compared between reload checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceStamp {
    Modified {
        len: u64,
        modified: Option<SystemTime>,
    },
    Revision(u64),
}

pub trait ConfigSource: Send + Sync + fmt::Debug {
    /// Human readable location, used in logs and error messages.
    fn describe(&self) -> String;

    /// Current stamp of the source. Must not read the full content.
    fn stamp(&self) -> Result<SourceStamp, PolicyError>;

    fn read(&self) -> Result<String, PolicyError>;
}

#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn map_io(&self, err: std::io::Error) -> PolicyError {
        match err.kind() {
            ErrorKind::NotFound => PolicyError::SourceUnavailable(self.path.display().to_string()),
            _ => PolicyError::Io(format!("{}: {}", self.path.display(), err)),
        }
    }
}

impl ConfigSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn stamp(&self) -> Result<SourceStamp, PolicyError> {
        let metadata = fs::metadata(&self.path).map_err(|err| self.map_io(err))?;
        if !metadata.is_file() {
            return Err(PolicyError::SourceUnavailable(format!(
                "{} is not a regular file",
                self.path.display()
            )));
        }
        Ok(SourceStamp::Modified {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }

    fn read(&self) -> Result<String, PolicyError> {
        fs::read_to_string(&self.path).map_err(|err| self.map_io(err))
    }
}

#[derive(Debug)]
struct InMemoryState {
    content: Option<String>,
    revision: u64,
}

/// Source held in memory; each `replace` bumps the revision.
#[derive(Debug)]
pub struct InMemorySource {
    name: String,
    state: Mutex<InMemoryState>,
}

impl InMemorySource {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(InMemoryState {
                content: Some(content.into()),
                revision: 1,
            }),
        }
    }

    pub fn replace(&self, content: impl Into<String>) {
        let mut state = self.state.lock();
        state.content = Some(content.into());
        state.revision += 1;
    }

    /// Simulates a source that cannot be reached until the next `replace`.
    pub fn make_unavailable(&self) {
        let mut state = self.state.lock();
        state.content = None;
        state.revision += 1;
    }

    pub fn revision(&self) -> u64 {
        self.state.lock().revision
    }
}

impl ConfigSource for InMemorySource {
    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }

    fn stamp(&self) -> Result<SourceStamp, PolicyError> {
        let state = self.state.lock();
        match state.content {
            Some(_) => Ok(SourceStamp::Revision(state.revision)),
            None => Err(PolicyError::SourceUnavailable(self.describe())),
        }
    }

    fn read(&self) -> Result<String, PolicyError> {
        self.state
            .lock()
            .content
            .clone()
            .ok_or_else(|| PolicyError::SourceUnavailable(self.describe()))
    }
}
