// src/engine/mod.rs

//! Container engine interface
//!
//! The packager talks to the container engine only through
//! [`ContainerEngine`]. Every call blocks; calls that produce a stream return
//! a forward-only iterator that fetches one record per `next()`, so callers
//! observe records strictly in arrival order and nothing is read ahead.

mod docker;
mod progress;

pub use docker::{DockerConfig, DockerEngine, DEFAULT_TIMEOUT_SECS};
pub use progress::{Progress, ProgressRecord};

use crate::error::Result;
use std::path::Path;

/// Lazy, single-pass sequence of records from the engine
pub type RecordStream<'a, T> = Box<dyn Iterator<Item = Result<T>> + 'a>;

/// Kind of a filesystem change in a container diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Modified,
    Added,
    Deleted,
}

impl ChangeKind {
    /// Map the engine's numeric change code
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(ChangeKind::Modified),
            1 => Some(ChangeKind::Added),
            2 => Some(ChangeKind::Deleted),
            _ => None,
        }
    }
}

/// One entry of a container's filesystem diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    /// Absolute path inside the container
    pub path: String,
    pub kind: Option<ChangeKind>,
}

impl DiffEntry {
    pub fn new(path: impl Into<String>, kind: Option<ChangeKind>) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// An image known to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub id: String,
    pub tags: Vec<String>,
}

/// Operations the packager needs from a container engine
pub trait ContainerEngine {
    /// Build an image from a context directory, tagging it `tag`
    ///
    /// The image is only guaranteed to exist once the returned stream has
    /// been drained.
    fn build_image(&self, context: &Path, tag: &str) -> Result<RecordStream<'_, ProgressRecord>>;

    /// Images matching an exact reference
    fn list_images(&self, reference: &str) -> Result<Vec<ImageRef>>;

    /// Create a container from an image, returning the container id
    fn create_container(&self, image_id: &str) -> Result<String>;

    fn start_container(&self, container_id: &str) -> Result<()>;

    /// Follow the container's output until it exits
    fn logs(&self, container_id: &str) -> Result<RecordStream<'_, String>>;

    /// Filesystem changes of the container relative to its image
    fn diff(&self, container_id: &str) -> Result<Vec<DiffEntry>>;

    /// Copy a single file out of the container
    ///
    /// Returns the raw transport payload: a tar stream wrapping the file.
    fn copy_out(&self, container_id: &str, path: &str) -> Result<Vec<u8>>;
}
