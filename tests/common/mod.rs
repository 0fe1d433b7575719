// tests/common/mod.rs

//! Shared test utilities: an in-memory container engine and recipe fixtures.

#![allow(dead_code)]

use docker_rpmbuild::engine::{
    ContainerEngine, DiffEntry, ImageRef, ProgressRecord, RecordStream,
};
use docker_rpmbuild::{Error, RecipeDescriptor, RecipeOptions, Result};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// What the engine saw of the build context when the build was submitted
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    pub path: PathBuf,
    pub dockerfile: String,
    pub files: Vec<String>,
}

/// Scripted container engine that records every call
#[derive(Default)]
pub struct MockEngine {
    pub progress: Vec<ProgressRecord>,
    pub images: Vec<ImageRef>,
    pub logs: Vec<String>,
    pub diff: Vec<DiffEntry>,
    /// In-container path -> file content served by `copy_out`
    pub files: HashMap<String, Vec<u8>>,
    /// Fail `create_container` with a transport error
    pub fail_create: bool,

    pub calls: RefCell<Vec<String>>,
    pub progress_pulled: Cell<usize>,
    pub snapshot: RefCell<Option<ContextSnapshot>>,
}

impl MockEngine {
    /// Engine that builds `tag` successfully and leaves `rpms` in the diff
    pub fn successful(tag: &str, rpms: &[(&str, &[u8])]) -> Self {
        let mut engine = MockEngine {
            progress: vec![
                ProgressRecord::stream("Step 1/9 : FROM centos:7\n"),
                ProgressRecord::stream("Successfully built 0123456789ab\n"),
            ],
            images: vec![ImageRef {
                id: "sha256:0123456789ab".to_string(),
                tags: vec![format!("{}:latest", tag)],
            }],
            logs: vec![
                "Executing(%prep): /bin/sh -e /var/tmp/rpm-tmp.1\n".to_string(),
                "Wrote: /rpmbuild/build/RPMS/x86_64/foo.rpm\n\n".to_string(),
            ],
            ..Default::default()
        };

        engine.diff.push(DiffEntry::new("/rpmbuild/build", None));
        for (path, content) in rpms {
            engine.diff.push(DiffEntry::new(*path, None));
            engine.files.insert(path.to_string(), content.to_vec());
        }
        engine
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls.borrow().iter().any(|c| c.starts_with(name))
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl ContainerEngine for MockEngine {
    fn build_image(&self, context: &Path, tag: &str) -> Result<RecordStream<'_, ProgressRecord>> {
        self.record(format!("build_image {}", tag));

        let mut files: Vec<String> = fs::read_dir(context)?
            .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<std::io::Result<_>>()?;
        files.sort();
        *self.snapshot.borrow_mut() = Some(ContextSnapshot {
            path: context.to_path_buf(),
            dockerfile: fs::read_to_string(context.join("Dockerfile"))?,
            files,
        });

        let pulled = &self.progress_pulled;
        Ok(Box::new(self.progress.clone().into_iter().map(move |record| {
            pulled.set(pulled.get() + 1);
            Ok::<_, Error>(record)
        })))
    }

    fn list_images(&self, reference: &str) -> Result<Vec<ImageRef>> {
        self.record(format!("list_images {}", reference));
        Ok(self
            .images
            .iter()
            .filter(|image| {
                image
                    .tags
                    .iter()
                    .any(|t| t == reference || t.split(':').next() == Some(reference))
            })
            .cloned()
            .collect())
    }

    fn create_container(&self, image_id: &str) -> Result<String> {
        self.record(format!("create_container {}", image_id));
        if self.fail_create {
            return Err(Error::TransportError("connection refused".to_string()));
        }
        Ok("c0ffee".to_string())
    }

    fn start_container(&self, container_id: &str) -> Result<()> {
        self.record(format!("start_container {}", container_id));
        Ok(())
    }

    fn logs(&self, container_id: &str) -> Result<RecordStream<'_, String>> {
        self.record(format!("logs {}", container_id));
        Ok(Box::new(self.logs.clone().into_iter().map(Ok::<_, Error>)))
    }

    fn diff(&self, container_id: &str) -> Result<Vec<DiffEntry>> {
        self.record(format!("diff {}", container_id));
        Ok(self.diff.clone())
    }

    fn copy_out(&self, container_id: &str, path: &str) -> Result<Vec<u8>> {
        self.record(format!("copy_out {} {}", container_id, path));
        let content = self
            .files
            .get(path)
            .ok_or_else(|| Error::TransportError(format!("no such file: {}", path)))?;
        Ok(tar_payload(path, content))
    }
}

/// Wrap `content` the way the engine's copy endpoint does
pub fn tar_payload(path: &str, content: &[u8]) -> Vec<u8> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, content).unwrap();
    builder.into_inner().unwrap()
}

/// Write the inputs of a from-scratch build into `dir`
///
/// Returns a descriptor for `centos:7` with `foo.tar` and `bar.spec`.
pub fn build_recipe(dir: &Path) -> RecipeDescriptor {
    fs::write(dir.join("foo.tar"), b"not really a tarball").unwrap();
    fs::write(dir.join("bar.spec"), "Name: bar\nVersion: 1.0\n").unwrap();

    RecipeDescriptor::new(RecipeOptions {
        image: Some("centos:7".to_string()),
        sources: vec![dir.join("foo.tar")],
        spec: Some(dir.join("bar.spec")),
        ..Default::default()
    })
    .unwrap()
}

/// Write a source RPM into `dir` and return a rebuild descriptor for it
pub fn rebuild_recipe(dir: &Path) -> RecipeDescriptor {
    fs::write(dir.join("foo-1.0-1.src.rpm"), b"\xed\xab\xee\xdb").unwrap();

    RecipeDescriptor::new(RecipeOptions {
        image: Some("centos:7".to_string()),
        srpm: Some(dir.join("foo-1.0-1.src.rpm")),
        ..Default::default()
    })
    .unwrap()
}

/// Writer that appends formatted log output to a shared buffer
struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with info-level logging captured, returning its result and the log text
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let writer = Arc::clone(&buffer);
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || CapturedWriter(Arc::clone(&writer)))
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .without_time()
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let text = String::from_utf8_lossy(&buffer.lock().unwrap()).into_owned();
    (result, text)
}
