// src/packager/mod.rs

//! Packager: drives one containerized RPM build
//!
//! A build runs in four steps against the container engine:
//! 1. **Build image**: submit the staged context, drain the progress stream
//! 2. **Resolve image**: look the fresh image up by its deterministic tag
//! 3. **Build package**: create and start a container, follow its logs
//! 4. **Export**: copy the produced RPMs out of the stopped container
//!
//! [`Packager::run`] wraps all four in the build context's lifetime: the
//! staging directory is created first and removed on every exit path.

mod export;

pub use export::{
    export_artifacts, is_artifact, unwrap_copy_payload, PACKAGE_EXTENSION, RPMBUILD_ROOT,
    TAR_HEADER_LEN,
};

use crate::engine::{ContainerEngine, ImageRef, Progress, ProgressRecord, RecordStream};
use crate::error::{Error, Result};
use crate::recipe::BuildContext;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Consume a build-progress stream in order
///
/// Progress text is handed to `on_line`; status records are logged at debug
/// level. Stops at the first error record and returns it as
/// [`Error::EngineProtocolError`] without pulling further records. Returns
/// the number of records consumed.
pub fn drain_build_progress<I, F>(records: I, mut on_line: F) -> Result<usize>
where
    I: IntoIterator<Item = Result<ProgressRecord>>,
    F: FnMut(&str),
{
    let mut count = 0;
    for record in records {
        count += 1;
        match record?.classify() {
            Progress::Stream(text) => on_line(text.trim()),
            Progress::Status(value) => debug!("{}", value),
            Progress::Failed(e) => return Err(e),
        }
    }
    Ok(count)
}

/// Consume container log chunks, reassembling lines split across chunks
///
/// Complete lines go to `on_line` as they arrive; a trailing partial line is
/// flushed when the stream ends. Blank lines are skipped. Returns the number
/// of lines emitted.
pub fn follow_logs<I, F>(chunks: I, mut on_line: F) -> Result<usize>
where
    I: IntoIterator<Item = Result<String>>,
    F: FnMut(&str),
{
    let mut count = 0;
    let mut emit = |line: &str| {
        let line = line.trim();
        if !line.is_empty() {
            on_line(line);
            count += 1;
        }
    };

    let mut partial = String::new();
    for chunk in chunks {
        partial.push_str(&chunk?);
        while let Some(end) = partial.find('\n') {
            let line: String = partial.drain(..=end).collect();
            emit(&line);
        }
    }
    emit(&partial);

    Ok(count)
}

/// One build of one recipe against one container engine
pub struct Packager<E: ContainerEngine> {
    context: BuildContext,
    engine: E,
    container: Option<String>,
}

impl<E: ContainerEngine> Packager<E> {
    pub fn new(context: BuildContext, engine: E) -> Self {
        Self {
            context,
            engine,
            container: None,
        }
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Id of the build container, once created
    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }

    /// Tag of the image built for this recipe
    pub fn image_name(&self) -> String {
        self.context.recipe().image_name()
    }

    /// Submit the staged context for an image build
    ///
    /// The context must be set up. The returned stream must be drained
    /// before [`Packager::image`] is called.
    pub fn build_image(&self) -> Result<RecordStream<'_, ProgressRecord>> {
        let path = self.context.path().ok_or_else(|| {
            Error::IoError("Build context has not been set up".to_string())
        })?;
        info!("Building image {}", self.image_name());
        self.engine.build_image(path, &self.image_name())
    }

    /// Resolve the built image by tag
    pub fn image(&self) -> Result<ImageRef> {
        let name = self.image_name();
        self.engine
            .list_images(&name)?
            .into_iter()
            .next()
            .ok_or(Error::EngineLookupError(name))
    }

    /// Create and start the build container
    ///
    /// Returns the container id and its log stream, which ends when the
    /// build finishes.
    pub fn build_package(&mut self) -> Result<(String, RecordStream<'_, String>)> {
        let image = self.image()?;
        let container = self.engine.create_container(&image.id)?;
        debug!("Created container {} from image {}", container, image.id);

        self.container = Some(container.clone());
        self.engine.start_container(&container)?;

        let logs = self.engine.logs(&container)?;
        Ok((container, logs))
    }

    /// Copy built packages out of the build container into `output`
    pub fn export_package(&self, output: &Path) -> Result<Vec<PathBuf>> {
        let container = self.container.as_deref().ok_or_else(|| {
            Error::IoError("No build container to export from".to_string())
        })?;
        export_artifacts(&self.engine, container, output)
    }

    /// Run the whole build, returning the exported package paths
    ///
    /// The build context is set up first and torn down before returning,
    /// whether or not the build succeeded.
    pub fn run(&mut self, output: &Path) -> Result<Vec<PathBuf>> {
        self.context.setup()?;

        let result = self.run_in_context(output);

        let teardown = self.context.teardown();
        if let (Err(_), Err(e)) = (&result, &teardown) {
            warn!("{}", e);
        }

        let exported = result?;
        teardown?;
        Ok(exported)
    }

    fn run_in_context(&mut self, output: &Path) -> Result<Vec<PathBuf>> {
        let records = self.build_image()?;
        drain_build_progress(records, |line| info!("{}", line))?;

        let (container, logs) = self.build_package()?;
        info!("Running rpmbuild in container {}", container);
        follow_logs(logs, |line| info!("{}", line))?;

        let exported = self.export_package(output)?;
        for path in &exported {
            info!("Wrote: {}", path.display());
        }
        Ok(exported)
    }
}

impl<E: ContainerEngine> fmt::Display for Packager<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.context.recipe().image())
    }
}
