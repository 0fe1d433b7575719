// src/recipe/mod.rs

//! Recipe descriptors for containerized RPM builds
//!
//! A recipe describes one package build. It runs in one of two modes:
//! - **Build**: from a spec file plus source archives (`rpmbuild -ba`)
//! - **Rebuild**: from a source RPM that already bundles spec and sources
//!   (`rpmbuild --rebuild`)
//!
//! The descriptor is validated once at construction; everything downstream
//! (Dockerfile rendering, staging, image naming) can rely on exactly one mode
//! being active.

mod context;
mod dockerfile;

pub use context::{BuildContext, DOCKERFILE_NAME, SOURCES_SUBDIR};
pub use dockerfile::{render_dockerfile, DockerfileInput, DockerfileMode, RPMBUILD_TOPDIR};

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Prefix for the tag of every image built by this tool
pub const IMAGE_NAME_PREFIX: &str = "rpmbuild_";

/// Raw recipe inputs, as collected from flags and config files
#[derive(Debug, Clone, Default)]
pub struct RecipeOptions {
    /// Base Docker image to build from
    pub image: Option<String>,
    /// Macro overrides passed to rpmbuild as `--define`, in order
    pub defines: Vec<String>,
    /// Source archives (or directories) to stage into SOURCES
    pub sources: Vec<PathBuf>,
    /// Directory whose whole tree is staged into SOURCES
    pub sources_dir: Option<PathBuf>,
    /// Spec file for a from-scratch build
    pub spec: Option<PathBuf>,
    /// Macro files staged next to the spec
    pub macrofiles: Vec<PathBuf>,
    /// Fetch remote sources with spectool before building
    pub retrieve: bool,
    /// Source RPM for a rebuild
    pub srpm: Option<PathBuf>,
}

/// Which rpmbuild invocation drives the build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeMode {
    Build {
        spec: PathBuf,
        macrofiles: Vec<PathBuf>,
        defines: Vec<String>,
        retrieve: bool,
    },
    Rebuild {
        srpm: PathBuf,
    },
}

/// A validated recipe
#[derive(Debug, Clone)]
pub struct RecipeDescriptor {
    image: String,
    sources: Vec<PathBuf>,
    sources_dir: Option<PathBuf>,
    mode: RecipeMode,
}

impl RecipeDescriptor {
    /// Validate raw options into a descriptor
    ///
    /// Fails with [`Error::ConfigError`] when the base image is missing or
    /// when not exactly one of spec and srpm is given.
    pub fn new(options: RecipeOptions) -> Result<Self> {
        let image = options
            .image
            .filter(|i| !i.trim().is_empty())
            .ok_or_else(|| Error::ConfigError("Must provide base docker <image>".to_string()))?;

        let spec = options.spec.filter(|p| !p.as_os_str().is_empty());
        let srpm = options.srpm.filter(|p| !p.as_os_str().is_empty());

        let mode = match (spec, srpm) {
            (Some(spec), None) => RecipeMode::Build {
                spec,
                macrofiles: options.macrofiles,
                defines: options.defines,
                retrieve: options.retrieve,
            },
            (None, Some(srpm)) => RecipeMode::Rebuild { srpm },
            (None, None) => {
                return Err(Error::ConfigError(
                    "Must provide <spec> or <srpm>".to_string(),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(Error::ConfigError(
                    "<spec> and <srpm> are mutually exclusive".to_string(),
                ));
            }
        };

        let sources_dir = match options.sources_dir {
            Some(dir) if dir.exists() => Some(dir),
            Some(dir) => {
                warn!("Ignoring missing sources directory: {}", dir.display());
                None
            }
            None => None,
        };

        Ok(Self {
            image,
            sources: options.sources,
            sources_dir,
            mode,
        })
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn sources_dir(&self) -> Option<&Path> {
        self.sources_dir.as_deref()
    }

    pub fn mode(&self) -> &RecipeMode {
        &self.mode
    }

    /// The file that names this recipe: the spec, or the srpm in rebuild mode
    pub fn recipe_file(&self) -> &Path {
        match &self.mode {
            RecipeMode::Build { spec, .. } => spec,
            RecipeMode::Rebuild { srpm } => srpm,
        }
    }

    /// Tag-safe identity token derived from the recipe file's basename
    pub fn identity(&self) -> String {
        sanitize(&basename(self.recipe_file()))
    }

    /// Deterministic tag of the image built for this recipe
    pub fn image_name(&self) -> String {
        format!("{}{}", IMAGE_NAME_PREFIX, self.identity())
    }
}

impl fmt::Display for RecipeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity())
    }
}

/// Make a string safe for use in a Docker tag
///
/// Lower-cases, then replaces every character outside `[a-z0-9_.]` with `_`.
pub fn sanitize(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}

/// Last path component as a string, tolerating trailing separators
pub(crate) fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
