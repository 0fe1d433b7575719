// src/recipe/context.rs

//! Build context staging
//!
//! The build context is a throwaway directory handed to Docker as the input
//! of an image build. It holds a flat copy of every input file (by basename),
//! an optional `SOURCES/` tree, and the generated Dockerfile.

use super::dockerfile::{render_dockerfile, DockerfileInput};
use super::{basename, RecipeDescriptor, RecipeMode};
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;

/// Name of the generated Dockerfile at the context root
pub const DOCKERFILE_NAME: &str = "Dockerfile";

/// Subdirectory receiving the bulk sources directory
pub const SOURCES_SUBDIR: &str = "SOURCES";

/// Staging directory for one image build
#[derive(Debug)]
pub struct BuildContext {
    recipe: RecipeDescriptor,
    dir: Option<TempDir>,
}

impl BuildContext {
    pub fn new(recipe: RecipeDescriptor) -> Self {
        Self { recipe, dir: None }
    }

    pub fn recipe(&self) -> &RecipeDescriptor {
        &self.recipe
    }

    /// Staging directory, if set up
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(|d| d.path())
    }

    /// The Dockerfile this context renders
    pub fn dockerfile(&self) -> String {
        render_dockerfile(&DockerfileInput::from_recipe(&self.recipe))
    }

    /// Create the staging directory and populate it
    ///
    /// Copies every input by basename, copies the sources directory tree
    /// into `SOURCES/`, then writes the Dockerfile. On failure the partially
    /// populated directory is removed before returning.
    pub fn setup(&mut self) -> Result<&Path> {
        if self.dir.is_some() {
            return Err(Error::IoError(
                "Build context is already set up".to_string(),
            ));
        }

        let dir = tempfile::Builder::new()
            .prefix("rpmbuild-")
            .tempdir()
            .map_err(|e| Error::IoError(format!("Failed to create build context: {}", e)))?;

        // Dropping `dir` on the error path removes it
        self.populate(dir.path())?;

        debug!("Build context ready at {}", dir.path().display());
        Ok(self.dir.insert(dir).path())
    }

    /// Remove the staging directory
    ///
    /// Calling this without a prior `setup()` (or twice) is a no-op.
    pub fn teardown(&mut self) -> Result<()> {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            dir.close().map_err(|e| {
                Error::IoError(format!(
                    "Failed to remove build context {}: {}",
                    path.display(),
                    e
                ))
            })?;
            debug!("Removed build context {}", path.display());
        }
        Ok(())
    }

    fn populate(&self, root: &Path) -> Result<()> {
        let mut staged = HashSet::new();
        for source in self.recipe.sources() {
            stage_input(source, root, &mut staged)?;
        }

        match self.recipe.mode() {
            RecipeMode::Build {
                spec, macrofiles, ..
            } => {
                for macrofile in macrofiles {
                    stage_input(macrofile, root, &mut staged)?;
                }
                stage_input(spec, root, &mut staged)?;
            }
            RecipeMode::Rebuild { srpm } => {
                stage_input(srpm, root, &mut staged)?;
            }
        }

        if let Some(sources_dir) = self.recipe.sources_dir() {
            let dest = root.join(SOURCES_SUBDIR);
            if dest.exists() {
                return Err(Error::IoError(format!(
                    "Cannot stage {}: {} already exists in the build context",
                    sources_dir.display(),
                    SOURCES_SUBDIR
                )));
            }
            copy_tree(sources_dir, &dest)?;
        }

        fs::write(root.join(DOCKERFILE_NAME), self.dockerfile())?;
        Ok(())
    }
}

/// Copy one input into the context root under its basename
///
/// Directories are copied recursively; the Dockerfile re-packs them.
/// Basenames must be unique and must not shadow the generated Dockerfile.
fn stage_input(input: &Path, root: &Path, staged: &mut HashSet<String>) -> Result<PathBuf> {
    let name = basename(input);
    if name == DOCKERFILE_NAME {
        return Err(Error::ConfigError(format!(
            "Cannot stage {}: {} is reserved for the generated Dockerfile",
            input.display(),
            DOCKERFILE_NAME
        )));
    }
    if !staged.insert(name.clone()) {
        return Err(Error::ConfigError(format!(
            "Cannot stage {}: another input is already named {}",
            input.display(),
            name
        )));
    }

    let dest = root.join(&name);
    if input.is_dir() {
        copy_tree(input, &dest)?;
    } else {
        fs::copy(input, &dest).map_err(|e| {
            Error::IoError(format!("Failed to stage {}: {}", input.display(), e))
        })?;
    }
    debug!("Staged {}", input.display());
    Ok(dest)
}

/// Recursively copy `src` to `dest`, which must not exist yet
fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir(dest)?;

    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::IoError(e.to_string()))?;
        let target = dest.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> Result<()> {
    let link = fs::read_link(src)?;
    std::os::unix::fs::symlink(link, dest)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dest: &Path) -> Result<()> {
    fs::copy(src, dest)?;
    Ok(())
}
