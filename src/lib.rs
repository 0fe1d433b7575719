// src/lib.rs

//! docker-rpmbuild: RPM builds inside disposable Docker images
//!
//! Given a spec file and its sources (or a source RPM), the packager stages
//! a Docker build context, builds an image holding rpmbuild and the spec's
//! build dependencies, runs rpmbuild in a container from that image, and
//! copies the resulting RPMs back to the host.
//!
//! # Architecture
//!
//! - `recipe`: validated build inputs, Dockerfile rendering, context staging
//! - `engine`: the container engine seam and its Docker implementation
//! - `packager`: the build pipeline and artifact export
//! - `config` / `cli`: layered configuration and the command line

pub mod cli;
pub mod config;
pub mod engine;
mod error;
pub mod packager;
pub mod recipe;

pub use engine::{ContainerEngine, DockerConfig, DockerEngine, ProgressRecord};
pub use error::{Error, Result};
pub use packager::Packager;
pub use recipe::{BuildContext, RecipeDescriptor, RecipeMode, RecipeOptions};
