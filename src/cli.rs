// src/cli.rs

//! Command-line interface definitions
//!
//! Two subcommands:
//! - `build` - build binary and source RPMs from a spec file and sources
//! - `rebuild` - rebuild an existing source RPM
//!
//! Every recipe value may also come from the `[build]` section of the config
//! file; flags win over file values.

use crate::config::{ConfigFile, DockerFlags};
use crate::engine::DockerConfig;
use crate::error::{Error, Result};
use crate::recipe::{RecipeDescriptor, RecipeOptions};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docker-rpmbuild")]
#[command(author, version, about = "Build RPM packages inside disposable Docker images", long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Docker connection overrides
#[derive(Args, Debug, Clone, Default)]
pub struct DockerArgs {
    /// protocol+hostname+port towards docker (example: unix:///var/run/docker.sock)
    #[arg(long = "docker-base-url", value_name = "URL")]
    pub base_url: Option<String>,

    /// HTTP request timeout in seconds towards the docker API [default: 600]
    #[arg(long = "docker-timeout", value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// API version the docker client will use (example: 1.41)
    #[arg(long = "docker-version", value_name = "VERSION")]
    pub version: Option<String>,
}

impl From<DockerArgs> for DockerFlags {
    fn from(args: DockerArgs) -> Self {
        DockerFlags {
            base_url: args.base_url,
            timeout: args.timeout,
            version: args.version,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build RPMs from a spec file and source tarballs
    Build {
        #[command(flatten)]
        docker: DockerArgs,

        /// Pass a macro to rpmbuild (repeatable)
        #[arg(long = "define", value_name = "OPTION")]
        defines: Vec<String>,

        /// Tarball containing package sources (repeatable)
        #[arg(long = "source", value_name = "TARBALL")]
        sources: Vec<PathBuf>,

        /// Directory containing resources required by the spec
        #[arg(long, value_name = "DIR")]
        sources_dir: Option<PathBuf>,

        /// RPM spec file to build
        #[arg(long, value_name = "FILE")]
        spec: Option<PathBuf>,

        /// Macro file placed next to the spec in SPECS/ (repeatable)
        #[arg(long = "macrofile", value_name = "FILE")]
        macrofiles: Vec<PathBuf>,

        /// Fetch resources defined in the spec with spectool inside the container
        #[arg(short, long)]
        retrieve: bool,

        /// Output directory for RPMs [default: .]
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Base docker image
        image: Option<String>,
    },

    /// Rebuild a source RPM
    Rebuild {
        #[command(flatten)]
        docker: DockerArgs,

        /// SRPM to rebuild
        #[arg(long, value_name = "FILE")]
        srpm: Option<PathBuf>,

        /// Output directory for RPMs [default: .]
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Base docker image
        image: Option<String>,
    },
}

/// A fully resolved build request
#[derive(Debug)]
pub struct Invocation {
    pub recipe: RecipeDescriptor,
    pub docker: DockerConfig,
    pub output: PathBuf,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Merge flags with the config file and validate the result
    pub fn resolve(self) -> Result<Invocation> {
        let file = match &self.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };

        match self.command {
            Commands::Build {
                docker,
                defines,
                sources,
                sources_dir,
                spec,
                macrofiles,
                retrieve,
                output,
                image,
            } => {
                let options = file.build_options(RecipeOptions {
                    image,
                    defines,
                    sources,
                    sources_dir,
                    spec,
                    macrofiles,
                    retrieve,
                    srpm: None,
                });
                if options.spec.is_none() {
                    return Err(Error::ConfigError("build requires --spec".to_string()));
                }
                if options.sources.is_empty() && options.sources_dir.is_none() {
                    return Err(Error::ConfigError(
                        "build requires --source or --sources-dir".to_string(),
                    ));
                }

                let docker = file.docker_config(&docker.into());
                docker.validate()?;

                Ok(Invocation {
                    recipe: RecipeDescriptor::new(options)?,
                    docker,
                    output: file.output_dir(output),
                })
            }
            Commands::Rebuild {
                docker,
                srpm,
                output,
                image,
            } => {
                let options = file.rebuild_options(image, srpm);
                if options.srpm.is_none() {
                    return Err(Error::ConfigError("rebuild requires --srpm".to_string()));
                }

                let docker = file.docker_config(&docker.into());
                docker.validate()?;

                Ok(Invocation {
                    recipe: RecipeDescriptor::new(options)?,
                    docker,
                    output: file.output_dir(output),
                })
            }
        }
    }
}
