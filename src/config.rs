// src/config.rs

//! Configuration file parsing and layering
//!
//! Values come from three layers, lowest priority first: built-in defaults,
//! the TOML config file, explicit command-line flags. The file has two
//! sections:
//!
//! ```toml
//! [docker]
//! base_url = "unix:///var/run/docker.sock"
//! timeout = 600
//! version = "1.41"
//!
//! [build]
//! image = "centos:7"
//! define = ["dist .el7"]
//! source = ["foo-1.0.tar.gz"]
//! sources_dir = "SOURCES"
//! spec = "foo.spec"
//! macrofile = ["macros.foo"]
//! retrieve = true
//! output = "out"
//! srpm = "foo-1.0-1.src.rpm"
//! ```
//!
//! Empty strings and empty lists in the file count as unset.

use crate::engine::{DockerConfig, DEFAULT_TIMEOUT_SECS};
use crate::error::{Error, Result};
use crate::recipe::RecipeOptions;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default output directory for exported packages
pub const DEFAULT_OUTPUT_DIR: &str = ".";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub docker: DockerSection,

    #[serde(default)]
    pub build: BuildSection,
}

/// `[docker]` section: engine connection
#[derive(Debug, Default, Deserialize)]
pub struct DockerSection {
    pub base_url: Option<String>,
    pub timeout: Option<u64>,
    pub version: Option<String>,
}

/// `[build]` section: recipe inputs
#[derive(Debug, Default, Deserialize)]
pub struct BuildSection {
    pub image: Option<String>,
    #[serde(default)]
    pub define: Vec<String>,
    #[serde(default)]
    pub source: Vec<PathBuf>,
    pub sources_dir: Option<PathBuf>,
    pub spec: Option<PathBuf>,
    #[serde(default)]
    pub macrofile: Vec<PathBuf>,
    pub retrieve: Option<bool>,
    pub output: Option<PathBuf>,
    pub srpm: Option<PathBuf>,
}

impl ConfigFile {
    /// Load a config file; a path that does not exist yields an empty config
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file {} not found, ignoring", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)?;
        Self::parse(&text).map_err(|e| match e {
            Error::ConfigError(msg) => {
                Error::ConfigError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse config text, dropping empty values
    pub fn parse(text: &str) -> Result<Self> {
        let mut config: ConfigFile =
            toml::from_str(text).map_err(|e| Error::ConfigError(e.to_string()))?;
        config.strip_empty();
        Ok(config)
    }

    fn strip_empty(&mut self) {
        let docker = &mut self.docker;
        docker.base_url = docker.base_url.take().filter(|s| !s.trim().is_empty());
        docker.version = docker.version.take().filter(|s| !s.trim().is_empty());
        docker.timeout = docker.timeout.filter(|t| *t > 0);

        let build = &mut self.build;
        build.image = build.image.take().filter(|s| !s.trim().is_empty());
        build.define.retain(|d| !d.trim().is_empty());
        build.source.retain(|p| !p.as_os_str().is_empty());
        build.macrofile.retain(|p| !p.as_os_str().is_empty());
        for path in [
            &mut build.sources_dir,
            &mut build.spec,
            &mut build.output,
            &mut build.srpm,
        ] {
            *path = path.take().filter(|p| !p.as_os_str().is_empty());
        }
    }

    /// Engine connection settings with `flags` layered on top
    pub fn docker_config(&self, flags: &DockerFlags) -> DockerConfig {
        DockerConfig {
            base_url: flags.base_url.clone().or_else(|| self.docker.base_url.clone()),
            timeout: flags
                .timeout
                .or(self.docker.timeout)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            version: flags.version.clone().or_else(|| self.docker.version.clone()),
        }
    }

    /// Recipe inputs for a from-scratch build, flags first
    ///
    /// List-valued flags replace the file's list when non-empty.
    pub fn build_options(&self, flags: RecipeOptions) -> RecipeOptions {
        let build = &self.build;
        RecipeOptions {
            image: flags.image.or_else(|| build.image.clone()),
            defines: non_empty_or(flags.defines, &build.define),
            sources: non_empty_or(flags.sources, &build.source),
            sources_dir: flags.sources_dir.or_else(|| build.sources_dir.clone()),
            spec: flags.spec.or_else(|| build.spec.clone()),
            macrofiles: non_empty_or(flags.macrofiles, &build.macrofile),
            retrieve: flags.retrieve || build.retrieve.unwrap_or(false),
            srpm: None,
        }
    }

    /// Recipe inputs for a rebuild, flags first
    pub fn rebuild_options(&self, image: Option<String>, srpm: Option<PathBuf>) -> RecipeOptions {
        RecipeOptions {
            image: image.or_else(|| self.build.image.clone()),
            srpm: srpm.or_else(|| self.build.srpm.clone()),
            ..Default::default()
        }
    }

    /// Output directory, flag first
    pub fn output_dir(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.build.output.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }
}

/// Engine connection flags from the command line
#[derive(Debug, Clone, Default)]
pub struct DockerFlags {
    pub base_url: Option<String>,
    pub timeout: Option<u64>,
    pub version: Option<String>,
}

fn non_empty_or<T: Clone>(flags: Vec<T>, file: &[T]) -> Vec<T> {
    if flags.is_empty() {
        file.to_vec()
    } else {
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
[docker]
base_url = "tcp://127.0.0.1:4242"
timeout = 42
version = "1.11"

[build]
image = "docker.example.net:5000/centos:7"
define = ["dist .el7", "_smp_mflags -j4"]
source = ["foo", "bar", "keke", "docker"]
spec = "SPECS/foo.spec"
retrieve = true
output = "/tmp/rpms"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = ConfigFile::parse(FULL_CONFIG).unwrap();
        assert_eq!(config.docker.base_url.as_deref(), Some("tcp://127.0.0.1:4242"));
        assert_eq!(config.docker.timeout, Some(42));
        assert_eq!(config.docker.version.as_deref(), Some("1.11"));
        assert_eq!(config.build.source.len(), 4);
        assert_eq!(config.build.source[2], PathBuf::from("keke"));
        assert_eq!(config.build.retrieve, Some(true));
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let config = ConfigFile::parse("[foo]\nmissing = \"docker-section\"\n").unwrap();
        assert!(config.docker.base_url.is_none());
        assert!(config.docker.timeout.is_none());
        assert!(config.build.image.is_none());
    }

    #[test]
    fn test_empty_values_are_dropped() {
        let config = ConfigFile::parse("[docker]\nbase_url = \"\"\nversion = \"1.11\"\n").unwrap();
        assert!(config.docker.base_url.is_none());
        assert_eq!(config.docker.version.as_deref(), Some("1.11"));
    }

    #[test]
    fn test_malformed_config_is_config_error() {
        assert!(matches!(
            ConfigFile::parse("[docker]\ntimeout = \"soon\"\n"),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let config = ConfigFile::load(Path::new("/nonexistent/docker-rpmbuild.toml")).unwrap();
        assert!(config.build.spec.is_none());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, FULL_CONFIG).unwrap();

        let config = ConfigFile::load(&path).unwrap();
        assert_eq!(config.build.spec, Some(PathBuf::from("SPECS/foo.spec")));
    }

    #[test]
    fn test_default_timeout_when_unset_everywhere() {
        let config = ConfigFile::default();
        let docker = config.docker_config(&DockerFlags::default());
        assert_eq!(docker.timeout, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_timeout_flag_without_config() {
        let config = ConfigFile::default();
        let flags = DockerFlags {
            timeout: Some(44),
            ..Default::default()
        };
        assert_eq!(config.docker_config(&flags).timeout, 44);
    }

    #[test]
    fn test_flags_override_config_values() {
        let config = ConfigFile::parse(FULL_CONFIG).unwrap();
        let flags = DockerFlags {
            timeout: Some(48),
            ..Default::default()
        };
        let docker = config.docker_config(&flags);
        assert_eq!(docker.timeout, 48);
        assert_eq!(docker.version.as_deref(), Some("1.11"));
        assert_eq!(docker.base_url.as_deref(), Some("tcp://127.0.0.1:4242"));
    }

    #[test]
    fn test_config_timeout_used_without_flag() {
        let config = ConfigFile::parse(FULL_CONFIG).unwrap();
        assert_eq!(config.docker_config(&DockerFlags::default()).timeout, 42);
    }

    #[test]
    fn test_build_options_layering() {
        let config = ConfigFile::parse(FULL_CONFIG).unwrap();
        let options = config.build_options(RecipeOptions {
            sources: vec![PathBuf::from("override.tar.gz")],
            ..Default::default()
        });

        assert_eq!(options.image.as_deref(), Some("docker.example.net:5000/centos:7"));
        assert_eq!(options.sources, vec![PathBuf::from("override.tar.gz")]);
        assert_eq!(options.defines, vec!["dist .el7", "_smp_mflags -j4"]);
        assert_eq!(options.spec, Some(PathBuf::from("SPECS/foo.spec")));
        assert!(options.retrieve);
        assert!(options.srpm.is_none());
    }

    #[test]
    fn test_rebuild_options_and_output() {
        let config = ConfigFile::parse("[build]\nimage = \"centos:7\"\nsrpm = \"a.src.rpm\"\n").unwrap();
        let options = config.rebuild_options(None, None);
        assert_eq!(options.image.as_deref(), Some("centos:7"));
        assert_eq!(options.srpm, Some(PathBuf::from("a.src.rpm")));

        assert_eq!(config.output_dir(None), PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(
            config.output_dir(Some(PathBuf::from("/tmp/"))),
            PathBuf::from("/tmp/")
        );
    }
}
