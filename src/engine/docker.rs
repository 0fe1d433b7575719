// src/engine/docker.rs

//! Docker implementation of [`ContainerEngine`]
//!
//! bollard is async; the engine owns a private current-thread tokio runtime
//! and drives each request to completion with `block_on`. Streaming
//! responses are wrapped in [`BlockingStream`], which awaits exactly one item
//! per `next()`.

use super::{ChangeKind, ContainerEngine, DiffEntry, ImageRef, ProgressRecord, RecordStream};
use crate::error::{Error, Result};
use crate::recipe::DOCKERFILE_NAME;
use bollard::models::{BuildInfo, ContainerCreateBody};
use bollard::query_parameters::{
    BuildImageOptionsBuilder, CreateContainerOptions, DownloadFromContainerOptionsBuilder,
    ListImagesOptionsBuilder, LogsOptionsBuilder, StartContainerOptions,
};
use bollard::{ClientVersion, Docker, API_DEFAULT_VERSION};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::debug;

/// Default HTTP request timeout towards the engine
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

const DEFAULT_UNIX_SOCKET: &str = "unix:///var/run/docker.sock";

const SUPPORTED_SCHEMES: [&str; 3] = ["unix://", "tcp://", "http://"];

/// Connection settings for the Docker engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerConfig {
    /// `unix://`, `tcp://` or `http://` endpoint; local defaults when unset
    pub base_url: Option<String>,
    /// Request timeout in seconds
    pub timeout: u64,
    /// API version as `MAJOR.MINOR`; client default when unset
    pub version: Option<String>,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            version: None,
        }
    }
}

impl DockerConfig {
    /// Check the base URL scheme and API version without connecting
    pub fn validate(&self) -> Result<()> {
        if let Some(version) = &self.version {
            parse_api_version(version)?;
        }

        match self.base_url.as_deref() {
            Some(url) if !SUPPORTED_SCHEMES.iter().any(|s| url.starts_with(s)) => Err(
                Error::ConfigError(format!("Unsupported docker base URL: {}", url)),
            ),
            _ => Ok(()),
        }
    }
}

/// Parse an API version such as `1.41`
pub fn parse_api_version(version: &str) -> Result<ClientVersion> {
    let invalid = || Error::ConfigError(format!("Invalid docker API version: {}", version));

    let (major, minor) = version.trim().split_once('.').ok_or_else(invalid)?;
    Ok(ClientVersion {
        major_version: major.parse().map_err(|_| invalid())?,
        minor_version: minor.parse().map_err(|_| invalid())?,
    })
}

/// Container engine backed by a Docker daemon
pub struct DockerEngine {
    docker: Docker,
    runtime: Runtime,
}

impl DockerEngine {
    /// Connect to the engine described by `config`
    pub fn connect(config: &DockerConfig) -> Result<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::TransportError(format!("Failed to start runtime: {}", e)))?;
        let _guard = runtime.enter();

        let requested = config.version.as_deref().map(parse_api_version).transpose()?;
        let version = requested.as_ref().unwrap_or(API_DEFAULT_VERSION);
        let timeout = config.timeout;

        let docker = match config.base_url.as_deref() {
            None if requested.is_none() => {
                Docker::connect_with_local_defaults()?.with_timeout(Duration::from_secs(timeout))
            }
            None => Docker::connect_with_unix(DEFAULT_UNIX_SOCKET, timeout, version)?,
            Some(url) if url.starts_with("unix://") => {
                Docker::connect_with_unix(url, timeout, version)?
            }
            Some(url) if url.starts_with("tcp://") || url.starts_with("http://") => {
                Docker::connect_with_http(url, timeout, version)?
            }
            Some(url) => {
                return Err(Error::ConfigError(format!(
                    "Unsupported docker base URL: {}",
                    url
                )));
            }
        };

        debug!(
            "Connected to docker at {}",
            config.base_url.as_deref().unwrap_or("local defaults")
        );
        Ok(Self { docker, runtime })
    }

    fn blocking<'a, S>(&'a self, stream: S) -> BlockingStream<'a, S>
    where
        S: Stream + 'a,
    {
        BlockingStream {
            runtime: &self.runtime,
            stream: Box::pin(stream),
        }
    }
}

impl ContainerEngine for DockerEngine {
    fn build_image(&self, context: &Path, tag: &str) -> Result<RecordStream<'_, ProgressRecord>> {
        let archive = archive_context(context)?;
        debug!("Submitting {} byte build context as {}", archive.len(), tag);

        let options = BuildImageOptionsBuilder::default()
            .dockerfile(DOCKERFILE_NAME)
            .t(tag)
            .rm(true)
            .build();
        let stream = self
            .docker
            .build_image(options, None, Some(bollard::body_full(Bytes::from(archive))))
            .map(build_record);

        Ok(Box::new(self.blocking(stream)))
    }

    fn list_images(&self, reference: &str) -> Result<Vec<ImageRef>> {
        let mut filters = HashMap::new();
        filters.insert("reference".to_string(), vec![reference.to_string()]);
        let options = ListImagesOptionsBuilder::default().filters(&filters).build();

        let images = self.runtime.block_on(self.docker.list_images(Some(options)))?;
        Ok(images
            .into_iter()
            .map(|image| ImageRef {
                id: image.id,
                tags: image.repo_tags,
            })
            .collect())
    }

    fn create_container(&self, image_id: &str) -> Result<String> {
        let body = ContainerCreateBody {
            image: Some(image_id.to_string()),
            ..Default::default()
        };
        let response = self
            .runtime
            .block_on(self.docker.create_container(None::<CreateContainerOptions>, body))?;
        for warning in &response.warnings {
            debug!("create_container: {}", warning);
        }
        Ok(response.id)
    }

    fn start_container(&self, container_id: &str) -> Result<()> {
        self.runtime.block_on(
            self.docker
                .start_container(container_id, None::<StartContainerOptions>),
        )?;
        Ok(())
    }

    fn logs(&self, container_id: &str) -> Result<RecordStream<'_, String>> {
        let options = LogsOptionsBuilder::default()
            .follow(true)
            .stdout(true)
            .stderr(true)
            .build();
        let stream = self
            .docker
            .logs(container_id, Some(options))
            .map(|item| -> Result<String> {
                let output = item?;
                Ok(String::from_utf8_lossy(&output.into_bytes()).into_owned())
            });

        Ok(Box::new(self.blocking(stream)))
    }

    fn diff(&self, container_id: &str) -> Result<Vec<DiffEntry>> {
        let changes = self
            .runtime
            .block_on(self.docker.container_changes(container_id))?
            .unwrap_or_default();

        Ok(changes
            .into_iter()
            .map(|change| {
                let kind = serde_json::to_value(&change.kind)
                    .ok()
                    .and_then(|v| v.as_u64())
                    .and_then(ChangeKind::from_code);
                DiffEntry::new(change.path, kind)
            })
            .collect())
    }

    fn copy_out(&self, container_id: &str, path: &str) -> Result<Vec<u8>> {
        let options = DownloadFromContainerOptionsBuilder::default()
            .path(path)
            .build();
        let stream = self
            .docker
            .download_from_container(container_id, Some(options));

        let mut payload = Vec::new();
        for chunk in self.blocking(stream) {
            payload.extend_from_slice(&chunk?);
        }
        Ok(payload)
    }
}

/// Map one bollard build item onto a protocol record
///
/// bollard surfaces in-band build errors carrying a message as
/// `DockerStreamError`; any other item with an `errorDetail` is an error
/// record too, whether or not the detail has a message.
fn build_record(
    item: std::result::Result<BuildInfo, bollard::errors::Error>,
) -> Result<ProgressRecord> {
    match item {
        Ok(info) => progress_from_build_info(info),
        Err(bollard::errors::Error::DockerStreamError { error }) => {
            Ok(ProgressRecord::error(error, None))
        }
        Err(e) => Err(e.into()),
    }
}

fn progress_from_build_info(info: BuildInfo) -> Result<ProgressRecord> {
    if let Some(detail) = info.error_detail {
        let message = detail
            .message
            .clone()
            .unwrap_or_else(|| "Image build failed".to_string());
        return Ok(ProgressRecord::error(
            message,
            Some(serde_json::to_value(&detail)?),
        ));
    }

    let mut record = ProgressRecord {
        stream: info.stream,
        ..Default::default()
    };
    if let Some(status) = info.status {
        record.extra.insert("status".to_string(), Value::String(status));
    }
    if let Some(id) = info.id {
        record.extra.insert("id".to_string(), Value::String(id));
    }
    Ok(record)
}

/// Tar the build context directory
fn archive_context(context: &Path) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);
    builder.append_dir_all(".", context)?;
    Ok(builder.into_inner()?)
}

/// Blocking, forward-only view of an async stream
struct BlockingStream<'a, S: Stream> {
    runtime: &'a Runtime,
    stream: Pin<Box<S>>,
}

impl<S: Stream> Iterator for BlockingStream<'_, S> {
    type Item = S::Item;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.stream.next())
    }
}
