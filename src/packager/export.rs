// src/packager/export.rs

//! Artifact export from a stopped build container
//!
//! Built packages are located through the container's filesystem diff rather
//! than by exporting the image: every changed path under the rpmbuild root
//! that ends in `.rpm` is copied out individually.

use crate::engine::{ContainerEngine, DiffEntry};
use crate::error::{Error, Result};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Root of the rpmbuild tree inside the container
pub const RPMBUILD_ROOT: &str = "/rpmbuild";

/// Extension of exported package files
pub const PACKAGE_EXTENSION: &str = ".rpm";

/// Size of the ustar header that prefixes a single-file copy payload
pub const TAR_HEADER_LEN: usize = 512;

/// Whether a diff entry is a package produced by the build
pub fn is_artifact(entry: &DiffEntry) -> bool {
    entry.path.starts_with(RPMBUILD_ROOT) && entry.path.ends_with(PACKAGE_EXTENSION)
}

/// Copy every built package of `container_id` into `output`
///
/// Returns the written host paths in diff order. Files written before a
/// failure are left in place.
pub fn export_artifacts<E>(engine: &E, container_id: &str, output: &Path) -> Result<Vec<PathBuf>>
where
    E: ContainerEngine + ?Sized,
{
    let diff = engine.diff(container_id)?;
    let mut exported = Vec::new();

    for entry in diff.iter().filter(|e| is_artifact(e)) {
        if exported.is_empty() {
            fs::create_dir_all(output)?;
        }

        let name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
        let payload = engine.copy_out(container_id, &entry.path)?;
        let content = unwrap_copy_payload(&payload)?;

        let dest = output.join(name);
        fs::write(&dest, &content).map_err(|e| {
            Error::IoError(format!("Failed to write {}: {}", dest.display(), e))
        })?;
        debug!("Exported {} ({} bytes)", entry.path, content.len());
        exported.push(dest);
    }

    Ok(exported)
}

/// Recover the raw file bytes from a copy-out payload
///
/// The payload is a tar stream holding one file. In the common case the
/// first 512 bytes are its ustar header and the file follows directly; the
/// header's size field bounds the content so trailing tar padding is
/// dropped. Payloads that open with an extended header (PAX or GNU long
/// name) are walked with the tar reader instead.
pub fn unwrap_copy_payload(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() < TAR_HEADER_LEN {
        return Err(Error::ParseError(format!(
            "Copy payload too short: {} bytes",
            payload.len()
        )));
    }

    let header = tar::Header::from_byte_slice(&payload[..TAR_HEADER_LEN]);
    if !header.entry_type().is_file() {
        return first_file_in_archive(payload);
    }

    let size = header.entry_size()? as usize;
    let body = &payload[TAR_HEADER_LEN..];
    if body.len() < size {
        return Err(Error::ParseError(format!(
            "Copy payload truncated: expected {} bytes, got {}",
            size,
            body.len()
        )));
    }

    Ok(body[..size].to_vec())
}

fn first_file_in_archive(payload: &[u8]) -> Result<Vec<u8>> {
    let mut archive = tar::Archive::new(payload);
    for entry in archive.entries()? {
        let mut entry = entry?;
        if entry.header().entry_type().is_file() {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            return Ok(content);
        }
    }

    Err(Error::ParseError(
        "Copy payload contains no regular file".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tar_single_file(name: &str, content: &[u8]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, content).unwrap();
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_is_artifact() {
        assert!(is_artifact(&DiffEntry::new(
            "/rpmbuild/build/RPMS/x86_64/foo-1.0-1.x86_64.rpm",
            None
        )));
        assert!(is_artifact(&DiffEntry::new(
            "/rpmbuild/build/SRPMS/foo-1.0-1.src.rpm",
            None
        )));
        assert!(!is_artifact(&DiffEntry::new("/rpmbuild/build/SPECS/foo.spec", None)));
        assert!(!is_artifact(&DiffEntry::new("/var/cache/yum/foo.rpm", None)));
        assert!(!is_artifact(&DiffEntry::new("/rpmbuild/build/RPMS", None)));
    }

    #[test]
    fn test_unwrap_strips_header_and_padding() {
        let payload = tar_single_file("foo.rpm", b"\xed\xab\xee\xdbrpm-bytes");
        assert!(payload.len() > TAR_HEADER_LEN + 14);

        let content = unwrap_copy_payload(&payload).unwrap();
        assert_eq!(content, b"\xed\xab\xee\xdbrpm-bytes");
    }

    #[test]
    fn test_unwrap_long_name_falls_back_to_archive() {
        let long_name = format!("{}.x86_64.rpm", "a".repeat(150));
        let payload = tar_single_file(&long_name, b"payload");

        let content = unwrap_copy_payload(&payload).unwrap();
        assert_eq!(content, b"payload");
    }

    #[test]
    fn test_unwrap_empty_file() {
        let payload = tar_single_file("empty.rpm", b"");
        assert!(unwrap_copy_payload(&payload).unwrap().is_empty());
    }

    #[test]
    fn test_unwrap_short_payload_is_error() {
        assert!(matches!(
            unwrap_copy_payload(&[0u8; 100]),
            Err(Error::ParseError(_))
        ));
    }

    #[test]
    fn test_unwrap_truncated_payload_is_error() {
        let payload = tar_single_file("foo.rpm", &[7u8; 2048]);
        let truncated = &payload[..TAR_HEADER_LEN + 100];
        assert!(matches!(
            unwrap_copy_payload(truncated),
            Err(Error::ParseError(_))
        ));
    }
}
