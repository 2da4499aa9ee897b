//! Bundle decoding and transient persistence.
//!
//! A bundle arrives base64-encoded inside the `/init` request. It is decoded
//! and written to a uniquely named file, from which the module is compiled.
//! The file belongs to the loaded entry point and is removed, best-effort,
//! when that entry point is dropped.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};
use uuid::Uuid;

use action_runtime_common::{LoadError, LoaderConfig};

/// Decode a base64 bundle. ASCII whitespace (line wrapping) is ignored.
///
/// # Errors
///
/// Returns [`LoadError::BadEncoding`] if the text is not valid base64 or
/// decodes to an empty payload.
pub fn decode_bundle(encoded: &str) -> Result<Vec<u8>, LoadError> {
    let compact: Vec<u8> = encoded
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    let bytes = STANDARD
        .decode(&compact)
        .map_err(|e| LoadError::bad_encoding(e.to_string()))?;

    if bytes.is_empty() {
        return Err(LoadError::bad_encoding("bundle is empty"));
    }

    Ok(bytes)
}

/// A decoded bundle materialized on disk.
///
/// The file is deleted when this value is dropped.
#[derive(Debug)]
pub struct BundleFile {
    path: PathBuf,
}

impl BundleFile {
    /// Write `bytes` to a new, uniquely named file under the configured directory.
    ///
    /// The file is created with `create_new`, so an existing file is never
    /// overwritten.
    pub fn persist(bytes: &[u8], config: &LoaderConfig) -> io::Result<Self> {
        let name = format!(
            "{}-{}{}",
            config.file_prefix,
            Uuid::new_v4(),
            config.file_suffix
        );
        let path = config.bundle_dir().join(name);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        // Hold the path before writing so a failed write still cleans up.
        let bundle = Self { path };
        file.write_all(bytes)?;
        file.flush()?;

        debug!(path = %bundle.path.display(), bytes = bytes.len(), "Bundle persisted");
        Ok(bundle)
    }

    /// Location of the persisted bundle.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BundleFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Bundle removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove bundle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_bundle() {
        assert_eq!(decode_bundle("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_ignores_line_breaks() {
        assert_eq!(decode_bundle("aGVs\nbG8=\r\n").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        let err = decode_bundle("not base64!").unwrap_err();
        assert!(matches!(err, LoadError::BadEncoding { .. }));
    }

    #[test]
    fn test_decode_rejects_empty() {
        let err = decode_bundle("").unwrap_err();
        assert!(matches!(err, LoadError::BadEncoding { .. }));
    }

    #[test]
    fn test_persist_unique_and_removed_on_drop() {
        let config = LoaderConfig::default();

        let first = BundleFile::persist(b"one", &config).unwrap();
        let second = BundleFile::persist(b"two", &config).unwrap();

        assert_ne!(first.path(), second.path());
        assert_eq!(std::fs::read(first.path()).unwrap(), b"one");

        let name = first.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("useraction-"));
        assert!(name.ends_with(".wasm"));

        let path = first.path().to_path_buf();
        drop(first);
        assert!(!path.exists());
        assert!(second.path().exists());
    }

    #[test]
    fn test_persist_into_missing_dir_fails() {
        let config = LoaderConfig {
            bundle_dir: Some(PathBuf::from("/nonexistent/action-runtime-bundles")),
            ..Default::default()
        };
        assert!(BundleFile::persist(b"bytes", &config).is_err());
    }
}
