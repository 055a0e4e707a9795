//! # File Uploads
//!
//! Validation and storage for upload routes.
//!
//! Checks run in a fixed order: file count, per-file host error, size,
//! then extension. Only when every file passes are they moved into the
//! upload directory as `<uuid>.<ext>`.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A file received by the host, still at its temporary location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Client-supplied file name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Temporary location written by the host
    pub temp_path: PathBuf,
    /// Upload error reported by the host, if any
    pub error: Option<String>,
}

impl UploadedFile {
    /// File received without error
    #[must_use]
    pub fn new(name: impl Into<String>, size: u64, temp_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            size,
            temp_path: temp_path.into(),
            error: None,
        }
    }

    /// Mark the file as failed by the host
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Extension of the client file name, without the dot
    #[must_use]
    pub fn extension(&self) -> &str {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
    }
}

/// Upload route settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Directory files are stored in, created if missing
    pub upload_dir: PathBuf,
    /// Whether more than one file may be sent
    pub allow_multiple_files: bool,
    /// Allowed extensions, empty for any
    pub allowed_extensions: Vec<String>,
    /// Max size per file in bytes, 0 for no limit
    pub max_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            allow_multiple_files: true,
            allowed_extensions: Vec::new(),
            max_size: 0,
        }
    }
}

impl UploadConfig {
    /// Settings storing into `upload_dir`
    #[must_use]
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            ..Self::default()
        }
    }

    /// Allow or forbid multiple files
    #[must_use]
    pub const fn allow_multiple_files(mut self, allow: bool) -> Self {
        self.allow_multiple_files = allow;
        self
    }

    /// Restrict accepted extensions (compared case-insensitively)
    #[must_use]
    pub fn allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the size limit from text such as `"2MB"` or `"200KB"`
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the size cannot be parsed.
    pub fn max_size(mut self, size: &str) -> Result<Self> {
        self.max_size = parse_size(size)?;
        Ok(self)
    }

    /// Set the size limit in bytes
    #[must_use]
    pub const fn max_size_bytes(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    /// Check every file against the settings
    ///
    /// # Errors
    ///
    /// Returns the first failed check: `MultipleFilesNotAllowed`,
    /// `FileUploadError`, `FileSizeExceeded` or `FileTypeNotAllowed`.
    pub fn validate(&self, files: &[UploadedFile]) -> Result<()> {
        if !self.allow_multiple_files && files.len() > 1 {
            return Err(Error::MultipleFilesNotAllowed);
        }

        for file in files {
            if let Some(error) = &file.error {
                return Err(Error::FileUploadError(error.clone()));
            }
            if self.max_size > 0 && file.size > self.max_size {
                return Err(Error::FileSizeExceeded {
                    name: file.name.clone(),
                    limit: self.max_size,
                });
            }
            let ext = file.extension();
            if !self.allowed_extensions.is_empty()
                && !self
                    .allowed_extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            {
                return Err(Error::FileTypeNotAllowed(ext.to_string()));
            }
        }
        Ok(())
    }

    /// Validate then move every file into the upload directory
    ///
    /// # Errors
    ///
    /// Returns validation errors, or `Error::FileUploadError` if a file
    /// cannot be moved. Files already stored by this call are removed
    /// again in that case.
    pub fn store(&self, files: &[UploadedFile]) -> Result<Vec<PathBuf>> {
        self.validate(files)?;
        fs::create_dir_all(&self.upload_dir)?;

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            let id = uuid::Uuid::new_v4();
            let target = match file.extension() {
                "" => self.upload_dir.join(id.to_string()),
                ext => self.upload_dir.join(format!("{id}.{ext}")),
            };
            if let Err(e) = move_file(&file.temp_path, &target) {
                discard(&stored);
                return Err(Error::FileUploadError(format!("{}: {e}", file.name)));
            }
            debug!(name = %file.name, target = %target.display(), "Stored uploaded file");
            stored.push(target);
        }

        info!(count = stored.len(), dir = %self.upload_dir.display(), "Upload completed");
        Ok(stored)
    }
}

/// Remove stored uploads whose request did not reach its handler
pub fn discard(stored: &[PathBuf]) {
    for path in stored {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), "Could not remove stored upload: {}", e);
        }
    }
}

/// Rename, falling back to copy and remove across filesystems
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

/// Parse a size such as `"2MB"`, `"200KB"`, `"1GB"` or `"512"` into bytes.
///
/// Units are base 1024 and case-insensitive. `"0"` means no limit.
///
/// # Errors
///
/// Returns `Error::InvalidConfig` for an unknown unit or a non-numeric amount.
pub fn parse_size(size: &str) -> Result<u64> {
    let text = size.trim().to_ascii_uppercase();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (amount, unit) = text.split_at(split);

    let invalid = |reason: &str| Error::InvalidConfig {
        key: "upload_max_size".to_string(),
        reason: format!("{reason}: {size}"),
    };

    let amount: u64 = amount.parse().map_err(|_| invalid("not a number"))?;
    let factor: u64 = match unit.trim() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        _ => return Err(invalid("unknown unit")),
    };
    amount.checked_mul(factor).ok_or_else(|| invalid("too large"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn temp_file(dir: &TempDir, name: &str, content: &[u8]) -> UploadedFile {
        let path = dir.path().join(format!("tmp-{name}"));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content).unwrap();
        UploadedFile::new(name, content.len() as u64, path)
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("2MB").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size("200KB").unwrap(), 200 * 1024);
        assert_eq!(parse_size("10mb").unwrap(), 10 * 1024 * 1024);
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("0").unwrap(), 0);
        assert!(matches!(parse_size("2XB"), Err(Error::InvalidConfig { .. })));
        assert!(parse_size("MB").is_err());
    }

    #[test]
    fn test_validate_order() {
        let config = UploadConfig::default()
            .allow_multiple_files(false)
            .allowed_extensions(["png"])
            .max_size_bytes(10);

        let big = UploadedFile::new("a.gif", 100, "/tmp/a");
        let two = [big.clone(), big.clone()];
        assert!(matches!(config.validate(&two), Err(Error::MultipleFilesNotAllowed)));

        let failed = [big.clone().with_error("partial")];
        assert!(matches!(config.validate(&failed), Err(Error::FileUploadError(_))));

        assert!(matches!(
            config.validate(&[big]),
            Err(Error::FileSizeExceeded { limit: 10, .. })
        ));

        let small = UploadedFile::new("a.gif", 5, "/tmp/a");
        assert!(matches!(
            config.validate(&[small]),
            Err(Error::FileTypeNotAllowed(ref ext)) if ext == "gif"
        ));
    }

    #[test]
    fn test_extension_case_insensitive() {
        let config = UploadConfig::default().allowed_extensions(["PNG"]);
        assert!(config.validate(&[UploadedFile::new("photo.png", 1, "/tmp/p")]).is_ok());
    }

    #[test]
    fn test_store_moves_files() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("nested").join("uploads");
        let config = UploadConfig::new(&target).max_size("1KB").unwrap();

        let file = temp_file(&tmp, "report.pdf", b"%PDF-1.4");
        let stored = config.store(&[file.clone()]).unwrap();

        assert_eq!(stored.len(), 1);
        assert!(stored[0].starts_with(&target));
        assert_eq!(stored[0].extension().and_then(|e| e.to_str()), Some("pdf"));
        assert_eq!(fs::read(&stored[0]).unwrap(), b"%PDF-1.4");
        assert!(!file.temp_path.exists());
    }

    #[test]
    fn test_store_rejects_before_moving() {
        let tmp = TempDir::new().unwrap();
        let config = UploadConfig::new(tmp.path().join("out")).allowed_extensions(["jpg"]);
        let file = temp_file(&tmp, "script.sh", b"echo");

        assert!(config.store(&[file.clone()]).is_err());
        assert!(file.temp_path.exists());
        assert!(!tmp.path().join("out").exists());
    }

    #[test]
    fn test_store_failure_removes_moved_files() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("out");
        let config = UploadConfig::new(&target);
        let present = temp_file(&tmp, "a.txt", b"a");
        let vanished = UploadedFile::new("b.txt", 1, tmp.path().join("missing"));

        let err = config.store(&[present, vanished]).unwrap_err();
        assert!(matches!(err, Error::FileUploadError(_)));
        assert_eq!(fs::read_dir(&target).unwrap().count(), 0);
    }
}
