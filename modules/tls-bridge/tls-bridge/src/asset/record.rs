use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use crate::error::ClientError;

/// File name of the version record inside the install directory.
pub const RECORD_FILE: &str = ".version";

/// The installed artifact: a single `"<filename> <version>"` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub filename: String,
    pub version: String,
}

impl AssetRecord {
    #[must_use]
    pub fn new(filename: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            version: version.into(),
        }
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let (filename, version) = text.trim().split_once(' ')?;
        let version = version.trim();
        if filename.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self::new(filename, version))
    }

    #[must_use]
    pub fn render(&self) -> String {
        format!("{} {}", self.filename, self.version)
    }
}

fn record_path(dir: &Path) -> PathBuf {
    dir.join(RECORD_FILE)
}

/// Read the record in `dir`; `None` when absent or unreadable as a record.
///
/// # Errors
/// I/O failures other than the file being missing.
pub async fn read(dir: &Path) -> Result<Option<AssetRecord>, ClientError> {
    match tokio::fs::read_to_string(record_path(dir)).await {
        Ok(text) => Ok(AssetRecord::parse(&text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Replace the record in `dir` atomically.
///
/// # Errors
/// I/O failures creating or renaming the file.
pub async fn write(dir: &Path, record: &AssetRecord) -> Result<(), ClientError> {
    let dir = dir.to_path_buf();
    let line = record.render();
    tokio::task::spawn_blocking(move || -> io::Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".version-")
            .tempfile_in(&dir)?;
        tmp.write_all(line.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(record_path(&dir))?;
        Ok(())
    })
    .await??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_render() {
        let record = AssetRecord::parse("tls-client-linux-amd64-1.7.2.so 1.7.2\n").unwrap();
        assert_eq!(record, AssetRecord::new("tls-client-linux-amd64-1.7.2.so", "1.7.2"));
        assert_eq!(record.render(), "tls-client-linux-amd64-1.7.2.so 1.7.2");
        assert_eq!(AssetRecord::parse("garbage"), None);
        assert_eq!(AssetRecord::parse(""), None);
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read(dir.path()).await.unwrap(), None);

        let record = AssetRecord::new("engine.so", "2.0.0");
        write(dir.path(), &record).await.unwrap();
        assert_eq!(read(dir.path()).await.unwrap(), Some(record));

    }
}
