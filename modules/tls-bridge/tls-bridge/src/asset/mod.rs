//! Installation of the versioned engine binary.
//!
//! The install directory holds one engine library plus a `.version` record
//! naming it. [`AssetManager`] keeps the two consistent: the record is
//! written only after the library it names is fully on disk, and all
//! installs go through one lock.

mod platform;
pub mod record;
mod release;

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{info, warn};

pub use platform::Platform;
pub use record::AssetRecord;
pub use release::{Release, ReleaseAsset};

use crate::config::AssetConfig;
use crate::error::ClientError;
use release::ReleaseClient;

/// Result of [`AssetManager::update_if_necessary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate(AssetRecord),
    Updated { previous: String, record: AssetRecord },
}

/// Resolves, downloads and records the engine artifact for one platform.
#[derive(Debug)]
pub struct AssetManager {
    config: AssetConfig,
    platform: Platform,
    releases: ReleaseClient,
    install_lock: Mutex<()>,
}

impl AssetManager {
    /// Manage assets for the current host.
    ///
    /// # Errors
    /// [`ClientError::Reqwest`] if the HTTP client cannot be built.
    pub fn new(config: AssetConfig) -> Result<Self, ClientError> {
        Self::with_platform(config, Platform::current())
    }

    /// Manage assets for an explicit platform.
    ///
    /// # Errors
    /// [`ClientError::Reqwest`] if the HTTP client cannot be built.
    pub fn with_platform(config: AssetConfig, platform: Platform) -> Result<Self, ClientError> {
        let releases = ReleaseClient::new(&config)?;
        Ok(Self {
            config,
            platform,
            releases,
            install_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AssetConfig {
        &self.config
    }

    #[must_use]
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    #[must_use]
    pub fn install_dir(&self) -> &Path {
        &self.config.install_dir
    }

    /// Artifact file name for `version` on this platform.
    #[must_use]
    pub fn asset_name(&self, version: &str) -> String {
        self.platform.asset_name(&self.config.component, version)
    }

    /// # Errors
    /// I/O failures reading the record.
    pub async fn read_version_record(&self) -> Result<Option<AssetRecord>, ClientError> {
        record::read(self.install_dir()).await
    }

    /// # Errors
    /// [`ClientError::Network`] once retries are exhausted.
    pub async fn latest_release(&self) -> Result<Release, ClientError> {
        self.releases.latest().await
    }

    /// Install the latest release unless a recorded artifact is present.
    ///
    /// Makes no network call when the record names an existing file.
    ///
    /// # Errors
    /// - [`ClientError::Network`] when release metadata or the download fails.
    /// - [`ClientError::ResourceNotFound`] when the release has no assets.
    /// - [`ClientError::Configuration`] when no asset matches this platform.
    pub async fn download_if_necessary(&self) -> Result<AssetRecord, ClientError> {
        let _guard = self.install_lock.lock().await;
        if let Some(record) = self.installed_record().await? {
            return Ok(record);
        }
        let release = self.releases.latest().await?;
        self.install(&release).await
    }

    /// Replace the installed artifact if a newer release exists.
    ///
    /// # Errors
    /// [`ClientError::ResourceNotFound`] when nothing is installed yet, plus
    /// the failures of [`download_if_necessary`](Self::download_if_necessary).
    pub async fn update_if_necessary(&self) -> Result<UpdateOutcome, ClientError> {
        let _guard = self.install_lock.lock().await;
        let current = self.read_version_record().await?.ok_or_else(|| {
            ClientError::ResourceNotFound(format!(
                "no version record in {}; download the engine first",
                self.install_dir().display()
            ))
        })?;
        let release = self.releases.latest().await?;
        if release.version == current.version {
            info!(version = %current.version, "engine is up to date");
            return Ok(UpdateOutcome::UpToDate(current));
        }
        warn!(
            installed = %current.version,
            latest = %release.version,
            "installed engine is outdated, updating"
        );
        let record = self.install(&release).await?;
        Ok(UpdateOutcome::Updated {
            previous: current.version,
            record,
        })
    }

    /// Path of a usable engine library, installing one into an empty
    /// directory first.
    ///
    /// # Errors
    /// [`ClientError::ResourceNotFound`] when the directory has files but no
    /// record, or the recorded file is missing; plus download failures.
    pub async fn ensure_ready(&self) -> Result<PathBuf, ClientError> {
        let dir = self.install_dir().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let record = match self.read_version_record().await? {
            Some(record) => record,
            None if !has_visible_files(&dir).await? => {
                info!(dir = %dir.display(), "no engine installed, downloading");
                self.download_if_necessary().await?
            }
            None => {
                return Err(ClientError::ResourceNotFound(format!(
                    "no version record in {}",
                    dir.display()
                )));
            }
        };

        let path = dir.join(&record.filename);
        if !tokio::fs::try_exists(&path).await? {
            return Err(ClientError::ResourceNotFound(format!(
                "unable to find asset {} for version {}",
                record.filename, record.version
            )));
        }
        Ok(path)
    }

    /// Remove every file in the install directory, the record included.
    ///
    /// # Errors
    /// I/O failures other than the directory being missing.
    pub async fn clean(&self) -> Result<usize, ClientError> {
        let _guard = self.install_lock.lock().await;
        let mut entries = match tokio::fs::read_dir(self.install_dir()).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        info!(dir = %self.install_dir().display(), removed, "cleaned install directory");
        Ok(removed)
    }

    async fn installed_record(&self) -> Result<Option<AssetRecord>, ClientError> {
        let Some(record) = self.read_version_record().await? else {
            return Ok(None);
        };
        let present = tokio::fs::try_exists(self.install_dir().join(&record.filename)).await?;
        Ok(present.then_some(record))
    }

    /// Install `release` for this platform. Caller holds the install lock.
    async fn install(&self, release: &Release) -> Result<AssetRecord, ClientError> {
        if release.assets.is_empty() {
            return Err(ClientError::ResourceNotFound(format!(
                "release {} does not have any assets",
                release.version
            )));
        }
        let name = self.asset_name(&release.version);
        let dir = self.install_dir();
        let target = dir.join(&name);
        let record = AssetRecord::new(name.as_str(), release.version.as_str());

        if tokio::fs::try_exists(&target).await? {
            info!(asset = %name, "asset already on disk, recording it");
            record::write(dir, &record).await?;
            return Ok(record);
        }
        let asset = release.find(&name).ok_or_else(|| {
            ClientError::Configuration(format!(
                "unable to find asset {name} for version {}",
                release.version
            ))
        })?;

        tokio::fs::create_dir_all(dir).await?;
        info!(asset = %name, version = %release.version, "downloading engine");
        let bytes = self.releases.download(asset, &target).await?;
        record::write(dir, &record).await?;
        info!(asset = %name, bytes, "installed engine");
        Ok(record)
    }
}

async fn has_visible_files(dir: &Path) -> Result<bool, ClientError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_name().to_string_lossy().starts_with('.') {
            return Ok(true);
        }
    }
    Ok(false)
}
