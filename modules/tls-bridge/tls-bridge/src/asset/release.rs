use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt as _;
use serde::Deserialize;
use tokio::io::AsyncWriteExt as _;
use tracing::{debug, warn};

use crate::config::AssetConfig;
use crate::error::ClientError;

const RELEASE_ACCEPT: &str = "application/vnd.github.v3+json";

/// One downloadable file of a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// The latest published engine release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Tag with any leading `v` removed.
    pub version: String,
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|asset| asset.name == name)
    }
}

#[derive(Deserialize)]
struct ReleaseDocument {
    tag_name: String,
    #[serde(default)]
    assets: Option<Vec<ReleaseAsset>>,
}

impl From<ReleaseDocument> for Release {
    fn from(doc: ReleaseDocument) -> Self {
        let version = doc
            .tag_name
            .strip_prefix('v')
            .unwrap_or(&doc.tag_name)
            .to_owned();
        Self {
            version,
            assets: doc.assets.unwrap_or_default(),
        }
    }
}

/// Release metadata lookups and artifact downloads.
#[derive(Debug, Clone)]
pub(crate) struct ReleaseClient {
    http: reqwest::Client,
    release_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl ReleaseClient {
    pub(crate) fn new(config: &AssetConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            http,
            release_url: config.release_url.clone(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        })
    }

    /// Fetch the latest release, retrying up to `max_retries` times.
    pub(crate) async fn latest(&self) -> Result<Release, ClientError> {
        let mut attempt = 0;
        loop {
            match self.fetch_latest().await {
                Ok(release) => return Ok(release),
                Err(err) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        error = %err,
                        "release lookup failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_latest(&self) -> Result<Release, ClientError> {
        let response = self
            .http
            .get(&self.release_url)
            .header(reqwest::header::ACCEPT, RELEASE_ACCEPT)
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("release lookup failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Network(format!(
                "release lookup returned {status}"
            )));
        }
        let document: ReleaseDocument = response
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("invalid release metadata: {e}")))?;
        let release = Release::from(document);
        debug!(version = %release.version, assets = release.assets.len(), "fetched release metadata");
        Ok(release)
    }

    /// Stream `asset` to `dest`. The file appears only once complete.
    pub(crate) async fn download(&self, asset: &ReleaseAsset, dest: &Path) -> Result<u64, ClientError> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        let response = self
            .http
            .get(&asset.browser_download_url)
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("download of {} failed: {e}", asset.name)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Network(format!(
                "download of {} returned {status}",
                asset.name
            )));
        }

        let (file, tmp_path) = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(parent)?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);
        let mut stream = response.bytes_stream();
        let mut written = 0_u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ClientError::Network(format!("download of {} interrupted: {e}", asset.name)))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        tmp_path.persist(dest).map_err(std::io::Error::from)?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_prefix_is_stripped() {
        let release = Release::from(ReleaseDocument {
            tag_name: "v1.7.2".to_owned(),
            assets: None,
        });
        assert_eq!(release.version, "1.7.2");
        assert!(release.assets.is_empty());

        let release = Release::from(ReleaseDocument {
            tag_name: "1.8.0".to_owned(),
            assets: Some(vec![ReleaseAsset {
                name: "a.so".to_owned(),
                browser_download_url: "https://dl/a.so".to_owned(),
            }]),
        });
        assert_eq!(release.version, "1.8.0");
        assert!(release.find("a.so").is_some());
        assert!(release.find("b.so").is_none());
    }
}
