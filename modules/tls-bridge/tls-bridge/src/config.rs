use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Prefix for environment overrides, e.g. `TLS_BRIDGE_INSTALL_DIR`.
pub const ENV_PREFIX: &str = "TLS_BRIDGE_";

const DEFAULT_RELEASE_URL: &str = "https://api.github.com/repos/bogdanfinn/tls-client/releases/latest";
const DEFAULT_COMPONENT: &str = "tls-client";

/// Where and how the engine binary is installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory holding the engine library and its version record.
    pub install_dir: PathBuf,
    /// Release metadata endpoint returning `tag_name` and `assets`.
    pub release_url: String,
    /// Asset name prefix.
    pub component: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub user_agent: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        let install_dir = dirs::data_local_dir().map_or_else(
            || PathBuf::from("dependencies"),
            |dir| dir.join("tls-bridge").join("dependencies"),
        );
        Self {
            install_dir,
            release_url: DEFAULT_RELEASE_URL.to_owned(),
            component: DEFAULT_COMPONENT.to_owned(),
            max_retries: 3,
            retry_delay_ms: 100,
            user_agent: concat!("tls-bridge/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl AssetConfig {
    /// Defaults overlaid by `TLS_BRIDGE_*` environment variables.
    ///
    /// # Errors
    /// [`ClientError::Config`] when a value has the wrong type.
    pub fn load() -> Result<Self, ClientError> {
        Ok(Self::figment(None).extract()?)
    }

    /// Defaults, then the YAML file at `path`, then the environment.
    ///
    /// # Errors
    /// [`ClientError::Config`] when the file or a value is invalid.
    pub fn load_from(path: &Path) -> Result<Self, ClientError> {
        Ok(Self::figment(Some(path)).extract()?)
    }

    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_upstream_releases() {
        let config = AssetConfig::default();
        assert_eq!(config.component, "tls-client");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay(), Duration::from_millis(100));
        assert!(config.install_dir.ends_with("dependencies"));
    }

    #[test]
    fn yaml_then_env_override_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "bridge.yaml",
                "component: custom-engine\nmax_retries: 1\ninstall_dir: /opt/engine\n",
            )?;
            jail.set_env("TLS_BRIDGE_MAX_RETRIES", "5");

            let config = AssetConfig::load_from(Path::new("bridge.yaml")).map_err(|e| e.to_string())?;

            assert_eq!(config.component, "custom-engine");
            assert_eq!(config.max_retries, 5);
            assert_eq!(config.install_dir, PathBuf::from("/opt/engine"));
            assert_eq!(config.release_url, DEFAULT_RELEASE_URL);
            Ok(())
        });
    }

    #[test]
    fn invalid_value_is_a_config_error() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TLS_BRIDGE_MAX_RETRIES", "many");
            let err = AssetConfig::load().unwrap_err();
            assert!(matches!(err, ClientError::Config(_)));
            Ok(())
        });
    }
}
