use std::path::Path;

use sqlshift_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

const CANDIDATES: &[&str] = &["sqlshift.yml", "sqlshift.yaml", "sqlshift.toml"];

/// Reads `AppConfig` from YAML or TOML files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `path`, picking the parser from its extension.
    pub fn load(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config: AppConfig = match ext {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}")))?,
            "toml" => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}")))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension: {other}"
                )));
            }
        };

        config.validate()?;
        info!("config loaded from {}", path.display());
        Ok(config)
    }

    /// Load the first `sqlshift.{yml,yaml,toml}` found in `dir`, or defaults.
    pub fn discover(dir: &Path) -> Result<AppConfig> {
        for name in CANDIDATES {
            let path = dir.join(name);
            if path.is_file() {
                return Self::load(&path);
            }
        }

        debug!("no config file in {}, using defaults", dir.display());
        Ok(AppConfig::default())
    }
}
