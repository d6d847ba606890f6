use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use belet_api::ClientConfig;

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("belet").join("config.toml"))
}

/// Load the client configuration.
///
/// An explicit path must exist; the default location is optional and falls
/// back to built-in defaults.
pub fn load(path: Option<&Path>) -> Result<ClientConfig> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match default_config_path() {
            Some(path) => (path, false),
            None => return Ok(ClientConfig::default()),
        },
    };

    if !path.exists() {
        if explicit {
            bail!("configuration file {} does not exist", path.display());
        }
        return Ok(ClientConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: ClientConfig =
        toml::from_str(&content).with_context(|| format!("invalid configuration in {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
