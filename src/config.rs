use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::rates::Endpoints;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Where the store, the cache and the log live
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_base_url")]
  pub base_url: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
    }
  }
}

fn default_base_url() -> String {
  "https://free.currconv.com/api/v7".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_prefix")]
  pub prefix: String,
  /// Bumping this installs a new static generation
  #[serde(default = "default_version")]
  pub version: String,
  /// Fetched at install; defaults to the currency list endpoint
  #[serde(default)]
  pub shell_assets: Vec<String>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      prefix: default_prefix(),
      version: default_version(),
      shell_assets: Vec::new(),
    }
  }
}

fn default_prefix() -> String {
  "convter".to_string()
}

fn default_version() -> String {
  "v1".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./convter.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/convter/config.yaml
  ///
  /// Without any file the built-in defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("convter.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("convter").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file is a valid "all defaults" config
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Get the rate provider API key from the environment, if set.
  ///
  /// Checks CONVTER_API_KEY.
  pub fn api_key() -> Option<String> {
    std::env::var("CONVTER_API_KEY")
      .ok()
      .filter(|key| !key.trim().is_empty())
  }

  pub fn data_dir(&self) -> Result<PathBuf> {
    match &self.data_dir {
      Some(dir) => Ok(dir.clone()),
      None => crate::db::default_data_dir().map_err(|e| eyre!("{}", e)),
    }
  }

  pub fn endpoints(&self) -> Result<Endpoints> {
    Endpoints::new(&self.api.base_url).map_err(|e| eyre!("{}", e))
  }

  /// Assets fetched into the static generation at install
  pub fn shell_asset_urls(&self) -> Result<Vec<Url>> {
    if self.cache.shell_assets.is_empty() {
      return Ok(vec![self.endpoints()?.currencies()]);
    }

    self
      .cache
      .shell_assets
      .iter()
      .map(|s| Url::parse(s).map_err(|e| eyre!("Bad shell asset url '{}': {}", s, e)))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.api.base_url, "https://free.currconv.com/api/v7");
    assert_eq!(config.cache.prefix, "convter");
    assert_eq!(config.cache.version, "v1");
    assert_eq!(
      config.shell_asset_urls().unwrap()[0].as_str(),
      "https://free.currconv.com/api/v7/currencies?"
    );
  }

  #[test]
  fn test_partial_file() {
    let config = Config::parse(
      "cache:\n  version: v3\n  shell_assets:\n    - https://rates.test/app.css\ndata_dir: /tmp/convter-test\n",
    )
    .unwrap();

    assert_eq!(config.cache.version, "v3");
    assert_eq!(config.cache.prefix, "convter");
    assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/convter-test"));
    assert_eq!(
      config.shell_asset_urls().unwrap(),
      vec![Url::parse("https://rates.test/app.css").unwrap()]
    );
  }

  #[test]
  fn test_missing_explicit_path() {
    assert!(Config::load(Some(Path::new("/nonexistent/convter.yaml"))).is_err());
  }

  #[test]
  fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("convter.yaml");
    std::fs::write(&path, "api:\n  base_url: https://rates.test/api\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(
      config.endpoints().unwrap().convert().as_str(),
      "https://rates.test/api/convert"
    );
  }
}
