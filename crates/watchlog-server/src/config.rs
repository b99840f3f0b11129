//! Server configuration: a TOML file overlaid by `WATCHLOG_*` environment
//! variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

/// Runtime server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  #[serde(default)]
  pub tmdb_api_key:       String,
  #[serde(default = "default_tmdb_base_url")]
  pub tmdb_base_url:      String,
  #[serde(default = "default_true")]
  pub automate_statuses:  bool,
  /// Finished jobs older than this are dropped. Unset keeps every job.
  #[serde(default)]
  pub job_retention_secs: Option<u64>,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 3080 }

fn default_store_path() -> PathBuf { PathBuf::from("watchlog.db") }

fn default_tmdb_base_url() -> String { "https://api.themoviedb.org/3".to_string() }

fn default_true() -> bool { true }

/// Read `path` (optional) and the environment.
pub fn load(path: &Path) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("WATCHLOG"))
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(toml: &str) -> ServerConfig {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_file_uses_defaults() {
    let cfg = parse("");
    assert_eq!(cfg.port, 3080);
    assert_eq!(cfg.tmdb_base_url, "https://api.themoviedb.org/3");
    assert!(cfg.automate_statuses);
    assert!(cfg.job_retention_secs.is_none());
  }

  #[test]
  fn explicit_values_win() {
    let cfg = parse(
      r#"
        port = 9000
        automate_statuses = false
        job_retention_secs = 1800
      "#,
    );
    assert_eq!(cfg.port, 9000);
    assert!(!cfg.automate_statuses);
    assert_eq!(cfg.job_retention_secs, Some(1800));
  }

  #[test]
  fn tilde_is_left_alone_mid_path() {
    let p = Path::new("/data/~/watchlog.db");
    assert_eq!(expand_tilde(p), p.to_path_buf());
  }
}
