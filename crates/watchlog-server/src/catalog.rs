//! [`TmdbCatalog`]: a [`ContentCatalog`] over a TMDB-compatible HTTP API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use watchlog_core::{
  catalog::ContentCatalog,
  progress::{ContentKind, ContentRef},
};

#[derive(Debug, Error)]
pub enum TmdbError {
  #[error("catalog request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("catalog has no metadata for {0}s")]
  Unsupported(ContentKind),
}

#[derive(Debug, Deserialize)]
struct SeasonDetails {
  #[serde(default)]
  episodes: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct MovieDetails {
  title: String,
}

#[derive(Debug, Deserialize)]
struct ShowDetails {
  name: String,
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct TmdbCatalog {
  client:   Client,
  base_url: String,
  api_key:  String,
}

impl TmdbCatalog {
  pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, TmdbError> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self {
      client,
      base_url: base_url.into(),
      api_key: api_key.into(),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url.trim_end_matches('/'), path)
  }

  async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, TmdbError> {
    let resp = self
      .client
      .get(self.url(path))
      .query(&[("api_key", self.api_key.as_str())])
      .send()
      .await?
      .error_for_status()?;
    Ok(resp.json().await?)
  }
}

impl ContentCatalog for TmdbCatalog {
  type Error = TmdbError;

  async fn season_episode_count(&self, content_id: i64, season: u32) -> Result<u32, TmdbError> {
    let details: SeasonDetails = self.get(&format!("/tv/{content_id}/season/{season}")).await?;
    let count = u32::try_from(details.episodes.len()).unwrap_or(u32::MAX);
    tracing::debug!(content_id, season, count, "canonical episode count");
    Ok(count)
  }

  async fn describe(&self, kind: ContentKind, content_id: i64) -> Result<ContentRef, TmdbError> {
    let name = match kind {
      ContentKind::Movie => {
        self
          .get::<MovieDetails>(&format!("/movie/{content_id}"))
          .await?
          .title
      }
      ContentKind::Show => {
        self
          .get::<ShowDetails>(&format!("/tv/{content_id}"))
          .await?
          .name
      }
      ContentKind::Game => return Err(TmdbError::Unsupported(kind)),
    };
    Ok(ContentRef {
      kind,
      content_id,
      name,
    })
  }
}
