//! The content-metadata provider consumed by the core.
//!
//! Implementations live outside this crate (e.g. the TMDB client in
//! `watchlog-server`). [`FixedCatalog`] is an in-memory implementation for
//! tests and offline use.

use std::{
  collections::HashMap,
  future::Future,
  sync::{PoisonError, RwLock},
};

use thiserror::Error;

use crate::progress::{ContentKind, ContentRef};

/// Source of canonical episode counts and descriptive content fields.
pub trait ContentCatalog: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Number of episodes the catalog lists for `season` of show
  /// `content_id`.
  fn season_episode_count(
    &self,
    content_id: i64,
    season: u32,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + '_;

  /// Resolve the denormalised reference stored on a title row.
  fn describe(
    &self,
    kind: ContentKind,
    content_id: i64,
  ) -> impl Future<Output = Result<ContentRef, Self::Error>> + Send + '_;
}

// ─── FixedCatalog ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FixedCatalogError {
  #[error("no {0} with id {1} in catalog")]
  UnknownContent(ContentKind, i64),

  #[error("show {0} has no season {1} in catalog")]
  UnknownSeason(i64, u32),
}

/// A catalog backed by maps filled in ahead of time.
#[derive(Debug, Default)]
pub struct FixedCatalog {
  names:   RwLock<HashMap<(ContentKind, i64), String>>,
  seasons: RwLock<HashMap<(i64, u32), u32>>,
}

impl FixedCatalog {
  pub fn new() -> Self { Self::default() }

  pub fn with_content(
    self,
    kind: ContentKind,
    content_id: i64,
    name: impl Into<String>,
  ) -> Self {
    self
      .names
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert((kind, content_id), name.into());
    self
  }

  pub fn with_season(self, content_id: i64, season: u32, episodes: u32) -> Self {
    self.set_season(content_id, season, episodes);
    self
  }

  /// Replace the canonical count for a season (catalogs get edited).
  pub fn set_season(&self, content_id: i64, season: u32, episodes: u32) {
    self
      .seasons
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert((content_id, season), episodes);
  }
}

impl ContentCatalog for FixedCatalog {
  type Error = FixedCatalogError;

  async fn season_episode_count(
    &self,
    content_id: i64,
    season: u32,
  ) -> Result<u32, FixedCatalogError> {
    self
      .seasons
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(&(content_id, season))
      .copied()
      .ok_or(FixedCatalogError::UnknownSeason(content_id, season))
  }

  async fn describe(
    &self,
    kind: ContentKind,
    content_id: i64,
  ) -> Result<ContentRef, FixedCatalogError> {
    let names = self.names.read().unwrap_or_else(PoisonError::into_inner);
    let name = names
      .get(&(kind, content_id))
      .ok_or(FixedCatalogError::UnknownContent(kind, content_id))?;
    Ok(ContentRef {
      kind,
      content_id,
      name: name.clone(),
    })
  }
}
