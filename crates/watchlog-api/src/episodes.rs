//! Handlers for episode endpoints.
//!
//! `POST /titles/{id}/episodes` runs status propagation and returns its
//! report alongside the title's episode rows.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;
use watchlog_core::{
  catalog::ContentCatalog,
  progress::{EpisodeProgress, WatchStatus},
  store::ProgressStore,
  tracker::{EpisodeUpsert, EpisodeUpsertOutcome},
};

use crate::{AppState, error::ApiError, owner::Owner};

/// `GET /titles/{id}/episodes`
pub async fn list<S, C>(
  State(state): State<AppState<S, C>>,
  Owner(owner): Owner,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<EpisodeProgress>>, ApiError>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  Ok(Json(state.tracker.list_episodes(owner, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpsertBody {
  pub season:  u32,
  pub episode: u32,
  pub status:  Option<WatchStatus>,
  #[serde(default)]
  pub rating:  u8,
}

/// `POST /titles/{id}/episodes`
pub async fn upsert<S, C>(
  State(state): State<AppState<S, C>>,
  Owner(owner): Owner,
  Path(id): Path<Uuid>,
  Json(body): Json<UpsertBody>,
) -> Result<Json<EpisodeUpsertOutcome>, ApiError>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  let mut req = EpisodeUpsert::new(id, body.season, body.episode).rating(body.rating);
  req.status = body.status;
  Ok(Json(state.tracker.upsert_episode(owner, req).await?))
}

/// `DELETE /titles/{id}/episodes/{episode_id}`
pub async fn remove<S, C>(
  State(state): State<AppState<S, C>>,
  Owner(owner): Owner,
  Path((id, episode_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  state.tracker.remove_episode(owner, id, episode_id).await?;
  Ok(StatusCode::NO_CONTENT)
}
