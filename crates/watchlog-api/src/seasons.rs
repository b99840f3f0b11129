//! Handlers for season endpoints.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use watchlog_core::{
  activity::{Activity, SeasonOrigin},
  catalog::ContentCatalog,
  progress::{SeasonProgress, WatchStatus},
  store::ProgressStore,
  tracker::SeasonUpsert,
};

use crate::{AppState, error::ApiError, owner::Owner};

/// `GET /titles/{id}/seasons`
pub async fn list<S, C>(
  State(state): State<AppState<S, C>>,
  Owner(owner): Owner,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<SeasonProgress>>, ApiError>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  Ok(Json(state.tracker.list_seasons(owner, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpsertBody {
  pub season: u32,
  pub status: Option<WatchStatus>,
  #[serde(default)]
  pub rating: u8,
}

#[derive(Debug, Serialize)]
pub struct UpsertResponse {
  pub season:   SeasonProgress,
  pub activity: Option<Activity>,
}

/// `POST /titles/{id}/seasons`
pub async fn upsert<S, C>(
  State(state): State<AppState<S, C>>,
  Owner(owner): Owner,
  Path(id): Path<Uuid>,
  Json(body): Json<UpsertBody>,
) -> Result<Json<UpsertResponse>, ApiError>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  let (season, activity) = state
    .tracker
    .upsert_season(owner, SeasonUpsert {
      title_id: id,
      season:   body.season,
      status:   body.status,
      rating:   body.rating,
      origin:   SeasonOrigin::Manual,
      backdate: None,
    })
    .await?;
  Ok(Json(UpsertResponse { season, activity }))
}

/// `DELETE /titles/{id}/seasons/{season_id}`
pub async fn remove<S, C>(
  State(state): State<AppState<S, C>>,
  Owner(owner): Owner,
  Path((id, season_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  state.tracker.remove_season(owner, id, season_id).await?;
  Ok(StatusCode::NO_CONTENT)
}
