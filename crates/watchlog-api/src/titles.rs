//! Handlers for `/titles` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/titles` | Live titles of the owner |
//! | `POST`   | `/titles` | Body: `{"kind":"show","content_id":1399}`; 409 if tracked |
//! | `GET`    | `/titles/{id}` | 404 if missing or removed |
//! | `PATCH`  | `/titles/{id}` | Body: any of `status`, `rating`, `thoughts`, `remove_thoughts` |
//! | `DELETE` | `/titles/{id}` | Soft delete |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use watchlog_core::{
  activity::{Activity, Origin},
  catalog::ContentCatalog,
  progress::{ContentKind, NewTitle, TitleProgress, TitleUpdate, WatchStatus},
  store::ProgressStore,
};

use crate::{AppState, error::ApiError, owner::Owner};

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /titles`
pub async fn list<S, C>(
  State(state): State<AppState<S, C>>,
  Owner(owner): Owner,
) -> Result<Json<Vec<TitleProgress>>, ApiError>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  Ok(Json(state.tracker.list_titles(owner).await?))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub kind:       ContentKind,
  pub content_id: i64,
  /// Defaults to finished for movies and games, watching for shows.
  pub status:     Option<WatchStatus>,
  #[serde(default)]
  pub rating:     u8,
  pub thoughts:   Option<String>,
}

/// `POST /titles`
pub async fn create<S, C>(
  State(state): State<AppState<S, C>>,
  Owner(owner): Owner,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  let content = state.tracker.describe(body.kind, body.content_id).await?;
  let mut new = NewTitle::new(owner, content);
  if let Some(status) = body.status {
    new.status = status;
  }
  new.rating = body.rating;
  new.thoughts = body.thoughts;

  let (title, _) = state.tracker.add_title(new, Origin::Manual).await?;
  Ok((StatusCode::CREATED, Json(title)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /titles/{id}`
pub async fn get_one<S, C>(
  State(state): State<AppState<S, C>>,
  Owner(owner): Owner,
  Path(id): Path<Uuid>,
) -> Result<Json<TitleProgress>, ApiError>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  Ok(Json(state.tracker.get_title(owner, id).await?))
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
  pub title:    TitleProgress,
  /// The last record written, if anything changed.
  pub activity: Option<Activity>,
}

/// `PATCH /titles/{id}`
pub async fn update<S, C>(
  State(state): State<AppState<S, C>>,
  Owner(owner): Owner,
  Path(id): Path<Uuid>,
  Json(body): Json<TitleUpdate>,
) -> Result<Json<UpdateResponse>, ApiError>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  let (title, activity) = state.tracker.update_title(owner, id, body).await?;
  Ok(Json(UpdateResponse { title, activity }))
}

// ─── Remove ──────────────────────────────────────────────────────────────────

/// `DELETE /titles/{id}`
pub async fn remove<S, C>(
  State(state): State<AppState<S, C>>,
  Owner(owner): Owner,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  state.tracker.remove_title(owner, id).await?;
  Ok(StatusCode::NO_CONTENT)
}
