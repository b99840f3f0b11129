//! Import and job polling endpoints.
//!
//! `POST /import` answers `202 Accepted` with the job id at once; the
//! import keeps running after the response and is polled with
//! `GET /jobs/{id}` and dismissed with `DELETE /jobs/{id}`. A job owned by
//! someone else is a plain 404.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use watchlog_core::{
  catalog::ContentCatalog,
  import::{UploadSource, WatchEvent, spawn_import},
  job::{Job, JobId},
  store::ProgressStore,
};

use crate::{AppState, error::ApiError, owner::Owner};

#[derive(Debug, Deserialize)]
pub struct ImportBody {
  pub events: Vec<WatchEvent>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
  pub job_id: JobId,
}

/// `POST /import`
pub async fn import<S, C>(
  State(state): State<AppState<S, C>>,
  Owner(owner): Owner,
  Json(body): Json<ImportBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ProgressStore + 'static,
  C: ContentCatalog + 'static,
{
  if body.events.is_empty() {
    return Err(ApiError::BadRequest("events must not be empty".into()));
  }
  let job_id = spawn_import(
    state.tracker.clone(),
    state.jobs.clone(),
    owner,
    UploadSource(body.events),
  )?;
  Ok((StatusCode::ACCEPTED, Json(ImportResponse { job_id })))
}

/// `GET /jobs/{id}`
pub async fn get_one<S, C>(
  State(state): State<AppState<S, C>>,
  Owner(owner): Owner,
  Path(id): Path<String>,
) -> Result<Json<Job>, ApiError>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  Ok(Json(state.jobs.get(&JobId::from(id), owner)?))
}

/// `DELETE /jobs/{id}`
///
/// A worker still running for the job keeps going; its later updates are
/// dropped.
pub async fn remove<S, C>(
  State(state): State<AppState<S, C>>,
  Owner(owner): Owner,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  state.jobs.remove(&JobId::from(id), owner)?;
  Ok(StatusCode::NO_CONTENT)
}
