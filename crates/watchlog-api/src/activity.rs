//! Handlers for the activity ledger.

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use watchlog_core::{
  activity::Activity, catalog::ContentCatalog, store::ProgressStore,
};

use crate::{AppState, error::ApiError, owner::Owner};

/// `GET /titles/{id}/activity`, oldest first by effective date.
pub async fn list<S, C>(
  State(state): State<AppState<S, C>>,
  Owner(owner): Owner,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Activity>>, ApiError>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  let mut records = state.tracker.list_activity(owner, id).await?;
  records.sort_by_key(Activity::occurred_at);
  Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct SetDateBody {
  /// `null` clears the custom date.
  pub custom_date: Option<DateTime<Utc>>,
}

/// `PATCH /activity/{id}`
pub async fn set_date<S, C>(
  State(state): State<AppState<S, C>>,
  Owner(owner): Owner,
  Path(id): Path<Uuid>,
  Json(body): Json<SetDateBody>,
) -> Result<Json<Activity>, ApiError>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  Ok(Json(
    state
      .tracker
      .set_activity_date(owner, id, body.custom_date)
      .await?,
  ))
}
