//! JSON REST API for watchlog.
//!
//! Exposes an axum [`Router`] over a [`Tracker`] and a [`JobRegistry`].
//! Authentication and TLS are the caller's responsibility; the owner of a
//! request is taken from the `X-Owner-Id` header (see [`owner`]).
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", watchlog_api::api_router(state))
//! ```

pub mod activity;
pub mod episodes;
pub mod error;
pub mod jobs;
pub mod owner;
pub mod seasons;
pub mod titles;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, patch, post},
};
use tower_http::trace::TraceLayer;
use watchlog_core::{
  catalog::ContentCatalog, job::JobRegistry, store::ProgressStore,
  tracker::Tracker,
};

pub use error::ApiError;
pub use owner::Owner;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, C> {
  pub tracker: Arc<Tracker<S, C>>,
  pub jobs:    JobRegistry,
}

impl<S, C> AppState<S, C> {
  pub fn new(tracker: Tracker<S, C>, jobs: JobRegistry) -> Self {
    Self {
      tracker: Arc::new(tracker),
      jobs,
    }
  }
}

impl<S, C> Clone for AppState<S, C> {
  fn clone(&self) -> Self {
    Self {
      tracker: Arc::clone(&self.tracker),
      jobs:    self.jobs.clone(),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, C>(state: AppState<S, C>) -> Router<()>
where
  S: ProgressStore + 'static,
  C: ContentCatalog + 'static,
{
  Router::new()
    // Titles
    .route("/titles", get(titles::list::<S, C>).post(titles::create::<S, C>))
    .route(
      "/titles/{id}",
      get(titles::get_one::<S, C>)
        .patch(titles::update::<S, C>)
        .delete(titles::remove::<S, C>),
    )
    // Seasons
    .route(
      "/titles/{id}/seasons",
      get(seasons::list::<S, C>).post(seasons::upsert::<S, C>),
    )
    .route("/titles/{id}/seasons/{season_id}", delete(seasons::remove::<S, C>))
    // Episodes
    .route(
      "/titles/{id}/episodes",
      get(episodes::list::<S, C>).post(episodes::upsert::<S, C>),
    )
    .route(
      "/titles/{id}/episodes/{episode_id}",
      delete(episodes::remove::<S, C>),
    )
    // Activity
    .route("/titles/{id}/activity", get(activity::list::<S, C>))
    .route("/activity/{id}", patch(activity::set_date::<S, C>))
    // Jobs
    .route("/import", post(jobs::import::<S, C>))
    .route(
      "/jobs/{id}",
      get(jobs::get_one::<S, C>).delete(jobs::remove::<S, C>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
