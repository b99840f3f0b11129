//! The `ProgressStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `watchlog-store-sqlite`).
//! It exposes keyed, individually atomic primitives; the multi-step
//! operations (activity emission, propagation) are composed on top of it by
//! [`crate::tracker::Tracker`].

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  activity::{Activity, NewActivity},
  progress::{
    ContentKind, EpisodeProgress, NewTitle, RowWrite, SeasonProgress,
    TitleInsert, TitleProgress, WatchStatus,
  },
};

/// A season or episode write: `None` fields keep the stored value, and a
/// rating of 0 means "not provided".
#[derive(Debug, Clone, Copy)]
pub struct RowChange {
  pub status: Option<WatchStatus>,
  pub rating: u8,
}

/// Abstraction over a progress store backend.
///
/// Every method must be atomic on its own. In particular
/// [`insert_or_restore_title`](Self::insert_or_restore_title) and the keyed
/// `write_*` methods must be safe against concurrent writers for the same
/// key: the backend's uniqueness constraint decides the winner, never a
/// read-then-insert race.
///
/// Reads and writes are always scoped by `owner`; a row owned by someone else
/// behaves exactly like a missing row.
pub trait ProgressStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Titles ────────────────────────────────────────────────────────────

  /// Insert a title row, or revive the soft-deleted row holding the same
  /// (owner, kind, content_id) key with the supplied status and rating.
  /// A live row holding the key is returned as [`TitleInsert::Conflict`].
  fn insert_or_restore_title(
    &self,
    new: NewTitle,
  ) -> impl Future<Output = Result<TitleInsert, Self::Error>> + Send + '_;

  /// Retrieve a live (not soft-deleted) title.
  fn get_title(
    &self,
    owner: Uuid,
    title_id: Uuid,
  ) -> impl Future<Output = Result<Option<TitleProgress>, Self::Error>> + Send + '_;

  /// Retrieve the live title tracking a catalog entry.
  fn find_title(
    &self,
    owner: Uuid,
    kind: ContentKind,
    content_id: i64,
  ) -> impl Future<Output = Result<Option<TitleProgress>, Self::Error>> + Send + '_;

  /// All live titles for an owner.
  fn list_titles(
    &self,
    owner: Uuid,
  ) -> impl Future<Output = Result<Vec<TitleProgress>, Self::Error>> + Send + '_;

  /// Persist status, rating and thoughts of a live title and bump its
  /// `updated_at`. Returns `false` if no live row matched.
  fn save_title(
    &self,
    title: TitleProgress,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Set `status` on a live title whose status is empty or
  /// [`WatchStatus::Planned`], leaving every other field alone. Returns
  /// `false` if no row matched, including when the title has moved on.
  fn promote_title_status(
    &self,
    owner: Uuid,
    title_id: Uuid,
    status: WatchStatus,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Soft delete. Returns `false` if no live row matched.
  fn soft_delete_title(
    &self,
    owner: Uuid,
    title_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Seasons ───────────────────────────────────────────────────────────

  fn get_season(
    &self,
    owner: Uuid,
    title_id: Uuid,
    season: u32,
  ) -> impl Future<Output = Result<Option<SeasonProgress>, Self::Error>> + Send + '_;

  fn list_seasons(
    &self,
    owner: Uuid,
    title_id: Uuid,
  ) -> impl Future<Output = Result<Vec<SeasonProgress>, Self::Error>> + Send + '_;

  /// Insert or update the row keyed by (title, season).
  fn write_season(
    &self,
    owner: Uuid,
    title_id: Uuid,
    season: u32,
    change: RowChange,
  ) -> impl Future<Output = Result<RowWrite<SeasonProgress>, Self::Error>> + Send + '_;

  /// Hard delete, returning the row as it was.
  fn delete_season(
    &self,
    owner: Uuid,
    title_id: Uuid,
    season_id: Uuid,
  ) -> impl Future<Output = Result<Option<SeasonProgress>, Self::Error>> + Send + '_;

  // ── Episodes ──────────────────────────────────────────────────────────

  fn list_episodes(
    &self,
    owner: Uuid,
    title_id: Uuid,
  ) -> impl Future<Output = Result<Vec<EpisodeProgress>, Self::Error>> + Send + '_;

  /// Insert or update the row keyed by (title, season, episode).
  fn write_episode(
    &self,
    owner: Uuid,
    title_id: Uuid,
    season: u32,
    episode: u32,
    change: RowChange,
  ) -> impl Future<Output = Result<RowWrite<EpisodeProgress>, Self::Error>> + Send + '_;

  /// Hard delete, returning the row as it was.
  fn delete_episode(
    &self,
    owner: Uuid,
    title_id: Uuid,
    episode_id: Uuid,
  ) -> impl Future<Output = Result<Option<EpisodeProgress>, Self::Error>> + Send + '_;

  /// Number of episode rows in `season` whose status is one of `statuses`.
  fn count_episodes(
    &self,
    owner: Uuid,
    title_id: Uuid,
    season: u32,
    statuses: Vec<WatchStatus>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Activity ledger ───────────────────────────────────────────────────

  /// Append a record. `created_at` is set by the store.
  fn record_activity(
    &self,
    input: NewActivity,
  ) -> impl Future<Output = Result<Activity, Self::Error>> + Send + '_;

  /// All records for an (owner, title) pair, in storage order.
  fn list_activity(
    &self,
    owner: Uuid,
    title_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Activity>, Self::Error>> + Send + '_;

  /// Set or clear the custom date, the one mutable field of a record.
  fn set_activity_date(
    &self,
    owner: Uuid,
    activity_id: Uuid,
    date: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Option<Activity>, Self::Error>> + Send + '_;
}
