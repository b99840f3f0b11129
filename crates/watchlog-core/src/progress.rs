//! Progress rows: the title → season → episode hierarchy.
//!
//! A title row is the root entry for one piece of content for one owner.
//! Season and episode rows hang off it and are keyed by number, never by a
//! catalog episode id (catalog ids are not stable across catalog edits).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Where the owner is with a title, season or episode.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchStatus {
  Planned,
  Watching,
  Finished,
  /// On hold. Never set by propagation.
  Hold,
  Dropped,
}

impl WatchStatus {
  /// Status given to a title added without one: single-unit content is
  /// assumed watched, episodic content in progress.
  pub fn default_for(kind: ContentKind) -> Self {
    match kind {
      ContentKind::Show => Self::Watching,
      ContentKind::Movie | ContentKind::Game => Self::Finished,
    }
  }

  /// Statuses that count an episode as done when checking season
  /// completion.
  pub const COMPLETED: [WatchStatus; 2] = [Self::Finished, Self::Dropped];
}

// ─── Content ─────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContentKind {
  Movie,
  Show,
  Game,
}

impl ContentKind {
  /// Only shows have seasons and episodes.
  pub fn is_episodic(self) -> bool { matches!(self, Self::Show) }
}

/// Denormalised reference to a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
  pub kind:       ContentKind,
  /// Identifier in the external catalog.
  pub content_id: i64,
  pub name:       String,
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// Root entry. At most one non-deleted row exists per (owner, kind,
/// content_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleProgress {
  pub title_id:   Uuid,
  pub owner:      Uuid,
  pub content:    ContentRef,
  pub status:     Option<WatchStatus>,
  /// 0-10, 0 means unset.
  pub rating:     u8,
  pub thoughts:   Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub deleted_at: Option<DateTime<Utc>>,
}

impl TitleProgress {
  pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonProgress {
  pub season_id:     Uuid,
  pub title_id:      Uuid,
  pub owner:         Uuid,
  pub season_number: u32,
  pub status:        Option<WatchStatus>,
  pub rating:        u8,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeProgress {
  pub episode_id:     Uuid,
  pub title_id:       Uuid,
  pub owner:          Uuid,
  pub season_number:  u32,
  pub episode_number: u32,
  pub status:         Option<WatchStatus>,
  pub rating:         u8,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::ProgressStore::insert_or_restore_title`].
#[derive(Debug, Clone)]
pub struct NewTitle {
  pub owner:      Uuid,
  pub content:    ContentRef,
  pub status:     WatchStatus,
  pub rating:     u8,
  pub thoughts:   Option<String>,
  /// When set, the row's created/updated timestamps are backdated to it.
  pub watched_at: Option<DateTime<Utc>>,
}

impl NewTitle {
  /// Convenience constructor: the kind's default status, no rating.
  pub fn new(owner: Uuid, content: ContentRef) -> Self {
    Self {
      owner,
      status: WatchStatus::default_for(content.kind),
      content,
      rating: 0,
      thoughts: None,
      watched_at: None,
    }
  }
}

/// Partial update of a title. `None` fields are left alone; a rating of 0
/// means "not provided".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TitleUpdate {
  pub status:          Option<WatchStatus>,
  #[serde(default)]
  pub rating:          u8,
  pub thoughts:        Option<String>,
  #[serde(default)]
  pub remove_thoughts: bool,
}

/// Result of a keyed season/episode write, telling the caller which
/// activity (if any) describes it.
#[derive(Debug, Clone)]
pub enum RowWrite<T> {
  Inserted(T),
  Updated {
    row:            T,
    status_changed: bool,
    rating_changed: bool,
  },
  Unchanged(T),
}

impl<T> RowWrite<T> {
  pub fn row(&self) -> &T {
    match self {
      Self::Inserted(row) | Self::Updated { row, .. } | Self::Unchanged(row) => {
        row
      }
    }
  }

  pub fn into_row(self) -> T {
    match self {
      Self::Inserted(row) | Self::Updated { row, .. } | Self::Unchanged(row) => {
        row
      }
    }
  }
}

/// Outcome of an insert against the (owner, kind, content_id) key.
#[derive(Debug, Clone)]
pub enum TitleInsert {
  Created(TitleProgress),
  /// A soft-deleted row was revived with the supplied status and rating.
  Restored(TitleProgress),
  /// A live row already holds the key; it is returned untouched.
  Conflict(TitleProgress),
}

pub(crate) fn check_rating(rating: u8) -> crate::Result<u8> {
  if rating > 10 {
    return Err(crate::Error::RatingOutOfRange(rating));
  }
  Ok(rating)
}
