//! Activity records: the append-only audit trail of progress changes.
//!
//! Every record belongs to one (owner, title) pair. The only field that may
//! change after creation is the optional custom date, which lets imports and
//! users backdate an event to when it actually happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Result, progress::WatchStatus};

// ─── Sources ─────────────────────────────────────────────────────────────────

/// Upstream platform an imported change came from.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImportSource {
  Plex,
  Jellyfin,
  Trakt,
  /// A history list uploaded by the user.
  Upload,
}

/// Who caused a title or episode to be added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Origin {
  #[default]
  Manual,
  Imported(ImportSource),
}

/// Who caused a season to be added. Seasons can also be created by
/// propagation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SeasonOrigin {
  #[default]
  Manual,
  Auto { reason: String },
  Imported(ImportSource),
}

// ─── Payloads ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleValues {
  pub status: Option<WatchStatus>,
  pub rating: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoStatus {
  pub status: WatchStatus,
  pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonValues {
  pub season: u32,
  pub status: Option<WatchStatus>,
  pub rating: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonStatus {
  pub season: u32,
  pub status: WatchStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonRating {
  pub season: u32,
  pub rating: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoSeasonStatus {
  pub season: u32,
  pub status: Option<WatchStatus>,
  pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeValues {
  pub season:  u32,
  pub episode: u32,
  pub status:  Option<WatchStatus>,
  pub rating:  u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeStatus {
  pub season:  u32,
  pub episode: u32,
  pub status:  WatchStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRating {
  pub season:  u32,
  pub episode: u32,
  pub rating:  u8,
}

// ─── ActivityKind ────────────────────────────────────────────────────────────

/// The typed payload of an activity record. The variant name is the
/// `activity_type` discriminant stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ActivityKind {
  // ── Manual, title level ─────────────────────────────────────────────────
  AddedWatched(TitleValues),
  RemovedWatched,
  StatusChanged(WatchStatus),
  RatingChanged(u8),
  ThoughtsChanged,
  /// Carries the thoughts that were removed.
  ThoughtsRemoved(String),

  // ── Manual, seasons and episodes ────────────────────────────────────────
  SeasonAdded(SeasonValues),
  SeasonStatusChanged(SeasonStatus),
  SeasonRatingChanged(SeasonRating),
  SeasonRemoved(SeasonValues),
  EpisodeAdded(EpisodeValues),
  EpisodeStatusChanged(EpisodeStatus),
  EpisodeRatingChanged(EpisodeRating),
  EpisodeRemoved(EpisodeValues),

  // ── Automatic (propagation) ─────────────────────────────────────────────
  StatusChangedAuto(AutoStatus),
  SeasonAddedAuto(AutoSeasonStatus),
  SeasonStatusChangedAuto(AutoSeasonStatus),

  // ── Imported ────────────────────────────────────────────────────────────
  ImportedWatched {
    source: ImportSource,
    status: Option<WatchStatus>,
    rating: u8,
  },
  /// Marks the original watch date on the source platform; the record's
  /// custom date holds that date.
  ImportedAddedWatched { source: ImportSource },
  ImportedRating { source: ImportSource, rating: u8 },
  SeasonImported {
    source: ImportSource,
    season: u32,
    status: Option<WatchStatus>,
    rating: u8,
  },
  EpisodeImported {
    source:  ImportSource,
    season:  u32,
    episode: u32,
    status:  Option<WatchStatus>,
    rating:  u8,
  },
}

impl ActivityKind {
  /// The discriminant string stored in the `activity_type` column.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::AddedWatched(_) => "added_watched",
      Self::RemovedWatched => "removed_watched",
      Self::StatusChanged(_) => "status_changed",
      Self::RatingChanged(_) => "rating_changed",
      Self::ThoughtsChanged => "thoughts_changed",
      Self::ThoughtsRemoved(_) => "thoughts_removed",
      Self::SeasonAdded(_) => "season_added",
      Self::SeasonStatusChanged(_) => "season_status_changed",
      Self::SeasonRatingChanged(_) => "season_rating_changed",
      Self::SeasonRemoved(_) => "season_removed",
      Self::EpisodeAdded(_) => "episode_added",
      Self::EpisodeStatusChanged(_) => "episode_status_changed",
      Self::EpisodeRatingChanged(_) => "episode_rating_changed",
      Self::EpisodeRemoved(_) => "episode_removed",
      Self::StatusChangedAuto(_) => "status_changed_auto",
      Self::SeasonAddedAuto(_) => "season_added_auto",
      Self::SeasonStatusChangedAuto(_) => "season_status_changed_auto",
      Self::ImportedWatched { .. } => "imported_watched",
      Self::ImportedAddedWatched { .. } => "imported_added_watched",
      Self::ImportedRating { .. } => "imported_rating",
      Self::SeasonImported { .. } => "season_imported",
      Self::EpisodeImported { .. } => "episode_imported",
    }
  }

  /// Serialise the inner payload (without the type tag) for the
  /// `payload_json` column. Unit variants produce `null`.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("data").cloned().unwrap_or(serde_json::Value::Null))
  }

  /// Deserialise from the discriminant and JSON payload stored in the
  /// database.
  pub fn from_parts(discriminant: &str, data: serde_json::Value) -> Result<Self> {
    let wrapped = if data.is_null() {
      serde_json::json!({ "type": discriminant })
    } else {
      serde_json::json!({ "type": discriminant, "data": data })
    };
    Ok(serde_json::from_value(wrapped)?)
  }

  /// The "added" record for a new title.
  pub fn title_added(origin: Origin, values: TitleValues) -> Self {
    match origin {
      Origin::Manual => Self::AddedWatched(values),
      Origin::Imported(source) => Self::ImportedWatched {
        source,
        status: values.status,
        rating: values.rating,
      },
    }
  }

  /// The "added" record for a new season.
  pub fn season_added(origin: &SeasonOrigin, values: SeasonValues) -> Self {
    match origin {
      SeasonOrigin::Manual => Self::SeasonAdded(values),
      SeasonOrigin::Auto { reason } => Self::SeasonAddedAuto(AutoSeasonStatus {
        season: values.season,
        status: values.status,
        reason: reason.clone(),
      }),
      SeasonOrigin::Imported(source) => Self::SeasonImported {
        source: *source,
        season: values.season,
        status: values.status,
        rating: values.rating,
      },
    }
  }

  /// The "added" record for a new episode.
  pub fn episode_added(origin: Origin, values: EpisodeValues) -> Self {
    match origin {
      Origin::Manual => Self::EpisodeAdded(values),
      Origin::Imported(source) => Self::EpisodeImported {
        source,
        season: values.season,
        episode: values.episode,
        status: values.status,
        rating: values.rating,
      },
    }
  }
}

// ─── Activity ────────────────────────────────────────────────────────────────

/// A persisted activity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
  pub activity_id: Uuid,
  pub owner:       Uuid,
  pub title_id:    Uuid,
  pub kind:        ActivityKind,
  /// Caller- or user-supplied date the event really happened.
  pub custom_date: Option<DateTime<Utc>>,
  /// Server-assigned; never changes.
  pub created_at:  DateTime<Utc>,
}

impl Activity {
  /// When the change happened, preferring the custom date.
  pub fn occurred_at(&self) -> DateTime<Utc> {
    self.custom_date.unwrap_or(self.created_at)
  }
}

/// Input to [`crate::store::ProgressStore::record_activity`].
/// `created_at` is always set by the store.
#[derive(Debug, Clone)]
pub struct NewActivity {
  pub owner:       Uuid,
  pub title_id:    Uuid,
  pub kind:        ActivityKind,
  pub custom_date: Option<DateTime<Utc>>,
}

impl NewActivity {
  pub fn new(owner: Uuid, title_id: Uuid, kind: ActivityKind) -> Self {
    Self {
      owner,
      title_id,
      kind,
      custom_date: None,
    }
  }

  pub fn backdated(mut self, date: Option<DateTime<Utc>>) -> Self {
    self.custom_date = date;
    self
  }
}
