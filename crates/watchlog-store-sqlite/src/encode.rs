//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings,
//! statuses and kinds their serde names. Activity payloads are compact JSON.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;
use watchlog_core::{
  activity::{Activity, ActivityKind},
  progress::{
    ContentKind, ContentRef, EpisodeProgress, SeasonProgress, TitleProgress,
    WatchStatus,
  },
};

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn encode_status(status: Option<WatchStatus>) -> Option<String> {
  status.map(|s| s.to_string())
}

pub fn decode_status(s: Option<&str>) -> Result<Option<WatchStatus>> {
  s.map(|s| parse_enum("status", s)).transpose()
}

pub fn encode_kind(kind: ContentKind) -> String { kind.to_string() }

fn parse_enum<T: FromStr>(column: &'static str, value: &str) -> Result<T> {
  value.parse().map_err(|_| Error::UnknownValue {
    column,
    value: value.to_owned(),
  })
}

fn decode_u32(column: &'static str, value: i64) -> Result<u32> {
  u32::try_from(value).map_err(|_| Error::OutOfRange(column))
}

fn decode_rating(value: i64) -> Result<u8> {
  u8::try_from(value).map_err(|_| Error::OutOfRange("rating"))
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const TITLE_COLUMNS: &str = "title_id, owner_id, content_kind, content_id, \
                                 content_name, status, rating, thoughts, \
                                 created_at, updated_at, deleted_at";

/// Raw values read directly from a `titles` row.
pub struct RawTitle {
  pub title_id:     String,
  pub owner_id:     String,
  pub content_kind: String,
  pub content_id:   i64,
  pub content_name: String,
  pub status:       Option<String>,
  pub rating:       i64,
  pub thoughts:     Option<String>,
  pub created_at:   String,
  pub updated_at:   String,
  pub deleted_at:   Option<String>,
}

impl RawTitle {
  /// Read a row selected with [`TITLE_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      title_id:     row.get(0)?,
      owner_id:     row.get(1)?,
      content_kind: row.get(2)?,
      content_id:   row.get(3)?,
      content_name: row.get(4)?,
      status:       row.get(5)?,
      rating:       row.get(6)?,
      thoughts:     row.get(7)?,
      created_at:   row.get(8)?,
      updated_at:   row.get(9)?,
      deleted_at:   row.get(10)?,
    })
  }

  pub fn into_title(self) -> Result<TitleProgress> {
    Ok(TitleProgress {
      title_id:   decode_uuid(&self.title_id)?,
      owner:      decode_uuid(&self.owner_id)?,
      content:    ContentRef {
        kind:       parse_enum("content_kind", &self.content_kind)?,
        content_id: self.content_id,
        name:       self.content_name,
      },
      status:     decode_status(self.status.as_deref())?,
      rating:     decode_rating(self.rating)?,
      thoughts:   self.thoughts,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      deleted_at: self.deleted_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub const SEASON_COLUMNS: &str = "season_id, title_id, owner_id, season_number, \
                                  status, rating, created_at, updated_at";

/// Raw values read directly from a `seasons` row.
pub struct RawSeason {
  pub season_id:     String,
  pub title_id:      String,
  pub owner_id:      String,
  pub season_number: i64,
  pub status:        Option<String>,
  pub rating:        i64,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawSeason {
  /// Read a row selected with [`SEASON_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      season_id:     row.get(0)?,
      title_id:      row.get(1)?,
      owner_id:      row.get(2)?,
      season_number: row.get(3)?,
      status:        row.get(4)?,
      rating:        row.get(5)?,
      created_at:    row.get(6)?,
      updated_at:    row.get(7)?,
    })
  }

  pub fn into_season(self) -> Result<SeasonProgress> {
    Ok(SeasonProgress {
      season_id:     decode_uuid(&self.season_id)?,
      title_id:      decode_uuid(&self.title_id)?,
      owner:         decode_uuid(&self.owner_id)?,
      season_number: decode_u32("season_number", self.season_number)?,
      status:        decode_status(self.status.as_deref())?,
      rating:        decode_rating(self.rating)?,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

pub const EPISODE_COLUMNS: &str = "episode_id, title_id, owner_id, season_number, \
                                   episode_number, status, rating, created_at, \
                                   updated_at";

/// Raw values read directly from an `episodes` row.
pub struct RawEpisode {
  pub episode_id:     String,
  pub title_id:       String,
  pub owner_id:       String,
  pub season_number:  i64,
  pub episode_number: i64,
  pub status:         Option<String>,
  pub rating:         i64,
  pub created_at:     String,
  pub updated_at:     String,
}

impl RawEpisode {
  /// Read a row selected with [`EPISODE_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      episode_id:     row.get(0)?,
      title_id:       row.get(1)?,
      owner_id:       row.get(2)?,
      season_number:  row.get(3)?,
      episode_number: row.get(4)?,
      status:         row.get(5)?,
      rating:         row.get(6)?,
      created_at:     row.get(7)?,
      updated_at:     row.get(8)?,
    })
  }

  pub fn into_episode(self) -> Result<EpisodeProgress> {
    Ok(EpisodeProgress {
      episode_id:     decode_uuid(&self.episode_id)?,
      title_id:       decode_uuid(&self.title_id)?,
      owner:          decode_uuid(&self.owner_id)?,
      season_number:  decode_u32("season_number", self.season_number)?,
      episode_number: decode_u32("episode_number", self.episode_number)?,
      status:         decode_status(self.status.as_deref())?,
      rating:         decode_rating(self.rating)?,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

pub const ACTIVITY_COLUMNS: &str = "activity_id, owner_id, title_id, activity_type, \
                                    payload_json, custom_date, created_at";

/// Raw values read directly from an `activities` row.
pub struct RawActivity {
  pub activity_id:   String,
  pub owner_id:      String,
  pub title_id:      String,
  pub activity_type: String,
  pub payload_json:  String,
  pub custom_date:   Option<String>,
  pub created_at:    String,
}

impl RawActivity {
  /// Read a row selected with [`ACTIVITY_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      activity_id:   row.get(0)?,
      owner_id:      row.get(1)?,
      title_id:      row.get(2)?,
      activity_type: row.get(3)?,
      payload_json:  row.get(4)?,
      custom_date:   row.get(5)?,
      created_at:    row.get(6)?,
    })
  }

  pub fn into_activity(self) -> Result<Activity> {
    let payload: serde_json::Value = serde_json::from_str(&self.payload_json)?;
    Ok(Activity {
      activity_id: decode_uuid(&self.activity_id)?,
      owner:       decode_uuid(&self.owner_id)?,
      title_id:    decode_uuid(&self.title_id)?,
      kind:        ActivityKind::from_parts(&self.activity_type, payload)?,
      custom_date: self.custom_date.as_deref().map(decode_dt).transpose()?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}
