//! [`SqliteStore`]: the SQLite implementation of [`ProgressStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, types::Value};
use uuid::Uuid;
use watchlog_core::{
  activity::{Activity, NewActivity},
  progress::{
    ContentKind, EpisodeProgress, NewTitle, RowWrite, SeasonProgress,
    TitleInsert, TitleProgress, WatchStatus,
  },
  store::{ProgressStore, RowChange},
};

use crate::{
  Result,
  encode::{
    ACTIVITY_COLUMNS, EPISODE_COLUMNS, RawActivity, RawEpisode, RawSeason,
    RawTitle, SEASON_COLUMNS, TITLE_COLUMNS, encode_dt, encode_kind,
    encode_status, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A progress store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// run on the connection's own thread, one at a time, and every keyed
/// write runs inside a transaction.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Which branch of a keyed write ran, before decoding.
enum RawWrite<R> {
  Inserted(R),
  Updated {
    row:            R,
    status_changed: bool,
    rating_changed: bool,
  },
  Unchanged(R),
}

impl<R> RawWrite<R> {
  fn decode<T>(self, f: impl Fn(R) -> Result<T>) -> Result<RowWrite<T>> {
    Ok(match self {
      Self::Inserted(row) => RowWrite::Inserted(f(row)?),
      Self::Updated {
        row,
        status_changed,
        rating_changed,
      } => RowWrite::Updated {
        row: f(row)?,
        status_changed,
        rating_changed,
      },
      Self::Unchanged(row) => RowWrite::Unchanged(f(row)?),
    })
  }
}

enum TitleOutcome {
  Created,
  Restored,
  Conflict,
}

/// Status and rating as they will be bound, plus which of them differ from
/// the stored row.
fn diff_row(
  change: RowChange,
  stored_status: Option<&str>,
  stored_rating: i64,
) -> (Option<String>, i64, bool, bool) {
  let requested = encode_status(change.status);
  let status_changed =
    requested.is_some() && requested.as_deref() != stored_status;
  let rating_changed =
    change.rating != 0 && i64::from(change.rating) != stored_rating;

  let status = if status_changed {
    requested
  } else {
    stored_status.map(str::to_owned)
  };
  let rating = if rating_changed {
    i64::from(change.rating)
  } else {
    stored_rating
  };
  (status, rating, status_changed, rating_changed)
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("schema initialised");
    Ok(())
  }
}

// ─── ProgressStore impl ──────────────────────────────────────────────────────

impl ProgressStore for SqliteStore {
  type Error = crate::Error;

  // ── Titles ────────────────────────────────────────────────────────────

  async fn insert_or_restore_title(&self, new: NewTitle) -> Result<TitleInsert> {
    let stamp = encode_dt(new.watched_at.unwrap_or_else(Utc::now));
    let id_str = encode_uuid(Uuid::new_v4());
    let owner_str = encode_uuid(new.owner);
    let kind_str = encode_kind(new.content.kind);
    let content_id = new.content.content_id;
    let name = new.content.name;
    let status_str = encode_status(Some(new.status));
    let rating = i64::from(new.rating);
    let thoughts = new.thoughts;

    let (outcome, raw) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          "INSERT INTO titles (
             title_id, owner_id, content_kind, content_id, content_name,
             status, rating, thoughts, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
           ON CONFLICT (owner_id, content_kind, content_id) DO NOTHING",
          rusqlite::params![
            id_str, owner_str, kind_str, content_id, name, status_str, rating,
            thoughts, stamp,
          ],
        )?;

        let outcome = if inserted == 1 {
          TitleOutcome::Created
        } else {
          let restored = tx.execute(
            "UPDATE titles
                SET status = ?1, rating = ?2, thoughts = COALESCE(?3, thoughts),
                    content_name = ?4, updated_at = ?5, deleted_at = NULL
              WHERE owner_id = ?6 AND content_kind = ?7 AND content_id = ?8
                AND deleted_at IS NOT NULL",
            rusqlite::params![
              status_str, rating, thoughts, name, stamp, owner_str, kind_str,
              content_id,
            ],
          )?;
          if restored == 1 {
            TitleOutcome::Restored
          } else {
            TitleOutcome::Conflict
          }
        };

        let raw = tx.query_row(
          &format!(
            "SELECT {TITLE_COLUMNS} FROM titles
              WHERE owner_id = ?1 AND content_kind = ?2 AND content_id = ?3"
          ),
          rusqlite::params![owner_str, kind_str, content_id],
          RawTitle::from_row,
        )?;
        tx.commit()?;
        Ok((outcome, raw))
      })
      .await?;

    let title = raw.into_title()?;
    Ok(match outcome {
      TitleOutcome::Created => TitleInsert::Created(title),
      TitleOutcome::Restored => {
        tracing::debug!(title_id = %title.title_id, "revived soft-deleted title row");
        TitleInsert::Restored(title)
      }
      TitleOutcome::Conflict => {
        tracing::debug!(title_id = %title.title_id, "live title row holds the key");
        TitleInsert::Conflict(title)
      }
    })
  }

  async fn get_title(&self, owner: Uuid, title_id: Uuid) -> Result<Option<TitleProgress>> {
    let owner_str = encode_uuid(owner);
    let id_str = encode_uuid(title_id);

    let raw: Option<RawTitle> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {TITLE_COLUMNS} FROM titles
                  WHERE title_id = ?1 AND owner_id = ?2 AND deleted_at IS NULL"
              ),
              rusqlite::params![id_str, owner_str],
              RawTitle::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTitle::into_title).transpose()
  }

  async fn find_title(
    &self,
    owner: Uuid,
    kind: ContentKind,
    content_id: i64,
  ) -> Result<Option<TitleProgress>> {
    let owner_str = encode_uuid(owner);
    let kind_str = encode_kind(kind);

    let raw: Option<RawTitle> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {TITLE_COLUMNS} FROM titles
                  WHERE owner_id = ?1 AND content_kind = ?2 AND content_id = ?3
                    AND deleted_at IS NULL"
              ),
              rusqlite::params![owner_str, kind_str, content_id],
              RawTitle::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTitle::into_title).transpose()
  }

  async fn list_titles(&self, owner: Uuid) -> Result<Vec<TitleProgress>> {
    let owner_str = encode_uuid(owner);

    let raws: Vec<RawTitle> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {TITLE_COLUMNS} FROM titles
            WHERE owner_id = ?1 AND deleted_at IS NULL
            ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner_str], RawTitle::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTitle::into_title).collect()
  }

  async fn save_title(&self, title: TitleProgress) -> Result<bool> {
    let id_str = encode_uuid(title.title_id);
    let owner_str = encode_uuid(title.owner);
    let status_str = encode_status(title.status);
    let rating = i64::from(title.rating);
    let thoughts = title.thoughts;
    let now = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE titles SET status = ?1, rating = ?2, thoughts = ?3, updated_at = ?4
            WHERE title_id = ?5 AND owner_id = ?6 AND deleted_at IS NULL",
          rusqlite::params![status_str, rating, thoughts, now, id_str, owner_str],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  async fn promote_title_status(
    &self,
    owner: Uuid,
    title_id: Uuid,
    status: WatchStatus,
  ) -> Result<bool> {
    let id_str = encode_uuid(title_id);
    let owner_str = encode_uuid(owner);
    let status_str = encode_status(Some(status));
    let planned = encode_status(Some(WatchStatus::Planned));
    let now = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE titles SET status = ?1, updated_at = ?2
            WHERE title_id = ?3 AND owner_id = ?4 AND deleted_at IS NULL
              AND (status IS NULL OR status = ?5)",
          rusqlite::params![status_str, now, id_str, owner_str, planned],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  async fn soft_delete_title(&self, owner: Uuid, title_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(title_id);
    let owner_str = encode_uuid(owner);
    let now = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE titles SET deleted_at = ?1
            WHERE title_id = ?2 AND owner_id = ?3 AND deleted_at IS NULL",
          rusqlite::params![now, id_str, owner_str],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  // ── Seasons ───────────────────────────────────────────────────────────

  async fn get_season(
    &self,
    owner: Uuid,
    title_id: Uuid,
    season: u32,
  ) -> Result<Option<SeasonProgress>> {
    let owner_str = encode_uuid(owner);
    let title_str = encode_uuid(title_id);

    let raw: Option<RawSeason> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {SEASON_COLUMNS} FROM seasons
                  WHERE owner_id = ?1 AND title_id = ?2 AND season_number = ?3"
              ),
              rusqlite::params![owner_str, title_str, season],
              RawSeason::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSeason::into_season).transpose()
  }

  async fn list_seasons(&self, owner: Uuid, title_id: Uuid) -> Result<Vec<SeasonProgress>> {
    let owner_str = encode_uuid(owner);
    let title_str = encode_uuid(title_id);

    let raws: Vec<RawSeason> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SEASON_COLUMNS} FROM seasons
            WHERE owner_id = ?1 AND title_id = ?2
            ORDER BY season_number"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner_str, title_str], RawSeason::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSeason::into_season).collect()
  }

  async fn write_season(
    &self,
    owner: Uuid,
    title_id: Uuid,
    season: u32,
    change: RowChange,
  ) -> Result<RowWrite<SeasonProgress>> {
    let owner_str = encode_uuid(owner);
    let title_str = encode_uuid(title_id);
    let new_id = encode_uuid(Uuid::new_v4());
    let now = encode_dt(Utc::now());

    let write = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let select = format!(
          "SELECT {SEASON_COLUMNS} FROM seasons
            WHERE owner_id = ?1 AND title_id = ?2 AND season_number = ?3"
        );
        let key = rusqlite::params![owner_str, title_str, season];
        let existing = tx.query_row(&select, key, RawSeason::from_row).optional()?;

        let write = match existing {
          None => {
            tx.execute(
              "INSERT INTO seasons (
                 season_id, title_id, owner_id, season_number, status, rating,
                 created_at, updated_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
              rusqlite::params![
                new_id,
                title_str,
                owner_str,
                season,
                encode_status(change.status),
                i64::from(change.rating),
                now,
              ],
            )?;
            RawWrite::Inserted(tx.query_row(&select, key, RawSeason::from_row)?)
          }
          Some(row) => {
            let (status, rating, status_changed, rating_changed) =
              diff_row(change, row.status.as_deref(), row.rating);
            if status_changed || rating_changed {
              tx.execute(
                "UPDATE seasons SET status = ?1, rating = ?2, updated_at = ?3
                  WHERE season_id = ?4",
                rusqlite::params![status, rating, now, row.season_id],
              )?;
              RawWrite::Updated {
                row: tx.query_row(&select, key, RawSeason::from_row)?,
                status_changed,
                rating_changed,
              }
            } else {
              RawWrite::Unchanged(row)
            }
          }
        };
        tx.commit()?;
        Ok(write)
      })
      .await?;

    write.decode(RawSeason::into_season)
  }

  async fn delete_season(
    &self,
    owner: Uuid,
    title_id: Uuid,
    season_id: Uuid,
  ) -> Result<Option<SeasonProgress>> {
    let owner_str = encode_uuid(owner);
    let title_str = encode_uuid(title_id);
    let id_str = encode_uuid(season_id);

    let raw: Option<RawSeason> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let key = rusqlite::params![id_str, owner_str, title_str];
        let raw = tx
          .query_row(
            &format!(
              "SELECT {SEASON_COLUMNS} FROM seasons
                WHERE season_id = ?1 AND owner_id = ?2 AND title_id = ?3"
            ),
            key,
            RawSeason::from_row,
          )
          .optional()?;
        if raw.is_some() {
          tx.execute(
            "DELETE FROM seasons WHERE season_id = ?1 AND owner_id = ?2 AND title_id = ?3",
            key,
          )?;
        }
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawSeason::into_season).transpose()
  }

  // ── Episodes ──────────────────────────────────────────────────────────

  async fn list_episodes(&self, owner: Uuid, title_id: Uuid) -> Result<Vec<EpisodeProgress>> {
    let owner_str = encode_uuid(owner);
    let title_str = encode_uuid(title_id);

    let raws: Vec<RawEpisode> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EPISODE_COLUMNS} FROM episodes
            WHERE owner_id = ?1 AND title_id = ?2
            ORDER BY season_number, episode_number"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner_str, title_str], RawEpisode::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEpisode::into_episode).collect()
  }

  async fn write_episode(
    &self,
    owner: Uuid,
    title_id: Uuid,
    season: u32,
    episode: u32,
    change: RowChange,
  ) -> Result<RowWrite<EpisodeProgress>> {
    let owner_str = encode_uuid(owner);
    let title_str = encode_uuid(title_id);
    let new_id = encode_uuid(Uuid::new_v4());
    let now = encode_dt(Utc::now());

    let write = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let select = format!(
          "SELECT {EPISODE_COLUMNS} FROM episodes
            WHERE owner_id = ?1 AND title_id = ?2
              AND season_number = ?3 AND episode_number = ?4"
        );
        let key = rusqlite::params![owner_str, title_str, season, episode];
        let existing = tx.query_row(&select, key, RawEpisode::from_row).optional()?;

        let write = match existing {
          None => {
            tx.execute(
              "INSERT INTO episodes (
                 episode_id, title_id, owner_id, season_number, episode_number,
                 status, rating, created_at, updated_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
              rusqlite::params![
                new_id,
                title_str,
                owner_str,
                season,
                episode,
                encode_status(change.status),
                i64::from(change.rating),
                now,
              ],
            )?;
            RawWrite::Inserted(tx.query_row(&select, key, RawEpisode::from_row)?)
          }
          Some(row) => {
            let (status, rating, status_changed, rating_changed) =
              diff_row(change, row.status.as_deref(), row.rating);
            if status_changed || rating_changed {
              tx.execute(
                "UPDATE episodes SET status = ?1, rating = ?2, updated_at = ?3
                  WHERE episode_id = ?4",
                rusqlite::params![status, rating, now, row.episode_id],
              )?;
              RawWrite::Updated {
                row: tx.query_row(&select, key, RawEpisode::from_row)?,
                status_changed,
                rating_changed,
              }
            } else {
              RawWrite::Unchanged(row)
            }
          }
        };
        tx.commit()?;
        Ok(write)
      })
      .await?;

    write.decode(RawEpisode::into_episode)
  }

  async fn delete_episode(
    &self,
    owner: Uuid,
    title_id: Uuid,
    episode_id: Uuid,
  ) -> Result<Option<EpisodeProgress>> {
    let owner_str = encode_uuid(owner);
    let title_str = encode_uuid(title_id);
    let id_str = encode_uuid(episode_id);

    let raw: Option<RawEpisode> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let key = rusqlite::params![id_str, owner_str, title_str];
        let raw = tx
          .query_row(
            &format!(
              "SELECT {EPISODE_COLUMNS} FROM episodes
                WHERE episode_id = ?1 AND owner_id = ?2 AND title_id = ?3"
            ),
            key,
            RawEpisode::from_row,
          )
          .optional()?;
        if raw.is_some() {
          tx.execute(
            "DELETE FROM episodes WHERE episode_id = ?1 AND owner_id = ?2 AND title_id = ?3",
            key,
          )?;
        }
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawEpisode::into_episode).transpose()
  }

  async fn count_episodes(
    &self,
    owner: Uuid,
    title_id: Uuid,
    season: u32,
    statuses: Vec<WatchStatus>,
  ) -> Result<u64> {
    if statuses.is_empty() {
      return Ok(0);
    }
    let placeholders = (0..statuses.len())
      .map(|i| format!("?{}", i + 4))
      .collect::<Vec<_>>()
      .join(", ");
    let mut values = vec![
      Value::Text(encode_uuid(owner)),
      Value::Text(encode_uuid(title_id)),
      Value::Integer(i64::from(season)),
    ];
    values.extend(statuses.iter().map(|s| Value::Text(s.to_string())));

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "SELECT COUNT(*) FROM episodes
              WHERE owner_id = ?1 AND title_id = ?2 AND season_number = ?3
                AND status IN ({placeholders})"
          ),
          rusqlite::params_from_iter(values),
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(u64::try_from(count).unwrap_or_default())
  }

  // ── Activity ledger ───────────────────────────────────────────────────

  async fn record_activity(&self, input: NewActivity) -> Result<Activity> {
    let activity = Activity {
      activity_id: Uuid::new_v4(),
      owner:       input.owner,
      title_id:    input.title_id,
      kind:        input.kind,
      custom_date: input.custom_date,
      created_at:  Utc::now(),
    };

    let id_str = encode_uuid(activity.activity_id);
    let owner_str = encode_uuid(activity.owner);
    let title_str = encode_uuid(activity.title_id);
    let activity_type = activity.kind.discriminant().to_owned();
    let payload = activity.kind.to_json()?.to_string();
    let custom_date = activity.custom_date.map(encode_dt);
    let created_at = encode_dt(activity.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO activities (
             activity_id, owner_id, title_id, activity_type, payload_json,
             custom_date, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            id_str,
            owner_str,
            title_str,
            activity_type,
            payload,
            custom_date,
            created_at,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(activity)
  }

  async fn list_activity(&self, owner: Uuid, title_id: Uuid) -> Result<Vec<Activity>> {
    let owner_str = encode_uuid(owner);
    let title_str = encode_uuid(title_id);

    let raws: Vec<RawActivity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ACTIVITY_COLUMNS} FROM activities
            WHERE owner_id = ?1 AND title_id = ?2
            ORDER BY rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner_str, title_str], RawActivity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawActivity::into_activity).collect()
  }

  async fn set_activity_date(
    &self,
    owner: Uuid,
    activity_id: Uuid,
    date: Option<DateTime<Utc>>,
  ) -> Result<Option<Activity>> {
    let owner_str = encode_uuid(owner);
    let id_str = encode_uuid(activity_id);
    let date_str = date.map(encode_dt);

    let raw: Option<RawActivity> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE activities SET custom_date = ?1
            WHERE activity_id = ?2 AND owner_id = ?3",
          rusqlite::params![date_str, id_str, owner_str],
        )?;
        let raw = if changed == 1 {
          Some(tx.query_row(
            &format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE activity_id = ?1"),
            rusqlite::params![id_str],
            RawActivity::from_row,
          )?)
        } else {
          None
        };
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawActivity::into_activity).transpose()
  }
}
