//! Progress operations: the title/season/episode writes and the activity
//! records that describe them.
//!
//! [`Tracker`] composes the keyed primitives of a [`ProgressStore`] into the
//! user-facing operations. Episode writes that carry a status also run the
//! propagation cascade (see [`crate::propagate`]).

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  activity::{
    Activity, ActivityKind, EpisodeRating, EpisodeStatus, EpisodeValues,
    NewActivity, Origin, SeasonOrigin, SeasonRating, SeasonStatus,
    SeasonValues, TitleValues,
  },
  catalog::ContentCatalog,
  progress::{
    ContentKind, ContentRef, EpisodeProgress, NewTitle, RowWrite,
    SeasonProgress, TitleInsert, TitleProgress, TitleUpdate, WatchStatus,
    check_rating,
  },
  propagate::PropagationReport,
  store::{ProgressStore, RowChange},
};

// ─── Requests ────────────────────────────────────────────────────────────────

/// A season write.
#[derive(Debug, Clone)]
pub struct SeasonUpsert {
  pub title_id: Uuid,
  pub season:   u32,
  pub status:   Option<WatchStatus>,
  /// 0 means "not provided".
  pub rating:   u8,
  pub origin:   SeasonOrigin,
  /// Custom date for the "added" record of a new row.
  pub backdate: Option<DateTime<Utc>>,
}

/// An episode write.
#[derive(Debug, Clone)]
pub struct EpisodeUpsert {
  pub title_id: Uuid,
  pub season:   u32,
  pub episode:  u32,
  pub status:   Option<WatchStatus>,
  /// 0 means "not provided".
  pub rating:   u8,
  /// Picks the "added" record type for a new row.
  pub origin:   Origin,
  /// Custom date for the "added" record of a new row.
  pub backdate: Option<DateTime<Utc>>,
}

impl EpisodeUpsert {
  pub fn new(title_id: Uuid, season: u32, episode: u32) -> Self {
    Self {
      title_id,
      season,
      episode,
      status: None,
      rating: 0,
      origin: Origin::Manual,
      backdate: None,
    }
  }

  pub fn status(mut self, status: WatchStatus) -> Self {
    self.status = Some(status);
    self
  }

  pub fn rating(mut self, rating: u8) -> Self {
    self.rating = rating;
    self
  }
}

/// Result of [`Tracker::upsert_episode`].
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeUpsertOutcome {
  /// Every episode row of the title after the write.
  pub episodes:    Vec<EpisodeProgress>,
  /// The last record written for the episode itself. When both status and
  /// rating changed two records exist and this holds the rating one.
  pub activity:    Option<Activity>,
  /// Present whenever the request carried a status and automation is on.
  pub propagation: Option<PropagationReport>,
}

// ─── Tracker ─────────────────────────────────────────────────────────────────

pub struct Tracker<S, C> {
  pub(crate) store:   S,
  pub(crate) catalog: C,
  automate_statuses:  bool,
}

impl<S, C> Tracker<S, C>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  pub fn new(store: S, catalog: C) -> Self {
    Self {
      store,
      catalog,
      automate_statuses: true,
    }
  }

  /// Turn the propagation cascade on or off (on by default).
  pub fn with_automation(mut self, enabled: bool) -> Self {
    self.automate_statuses = enabled;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn catalog(&self) -> &C { &self.catalog }

  // ── Titles ────────────────────────────────────────────────────────────

  /// Resolve a catalog entry into the reference stored on a title.
  pub async fn describe(
    &self,
    kind: ContentKind,
    content_id: i64,
  ) -> Result<ContentRef> {
    self
      .catalog
      .describe(kind, content_id)
      .await
      .map_err(Error::upstream)
  }

  /// Insert a title, or revive its soft-deleted row. A live row for the
  /// same content fails with [`Error::AlreadyTracked`]. The caller writes
  /// the "added" record.
  pub async fn create_or_restore_title(
    &self,
    new: NewTitle,
  ) -> Result<TitleProgress> {
    check_rating(new.rating)?;
    let inserted = self
      .store
      .insert_or_restore_title(new)
      .await
      .map_err(Error::storage)?;
    match inserted {
      TitleInsert::Created(title) => {
        tracing::debug!(owner = %title.owner, title_id = %title.title_id, "title created");
        Ok(title)
      }
      TitleInsert::Restored(title) => {
        tracing::info!(owner = %title.owner, title_id = %title.title_id, "title restored");
        Ok(title)
      }
      TitleInsert::Conflict(title) => Err(Error::AlreadyTracked {
        kind:       title.content.kind,
        content_id: title.content.content_id,
      }),
    }
  }

  /// [`create_or_restore_title`](Self::create_or_restore_title) followed by
  /// the "added" record for `origin`. Imports that know the original watch
  /// date also get a backdated `imported_added_watched` record.
  pub async fn add_title(
    &self,
    new: NewTitle,
    origin: Origin,
  ) -> Result<(TitleProgress, Activity)> {
    let owner = new.owner;
    let watched_at = new.watched_at;
    let title = self.create_or_restore_title(new).await?;

    let kind = ActivityKind::title_added(origin, TitleValues {
      status: title.status,
      rating: title.rating,
    });
    let activity = self
      .record(NewActivity::new(owner, title.title_id, kind))
      .await?;

    if let (Origin::Imported(source), Some(at)) = (origin, watched_at) {
      let kind = ActivityKind::ImportedAddedWatched { source };
      self
        .record(NewActivity::new(owner, title.title_id, kind).backdated(Some(at)))
        .await?;
    }
    Ok((title, activity))
  }

  pub async fn get_title(&self, owner: Uuid, title_id: Uuid) -> Result<TitleProgress> {
    self
      .store
      .get_title(owner, title_id)
      .await
      .map_err(Error::storage)?
      .ok_or(Error::TitleNotFound(title_id))
  }

  pub async fn find_title(
    &self,
    owner: Uuid,
    kind: ContentKind,
    content_id: i64,
  ) -> Result<Option<TitleProgress>> {
    self
      .store
      .find_title(owner, kind, content_id)
      .await
      .map_err(Error::storage)
  }

  pub async fn list_titles(&self, owner: Uuid) -> Result<Vec<TitleProgress>> {
    self.store.list_titles(owner).await.map_err(Error::storage)
  }

  /// Apply the fields of `update` that differ from the stored row. Each
  /// change writes one record; the last one is returned.
  pub async fn update_title(
    &self,
    owner: Uuid,
    title_id: Uuid,
    update: TitleUpdate,
  ) -> Result<(TitleProgress, Option<Activity>)> {
    check_rating(update.rating)?;
    let mut title = self.get_title(owner, title_id).await?;
    let mut changes = Vec::new();

    if let Some(status) = update.status {
      if title.status != Some(status) {
        title.status = Some(status);
        changes.push(ActivityKind::StatusChanged(status));
      }
    }
    if update.rating != 0 && update.rating != title.rating {
      title.rating = update.rating;
      changes.push(ActivityKind::RatingChanged(update.rating));
    }
    if update.remove_thoughts {
      if let Some(old) = title.thoughts.take() {
        changes.push(ActivityKind::ThoughtsRemoved(old));
      }
    } else if let Some(thoughts) = update.thoughts {
      if title.thoughts.as_deref() != Some(thoughts.as_str()) {
        title.thoughts = Some(thoughts);
        changes.push(ActivityKind::ThoughtsChanged);
      }
    }

    if changes.is_empty() {
      return Ok((title, None));
    }
    if !self
      .store
      .save_title(title.clone())
      .await
      .map_err(Error::storage)?
    {
      return Err(Error::TitleNotFound(title_id));
    }

    let mut last = None;
    for kind in changes {
      last = Some(self.record(NewActivity::new(owner, title_id, kind)).await?);
    }
    let title = self.get_title(owner, title_id).await?;
    Ok((title, last))
  }

  /// Soft delete. Seasons, episodes and activity are kept so a later
  /// restore brings them back.
  pub async fn remove_title(&self, owner: Uuid, title_id: Uuid) -> Result<Activity> {
    let removed = self
      .store
      .soft_delete_title(owner, title_id)
      .await
      .map_err(Error::storage)?;
    if !removed {
      return Err(Error::TitleNotFound(title_id));
    }
    tracing::info!(%owner, %title_id, "title removed");
    self
      .record(NewActivity::new(owner, title_id, ActivityKind::RemovedWatched))
      .await
  }

  // ── Seasons ───────────────────────────────────────────────────────────

  pub async fn list_seasons(
    &self,
    owner: Uuid,
    title_id: Uuid,
  ) -> Result<Vec<SeasonProgress>> {
    self.get_title(owner, title_id).await?;
    self
      .store
      .list_seasons(owner, title_id)
      .await
      .map_err(Error::storage)
  }

  /// Write a season row directly. Does not run propagation.
  pub async fn upsert_season(
    &self,
    owner: Uuid,
    req: SeasonUpsert,
  ) -> Result<(SeasonProgress, Option<Activity>)> {
    check_rating(req.rating)?;
    self.episodic_title(owner, req.title_id).await?;

    let write = self
      .store
      .write_season(owner, req.title_id, req.season, RowChange {
        status: req.status,
        rating: req.rating,
      })
      .await
      .map_err(Error::storage)?;
    let season = req.season;

    let activity = match &write {
      RowWrite::Inserted(row) => {
        let kind = ActivityKind::season_added(&req.origin, SeasonValues {
          season,
          status: row.status,
          rating: row.rating,
        });
        let input = NewActivity::new(owner, req.title_id, kind).backdated(req.backdate);
        Some(self.record(input).await?)
      }
      RowWrite::Updated {
        row,
        status_changed,
        rating_changed,
      } => {
        let mut last = None;
        if let (true, Some(status)) = (*status_changed, row.status) {
          let kind = ActivityKind::SeasonStatusChanged(SeasonStatus { season, status });
          last = Some(self.record(NewActivity::new(owner, req.title_id, kind)).await?);
        }
        if *rating_changed {
          let kind = ActivityKind::SeasonRatingChanged(SeasonRating {
            season,
            rating: row.rating,
          });
          last = Some(self.record(NewActivity::new(owner, req.title_id, kind)).await?);
        }
        last
      }
      RowWrite::Unchanged(_) => None,
    };
    Ok((write.into_row(), activity))
  }

  /// Hard delete a season row of a live title.
  pub async fn remove_season(
    &self,
    owner: Uuid,
    title_id: Uuid,
    season_id: Uuid,
  ) -> Result<Activity> {
    self.get_title(owner, title_id).await?;
    let row = self
      .store
      .delete_season(owner, title_id, season_id)
      .await
      .map_err(Error::storage)?
      .ok_or(Error::SeasonNotFound(season_id))?;
    let kind = ActivityKind::SeasonRemoved(SeasonValues {
      season: row.season_number,
      status: row.status,
      rating: row.rating,
    });
    self.record(NewActivity::new(owner, title_id, kind)).await
  }

  // ── Episodes ──────────────────────────────────────────────────────────

  pub async fn list_episodes(
    &self,
    owner: Uuid,
    title_id: Uuid,
  ) -> Result<Vec<EpisodeProgress>> {
    self.get_title(owner, title_id).await?;
    self
      .store
      .list_episodes(owner, title_id)
      .await
      .map_err(Error::storage)
  }

  /// Insert or update one episode row, record what changed, and run the
  /// propagation cascade whenever a status was requested, even if the
  /// stored status already matched.
  pub async fn upsert_episode(
    &self,
    owner: Uuid,
    req: EpisodeUpsert,
  ) -> Result<EpisodeUpsertOutcome> {
    check_rating(req.rating)?;
    let title = self.episodic_title(owner, req.title_id).await?;
    let (season, episode) = (req.season, req.episode);

    let write = self
      .store
      .write_episode(owner, req.title_id, season, episode, RowChange {
        status: req.status,
        rating: req.rating,
      })
      .await
      .map_err(Error::storage)?;

    let activity = match &write {
      RowWrite::Inserted(row) => {
        let kind = ActivityKind::episode_added(req.origin, EpisodeValues {
          season,
          episode,
          status: row.status,
          rating: row.rating,
        });
        let input = NewActivity::new(owner, req.title_id, kind).backdated(req.backdate);
        Some(self.record(input).await?)
      }
      RowWrite::Updated {
        row,
        status_changed,
        rating_changed,
      } => {
        let mut last = None;
        if let (true, Some(status)) = (*status_changed, row.status) {
          let kind = ActivityKind::EpisodeStatusChanged(EpisodeStatus {
            season,
            episode,
            status,
          });
          last = Some(self.record(NewActivity::new(owner, req.title_id, kind)).await?);
        }
        if *rating_changed {
          let kind = ActivityKind::EpisodeRatingChanged(EpisodeRating {
            season,
            episode,
            rating: row.rating,
          });
          last = Some(self.record(NewActivity::new(owner, req.title_id, kind)).await?);
        }
        last
      }
      RowWrite::Unchanged(_) => None,
    };

    let propagation = match req.status {
      Some(status) if self.automate_statuses => {
        Some(self.propagate(&title, season, episode, status).await)
      }
      _ => None,
    };

    let episodes = self
      .store
      .list_episodes(owner, req.title_id)
      .await
      .map_err(Error::storage)?;
    Ok(EpisodeUpsertOutcome {
      episodes,
      activity,
      propagation,
    })
  }

  /// Hard delete an episode row of a live title. The record is built from
  /// the deleted row's values.
  pub async fn remove_episode(
    &self,
    owner: Uuid,
    title_id: Uuid,
    episode_id: Uuid,
  ) -> Result<Activity> {
    self.get_title(owner, title_id).await?;
    let row = self
      .store
      .delete_episode(owner, title_id, episode_id)
      .await
      .map_err(Error::storage)?
      .ok_or(Error::EpisodeNotFound(episode_id))?;
    let kind = ActivityKind::EpisodeRemoved(EpisodeValues {
      season:  row.season_number,
      episode: row.episode_number,
      status:  row.status,
      rating:  row.rating,
    });
    self.record(NewActivity::new(owner, title_id, kind)).await
  }

  /// Episodes of `season` whose status is one of `statuses`.
  pub async fn count_completed_episodes(
    &self,
    owner: Uuid,
    title_id: Uuid,
    season: u32,
    statuses: &[WatchStatus],
  ) -> Result<u64> {
    self
      .store
      .count_episodes(owner, title_id, season, statuses.to_vec())
      .await
      .map_err(Error::storage)
  }

  // ── Activity ──────────────────────────────────────────────────────────

  /// Records in storage order. Sort by [`Activity::occurred_at`] for a
  /// timeline.
  pub async fn list_activity(
    &self,
    owner: Uuid,
    title_id: Uuid,
  ) -> Result<Vec<Activity>> {
    self
      .store
      .list_activity(owner, title_id)
      .await
      .map_err(Error::storage)
  }

  /// Set or clear a record's custom date.
  pub async fn set_activity_date(
    &self,
    owner: Uuid,
    activity_id: Uuid,
    date: Option<DateTime<Utc>>,
  ) -> Result<Activity> {
    self
      .store
      .set_activity_date(owner, activity_id, date)
      .await
      .map_err(Error::storage)?
      .ok_or(Error::ActivityNotFound(activity_id))
  }

  /// Append a record to the ledger. `input.custom_date` backdates it.
  pub async fn record(&self, input: NewActivity) -> Result<Activity> {
    let activity = self
      .store
      .record_activity(input)
      .await
      .map_err(Error::storage)?;
    tracing::debug!(
      owner = %activity.owner,
      title_id = %activity.title_id,
      kind = activity.kind.discriminant(),
      "activity recorded"
    );
    Ok(activity)
  }

  async fn episodic_title(&self, owner: Uuid, title_id: Uuid) -> Result<TitleProgress> {
    let title = self.get_title(owner, title_id).await?;
    if !title.content.kind.is_episodic() {
      return Err(Error::NotEpisodic(title_id));
    }
    Ok(title)
  }
}
