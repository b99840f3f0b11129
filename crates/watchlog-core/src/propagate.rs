//! Episode → season → title status propagation.
//!
//! Runs after every episode write that carries a status. Each step commits
//! on its own; when one fails the cascade stops, the failure is logged with
//! the step name, and the work of earlier steps is kept.

use serde::Serialize;

use crate::{
  Error, Result,
  activity::{
    Activity, ActivityKind, AutoSeasonStatus, AutoStatus, NewActivity,
    SeasonOrigin, SeasonValues,
  },
  catalog::ContentCatalog,
  progress::{RowWrite, SeasonProgress, TitleProgress, WatchStatus},
  store::{ProgressStore, RowChange},
  tracker::Tracker,
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PropagationStep {
  /// Create the season row or promote it to watching.
  Season,
  /// Promote the title to watching.
  Title,
  /// Mark the season finished once every canonical episode is done.
  Completion,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepFailure {
  pub step:    PropagationStep,
  pub message: String,
}

/// What one run of the cascade did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PropagationReport {
  /// The season row as last created or modified by the cascade.
  pub season:       Option<SeasonProgress>,
  /// Set when the title was promoted.
  pub title_status: Option<WatchStatus>,
  pub activities:   Vec<Activity>,
  pub failed:       Option<StepFailure>,
}

/// Inputs shared by every step.
struct Trigger<'a> {
  title:   &'a TitleProgress,
  season:  u32,
  episode: u32,
  status:  WatchStatus,
}

impl<S, C> Tracker<S, C>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  pub(crate) async fn propagate(
    &self,
    title: &TitleProgress,
    season: u32,
    episode: u32,
    status: WatchStatus,
  ) -> PropagationReport {
    let mut report = PropagationReport::default();
    if status == WatchStatus::Dropped {
      tracing::debug!(title_id = %title.title_id, season, episode, "dropped episode, nothing to propagate");
      return report;
    }

    let trigger = Trigger {
      title,
      season,
      episode,
      status,
    };
    for step in [
      PropagationStep::Season,
      PropagationStep::Title,
      PropagationStep::Completion,
    ] {
      let outcome = match step {
        PropagationStep::Season => self.season_step(&trigger, &mut report).await,
        PropagationStep::Title => self.title_step(&trigger, &mut report).await,
        PropagationStep::Completion => {
          self.completion_step(&trigger, &mut report).await
        }
      };
      if let Err(e) = outcome {
        tracing::error!(
          %step,
          owner = %title.owner,
          title_id = %title.title_id,
          season,
          episode,
          error = %e,
          "propagation stopped"
        );
        report.failed = Some(StepFailure {
          step,
          message: e.to_string(),
        });
        break;
      }
    }
    report
  }

  async fn season_step(
    &self,
    t: &Trigger<'_>,
    report: &mut PropagationReport,
  ) -> Result<()> {
    let (owner, title_id) = (t.title.owner, t.title.title_id);
    let existing = self
      .store
      .get_season(owner, title_id, t.season)
      .await
      .map_err(Error::storage)?;

    match existing {
      None => {
        // A single finished episode does not finish the season.
        let initial = match t.status {
          WatchStatus::Finished => WatchStatus::Watching,
          other => other,
        };
        let write = self
          .write_season_status(t, initial)
          .await?;
        if let RowWrite::Inserted(row) = &write {
          let origin = SeasonOrigin::Auto {
            reason: format!(
              "Episode {} was set to {} before the season was tracked.",
              t.episode, t.status
            ),
          };
          let kind = ActivityKind::season_added(&origin, SeasonValues {
            season: t.season,
            status: row.status,
            rating: row.rating,
          });
          report
            .activities
            .push(self.record(NewActivity::new(owner, title_id, kind)).await?);
        }
        report.season = Some(write.into_row());
      }
      Some(row) if matches!(row.status, None | Some(WatchStatus::Planned)) => {
        let reason = match row.status {
          None => format!(
            "Episode {} was set to {} while the season had no status.",
            t.episode, t.status
          ),
          Some(_) => format!(
            "Episode {} was set to {} while the season was planned.",
            t.episode, t.status
          ),
        };
        let write = self.write_season_status(t, WatchStatus::Watching).await?;
        if let RowWrite::Updated {
          status_changed: true,
          ..
        } = &write
        {
          let kind = ActivityKind::SeasonStatusChangedAuto(AutoSeasonStatus {
            season: t.season,
            status: Some(WatchStatus::Watching),
            reason,
          });
          report
            .activities
            .push(self.record(NewActivity::new(owner, title_id, kind)).await?);
        }
        report.season = Some(write.into_row());
      }
      Some(_) => {}
    }
    Ok(())
  }

  async fn title_step(
    &self,
    t: &Trigger<'_>,
    report: &mut PropagationReport,
  ) -> Result<()> {
    let (owner, title_id) = (t.title.owner, t.title.title_id);
    let promoted = self
      .store
      .promote_title_status(owner, title_id, WatchStatus::Watching)
      .await
      .map_err(Error::storage)?;
    if !promoted {
      return Ok(());
    }
    let kind = ActivityKind::StatusChangedAuto(AutoStatus {
      status: WatchStatus::Watching,
      reason: format!(
        "Episode {} of season {} was set to {}.",
        t.episode, t.season, t.status
      ),
    });
    report
      .activities
      .push(self.record(NewActivity::new(owner, title_id, kind)).await?);
    report.title_status = Some(WatchStatus::Watching);
    Ok(())
  }

  async fn completion_step(
    &self,
    t: &Trigger<'_>,
    report: &mut PropagationReport,
  ) -> Result<()> {
    let (owner, title_id) = (t.title.owner, t.title.title_id);
    let canonical = self
      .catalog
      .season_episode_count(t.title.content.content_id, t.season)
      .await
      .map_err(Error::upstream)?;
    let done = self
      .count_completed_episodes(owner, title_id, t.season, &WatchStatus::COMPLETED)
      .await?;
    if done < u64::from(canonical) {
      tracing::trace!(%title_id, season = t.season, done, canonical, "season not complete");
      return Ok(());
    }

    let write = self.write_season_status(t, WatchStatus::Finished).await?;
    let changed = match &write {
      RowWrite::Inserted(_) => true,
      RowWrite::Updated { status_changed, .. } => *status_changed,
      RowWrite::Unchanged(_) => false,
    };
    if changed {
      let kind = ActivityKind::SeasonStatusChangedAuto(AutoSeasonStatus {
        season: t.season,
        status: Some(WatchStatus::Finished),
        reason: format!(
          "{done} of {canonical} episodes in season {} are finished or dropped.",
          t.season
        ),
      });
      report
        .activities
        .push(self.record(NewActivity::new(owner, title_id, kind)).await?);
      report.season = Some(write.into_row());
    }
    Ok(())
  }

  async fn write_season_status(
    &self,
    t: &Trigger<'_>,
    status: WatchStatus,
  ) -> Result<RowWrite<SeasonProgress>> {
    self
      .store
      .write_season(t.title.owner, t.title.title_id, t.season, RowChange {
        status: Some(status),
        rating: 0,
      })
      .await
      .map_err(Error::storage)
  }
}
