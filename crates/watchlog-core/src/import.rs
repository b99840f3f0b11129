//! Background import of watch history from an external source.
//!
//! A request handler calls [`spawn_import`], gets a job id back at once, and
//! the worker feeds the source's events through the [`Tracker`] one at a
//! time while reporting progress into the [`JobRegistry`].

use std::{convert::Infallible, future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  activity::{ActivityKind, ImportSource, NewActivity, Origin, SeasonOrigin},
  catalog::ContentCatalog,
  job::{JobId, JobRegistry, JobStatus},
  progress::{ContentKind, ContentRef, NewTitle, TitleProgress, WatchStatus},
  store::ProgressStore,
  tracker::{EpisodeUpsert, SeasonUpsert, Tracker},
};

/// One watched unit reported by a source. Title level when `season` is
/// absent, season level when only `season` is set, episode level when both
/// are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEvent {
  pub kind:       ContentKind,
  pub content_id: i64,
  pub name:       String,
  pub season:     Option<u32>,
  pub episode:    Option<u32>,
  pub status:     Option<WatchStatus>,
  #[serde(default)]
  pub rating:     u8,
  /// When it was watched on the source platform.
  pub watched_at: Option<DateTime<Utc>>,
  /// When the rating was given on the source platform.
  pub rated_at:   Option<DateTime<Utc>>,
}

/// An external watch-history source.
pub trait WatchSource: Send + Sync + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  fn source(&self) -> ImportSource;

  /// Top-level precondition, e.g. the account is reachable and public.
  /// Failure cancels the job before any event is processed.
  fn preflight(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn fetch(
    &self,
  ) -> impl Future<Output = Result<Vec<WatchEvent>, Self::Error>> + Send + '_;
}

/// A history list uploaded by the client.
#[derive(Debug, Clone)]
pub struct UploadSource(pub Vec<WatchEvent>);

impl WatchSource for UploadSource {
  type Error = Infallible;

  fn source(&self) -> ImportSource { ImportSource::Upload }

  async fn preflight(&self) -> Result<(), Infallible> { Ok(()) }

  async fn fetch(&self) -> Result<Vec<WatchEvent>, Infallible> { Ok(self.0.clone()) }
}

// ─── Worker ──────────────────────────────────────────────────────────────────

/// Create a job, mark it running and start the worker. Returns immediately.
pub fn spawn_import<S, C, W>(
  tracker: Arc<Tracker<S, C>>,
  jobs: JobRegistry,
  owner: Uuid,
  source: W,
) -> Result<JobId>
where
  S: ProgressStore + 'static,
  C: ContentCatalog + 'static,
  W: WatchSource,
{
  let id = jobs.create(format!("import:{}", source.source()), owner)?;
  jobs.set_status(&id, owner, JobStatus::Running)?;

  let job_id = id.clone();
  tokio::spawn(async move {
    run_import(&*tracker, &jobs, &job_id, owner, &source).await;
  });
  Ok(id)
}

/// Job reporting that never fails the worker: a registry error only means
/// the job record went away, which is logged and otherwise ignored.
struct Reporter<'a> {
  jobs:  &'a JobRegistry,
  id:    &'a JobId,
  owner: Uuid,
}

impl Reporter<'_> {
  fn task(&self, task: String) {
    if let Err(e) = self.jobs.set_current_task(self.id, self.owner, task) {
      tracing::warn!(job_id = %self.id, error = %e, "could not update job task");
    }
  }

  fn error(&self, message: String) {
    if let Err(e) = self.jobs.append_error(self.id, self.owner, message) {
      tracing::warn!(job_id = %self.id, error = %e, "could not record job error");
    }
  }

  fn finish(&self, status: JobStatus) {
    if let Err(e) = self.jobs.set_status(self.id, self.owner, status) {
      tracing::warn!(job_id = %self.id, error = %e, "could not finish job");
    }
  }
}

/// The worker body. Per-event failures are appended to the job and the
/// batch continues; the job ends `DONE` unless the preflight fails.
pub async fn run_import<S, C, W>(
  tracker: &Tracker<S, C>,
  jobs: &JobRegistry,
  job_id: &JobId,
  owner: Uuid,
  source: &W,
) where
  S: ProgressStore,
  C: ContentCatalog,
  W: WatchSource,
{
  let tag = source.source();
  let report = Reporter {
    jobs,
    id: job_id,
    owner,
  };

  report.task(format!("Checking {tag} account"));
  if let Err(e) = source.preflight().await {
    tracing::warn!(job_id = %job_id, source = %tag, error = %e, "import cancelled");
    report.error(format!("{tag} account unavailable: {e}"));
    report.finish(JobStatus::Cancelled);
    return;
  }

  report.task(format!("Fetching history from {tag}"));
  let events = match source.fetch().await {
    Ok(events) => events,
    Err(e) => {
      report.error(format!("failed to fetch history from {tag}: {e}"));
      report.finish(JobStatus::Done);
      return;
    }
  };

  let total = events.len();
  for (i, event) in events.iter().enumerate() {
    report.task(format!("Importing {} ({}/{total})", event.name, i + 1));
    if let Err(e) = import_event(tracker, owner, tag, event).await {
      report.error(format!("{}: {e}", event.name));
    }
  }

  tracing::info!(job_id = %job_id, source = %tag, total, "import finished");
  report.finish(JobStatus::Done);
}

async fn import_event<S, C>(
  tracker: &Tracker<S, C>,
  owner: Uuid,
  source: ImportSource,
  event: &WatchEvent,
) -> Result<()>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  let content = ContentRef {
    kind:       event.kind,
    content_id: event.content_id,
    name:       event.name.clone(),
  };
  let origin = Origin::Imported(source);

  let Some(season) = event.season else {
    // Imported titles are assumed watched unless the source says otherwise.
    let mut new = NewTitle::new(owner, content);
    new.status = event.status.unwrap_or(WatchStatus::Finished);
    new.rating = event.rating;
    new.watched_at = event.watched_at;
    return match tracker.add_title(new, origin).await {
      Ok((title, _)) => {
        if event.rating != 0 {
          let kind = ActivityKind::ImportedRating {
            source,
            rating: event.rating,
          };
          tracker
            .record(NewActivity::new(owner, title.title_id, kind).backdated(event.rated_at))
            .await?;
        }
        Ok(())
      }
      Err(Error::AlreadyTracked { .. }) => {
        tracing::debug!(%owner, content_id = event.content_id, "already tracked, skipping");
        Ok(())
      }
      Err(e) => Err(e),
    };
  };

  let title = ensure_title(tracker, owner, content, origin, event.watched_at).await?;
  match event.episode {
    None => {
      tracker
        .upsert_season(owner, SeasonUpsert {
          title_id: title.title_id,
          season,
          status: event.status,
          rating: event.rating,
          origin: SeasonOrigin::Imported(source),
          backdate: event.watched_at,
        })
        .await?;
    }
    Some(episode) => {
      tracker
        .upsert_episode(owner, EpisodeUpsert {
          title_id: title.title_id,
          season,
          episode,
          status: event.status,
          rating: event.rating,
          origin,
          backdate: event.watched_at,
        })
        .await?;
    }
  }
  Ok(())
}

/// The live title for `content`, added as watching when missing.
async fn ensure_title<S, C>(
  tracker: &Tracker<S, C>,
  owner: Uuid,
  content: ContentRef,
  origin: Origin,
  watched_at: Option<DateTime<Utc>>,
) -> Result<TitleProgress>
where
  S: ProgressStore,
  C: ContentCatalog,
{
  let (kind, content_id) = (content.kind, content.content_id);
  if let Some(title) = tracker.find_title(owner, kind, content_id).await? {
    return Ok(title);
  }

  let mut new = NewTitle::new(owner, content);
  new.status = WatchStatus::Watching;
  new.watched_at = watched_at;
  match tracker.add_title(new, origin).await {
    Ok((title, _)) => Ok(title),
    // Another writer added it between the lookup and the insert.
    Err(Error::AlreadyTracked { .. }) => tracker
      .find_title(owner, kind, content_id)
      .await?
      .ok_or(Error::AlreadyTracked { kind, content_id }),
    Err(e) => Err(e),
  }
}
