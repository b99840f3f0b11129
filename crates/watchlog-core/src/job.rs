//! The in-memory registry of background import jobs.
//!
//! Jobs are never persisted. A request handler creates one, hands the id
//! back to the client, and a spawned worker updates it while the client
//! polls [`JobRegistry::get`].

use std::{
  collections::HashMap,
  fmt,
  sync::{Arc, PoisonError, RwLock},
  time::Duration,
};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

const JOB_ID_BYTES: usize = 16;

/// Opaque, unguessable job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for JobId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<String> for JobId {
  fn from(s: String) -> Self { Self(s) }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
  Created,
  Running,
  /// The worker ran to the end. Check `errors` for partial failure.
  Done,
  /// A top-level precondition failed before any item was processed.
  Cancelled,
}

impl JobStatus {
  pub fn is_finished(self) -> bool { matches!(self, Self::Done | Self::Cancelled) }
}

/// Snapshot of a job as seen by a poller.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
  pub id:           JobId,
  /// Free-form label, e.g. `"import:upload"`.
  pub kind:         String,
  pub status:       JobStatus,
  pub current_task: Option<String>,
  pub errors:       Vec<String>,
  #[serde(skip)]
  pub owner:        Uuid,
  pub created_at:   DateTime<Utc>,
  pub finished_at:  Option<DateTime<Utc>>,
}

// ─── JobRegistry ─────────────────────────────────────────────────────────────

/// Process-wide map of jobs. Cloning shares the same map.
///
/// Every accessor is owner-checked; a job owned by someone else is reported
/// as [`Error::JobNotFound`], exactly like an unknown id.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
  jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl JobRegistry {
  pub fn new() -> Self { Self::default() }

  /// Register a new job in the `CREATED` state.
  pub fn create(&self, kind: impl Into<String>, owner: Uuid) -> Result<JobId> {
    let id = generate_id()?;
    let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
    if jobs.contains_key(&id) {
      return Err(Error::JobIdCollision(id));
    }
    let job = Job {
      id: id.clone(),
      kind: kind.into(),
      status: JobStatus::Created,
      current_task: None,
      errors: Vec::new(),
      owner,
      created_at: Utc::now(),
      finished_at: None,
    };
    tracing::debug!(job_id = %id, kind = %job.kind, %owner, "job created");
    jobs.insert(id.clone(), job);
    Ok(id)
  }

  /// A copy of the job's current state.
  pub fn get(&self, id: &JobId, owner: Uuid) -> Result<Job> {
    let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
    match jobs.get(id) {
      Some(job) if job.owner == owner => Ok(job.clone()),
      Some(_) => {
        tracing::warn!(job_id = %id, %owner, "job requested by non-owner");
        Err(Error::JobNotFound(id.clone()))
      }
      None => Err(Error::JobNotFound(id.clone())),
    }
  }

  pub fn set_status(&self, id: &JobId, owner: Uuid, status: JobStatus) -> Result<()> {
    self.update(id, owner, |job| {
      job.status = status;
      if status.is_finished() {
        job.finished_at = Some(Utc::now());
      }
    })?;
    tracing::info!(job_id = %id, %status, "job status changed");
    Ok(())
  }

  pub fn set_current_task(
    &self,
    id: &JobId,
    owner: Uuid,
    task: impl Into<String>,
  ) -> Result<()> {
    let task = task.into();
    self.update(id, owner, |job| job.current_task = Some(task))
  }

  /// Record a non-fatal, per-item failure.
  pub fn append_error(
    &self,
    id: &JobId,
    owner: Uuid,
    message: impl Into<String>,
  ) -> Result<()> {
    let message = message.into();
    tracing::warn!(job_id = %id, error = %message, "job error");
    self.update(id, owner, |job| job.errors.push(message))
  }

  pub fn remove(&self, id: &JobId, owner: Uuid) -> Result<Job> {
    let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
    match jobs.get(id) {
      Some(job) if job.owner == owner => {}
      _ => return Err(Error::JobNotFound(id.clone())),
    }
    jobs.remove(id).ok_or_else(|| Error::JobNotFound(id.clone()))
  }

  /// Drop finished jobs whose `finished_at` is older than `max_age`.
  /// Returns how many were dropped.
  pub fn prune_finished(&self, max_age: Duration) -> usize {
    let cutoff = chrono::Duration::from_std(max_age)
      .ok()
      .and_then(|age| Utc::now().checked_sub_signed(age));
    let Some(cutoff) = cutoff else {
      return 0;
    };
    let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
    let before = jobs.len();
    jobs.retain(|_, job| !matches!(job.finished_at, Some(at) if at <= cutoff));
    let pruned = before - jobs.len();
    if pruned > 0 {
      tracing::debug!(pruned, "pruned finished jobs");
    }
    pruned
  }

  fn update(&self, id: &JobId, owner: Uuid, f: impl FnOnce(&mut Job)) -> Result<()> {
    let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
    match jobs.get_mut(id) {
      Some(job) if job.owner == owner => {
        f(job);
        Ok(())
      }
      _ => Err(Error::JobNotFound(id.clone())),
    }
  }
}

fn generate_id() -> Result<JobId> {
  let mut bytes = [0u8; JOB_ID_BYTES];
  OsRng
    .try_fill_bytes(&mut bytes)
    .map_err(|e| Error::Entropy(e.to_string()))?;
  Ok(JobId(URL_SAFE_NO_PAD.encode(bytes)))
}
