//! Error types for `watchlog-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{job::JobId, progress::ContentKind};

/// Coarse classification of an [`Error`], used by outer layers to pick a
/// response shape without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  AlreadyExists,
  InvalidState,
  StorageFailure,
  UpstreamFailure,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("title not found: {0}")]
  TitleNotFound(Uuid),

  #[error("season not found: {0}")]
  SeasonNotFound(Uuid),

  #[error("episode not found: {0}")]
  EpisodeNotFound(Uuid),

  #[error("activity not found: {0}")]
  ActivityNotFound(Uuid),

  /// Returned both for unknown ids and for jobs owned by someone else.
  #[error("job not found: {0}")]
  JobNotFound(JobId),

  #[error("content already tracked: {kind} {content_id}")]
  AlreadyTracked { kind: ContentKind, content_id: i64 },

  #[error("generated job id {0} is already in use, try again")]
  JobIdCollision(JobId),

  #[error("title {0} is not episodic content")]
  NotEpisodic(Uuid),

  #[error("rating {0} is out of range (0-10)")]
  RatingOutOfRange(u8),

  #[error("could not gather entropy for a job id: {0}")]
  Entropy(String),

  #[error("storage failure: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("upstream failure: {0}")]
  Upstream(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Box a backend error as [`Error::Storage`].
  pub fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Storage(Box::new(e))
  }

  /// Box a catalog or source error as [`Error::Upstream`].
  pub fn upstream(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Upstream(Box::new(e))
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::TitleNotFound(_)
      | Self::SeasonNotFound(_)
      | Self::EpisodeNotFound(_)
      | Self::ActivityNotFound(_)
      | Self::JobNotFound(_) => ErrorKind::NotFound,
      Self::AlreadyTracked { .. } | Self::JobIdCollision(_) => {
        ErrorKind::AlreadyExists
      }
      Self::NotEpisodic(_) | Self::RatingOutOfRange(_) => {
        ErrorKind::InvalidState
      }
      Self::Entropy(_) | Self::Storage(_) | Self::Serialization(_) => {
        ErrorKind::StorageFailure
      }
      Self::Upstream(_) => ErrorKind::UpstreamFailure,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
