//! Integration tests for `SqliteStore` and the tracker running on top of it,
//! against an in-memory database.

use std::{sync::Arc, time::Duration};

use chrono::{TimeZone as _, Utc};
use uuid::Uuid;
use watchlog_core::{
  ErrorKind,
  activity::{Activity, ActivityKind, ImportSource},
  catalog::FixedCatalog,
  import::{UploadSource, WatchEvent, WatchSource, run_import, spawn_import},
  job::{JobRegistry, JobStatus},
  progress::{ContentKind, ContentRef, NewTitle, TitleUpdate, WatchStatus},
  propagate::PropagationStep,
  store::{ProgressStore, RowChange},
  tracker::{EpisodeUpsert, SeasonUpsert, Tracker},
};

use crate::SqliteStore;

const SHOW_A: i64 = 1399;
const MOVIE: i64 = 603;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn catalog() -> FixedCatalog {
  FixedCatalog::new()
    .with_content(ContentKind::Show, SHOW_A, "Show A")
    .with_content(ContentKind::Movie, MOVIE, "The Matrix")
    .with_season(SHOW_A, 1, 2)
    .with_season(SHOW_A, 3, 0)
}

async fn tracker() -> Tracker<SqliteStore, FixedCatalog> {
  Tracker::new(store().await, catalog())
}

fn show_a() -> ContentRef {
  ContentRef {
    kind:       ContentKind::Show,
    content_id: SHOW_A,
    name:       "Show A".into(),
  }
}

fn movie() -> ContentRef {
  ContentRef {
    kind:       ContentKind::Movie,
    content_id: MOVIE,
    name:       "The Matrix".into(),
  }
}

fn new_title(owner: Uuid, content: ContentRef, status: WatchStatus) -> NewTitle {
  let mut new = NewTitle::new(owner, content);
  new.status = status;
  new
}

/// Add Show A as planned and return its id.
async fn planned_show(t: &Tracker<SqliteStore, FixedCatalog>, owner: Uuid) -> Uuid {
  let (title, _) = t
    .add_title(new_title(owner, show_a(), WatchStatus::Planned), Default::default())
    .await
    .unwrap();
  title.title_id
}

fn kinds(activities: &[Activity]) -> Vec<&'static str> {
  activities.iter().map(|a| a.kind.discriminant()).collect()
}

// ─── Titles ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_title_records_added_watched() {
  let t = tracker().await;
  let owner = Uuid::new_v4();

  let (title, activity) = t
    .add_title(new_title(owner, movie(), WatchStatus::Finished), Default::default())
    .await
    .unwrap();
  assert_eq!(title.status, Some(WatchStatus::Finished));
  assert!(!title.is_deleted());
  assert!(matches!(activity.kind, ActivityKind::AddedWatched(_)));

  let listed = t.list_titles(owner).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].title_id, title.title_id);
}

#[tokio::test]
async fn re_add_without_remove_is_already_tracked() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  t.create_or_restore_title(new_title(owner, movie(), WatchStatus::Finished))
    .await
    .unwrap();

  let err = t
    .create_or_restore_title(new_title(owner, movie(), WatchStatus::Planned))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[tokio::test]
async fn remove_then_re_add_restores_the_same_row() {
  let t = tracker().await;
  let owner = Uuid::new_v4();

  let mut first = new_title(owner, movie(), WatchStatus::Finished);
  first.rating = 4;
  let original = t.create_or_restore_title(first).await.unwrap();
  t.remove_title(owner, original.title_id).await.unwrap();
  assert!(t.list_titles(owner).await.unwrap().is_empty());

  let mut second = new_title(owner, movie(), WatchStatus::Dropped);
  second.rating = 7;
  let restored = t.create_or_restore_title(second).await.unwrap();

  assert_eq!(restored.title_id, original.title_id);
  assert_eq!(restored.status, Some(WatchStatus::Dropped));
  assert_eq!(restored.rating, 7);
  assert!(!restored.is_deleted());

  let listed = t.list_titles(owner).await.unwrap();
  assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn removed_title_is_not_found() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  let activity = t.remove_title(owner, id).await.unwrap();
  assert_eq!(activity.kind, ActivityKind::RemovedWatched);
  assert_eq!(t.get_title(owner, id).await.unwrap_err().kind(), ErrorKind::NotFound);
  assert_eq!(t.remove_title(owner, id).await.unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn titles_are_owner_scoped() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let other = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  assert_eq!(t.get_title(other, id).await.unwrap_err().kind(), ErrorKind::NotFound);
  assert!(t.list_titles(other).await.unwrap().is_empty());

  // Same content for a different owner is a separate row.
  t.create_or_restore_title(new_title(other, show_a(), WatchStatus::Planned))
    .await
    .unwrap();
}

#[tokio::test]
async fn concurrent_adds_create_exactly_one_row() {
  let t = Arc::new(tracker().await);
  let owner = Uuid::new_v4();

  let mut handles = Vec::new();
  for _ in 0..8 {
    let t = Arc::clone(&t);
    handles.push(tokio::spawn(async move {
      t.create_or_restore_title(new_title(owner, movie(), WatchStatus::Finished))
        .await
    }));
  }
  let mut created = 0;
  for h in handles {
    match h.await.unwrap() {
      Ok(_) => created += 1,
      Err(e) => assert_eq!(e.kind(), ErrorKind::AlreadyExists),
    }
  }
  assert_eq!(created, 1);
  assert_eq!(t.list_titles(owner).await.unwrap().len(), 1);
}

#[tokio::test]
async fn imported_title_with_watch_date_is_backdated() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let watched = Utc.with_ymd_and_hms(2019, 5, 4, 20, 0, 0).unwrap();

  let mut new = new_title(owner, movie(), WatchStatus::Finished);
  new.watched_at = Some(watched);
  let (title, activity) = t
    .add_title(new, watchlog_core::activity::Origin::Imported(ImportSource::Plex))
    .await
    .unwrap();
  assert_eq!(title.created_at, watched);
  assert_eq!(activity.kind.discriminant(), "imported_watched");

  let log = t.list_activity(owner, title.title_id).await.unwrap();
  assert_eq!(kinds(&log), vec!["imported_watched", "imported_added_watched"]);
  assert_eq!(log[1].custom_date, Some(watched));
  assert_eq!(log[1].occurred_at(), watched);
}

#[tokio::test]
async fn update_title_records_each_change() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  let (title, last) = t
    .update_title(owner, id, TitleUpdate {
      status: Some(WatchStatus::Hold),
      rating: 6,
      thoughts: Some("slow start".into()),
      remove_thoughts: false,
    })
    .await
    .unwrap();
  assert_eq!(title.status, Some(WatchStatus::Hold));
  assert_eq!(title.rating, 6);
  assert_eq!(title.thoughts.as_deref(), Some("slow start"));
  assert_eq!(last.unwrap().kind, ActivityKind::ThoughtsChanged);

  let (title, last) = t
    .update_title(owner, id, TitleUpdate {
      remove_thoughts: true,
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(title.thoughts.is_none());
  assert_eq!(last.unwrap().kind, ActivityKind::ThoughtsRemoved("slow start".into()));

  // Nothing differs: no record.
  let (_, last) = t
    .update_title(owner, id, TitleUpdate {
      status: Some(WatchStatus::Hold),
      rating: 6,
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(last.is_none());

  let log = t.list_activity(owner, id).await.unwrap();
  assert_eq!(kinds(&log), vec![
    "added_watched",
    "status_changed",
    "rating_changed",
    "thoughts_changed",
    "thoughts_removed",
  ]);
}

#[tokio::test]
async fn rating_above_ten_is_invalid() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  let err = t
    .upsert_episode(owner, EpisodeUpsert::new(id, 1, 1).rating(11))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidState);
}

// ─── Episodes ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_finished_episode_creates_watching_season_and_title() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  let outcome = t
    .upsert_episode(owner, EpisodeUpsert::new(id, 1, 1).status(WatchStatus::Finished))
    .await
    .unwrap();

  assert_eq!(outcome.episodes.len(), 1);
  assert_eq!(outcome.episodes[0].status, Some(WatchStatus::Finished));
  assert_eq!(outcome.activity.unwrap().kind.discriminant(), "episode_added");

  let seasons = t.list_seasons(owner, id).await.unwrap();
  assert_eq!(seasons.len(), 1);
  assert_eq!(seasons[0].status, Some(WatchStatus::Watching));

  let title = t.get_title(owner, id).await.unwrap();
  assert_eq!(title.status, Some(WatchStatus::Watching));

  let report = outcome.propagation.unwrap();
  assert!(report.failed.is_none());
  assert_eq!(report.title_status, Some(WatchStatus::Watching));

  let log = t.list_activity(owner, id).await.unwrap();
  assert_eq!(kinds(&log), vec![
    "added_watched",
    "episode_added",
    "season_added_auto",
    "status_changed_auto",
  ]);
}

#[tokio::test]
async fn finishing_every_canonical_episode_finishes_the_season() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  t.upsert_episode(owner, EpisodeUpsert::new(id, 1, 1).status(WatchStatus::Finished))
    .await
    .unwrap();
  let outcome = t
    .upsert_episode(owner, EpisodeUpsert::new(id, 1, 2).status(WatchStatus::Finished))
    .await
    .unwrap();

  let done = t
    .count_completed_episodes(owner, id, 1, &WatchStatus::COMPLETED)
    .await
    .unwrap();
  assert_eq!(done, 2);

  let report = outcome.propagation.unwrap();
  assert_eq!(report.season.unwrap().status, Some(WatchStatus::Finished));
  assert_eq!(kinds(&report.activities), vec!["season_status_changed_auto"]);

  let season = t.store().get_season(owner, id, 1).await.unwrap().unwrap();
  assert_eq!(season.status, Some(WatchStatus::Finished));
}

#[tokio::test]
async fn finished_season_is_never_reverted() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  for ep in [1, 2] {
    t.upsert_episode(owner, EpisodeUpsert::new(id, 1, ep).status(WatchStatus::Finished))
      .await
      .unwrap();
  }
  t.upsert_episode(owner, EpisodeUpsert::new(id, 1, 1).status(WatchStatus::Watching))
    .await
    .unwrap();
  t.upsert_episode(owner, EpisodeUpsert::new(id, 1, 3).status(WatchStatus::Planned))
    .await
    .unwrap();

  let season = t.store().get_season(owner, id, 1).await.unwrap().unwrap();
  assert_eq!(season.status, Some(WatchStatus::Finished));
}

#[tokio::test]
async fn unchanged_upsert_records_nothing_but_still_propagates() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;
  let req = EpisodeUpsert::new(id, 1, 1).status(WatchStatus::Watching).rating(5);

  let first = t.upsert_episode(owner, req.clone()).await.unwrap();
  let before = t.list_activity(owner, id).await.unwrap().len();

  // Remove the season so the second run has something to repair.
  let season = t.store().get_season(owner, id, 1).await.unwrap().unwrap();
  t.remove_season(owner, id, season.season_id).await.unwrap();

  let second = t.upsert_episode(owner, req).await.unwrap();
  assert!(second.activity.is_none());
  assert_eq!(
    first.episodes[0].updated_at,
    second.episodes[0].updated_at
  );

  let report = second.propagation.unwrap();
  assert_eq!(kinds(&report.activities), vec!["season_added_auto"]);
  assert!(t.store().get_season(owner, id, 1).await.unwrap().is_some());

  // season_removed + season_added_auto, nothing for the episode itself.
  let after = t.list_activity(owner, id).await.unwrap();
  assert_eq!(after.len(), before + 2);
}

#[tokio::test]
async fn status_and_rating_change_returns_the_rating_record() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  t.upsert_episode(owner, EpisodeUpsert::new(id, 2, 1).status(WatchStatus::Watching))
    .await
    .unwrap();
  let outcome = t
    .upsert_episode(
      owner,
      EpisodeUpsert::new(id, 2, 1).status(WatchStatus::Hold).rating(8),
    )
    .await
    .unwrap();

  let activity = outcome.activity.unwrap();
  assert_eq!(activity.kind.discriminant(), "episode_rating_changed");

  let log = t.list_activity(owner, id).await.unwrap();
  let episode_records: Vec<_> = kinds(&log)
    .into_iter()
    .filter(|k| k.starts_with("episode_"))
    .collect();
  assert_eq!(episode_records, vec![
    "episode_added",
    "episode_status_changed",
    "episode_rating_changed",
  ]);
}

#[tokio::test]
async fn rating_only_upsert_does_not_propagate() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  let outcome = t
    .upsert_episode(owner, EpisodeUpsert::new(id, 1, 1).rating(3))
    .await
    .unwrap();
  assert!(outcome.propagation.is_none());
  assert!(t.list_seasons(owner, id).await.unwrap().is_empty());
  assert_eq!(t.get_title(owner, id).await.unwrap().status, Some(WatchStatus::Planned));
}

#[tokio::test]
async fn dropped_episode_stops_propagation() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  let outcome = t
    .upsert_episode(owner, EpisodeUpsert::new(id, 1, 1).status(WatchStatus::Dropped))
    .await
    .unwrap();
  let report = outcome.propagation.unwrap();
  assert!(report.activities.is_empty());
  assert!(t.list_seasons(owner, id).await.unwrap().is_empty());
  assert_eq!(t.get_title(owner, id).await.unwrap().status, Some(WatchStatus::Planned));
}

#[tokio::test]
async fn dropped_episodes_count_towards_completion() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  t.upsert_episode(owner, EpisodeUpsert::new(id, 1, 1).status(WatchStatus::Dropped))
    .await
    .unwrap();
  t.upsert_episode(owner, EpisodeUpsert::new(id, 1, 2).status(WatchStatus::Finished))
    .await
    .unwrap();

  let season = t.store().get_season(owner, id, 1).await.unwrap().unwrap();
  assert_eq!(season.status, Some(WatchStatus::Finished));
}

#[tokio::test]
async fn planned_season_is_promoted_to_watching() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  t.upsert_season(owner, SeasonUpsert {
    title_id: id,
    season:   2,
    status:   Some(WatchStatus::Planned),
    rating:   0,
    origin:   Default::default(),
    backdate: None,
  })
  .await
  .unwrap();

  let outcome = t
    .upsert_episode(owner, EpisodeUpsert::new(id, 2, 4).status(WatchStatus::Watching))
    .await
    .unwrap();
  let report = outcome.propagation.unwrap();
  assert_eq!(report.season.unwrap().status, Some(WatchStatus::Watching));
  assert!(matches!(
    &report.activities[0].kind,
    ActivityKind::SeasonStatusChangedAuto(auto) if auto.reason.contains("planned")
  ));
}

#[tokio::test]
async fn catalog_failure_keeps_earlier_steps() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  // Season 2 is unknown to the catalog.
  let outcome = t
    .upsert_episode(owner, EpisodeUpsert::new(id, 2, 1).status(WatchStatus::Finished))
    .await
    .unwrap();
  let report = outcome.propagation.unwrap();
  let failure = report.failed.unwrap();
  assert_eq!(failure.step, PropagationStep::Completion);

  let season = t.store().get_season(owner, id, 2).await.unwrap().unwrap();
  assert_eq!(season.status, Some(WatchStatus::Watching));
  assert_eq!(t.get_title(owner, id).await.unwrap().status, Some(WatchStatus::Watching));
}

#[tokio::test]
async fn season_with_zero_canonical_episodes_is_complete() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  t.upsert_episode(owner, EpisodeUpsert::new(id, 3, 1).status(WatchStatus::Planned))
    .await
    .unwrap();
  let season = t.store().get_season(owner, id, 3).await.unwrap().unwrap();
  assert_eq!(season.status, Some(WatchStatus::Finished));
}

#[tokio::test]
async fn automation_can_be_disabled() {
  let t = Tracker::new(store().await, catalog()).with_automation(false);
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  let outcome = t
    .upsert_episode(owner, EpisodeUpsert::new(id, 1, 1).status(WatchStatus::Finished))
    .await
    .unwrap();
  assert!(outcome.propagation.is_none());
  assert!(t.list_seasons(owner, id).await.unwrap().is_empty());
}

#[tokio::test]
async fn episodes_need_an_episodic_title() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let (movie_row, _) = t
    .add_title(new_title(owner, movie(), WatchStatus::Finished), Default::default())
    .await
    .unwrap();

  let err = t
    .upsert_episode(
      owner,
      EpisodeUpsert::new(movie_row.title_id, 1, 1).status(WatchStatus::Finished),
    )
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidState);

  let err = t
    .upsert_episode(
      owner,
      EpisodeUpsert::new(Uuid::new_v4(), 1, 1).status(WatchStatus::Finished),
    )
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn remove_episode_records_the_deleted_values() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  let outcome = t
    .upsert_episode(
      owner,
      EpisodeUpsert::new(id, 1, 2).status(WatchStatus::Watching).rating(9),
    )
    .await
    .unwrap();
  let episode_id = outcome.episodes[0].episode_id;

  let activity = t.remove_episode(owner, id, episode_id).await.unwrap();
  match activity.kind {
    ActivityKind::EpisodeRemoved(values) => {
      assert_eq!(values.season, 1);
      assert_eq!(values.episode, 2);
      assert_eq!(values.status, Some(WatchStatus::Watching));
      assert_eq!(values.rating, 9);
    }
    other => panic!("unexpected record: {other:?}"),
  }
  assert!(t.list_episodes(owner, id).await.unwrap().is_empty());

  let err = t.remove_episode(owner, id, episode_id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn children_of_a_removed_title_are_left_alone() {
  let s = store().await;
  let t = Tracker::new(s.clone(), catalog());
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  let outcome = t
    .upsert_episode(owner, EpisodeUpsert::new(id, 1, 1).status(WatchStatus::Watching))
    .await
    .unwrap();
  let episode_id = outcome.episodes[0].episode_id;
  let season_id = outcome.propagation.unwrap().season.unwrap().season_id;
  t.remove_title(owner, id).await.unwrap();

  let err = t.remove_episode(owner, id, episode_id).await.unwrap_err();
  assert!(matches!(err, watchlog_core::Error::TitleNotFound(_)));
  let err = t.remove_season(owner, id, season_id).await.unwrap_err();
  assert!(matches!(err, watchlog_core::Error::TitleNotFound(_)));

  assert_eq!(s.list_episodes(owner, id).await.unwrap().len(), 1);
  assert_eq!(s.list_seasons(owner, id).await.unwrap().len(), 1);
  let log = s.list_activity(owner, id).await.unwrap();
  assert_eq!(log.last().unwrap().kind.discriminant(), "removed_watched");
}

#[tokio::test]
async fn title_promotion_only_touches_the_status() {
  let s = store().await;
  let t = Tracker::new(s.clone(), catalog());
  let owner = Uuid::new_v4();

  let mut planned = new_title(owner, show_a(), WatchStatus::Planned);
  planned.rating = 6;
  planned.thoughts = Some("slow start".into());
  let planned = t.create_or_restore_title(planned).await.unwrap();
  assert!(
    s.promote_title_status(owner, planned.title_id, WatchStatus::Watching)
      .await
      .unwrap()
  );
  let title = t.get_title(owner, planned.title_id).await.unwrap();
  assert_eq!(title.status, Some(WatchStatus::Watching));
  assert_eq!(title.rating, 6);
  assert_eq!(title.thoughts.as_deref(), Some("slow start"));

  // A title that has moved past planned is never pulled back.
  t.update_title(owner, planned.title_id, TitleUpdate {
    status: Some(WatchStatus::Finished),
    ..Default::default()
  })
  .await
  .unwrap();
  assert!(
    !s.promote_title_status(owner, planned.title_id, WatchStatus::Watching)
      .await
      .unwrap()
  );
  let outcome = t
    .upsert_episode(
      owner,
      EpisodeUpsert::new(planned.title_id, 1, 1).status(WatchStatus::Watching),
    )
    .await
    .unwrap();
  assert!(outcome.propagation.unwrap().title_status.is_none());
  let title = t.get_title(owner, planned.title_id).await.unwrap();
  assert_eq!(title.status, Some(WatchStatus::Finished));

  assert!(
    !s.promote_title_status(Uuid::new_v4(), planned.title_id, WatchStatus::Watching)
      .await
      .unwrap()
  );
}

#[tokio::test]
async fn count_ignores_other_seasons_and_statuses() {
  let s = store().await;
  let t = Tracker::new(s.clone(), catalog()).with_automation(false);
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;

  for (season, episode, status) in [
    (1, 1, WatchStatus::Finished),
    (1, 2, WatchStatus::Watching),
    (1, 3, WatchStatus::Dropped),
    (2, 1, WatchStatus::Finished),
  ] {
    s.write_episode(owner, id, season, episode, RowChange {
      status: Some(status),
      rating: 0,
    })
    .await
    .unwrap();
  }

  let done = t
    .count_completed_episodes(owner, id, 1, &WatchStatus::COMPLETED)
    .await
    .unwrap();
  assert_eq!(done, 2);
  assert_eq!(s.count_episodes(owner, id, 1, vec![]).await.unwrap(), 0);
}

// ─── Seasons ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_season_records_changes() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;
  let req = SeasonUpsert {
    title_id: id,
    season:   1,
    status:   Some(WatchStatus::Watching),
    rating:   0,
    origin:   Default::default(),
    backdate: None,
  };

  let (season, added) = t.upsert_season(owner, req.clone()).await.unwrap();
  assert_eq!(season.status, Some(WatchStatus::Watching));
  assert_eq!(added.unwrap().kind.discriminant(), "season_added");

  let (_, none) = t.upsert_season(owner, req.clone()).await.unwrap();
  assert!(none.is_none());

  let (season, changed) = t
    .upsert_season(owner, SeasonUpsert {
      rating: 7,
      ..req
    })
    .await
    .unwrap();
  assert_eq!(season.rating, 7);
  assert_eq!(changed.unwrap().kind.discriminant(), "season_rating_changed");

  let removed = t.remove_season(owner, id, season.season_id).await.unwrap();
  assert_eq!(removed.kind.discriminant(), "season_removed");
  assert_eq!(
    t.remove_season(owner, id, season.season_id)
      .await
      .unwrap_err()
      .kind(),
    ErrorKind::NotFound
  );
}

// ─── Activity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn activity_date_can_be_set_and_cleared() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let id = planned_show(&t, owner).await;
  let record = t.list_activity(owner, id).await.unwrap().remove(0);
  let date = Utc.with_ymd_and_hms(2021, 1, 2, 3, 4, 5).unwrap();

  let updated = t
    .set_activity_date(owner, record.activity_id, Some(date))
    .await
    .unwrap();
  assert_eq!(updated.occurred_at(), date);
  assert_eq!(updated.created_at, record.created_at);
  assert_eq!(updated.kind, record.kind);

  let cleared = t
    .set_activity_date(owner, record.activity_id, None)
    .await
    .unwrap();
  assert!(cleared.custom_date.is_none());

  let err = t
    .set_activity_date(Uuid::new_v4(), record.activity_id, Some(date))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn activity_is_listed_per_owner_and_title() {
  let t = tracker().await;
  let owner = Uuid::new_v4();
  let show = planned_show(&t, owner).await;
  let (film, _) = t
    .add_title(new_title(owner, movie(), WatchStatus::Finished), Default::default())
    .await
    .unwrap();

  assert_eq!(t.list_activity(owner, show).await.unwrap().len(), 1);
  assert_eq!(t.list_activity(owner, film.title_id).await.unwrap().len(), 1);
  assert!(t.list_activity(Uuid::new_v4(), show).await.unwrap().is_empty());
}

// ─── Import worker ───────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("profile is private")]
struct PrivateProfile;

struct PrivateSource;

impl WatchSource for PrivateSource {
  type Error = PrivateProfile;

  fn source(&self) -> ImportSource { ImportSource::Trakt }

  async fn preflight(&self) -> Result<(), PrivateProfile> { Err(PrivateProfile) }

  async fn fetch(&self) -> Result<Vec<WatchEvent>, PrivateProfile> {
    Ok(vec![movie_event()])
  }
}

#[derive(Debug, thiserror::Error)]
#[error("connection reset")]
struct Unreachable;

struct FlakySource;

impl WatchSource for FlakySource {
  type Error = Unreachable;

  fn source(&self) -> ImportSource { ImportSource::Jellyfin }

  async fn preflight(&self) -> Result<(), Unreachable> { Ok(()) }

  async fn fetch(&self) -> Result<Vec<WatchEvent>, Unreachable> { Err(Unreachable) }
}

fn movie_event() -> WatchEvent {
  WatchEvent {
    kind:       ContentKind::Movie,
    content_id: MOVIE,
    name:       "The Matrix".into(),
    season:     None,
    episode:    None,
    status:     Some(WatchStatus::Finished),
    rating:     9,
    watched_at: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
    rated_at:   Some(Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap()),
  }
}

fn episode_event(content_id: i64, kind: ContentKind, episode: u32) -> WatchEvent {
  WatchEvent {
    kind,
    content_id,
    name: "Show A".into(),
    season: Some(1),
    episode: Some(episode),
    status: Some(WatchStatus::Finished),
    rating: 0,
    watched_at: None,
    rated_at: None,
  }
}

#[tokio::test]
async fn import_continues_past_failed_events() {
  let t = tracker().await;
  let jobs = JobRegistry::new();
  let owner = Uuid::new_v4();
  let id = jobs.create("import:upload", owner).unwrap();

  let source = UploadSource(vec![
    movie_event(),
    episode_event(SHOW_A, ContentKind::Show, 1),
    // A movie cannot have episodes.
    episode_event(MOVIE, ContentKind::Movie, 1),
    episode_event(SHOW_A, ContentKind::Show, 2),
    // Already tracked: skipped silently.
    movie_event(),
  ]);
  run_import(&t, &jobs, &id, owner, &source).await;

  let job = jobs.get(&id, owner).unwrap();
  assert_eq!(job.status, JobStatus::Done);
  assert_eq!(job.errors.len(), 1, "{:?}", job.errors);
  assert!(job.finished_at.is_some());

  let titles = t.list_titles(owner).await.unwrap();
  assert_eq!(titles.len(), 2);
  let show = titles
    .iter()
    .find(|title| title.content.kind == ContentKind::Show)
    .unwrap();
  assert_eq!(show.status, Some(WatchStatus::Watching));

  let episodes = t.list_episodes(owner, show.title_id).await.unwrap();
  assert_eq!(episodes.len(), 2);
  let season = t
    .store()
    .get_season(owner, show.title_id, 1)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(season.status, Some(WatchStatus::Finished));

  let log = t.list_activity(owner, show.title_id).await.unwrap();
  assert_eq!(log[0].kind.discriminant(), "imported_watched");
  assert!(kinds(&log).contains(&"episode_imported"));
}

#[tokio::test]
async fn imported_rating_is_recorded_at_its_own_date() {
  let t = tracker().await;
  let jobs = JobRegistry::new();
  let owner = Uuid::new_v4();
  let id = jobs.create("import:upload", owner).unwrap();

  run_import(&t, &jobs, &id, owner, &UploadSource(vec![movie_event()])).await;

  let title = t
    .find_title(owner, ContentKind::Movie, MOVIE)
    .await
    .unwrap()
    .unwrap();
  let log = t.list_activity(owner, title.title_id).await.unwrap();
  assert_eq!(kinds(&log), vec![
    "imported_watched",
    "imported_added_watched",
    "imported_rating"
  ]);
  assert_eq!(
    log[2].kind,
    ActivityKind::ImportedRating {
      source: ImportSource::Upload,
      rating: 9,
    }
  );
  assert_eq!(
    log[2].custom_date,
    Some(Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap())
  );
}

#[tokio::test]
async fn unrated_import_writes_no_rating_record() {
  let t = tracker().await;
  let jobs = JobRegistry::new();
  let owner = Uuid::new_v4();
  let id = jobs.create("import:upload", owner).unwrap();

  let mut event = movie_event();
  event.rating = 0;
  run_import(&t, &jobs, &id, owner, &UploadSource(vec![event])).await;

  let title = t
    .find_title(owner, ContentKind::Movie, MOVIE)
    .await
    .unwrap()
    .unwrap();
  let log = t.list_activity(owner, title.title_id).await.unwrap();
  assert!(!kinds(&log).contains(&"imported_rating"));
}

#[tokio::test]
async fn imported_title_without_status_is_finished() {
  let t = tracker().await;
  let jobs = JobRegistry::new();
  let owner = Uuid::new_v4();
  let id = jobs.create("import:upload", owner).unwrap();

  let show = WatchEvent {
    kind:       ContentKind::Show,
    content_id: SHOW_A,
    name:       "Show A".into(),
    season:     None,
    episode:    None,
    status:     None,
    rating:     0,
    watched_at: None,
    rated_at:   None,
  };
  run_import(&t, &jobs, &id, owner, &UploadSource(vec![show])).await;

  let title = t
    .find_title(owner, ContentKind::Show, SHOW_A)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(title.status, Some(WatchStatus::Finished));
  assert!(jobs.get(&id, owner).unwrap().errors.is_empty());
}

#[tokio::test]
async fn private_profile_cancels_before_processing() {
  let t = tracker().await;
  let jobs = JobRegistry::new();
  let owner = Uuid::new_v4();
  let id = jobs.create("import:trakt", owner).unwrap();

  run_import(&t, &jobs, &id, owner, &PrivateSource).await;

  let job = jobs.get(&id, owner).unwrap();
  assert_eq!(job.status, JobStatus::Cancelled);
  assert_eq!(job.errors.len(), 1);
  assert!(t.list_titles(owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn fetch_failure_still_finishes_done() {
  let t = tracker().await;
  let jobs = JobRegistry::new();
  let owner = Uuid::new_v4();
  let id = jobs.create("import:jellyfin", owner).unwrap();

  run_import(&t, &jobs, &id, owner, &FlakySource).await;

  let job = jobs.get(&id, owner).unwrap();
  assert_eq!(job.status, JobStatus::Done);
  assert_eq!(job.errors.len(), 1);
}

#[tokio::test]
async fn spawned_import_can_be_polled_to_completion() {
  let t = Arc::new(tracker().await);
  let jobs = JobRegistry::new();
  let owner = Uuid::new_v4();

  let id = spawn_import(
    Arc::clone(&t),
    jobs.clone(),
    owner,
    UploadSource(vec![movie_event()]),
  )
  .unwrap();
  assert!(jobs.get(&id, Uuid::new_v4()).is_err());

  let mut job = jobs.get(&id, owner).unwrap();
  for _ in 0..200 {
    if job.status.is_finished() {
      break;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
    job = jobs.get(&id, owner).unwrap();
  }
  assert_eq!(job.status, JobStatus::Done);
  assert_eq!(job.kind, "import:upload");
  assert_eq!(t.list_titles(owner).await.unwrap().len(), 1);
}
