//! Service tests against the in-memory store.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use mockable::DefaultClock;
use rstest::{fixture, rstest};

use crate::tracker::{
    domain::{SubtaskId, Task, TaskId},
    memory::{InMemoryTaskStore, WriteStep},
    service::{NewTask, TaskService, TaskUpdate},
    subtask_diff::DesiredSubtask,
    timer::{displayed_remaining, TimerState},
    validation::TaskFields,
    TrackerError, TrackerResult,
};

const OWNER: i32 = 1;
const STRANGER: i32 = 2;

struct Harness {
    store: InMemoryTaskStore,
    service: TaskService,
}

#[fixture]
fn harness() -> Harness {
    let store = InMemoryTaskStore::new();
    let service = TaskService::new(Arc::new(store.clone()), Arc::new(DefaultClock));
    Harness { store, service }
}

#[fixture]
fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn fields(time_estimate: i64) -> TaskFields {
    TaskFields {
        title: "Ship release".to_owned(),
        description: "Cut and publish the build".to_owned(),
        time_estimate,
    }
}

fn new_task(time_estimate: i64, subtasks: &[&str]) -> NewTask {
    NewTask {
        fields: fields(time_estimate),
        subtasks: subtasks.iter().map(|s| (*s).to_owned()).collect(),
    }
}

async fn create(harness: &Harness, subtasks: &[&str]) -> Task {
    harness
        .service
        .create_task(OWNER, new_task(60, subtasks))
        .await
        .expect("task creation should succeed")
}

fn subtask_ids(task: &Task) -> Vec<SubtaskId> {
    task.subtasks.iter().map(|s| s.id).collect()
}

#[rstest]
#[tokio::test]
async fn created_subtasks_start_uncompleted(harness: Harness) {
    let task = create(&harness, &["one", "two"]).await;

    let listed = harness.service.list_tasks(OWNER).await.expect("list");

    assert_eq!(listed, vec![task.clone()]);
    assert!(task.subtasks.iter().all(|s| !s.completed));
    assert!(!task.completed);
    assert_eq!(task.timer, TimerState::Stopped { time_spent: 0 });
}

#[rstest]
#[tokio::test]
async fn invalid_create_writes_nothing(harness: Harness) {
    let result = harness
        .service
        .create_task(OWNER, new_task(60, &[]))
        .await;

    assert!(matches!(result, Err(TrackerError::Validation(_))));
    assert_eq!(harness.store.subtask_count(), 0);
}

#[rstest]
#[tokio::test]
async fn completion_tracks_every_subtask(harness: Harness) {
    let task = create(&harness, &["a", "b"]).await;
    let [a, b] = [task.subtasks[0].id, task.subtasks[1].id];

    let completed_after = |result: TrackerResult<Task>| result.map(|task| task.completed);
    let after_a = completed_after(harness.service.complete_subtask(OWNER, a, true, None).await);
    let after_b = completed_after(harness.service.complete_subtask(OWNER, b, true, None).await);
    let after_undo =
        completed_after(harness.service.complete_subtask(OWNER, a, false, None).await);

    assert!(matches!(after_a, Ok(false)));
    assert!(matches!(after_b, Ok(true)));
    assert!(matches!(after_undo, Ok(false)));
    let stored = harness.store_task(task.id).await;
    assert!(!stored.completed);
}

#[rstest]
#[tokio::test]
async fn completing_a_running_task_stops_its_timer(harness: Harness, t0: DateTime<Utc>) {
    let task = create(&harness, &["only"]).await;
    harness
        .service
        .start_timer_at(OWNER, task.id, t0)
        .await
        .expect("start");

    let completed = harness
        .service
        .complete_subtask_at(OWNER, task.subtasks[0].id, true, None, t0 + Duration::minutes(12))
        .await
        .expect("completion");

    assert!(completed.completed);
    assert_eq!(completed.timer, TimerState::Stopped { time_spent: 12 });
    let stored = harness.store_task(task.id).await;
    assert_eq!(stored.timer, TimerState::Stopped { time_spent: 12 });

    let restart = harness.service.start_timer_at(OWNER, task.id, t0).await;
    assert!(matches!(restart, Err(TrackerError::Validation(_))));
}

#[rstest]
#[tokio::test]
async fn subtask_of_another_task_is_forbidden(harness: Harness) {
    let first = create(&harness, &["mine"]).await;
    let second = create(&harness, &["theirs"]).await;

    let result = harness
        .service
        .complete_subtask(OWNER, second.subtasks[0].id, true, Some(first.id))
        .await;

    assert!(matches!(result, Err(TrackerError::Forbidden(_))));
    let untouched = harness.store_task(second.id).await;
    assert!(!untouched.subtasks[0].completed);
}

#[rstest]
#[tokio::test]
async fn unknown_subtask_is_not_found(harness: Harness) {
    let result = harness
        .service
        .complete_subtask(OWNER, SubtaskId::new(), true, None)
        .await;

    assert!(matches!(result, Err(TrackerError::NotFound(_))));
}

#[rstest]
#[tokio::test]
async fn strangers_are_forbidden_regardless_of_payload(harness: Harness, t0: DateTime<Utc>) {
    let task = create(&harness, &["mine"]).await;
    let garbage = TaskUpdate {
        fields: TaskFields {
            title: String::new(),
            description: String::new(),
            time_estimate: -1,
        },
        subtasks: Vec::new(),
    };

    let update = harness.service.update_task(STRANGER, task.id, garbage).await;
    let delete = harness.service.delete_task(STRANGER, task.id).await;
    let time = harness.service.record_time(STRANGER, task.id, -4, Some(i64::MAX)).await;
    let start = harness.service.start_timer_at(STRANGER, task.id, t0).await;
    let subtask = harness
        .service
        .complete_subtask(STRANGER, task.subtasks[0].id, true, None)
        .await;

    assert!(matches!(update, Err(TrackerError::Forbidden(_))));
    assert!(matches!(delete, Err(TrackerError::Forbidden(_))));
    assert!(matches!(time, Err(TrackerError::Forbidden(_))));
    assert!(matches!(start, Err(TrackerError::Forbidden(_))));
    assert!(matches!(subtask, Err(TrackerError::Forbidden(_))));
    assert_eq!(harness.store_task(task.id).await, task);
}

#[rstest]
#[tokio::test]
async fn missing_task_is_not_found(harness: Harness) {
    let result = harness.service.delete_task(OWNER, TaskId::new()).await;

    assert!(matches!(result, Err(TrackerError::NotFound(_))));
}

#[rstest]
#[tokio::test]
async fn update_reconciles_membership(harness: Harness) {
    let task = create(&harness, &["A", "B", "C"]).await;
    let [a, b, c] = [task.subtasks[0].id, task.subtasks[1].id, task.subtasks[2].id];
    let update = TaskUpdate {
        fields: fields(90),
        subtasks: vec![
            DesiredSubtask::existing(b, "B"),
            DesiredSubtask::new("D"),
        ],
    };

    let updated = harness
        .service
        .update_task(OWNER, task.id, update)
        .await
        .expect("update should succeed");

    let ids = subtask_ids(&updated);
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], b);
    assert!(!ids.contains(&a) && !ids.contains(&c));
    assert_eq!(updated.subtasks[1].title, "D");
    assert_eq!(updated.time_estimate, 90);
    assert_eq!(harness.store.subtask_count(), 2);
    assert_eq!(harness.store_task(task.id).await, updated);
}

#[rstest]
#[tokio::test]
async fn update_that_removes_the_open_subtask_completes_the_task(harness: Harness) {
    let task = create(&harness, &["done", "open"]).await;
    let done = task.subtasks[0].id;
    harness
        .service
        .complete_subtask(OWNER, done, true, None)
        .await
        .expect("completion");

    let update = TaskUpdate {
        fields: fields(60),
        subtasks: vec![DesiredSubtask::existing(done, "done")],
    };
    let updated = harness
        .service
        .update_task(OWNER, task.id, update)
        .await
        .expect("update");

    assert!(updated.completed);
}

#[rstest]
#[tokio::test]
async fn aborted_update_leaves_task_untouched(harness: Harness) {
    let task = create(&harness, &["A", "B"]).await;
    let update = TaskUpdate {
        fields: fields(15),
        subtasks: vec![DesiredSubtask::new("fresh")],
    };
    harness.store.fail_next(WriteStep::SaveTask);

    let result = harness.service.update_task(OWNER, task.id, update).await;

    assert!(matches!(result, Err(TrackerError::Storage(_))));
    assert_eq!(harness.store_task(task.id).await, task);
    assert_eq!(harness.store.subtask_count(), 2);
}

#[rstest]
#[tokio::test]
async fn stop_twice_keeps_time_spent(harness: Harness, t0: DateTime<Utc>) {
    let task = create(&harness, &["x"]).await;
    harness.service.start_timer_at(OWNER, task.id, t0).await.expect("start");

    let first = harness
        .service
        .stop_timer_at(OWNER, task.id, t0 + Duration::minutes(9))
        .await
        .expect("stop");
    let second = harness
        .service
        .stop_timer_at(OWNER, task.id, t0 + Duration::minutes(50))
        .await
        .expect("second stop");

    assert_eq!(first, TimerState::Stopped { time_spent: 9 });
    assert_eq!(second, first);
}

#[rstest]
#[tokio::test]
async fn record_time_stores_client_pair(harness: Harness, t0: DateTime<Utc>) {
    let task = create(&harness, &["x"]).await;
    let anchor = t0.timestamp_millis();

    let running = harness
        .service
        .record_time(OWNER, task.id, 7, Some(anchor))
        .await
        .expect("record");
    let stopped = harness
        .service
        .record_time(OWNER, task.id, 11, None)
        .await
        .expect("record");

    assert_eq!(running.last_start_time(), Some(anchor));
    assert_eq!(running.time_spent(), 7);
    assert_eq!(stopped, TimerState::Stopped { time_spent: 11 });
}

#[rstest]
#[tokio::test]
async fn record_time_rejects_negative_total(harness: Harness) {
    let task = create(&harness, &["x"]).await;

    let result = harness.service.record_time(OWNER, task.id, -1, None).await;

    assert!(matches!(result, Err(TrackerError::Validation(_))));
}

#[rstest]
#[tokio::test]
async fn record_time_rejects_oversized_total_and_timer_stays_usable(
    harness: Harness,
    t0: DateTime<Utc>,
) {
    let task = create(&harness, &["x"]).await;

    let result = harness
        .service
        .record_time(OWNER, task.id, i64::MAX, Some(t0.timestamp_millis()))
        .await;
    assert!(matches!(result, Err(TrackerError::Validation(_))));

    harness
        .service
        .start_timer_at(OWNER, task.id, t0)
        .await
        .expect("start");
    let stopped = harness
        .service
        .stop_timer_at(OWNER, task.id, t0 + Duration::minutes(5))
        .await
        .expect("stop");
    assert_eq!(stopped, TimerState::Stopped { time_spent: 5 });
}

#[rstest]
#[tokio::test]
async fn estimate_sixty_scenario(harness: Harness, t0: DateTime<Utc>) {
    let task = harness
        .service
        .create_task(OWNER, new_task(60, &["Draft"]))
        .await
        .expect("create");

    harness.service.start_timer_at(OWNER, task.id, t0).await.expect("start");

    let checkpoint = harness
        .service
        .checkpoint_timer_at(OWNER, task.id, t0 + Duration::minutes(25))
        .await
        .expect("checkpoint");
    assert_eq!(checkpoint.time_spent(), 25);
    assert!(checkpoint.is_running());

    let stopped = harness
        .service
        .stop_timer_at(OWNER, task.id, t0 + Duration::minutes(30))
        .await
        .expect("stop");
    assert_eq!(stopped, TimerState::Stopped { time_spent: 30 });

    let completed = harness
        .service
        .complete_subtask(OWNER, task.subtasks[0].id, true, Some(task.id))
        .await
        .expect("complete");
    assert!(completed.completed);

    let stored = harness.store_task(task.id).await;
    assert!(stored.completed);
    assert_eq!(displayed_remaining(stored.time_estimate, stored.time_spent()), 30);
}

impl Harness {
    async fn store_task(&self, id: TaskId) -> Task {
        use crate::tracker::store::TaskStore;

        self.store
            .find_task(id)
            .await
            .expect("lookup should succeed")
            .expect("task should exist")
    }
}
