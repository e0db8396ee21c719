//! The client's cache of tasks as last confirmed by the server.
//!
//! Timer transitions are computed locally from the cached pair and sent as a
//! `(timeSpent, lastStartTime)` record; the cache only changes once the
//! server has answered.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use mockable::Clock;

use super::{api::TaskApi, session::SessionContext, ClientError, ClientResult};
use crate::routes::tasks::tasks_models::{TaskPayload, TimeRecord};
use crate::tracker::{timer::displayed_remaining, TimerState, TrackerError};

pub struct TaskBoard {
    api: Arc<dyn TaskApi>,
    session: SessionContext,
    clock: Arc<dyn Clock + Send + Sync>,
    tasks: Vec<TaskPayload>,
}

impl TaskBoard {
    #[must_use]
    pub fn new(
        api: Arc<dyn TaskApi>,
        session: SessionContext,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            api,
            session,
            clock,
            tasks: Vec::new(),
        }
    }

    #[must_use]
    pub fn tasks(&self) -> &[TaskPayload] {
        &self.tasks
    }

    #[must_use]
    pub fn task(&self, task_id: &str) -> Option<&TaskPayload> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Signs in and stores the token in the shared session.
    ///
    /// # Errors
    ///
    /// Whatever the login request failed with.
    pub async fn sign_in(
        &mut self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> ClientResult<()> {
        let token = self.api.login(username, password, remember_me).await?;
        self.session.set_token(token);
        Ok(())
    }

    /// Replaces the cache with the server's task list.
    ///
    /// # Errors
    ///
    /// `NotSignedIn` without a token, otherwise the request error. The cache
    /// is left as it was on failure.
    pub async fn refresh(&mut self) -> ClientResult<usize> {
        let token = self.token()?;
        let tasks = self.api.list_tasks(&token).await.map_err(|e| self.observe(e))?;
        self.tasks = tasks;
        Ok(self.tasks.len())
    }

    /// # Errors
    ///
    /// See [`Self::start_timer_at`].
    pub async fn start_timer(&mut self, task_id: &str) -> ClientResult<TimeRecord> {
        let now = self.clock.utc();
        self.start_timer_at(task_id, now).await
    }

    /// Starts the task's timer at `now`. A running timer is left alone.
    ///
    /// # Errors
    ///
    /// `UnknownTask` for a task not on the board, `Tracker` when the task is
    /// already completed, otherwise the request error.
    pub async fn start_timer_at(
        &mut self,
        task_id: &str,
        now: DateTime<Utc>,
    ) -> ClientResult<TimeRecord> {
        let task = self.cached(task_id)?;
        let timer = timer_of(task)?;
        if task.completed {
            return Err(ClientError::Tracker(TrackerError::Validation(
                "a completed task cannot be timed".to_owned(),
            )));
        }
        if timer.is_running() {
            return Ok(timer.into());
        }
        self.save_time(task_id, timer.start(now).into()).await
    }

    /// # Errors
    ///
    /// See [`Self::stop_timer_at`].
    pub async fn stop_timer(&mut self, task_id: &str) -> ClientResult<TimeRecord> {
        let now = self.clock.utc();
        self.stop_timer_at(task_id, now).await
    }

    /// Stops the task's timer at `now`. A stopped timer is left alone.
    ///
    /// # Errors
    ///
    /// `UnknownTask` for a task not on the board, otherwise the request
    /// error.
    pub async fn stop_timer_at(
        &mut self,
        task_id: &str,
        now: DateTime<Utc>,
    ) -> ClientResult<TimeRecord> {
        let timer = timer_of(self.cached(task_id)?)?;
        if !timer.is_running() {
            return Ok(timer.into());
        }
        self.save_time(task_id, timer.stop(now).into()).await
    }

    /// Sets a subtask's flag and returns whether its task is now completed.
    ///
    /// The server answers with the task's committed timer pair, so a
    /// completion that stopped a running timer lands in the cache with the
    /// final total.
    ///
    /// # Errors
    ///
    /// `UnknownTask` when no cached task holds the subtask, otherwise the
    /// request error.
    pub async fn toggle_subtask(&mut self, subtask_id: &str, completed: bool) -> ClientResult<bool> {
        let token = self.token()?;
        let position = self
            .tasks
            .iter()
            .position(|task| task.subtasks.iter().any(|s| s.id == subtask_id))
            .ok_or_else(|| ClientError::UnknownTask(format!("holding subtask {subtask_id}")))?;

        let committed = self
            .api
            .complete_subtask(&token, subtask_id, completed)
            .await
            .map_err(|e| self.observe(e))?;

        let task = &mut self.tasks[position];
        for subtask in task.subtasks.iter_mut().filter(|s| s.id == subtask_id) {
            subtask.completed = completed;
        }
        if task.last_start_time.is_some() && committed.last_start_time.is_none() {
            info!("Task {} completed while running, timer stopped", task.id);
        }
        task.completed = committed.task_completed;
        task.time_spent = committed.time_spent;
        task.last_start_time = committed.last_start_time;
        Ok(committed.task_completed)
    }

    /// See [`Self::checkpoint_running_at`].
    pub async fn checkpoint_running(&mut self) -> usize {
        let now = self.clock.utc();
        self.checkpoint_running_at(now).await
    }

    /// Persists the whole minutes every running timer has accumulated by
    /// `now` and returns how many were saved. A failed save is logged and
    /// leaves that task's cached state as it was.
    pub async fn checkpoint_running_at(&mut self, now: DateTime<Utc>) -> usize {
        let running: Vec<(String, TimeRecord)> = self
            .tasks
            .iter()
            .filter_map(|task| {
                let timer = timer_of(task).ok()?;
                timer
                    .is_running()
                    .then(|| (task.id.clone(), timer.checkpoint(now).into()))
            })
            .collect();

        let mut saved = 0;
        for (task_id, record) in running {
            match self.save_time(&task_id, record).await {
                Ok(_) => saved += 1,
                Err(e) => warn!("Checkpoint for task {} failed: {}", task_id, e),
            }
        }
        saved
    }

    async fn save_time(&mut self, task_id: &str, record: TimeRecord) -> ClientResult<TimeRecord> {
        let token = self.token()?;
        let saved = self
            .api
            .record_time(&token, task_id, record)
            .await
            .map_err(|e| self.observe(e))?;

        if let Some(task) = self.tasks.iter_mut().find(|task| task.id == task_id) {
            task.time_spent = saved.time_spent;
            task.last_start_time = saved.last_start_time;
        }
        Ok(saved)
    }

    fn cached(&self, task_id: &str) -> ClientResult<&TaskPayload> {
        self.task(task_id)
            .ok_or_else(|| ClientError::UnknownTask(task_id.to_owned()))
    }

    fn token(&self) -> ClientResult<String> {
        self.session.token().ok_or(ClientError::NotSignedIn)
    }

    // A rejected token signs the user out.
    fn observe(&self, err: ClientError) -> ClientError {
        if err.is_unauthenticated() {
            info!("Session rejected by the server, signing out");
            self.session.clear();
        }
        err
    }
}

fn timer_of(task: &TaskPayload) -> ClientResult<TimerState> {
    Ok(TimerState::from_parts(task.time_spent, task.last_start_time)?)
}

/// Minutes spent including the running interval, as shown while the timer
/// ticks.
#[must_use]
pub fn live_time_spent(task: &TaskPayload, now: DateTime<Utc>) -> i64 {
    timer_of(task).map_or(task.time_spent, |timer| timer.total_at(now))
}

/// Minutes left against the estimate, never below zero.
#[must_use]
pub fn remaining_minutes(task: &TaskPayload, now: DateTime<Utc>) -> i64 {
    displayed_remaining(task.time_estimate, live_time_spent(task, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{ServiceBackedApi, PASSWORD, USERNAME};
    use crate::routes::tasks::tasks_models::{CreateTaskRequest, NewSubtaskRequest};
    use crate::tracker::memory::WriteStep;
    use chrono::{Duration, TimeZone};
    use mockable::DefaultClock;
    use rstest::{fixture, rstest};

    #[fixture]
    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn create_request(time_estimate: i64, subtasks: &[&str]) -> CreateTaskRequest {
        CreateTaskRequest {
            title: "Write report".to_owned(),
            description: "Quarterly numbers".to_owned(),
            time_estimate,
            subtasks: subtasks
                .iter()
                .map(|title| NewSubtaskRequest {
                    title: (*title).to_owned(),
                })
                .collect(),
        }
    }

    async fn signed_in_board(api: &ServiceBackedApi) -> TaskBoard {
        let mut board = TaskBoard::new(
            Arc::new(api.clone()),
            SessionContext::new(),
            Arc::new(DefaultClock),
        );
        board
            .sign_in(USERNAME, PASSWORD, false)
            .await
            .expect("sign in");
        board
    }

    async fn board_with_task(subtasks: &[&str]) -> (ServiceBackedApi, TaskBoard, String) {
        let api = ServiceBackedApi::with_user().await;
        let token = api.token().await;
        let task = api
            .create_task(&token, &create_request(60, subtasks))
            .await
            .expect("task created");
        let mut board = signed_in_board(&api).await;
        board.refresh().await.expect("refresh");
        (api, board, task.id)
    }

    #[tokio::test]
    async fn refresh_requires_a_session() {
        let api = ServiceBackedApi::with_user().await;
        let mut board = TaskBoard::new(
            Arc::new(api),
            SessionContext::new(),
            Arc::new(DefaultClock),
        );

        assert!(matches!(board.refresh().await, Err(ClientError::NotSignedIn)));
    }

    #[tokio::test]
    async fn rejected_token_signs_out() {
        let api = ServiceBackedApi::with_user().await;
        let session = SessionContext::new();
        session.set_token("not-a-session");
        let mut board = TaskBoard::new(Arc::new(api), session.clone(), Arc::new(DefaultClock));

        let err = board.refresh().await.expect_err("token is unknown");

        assert!(err.is_unauthenticated());
        assert!(!session.is_signed_in());
    }

    #[rstest]
    #[tokio::test]
    async fn estimate_sixty_scenario(t0: DateTime<Utc>) {
        let (_api, mut board, task_id) = board_with_task(&["Draft"]).await;
        let subtask_id = board.tasks()[0].subtasks[0].id.clone();

        board.start_timer_at(&task_id, t0).await.expect("start");
        let saved = board.checkpoint_running_at(t0 + Duration::minutes(25)).await;
        assert_eq!(saved, 1);
        let task = board.task(&task_id).expect("cached");
        assert_eq!(task.time_spent, 25);
        assert!(task.last_start_time.is_some());

        let stopped = board
            .stop_timer_at(&task_id, t0 + Duration::minutes(30))
            .await
            .expect("stop");
        assert_eq!(stopped.time_spent, 30);
        assert_eq!(stopped.last_start_time, None);

        assert!(board.toggle_subtask(&subtask_id, true).await.expect("toggle"));
        let task = board.task(&task_id).expect("cached");
        assert!(task.completed);
        assert_eq!(remaining_minutes(task, t0 + Duration::hours(2)), 30);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_save_keeps_confirmed_state(t0: DateTime<Utc>) {
        let (api, mut board, task_id) = board_with_task(&["Draft"]).await;
        api.store.fail_next(WriteStep::SaveTask);

        let result = board.start_timer_at(&task_id, t0).await;

        assert!(matches!(result, Err(ClientError::Status { status: 500, .. })));
        let task = board.task(&task_id).expect("cached");
        assert_eq!(task.last_start_time, None);
        assert_eq!(task.time_spent, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn completed_task_refuses_to_start(t0: DateTime<Utc>) {
        let (_api, mut board, task_id) = board_with_task(&["Only"]).await;
        let subtask_id = board.tasks()[0].subtasks[0].id.clone();
        board.toggle_subtask(&subtask_id, true).await.expect("toggle");

        let result = board.start_timer_at(&task_id, t0).await;

        assert!(matches!(result, Err(ClientError::Tracker(_))));
    }

    #[rstest]
    #[tokio::test]
    async fn completing_running_task_caches_stopped_timer(t0: DateTime<Utc>) {
        let (api, mut board, task_id) = board_with_task(&["Only"]).await;
        let subtask_id = board.tasks()[0].subtasks[0].id.clone();
        board
            .start_timer_at(&task_id, t0 - Duration::minutes(7))
            .await
            .expect("start");
        api.fail_next_listing();

        assert!(board.toggle_subtask(&subtask_id, true).await.expect("toggle"));

        let task = board.task(&task_id).expect("cached");
        assert!(task.completed);
        assert!(task.subtasks[0].completed);
        assert_eq!(task.last_start_time, None);
        assert!(task.time_spent >= 7);
        let token = api.token().await;
        // still armed: the board never listed again
        assert!(api.list_tasks(&token).await.is_err());
        let stored = api.list_tasks(&token).await.expect("list");
        assert_eq!(stored[0].time_spent, task.time_spent);
        assert_eq!(stored[0].last_start_time, None);
    }

    #[tokio::test]
    async fn failed_completion_leaves_cache_untouched() {
        let (api, mut board, task_id) = board_with_task(&["Only"]).await;
        let subtask_id = board.tasks()[0].subtasks[0].id.clone();
        api.fail_next_completion();

        let result = board.toggle_subtask(&subtask_id, true).await;

        assert!(matches!(result, Err(ClientError::Status { status: 500, .. })));
        let task = board.task(&task_id).expect("cached");
        assert!(!task.completed);
        assert!(!task.subtasks[0].completed);
    }

    #[rstest]
    #[tokio::test]
    async fn stop_on_stopped_task_sends_nothing(t0: DateTime<Utc>) {
        let (api, mut board, task_id) = board_with_task(&["Draft"]).await;
        api.store.fail_next(WriteStep::SaveTask);

        let record = board.stop_timer_at(&task_id, t0).await.expect("no-op stop");

        assert_eq!(record.time_spent, 0);
        assert_eq!(record.last_start_time, None);
    }

    #[test]
    fn remaining_is_live_and_floored() {
        let now = Utc::now();
        let mut task = TaskPayload {
            id: "t".to_owned(),
            title: "t".to_owned(),
            description: "about t".to_owned(),
            time_estimate: 30,
            time_spent: 20,
            completed: false,
            last_start_time: Some((now - Duration::minutes(5)).timestamp_millis()),
            subtasks: Vec::new(),
        };
        assert_eq!(live_time_spent(&task, now), 25);
        assert_eq!(remaining_minutes(&task, now), 5);

        task.time_spent = 50;
        assert_eq!(remaining_minutes(&task, now), 0);
    }
}
