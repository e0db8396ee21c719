//! A [`TaskApi`] that calls the services directly, answering the way the
//! HTTP handlers would.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use actix_web::ResponseError;
use async_trait::async_trait;
use mockable::DefaultClock;

use super::{api::TaskApi, ClientError, ClientResult};
use crate::identity::{memory::InMemoryIdentityStore, AuthService, Identity, SessionPolicy};
use crate::routes::error::ApiError;
use crate::routes::tasks::tasks_models::{
    CompleteSubtaskResponse, CreateTaskRequest, TaskPayload, TimeRecord, UpdateTaskRequest,
};
use crate::tracker::{memory::InMemoryTaskStore, TaskService};

pub const USERNAME: &str = "ada";
pub const PASSWORD: &str = "lovelace";

#[derive(Clone)]
pub struct ServiceBackedApi {
    pub store: InMemoryTaskStore,
    pub tasks: TaskService,
    pub auth: AuthService,
    fail_listing: Arc<AtomicBool>,
    fail_completions: Arc<AtomicBool>,
}

impl ServiceBackedApi {
    pub async fn with_user() -> Self {
        let store = InMemoryTaskStore::new();
        let clock = Arc::new(DefaultClock);
        let api = Self {
            tasks: TaskService::new(Arc::new(store.clone()), clock.clone()),
            auth: AuthService::new(
                Arc::new(InMemoryIdentityStore::new()),
                clock,
                SessionPolicy::default(),
            )
            .with_hash_cost(4),
            store,
            fail_listing: Arc::default(),
            fail_completions: Arc::default(),
        };
        api.auth
            .register(USERNAME, PASSWORD)
            .await
            .expect("user registers");
        api
    }

    pub async fn token(&self) -> String {
        self.login(USERNAME, PASSWORD, false)
            .await
            .expect("seeded user logs in")
    }

    /// The next `list_tasks` answers 500.
    pub fn fail_next_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    /// The next `complete_subtask` answers 500 without touching the store.
    pub fn fail_next_completion(&self) {
        self.fail_completions.store(true, Ordering::SeqCst);
    }

    async fn caller(&self, token: &str) -> ClientResult<Identity> {
        self.auth.authenticate(token).await.map_err(rejected)
    }
}

fn rejected(err: impl Into<ApiError>) -> ClientError {
    let err = err.into();
    ClientError::Status {
        status: err.status_code().as_u16(),
        message: err.to_string(),
    }
}

fn parsed<T: std::str::FromStr>(raw: &str) -> ClientResult<T> {
    raw.parse()
        .map_err(|_| rejected(ApiError::NotFound(format!("no record {raw}"))))
}

#[async_trait]
impl TaskApi for ServiceBackedApi {
    async fn login(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> ClientResult<String> {
        let grant = self
            .auth
            .login(username, password, remember_me)
            .await
            .map_err(rejected)?;
        Ok(grant.token)
    }

    async fn list_tasks(&self, token: &str) -> ClientResult<Vec<TaskPayload>> {
        if self.fail_listing.swap(false, Ordering::SeqCst) {
            return Err(rejected(ApiError::Storage("listing failed".to_owned())));
        }
        let caller = self.caller(token).await?;
        let tasks = self
            .tasks
            .list_tasks(caller.user_id)
            .await
            .map_err(rejected)?;
        Ok(tasks.iter().map(TaskPayload::from).collect())
    }

    async fn record_time(
        &self,
        token: &str,
        task_id: &str,
        record: TimeRecord,
    ) -> ClientResult<TimeRecord> {
        let caller = self.caller(token).await?;
        let timer = self
            .tasks
            .record_time(
                caller.user_id,
                parsed(task_id)?,
                record.time_spent,
                record.last_start_time,
            )
            .await
            .map_err(rejected)?;
        Ok(timer.into())
    }

    async fn complete_subtask(
        &self,
        token: &str,
        subtask_id: &str,
        completed: bool,
    ) -> ClientResult<CompleteSubtaskResponse> {
        if self.fail_completions.swap(false, Ordering::SeqCst) {
            return Err(rejected(ApiError::Storage("completion failed".to_owned())));
        }
        let caller = self.caller(token).await?;
        let task = self
            .tasks
            .complete_subtask(caller.user_id, parsed(subtask_id)?, completed, None)
            .await
            .map_err(rejected)?;
        Ok(CompleteSubtaskResponse::from(&task))
    }

    async fn create_task(
        &self,
        token: &str,
        request: &CreateTaskRequest,
    ) -> ClientResult<TaskPayload> {
        let caller = self.caller(token).await?;
        let task = self
            .tasks
            .create_task(caller.user_id, request.clone().into())
            .await
            .map_err(rejected)?;
        Ok(TaskPayload::from(&task))
    }

    async fn update_task(
        &self,
        token: &str,
        task_id: &str,
        request: &UpdateTaskRequest,
    ) -> ClientResult<TaskPayload> {
        let caller = self.caller(token).await?;
        let task = self
            .tasks
            .update_task(caller.user_id, parsed(task_id)?, request.clone().into())
            .await
            .map_err(rejected)?;
        Ok(TaskPayload::from(&task))
    }

    async fn delete_task(&self, token: &str, task_id: &str) -> ClientResult<()> {
        let caller = self.caller(token).await?;
        self.tasks
            .delete_task(caller.user_id, parsed(task_id)?)
            .await
            .map_err(rejected)
    }
}
