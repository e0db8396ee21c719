use async_trait::async_trait;
use log::info;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use super::{ClientError, ClientResult};
use crate::routes::login::login_models::{LoginRequest, LoginResponse};
use crate::routes::tasks::tasks_models::{
    CompleteSubtaskRequest, CompleteSubtaskResponse, CreateTaskRequest, MessageResponse,
    TaskListResponse, TaskPayload, TaskResponse, TimeRecord, UpdateTaskRequest,
};

/// The server operations a client performs. Every call but `login` carries
/// the caller's bearer token.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Returns the bearer token for the new session.
    async fn login(&self, username: &str, password: &str, remember_me: bool)
        -> ClientResult<String>;

    async fn list_tasks(&self, token: &str) -> ClientResult<Vec<TaskPayload>>;

    /// Stores the timer pair and returns what the server saved.
    async fn record_time(
        &self,
        token: &str,
        task_id: &str,
        record: TimeRecord,
    ) -> ClientResult<TimeRecord>;

    /// Returns the owning task's completion and timer as committed.
    async fn complete_subtask(
        &self,
        token: &str,
        subtask_id: &str,
        completed: bool,
    ) -> ClientResult<CompleteSubtaskResponse>;

    async fn create_task(
        &self,
        token: &str,
        request: &CreateTaskRequest,
    ) -> ClientResult<TaskPayload>;

    async fn update_task(
        &self,
        token: &str,
        task_id: &str,
        request: &UpdateTaskRequest,
    ) -> ClientResult<TaskPayload>;

    async fn delete_task(&self, token: &str, task_id: &str) -> ClientResult<()>;
}

/// [`TaskApi`] over HTTP against a running server.
#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: Client,
    base_url: String,
}

impl HttpTaskApi {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // Decodes a success body, or turns the `{success, message}` error body
    // into a status error.
    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> ClientResult<T> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<MessageResponse>()
                .await
                .map_or_else(|_| status.to_string(), |body| body.message);
            info!("Request rejected with {}: {}", status, message);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn login(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> ClientResult<String> {
        let request = LoginRequest {
            username: username.to_owned(),
            password: password.to_owned(),
            remember_me,
        };
        let response: LoginResponse =
            Self::send(self.client.post(self.url("/api/auth/login")).json(&request)).await?;
        Ok(response.token)
    }

    async fn list_tasks(&self, token: &str) -> ClientResult<Vec<TaskPayload>> {
        let response: TaskListResponse =
            Self::send(self.client.get(self.url("/api/tasks/")).bearer_auth(token)).await?;
        Ok(response.tasks)
    }

    async fn record_time(
        &self,
        token: &str,
        task_id: &str,
        record: TimeRecord,
    ) -> ClientResult<TimeRecord> {
        Self::send(
            self.client
                .post(self.url(&format!("/api/tasks/{task_id}/time")))
                .bearer_auth(token)
                .json(&record),
        )
        .await
    }

    async fn complete_subtask(
        &self,
        token: &str,
        subtask_id: &str,
        completed: bool,
    ) -> ClientResult<CompleteSubtaskResponse> {
        Self::send(
            self.client
                .post(self.url(&format!("/api/tasks/subtask/{subtask_id}")))
                .bearer_auth(token)
                .json(&CompleteSubtaskRequest { completed }),
        )
        .await
    }

    async fn create_task(
        &self,
        token: &str,
        request: &CreateTaskRequest,
    ) -> ClientResult<TaskPayload> {
        let response: TaskResponse = Self::send(
            self.client
                .post(self.url("/api/tasks/create"))
                .bearer_auth(token)
                .json(request),
        )
        .await?;
        Ok(response.task)
    }

    async fn update_task(
        &self,
        token: &str,
        task_id: &str,
        request: &UpdateTaskRequest,
    ) -> ClientResult<TaskPayload> {
        let response: TaskResponse = Self::send(
            self.client
                .patch(self.url(&format!("/api/tasks/{task_id}")))
                .bearer_auth(token)
                .json(request),
        )
        .await?;
        Ok(response.task)
    }

    async fn delete_task(&self, token: &str, task_id: &str) -> ClientResult<()> {
        let _: MessageResponse = Self::send(
            self.client
                .delete(self.url(&format!("/api/tasks/{task_id}")))
                .bearer_auth(token),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_dropped_from_base_url() {
        let api = HttpTaskApi::new("http://localhost:8080/");

        assert_eq!(api.url("/api/tasks/"), "http://localhost:8080/api/tasks/");
    }
}
