use actix_cors::Cors;
use actix_web::{error::JsonPayloadError, http::header, web, HttpRequest};
use log::info;

use super::error::ApiError;
use super::login::login_handlers;
use super::tasks::tasks_handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(login_handlers::health))
        .configure(auth_configure)
        .configure(tasks_configure);
}

pub fn auth_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/auth")
            .route("/register", web::post().to(login_handlers::register))
            .route("/login", web::post().to(login_handlers::login))
            .route("/logout", web::post().to(login_handlers::logout))
            .route("/me", web::get().to(login_handlers::me)),
    );
}

pub fn tasks_configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/tasks")
            .route("", web::get().to(tasks_handlers::get_tasks))
            .route("/", web::get().to(tasks_handlers::get_tasks))
            .route("/create", web::post().to(tasks_handlers::create_task))
            // before /{tid} so "subtask" is never read as a task id
            .route("/subtask/{subtid}", web::post().to(tasks_handlers::update_subtask))
            .route("/{tid}", web::patch().to(tasks_handlers::update_task))
            .route("/{tid}", web::delete().to(tasks_handlers::delete_task))
            .route(
                "/{tid}/subtasks/{subtid}",
                web::post().to(tasks_handlers::update_task_subtask),
            )
            .route("/{tid}/time", web::post().to(tasks_handlers::update_task_time))
            .route("/{tid}/start", web::post().to(tasks_handlers::start_timer))
            .route("/{tid}/stop", web::post().to(tasks_handlers::stop_timer))
            .route("/{tid}/checkpoint", web::post().to(tasks_handlers::checkpoint_timer)),
    );
}

// Malformed bodies are validation failures, with the usual JSON error body
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, req: &HttpRequest| {
        info!("Rejected body for {}: {}", req.path(), err);
        ApiError::Validation(err.to_string()).into()
    })
}

// Any origin may call the API, preflights included
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(["GET", "POST", "PUT", "PATCH", "DELETE"])
        .allowed_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(3600)
}
