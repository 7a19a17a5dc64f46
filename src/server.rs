use crate::model::{NewTask, Task, TaskError, TaskPatch};
use crate::render::render_page;
use crate::service::TaskSheet;
use crate::view::{derive_view, today, ViewMode, ViewOptions};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::path::PathBuf;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

#[derive(Clone)]
pub struct AppState {
    pub tasks: TaskSheet,
}

impl AppState {
    pub fn new(tasks: TaskSheet) -> Self {
        AppState { tasks }
    }
}

/// An error as returned to HTTP callers: `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    /// Store failures are logged and replaced by `fallback`.
    fn from_task(err: TaskError, fallback: &str) -> Self {
        match err {
            TaskError::MissingTitle => ApiError {
                status: StatusCode::BAD_REQUEST,
                message: err.to_string(),
            },
            TaskError::NotFound(_) => ApiError {
                status: StatusCode::NOT_FOUND,
                message: "Task not found".to_string(),
            },
            TaskError::Store(store) => {
                error!(error = %store, "{fallback}");
                ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: fallback.to_string(),
                }
            }
        }
    }

    fn bad_body(rejection: JsonRejection) -> Self {
        warn!(error = %rejection.body_text(), "rejected request body");
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: format!("invalid request body: {}", rejection.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Where the client application shell comes from.
#[derive(Debug, Clone)]
pub enum Shell {
    /// A built client: `index.html` plus its assets.
    Static(PathBuf),
    /// Server-rendered list page.
    Rendered,
}

impl Shell {
    pub fn detect(static_dir: Option<PathBuf>) -> Self {
        match static_dir {
            Some(dir) if dir.join("index.html").is_file() => Shell::Static(dir),
            _ => Shell::Rendered,
        }
    }
}

pub fn build_router(state: AppState, shell: Shell) -> Router {
    let api = Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/:id", axum::routing::put(update_task).delete(delete_task));
    let router = match shell {
        Shell::Static(dir) => {
            let index = ServeFile::new(dir.join("index.html"));
            api.fallback_service(ServeDir::new(dir).fallback(index))
        }
        Shell::Rendered => api.fallback(rendered_shell),
    };
    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state
        .tasks
        .list()
        .await
        .map_err(|e| ApiError::from_task(e, "Failed to load tasks"))?;
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<AppState>,
    body: Result<Json<NewTask>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let Json(new) = body.map_err(ApiError::bad_body)?;
    let task = state
        .tasks
        .create(new)
        .await
        .map_err(|e| ApiError::from_task(e, "Failed to add task"))?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<TaskPatch>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let Json(patch) = body.map_err(ApiError::bad_body)?;
    let task = state
        .tasks
        .update(&id, patch)
        .await
        .map_err(|e| ApiError::from_task(e, "Failed to update task"))?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .tasks
        .delete(&id)
        .await
        .map_err(|e| ApiError::from_task(e, "Failed to delete task"))?;
    Ok(Json(json!({ "success": true, "message": format!("Task {id} deleted") })))
}

/// Only GET and HEAD get the page; other methods on unknown paths are 405.
async fn rendered_shell(method: Method, State(state): State<AppState>) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    let options = ViewOptions {
        mode: ViewMode::List,
        ..ViewOptions::default()
    };
    match state.tasks.list().await {
        Ok(tasks) => {
            let today = today();
            let items = derive_view(&tasks, &options, today);
            Html(render_page(&items, &options, today)).into_response()
        }
        Err(err) => ApiError::from_task(err, "Failed to load tasks").into_response(),
    }
}
