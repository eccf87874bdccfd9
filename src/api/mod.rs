use axum::Json;
use axum::extract::Path;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use crate::alarms::PendingAlarm;
use crate::error::AppError;
use crate::models::{EditorMode, Task, TaskForm};
use crate::notify::Notification;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub priority_label: &'static str,
    pub due_display: String,
}

#[derive(Debug, Serialize)]
pub struct RearmResponse {
    pub armed: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", get(get_task).put(update_task).delete(delete_task))
        .route("/tasks/{id}/form", get(edit_form))
        .route("/reminders", get(list_reminders))
        .route("/reminders/rearm", post(rearm))
        .route("/notifications", get(list_notifications))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.tasks.store().try_list().await?;
    Ok(StatusCode::OK)
}

fn view(state: &AppState, task: Task) -> TaskView {
    TaskView {
        priority_label: task.priority.label(),
        due_display: task.format_due(state.tasks.timezone()),
        task,
    }
}

async fn list_tasks(State(state): State<AppState>) -> Json<Vec<TaskView>> {
    let tasks = state.tasks.list().await;
    Json(tasks.into_iter().map(|t| view(&state, t)).collect())
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TaskView>, AppError> {
    let task = state.tasks.get(id).await?;
    Ok(Json(view(&state, task)))
}

async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<TaskForm>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskView>), AppError> {
    let Json(form) = payload?;
    let task = state.tasks.submit(form, EditorMode::Adding).await?;
    Ok((StatusCode::CREATED, Json(view(&state, task))))
}

async fn edit_form(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TaskForm>, AppError> {
    Ok(Json(state.tasks.edit_form(id).await?))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<TaskForm>, JsonRejection>,
) -> Result<Json<TaskView>, AppError> {
    let Json(form) = payload?;
    let task = state.tasks.submit(form, EditorMode::Editing { id }).await?;
    Ok(Json(view(&state, task)))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.tasks.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_reminders(State(state): State<AppState>) -> Result<Json<Vec<PendingAlarm>>, AppError> {
    Ok(Json(state.tasks.scheduler().pending().await?))
}

async fn rearm(State(state): State<AppState>) -> Result<Json<RearmResponse>, AppError> {
    let armed = state.tasks.rearm().await?;
    Ok(Json(RearmResponse { armed }))
}

async fn list_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.feed.recent())
}
