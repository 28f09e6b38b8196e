// Admin Interface - HTTP surface of the conference console
// Public routes: health, login, signup. Everything else sits behind the session guard.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    infrastructure::{
        middleware::{require_admin_session, Session},
        Collection,
    },
    models::Program,
    services::{
        statistics_service::DASHBOARD_TOP_N, user_service::search_users, ExportFile, ExportFormat,
        ProgramForm, SpeakerInput, SpeakerSort,
    },
};

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ConfirmationRequest {
    #[serde(default)]
    pub confirmation: String,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Deserialize)]
pub struct SpeakerQuery {
    pub search: Option<String>,
    pub sort: Option<String>,
}

#[derive(Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

fn parse_format(query: &ExportQuery) -> AppResult<ExportFormat> {
    query.format.as_deref().unwrap_or("json").parse()
}

fn download(file: ExportFile) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.content,
    )
        .into_response()
}

// Health

pub async fn health_handler(State(state): State<AppState>) -> Response {
    match state.store.health_check().await {
        Ok(()) => Json(json!({
            "status": "ok",
            "backend": state.store.backend_name(),
        }))
        .into_response(),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "error": e.user_message() })),
            )
                .into_response()
        }
    }
}

// Auth

pub async fn login_handler(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(json!(outcome)))
}

pub async fn signup_handler(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = state.auth.signup(&req.email, &req.password).await?;
    Ok(Json(json!(outcome)))
}

pub async fn logout_handler(State(state): State<AppState>, session: Session) -> Json<Value> {
    let removed = state.auth.logout(&session.token).await;
    info!("Admin {} logged out", session.email);
    Json(json!({ "success": removed }))
}

pub async fn session_handler(session: Session) -> Json<Value> {
    Json(json!({ "session": &*session }))
}

// Programs

pub async fn list_programs_handler(State(state): State<AppState>) -> Result<Json<Vec<Program>>, AppError> {
    Ok(Json(state.programs.list_programs().await?))
}

pub async fn get_program_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Program>, AppError> {
    Ok(Json(state.programs.get_program(&id).await?))
}

pub async fn create_program_handler(
    State(state): State<AppState>,
    Json(form): Json<ProgramForm>,
) -> Result<(StatusCode, Json<Program>), AppError> {
    let program = state.programs.create_program(&form).await?;
    Ok((StatusCode::CREATED, Json(program)))
}

pub async fn update_program_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<ProgramForm>,
) -> Result<Json<Program>, AppError> {
    Ok(Json(state.programs.update_program(&id, &form).await?))
}

pub async fn delete_program_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.programs.delete_program(&id).await?;
    Ok(Json(json!({ "id": id, "deleted": true })))
}

// Statistics

pub async fn overview_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!(state.statistics.overview().await?)))
}

pub async fn presentations_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!(state.statistics.presentations().await?)))
}

pub async fn presentation_comments_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(json!(state.statistics.presentation_comments(&id).await?)))
}

pub async fn top_presenters_handler(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Value>, AppError> {
    let limit = query.limit.unwrap_or(DASHBOARD_TOP_N);
    Ok(Json(json!(state.statistics.top_presenters(limit).await?)))
}

pub async fn top_presentations_handler(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Value>, AppError> {
    let limit = query.limit.unwrap_or(DASHBOARD_TOP_N);
    Ok(Json(json!(state.statistics.top_presentations(limit).await?)))
}

pub async fn comments_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!(state.statistics.all_comments().await?)))
}

pub async fn engagement_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!(state.statistics.user_engagement().await?)))
}

pub async fn registrations_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!(state.statistics.registration_stats().await?)))
}

pub async fn user_activity_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!(state.statistics.user_activity().await?)))
}

pub async fn dashboard_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!(state.statistics.dashboard().await?)))
}

// Users

pub async fn list_users_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state.user_directory.snapshot();
    let term = query.search.unwrap_or_default();
    let users = if snapshot.is_loaded() {
        search_users(&snapshot.users, &term)
    } else {
        // the live view has not finished its first load yet
        state.users.search(&term).await?
    };
    Ok(Json(json!({
        "users": users,
        "total": users.len(),
        "revision": snapshot.revision,
    })))
}

pub async fn notify_incomplete_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!(state.users.notify_incomplete_profiles().await?)))
}

// Database

pub async fn database_stats_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!(state.database.collection_stats().await?)))
}

pub async fn export_collection_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let collection: Collection = collection.parse()?;
    let file = state.database.export(collection, parse_format(&query)?).await?;
    Ok(download(file))
}

/// JSON backups download as one file; CSV backups come back as a file list.
pub async fn export_all_handler(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let mut files = state.database.export_all(parse_format(&query)?).await?;
    if files.len() == 1 {
        if let Some(file) = files.pop() {
            return Ok(download(file));
        }
    }
    Ok(Json(json!({ "files": files })).into_response())
}

pub async fn clear_collection_handler(
    State(state): State<AppState>,
    session: Session,
    Path(collection): Path<String>,
    Json(req): Json<ConfirmationRequest>,
) -> Result<Json<Value>, AppError> {
    let collection: Collection = collection.parse()?;
    info!("Admin {} requested clearing {}", session.email, collection);
    let report = state.database.clear_collection(collection, &req.confirmation).await?;
    Ok(Json(json!({
        "success": report.failed == 0,
        "collection": collection,
        "report": report,
    })))
}

pub async fn clear_all_handler(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<ConfirmationRequest>,
) -> Result<Json<Value>, AppError> {
    info!("Admin {} requested clearing all data", session.email);
    let report = state.database.clear_all(&req.confirmation).await?;
    Ok(Json(json!({ "success": report.failed == 0, "report": report })))
}

// Keynote speakers

pub async fn list_speakers_handler(
    State(state): State<AppState>,
    Query(query): Query<SpeakerQuery>,
) -> Result<Json<Value>, AppError> {
    let sort: SpeakerSort = query.sort.as_deref().unwrap_or("order").parse()?;
    Ok(Json(json!(state.speakers.list(query.search.as_deref(), sort).await?)))
}

pub async fn create_speaker_handler(
    State(state): State<AppState>,
    Json(input): Json<SpeakerInput>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let speaker = state.speakers.create(&input).await?;
    Ok((StatusCode::CREATED, Json(json!(speaker))))
}

pub async fn update_speaker_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<SpeakerInput>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(json!(state.speakers.update(&id, &input).await?)))
}

pub async fn delete_speaker_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.speakers.delete(&id).await?;
    Ok(Json(json!({ "id": id, "deleted": true })))
}

/// Full console router with the session guard applied to every private route.
pub fn create_admin_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/signup", post(signup_handler));

    let private = Router::new()
        // Session
        .route("/auth/logout", post(logout_handler))
        .route("/auth/session", get(session_handler))
        // Programs
        .route("/programs", get(list_programs_handler).post(create_program_handler))
        .route(
            "/programs/{id}",
            get(get_program_handler)
                .put(update_program_handler)
                .delete(delete_program_handler),
        )
        // Statistics
        .route("/dashboard", get(dashboard_handler))
        .route("/statistics/overview", get(overview_handler))
        .route("/statistics/presentations", get(presentations_handler))
        .route("/statistics/presentations/{id}/comments", get(presentation_comments_handler))
        .route("/statistics/top-presenters", get(top_presenters_handler))
        .route("/statistics/top-presentations", get(top_presentations_handler))
        .route("/statistics/comments", get(comments_handler))
        .route("/statistics/engagement", get(engagement_handler))
        .route("/statistics/registrations", get(registrations_handler))
        .route("/statistics/users", get(user_activity_handler))
        // Users
        .route("/users", get(list_users_handler))
        .route("/users/notify-incomplete", post(notify_incomplete_handler))
        // Database
        .route("/database/stats", get(database_stats_handler))
        .route("/database/export", get(export_all_handler))
        .route("/database/export/{collection}", get(export_collection_handler))
        .route("/database/clear-all", post(clear_all_handler))
        .route("/database/clear/{collection}", post(clear_collection_handler))
        // Keynote speakers
        .route("/keynote-speakers", get(list_speakers_handler).post(create_speaker_handler))
        .route(
            "/keynote-speakers/{id}",
            put(update_speaker_handler).delete(delete_speaker_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_session::<AppState>,
        ));

    public.merge(private).with_state(state)
}
