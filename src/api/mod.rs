// HTTP API routes (snake CRUD, bracket management, heat game control).

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::db::Database;
use crate::service::{BracketService, ServiceError};

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateSnakeRequest {
    pub name: String,
    pub url: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateSnakeRequest {
    pub name: String,
    pub url: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateBracketRequest {
    pub name: String,
    #[serde(default)]
    pub snake_ids: Vec<i64>,
}

#[derive(Deserialize)]
pub struct UpdateBracketRequest {
    pub name: String,
    #[serde(default)]
    pub snake_ids: Vec<i64>,
}

#[derive(Deserialize)]
pub struct RecordResultRequest {
    pub winner_snake_id: i64,
    pub runner_up_snake_id: i64,
}

#[derive(Deserialize)]
pub struct RunGameParams {
    pub autoplay: Option<bool>,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub service: Arc<BracketService>,
    pub board_url: String,
}

// ── Error helpers ─────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

fn internal_error(e: sqlx::Error) -> impl IntoResponse {
    tracing::error!("Database error: {e}");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

fn service_error(e: ServiceError) -> axum::response::Response {
    match e {
        ServiceError::InvalidInput(msg) => {
            json_error(StatusCode::BAD_REQUEST, &msg).into_response()
        }
        ServiceError::NotFound(what) => {
            json_error(StatusCode::NOT_FOUND, &format!("{what} not found")).into_response()
        }
        ServiceError::InvalidState(msg) => {
            json_error(StatusCode::CONFLICT, &msg).into_response()
        }
        ServiceError::Db(e) => internal_error(e).into_response(),
        ServiceError::Engine(e) => {
            tracing::error!("Engine error: {e}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(db: Arc<Database>, service: Arc<BracketService>, board_url: String) -> Router {
    let state = AppState {
        db,
        service,
        board_url,
    };

    Router::new()
        // Snakes
        .route("/api/snakes", get(list_snakes).post(create_snake))
        .route(
            "/api/snakes/{id}",
            get(get_snake).put(update_snake).delete(delete_snake),
        )
        // Brackets
        .route(
            "/api/tournaments/{id}/brackets",
            get(list_brackets).post(create_bracket),
        )
        .route("/api/brackets/{id}", get(get_bracket).put(update_bracket))
        .route("/api/brackets/{id}/games/current", get(current_games))
        .route("/api/brackets/{id}/export.csv", get(export_csv))
        .route("/api/brackets/{id}/rounds", post(advance_round))
        // Heat games
        .route("/api/heats/{id}/games", post(create_game))
        .route("/api/heats/{heat_id}/games/{number}/run", post(run_game))
        .route(
            "/api/heats/{heat_id}/games/{number}/result",
            put(record_result),
        )
        .with_state(state)
}

// ── Snake handlers ────────────────────────────────────────────────────

async fn list_snakes(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.list_snakes().await {
        Ok(snakes) => (StatusCode::OK, Json(json!(snakes))).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

async fn create_snake(
    State(state): State<AppState>,
    Json(req): Json<CreateSnakeRequest>,
) -> impl IntoResponse {
    if req.name.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "name is required").into_response();
    }
    let url = req.url.unwrap_or_default();
    match state.db.create_snake(&req.name, &url).await {
        Ok(snake) => (StatusCode::CREATED, Json(json!(snake))).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

async fn get_snake(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    match state.db.get_snake(id).await {
        Ok(Some(snake)) => (StatusCode::OK, Json(json!(snake))).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Snake not found").into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

async fn update_snake(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateSnakeRequest>,
) -> impl IntoResponse {
    if req.name.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "name is required").into_response();
    }
    let url = req.url.unwrap_or_default();
    match state.db.update_snake(id, &req.name, &url).await {
        Ok(Some(snake)) => (StatusCode::OK, Json(json!(snake))).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "Snake not found").into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

async fn delete_snake(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    match state.db.delete_snake(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => json_error(StatusCode::NOT_FOUND, "Snake not found").into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

// ── Bracket handlers ──────────────────────────────────────────────────

async fn list_brackets(
    State(state): State<AppState>,
    Path(tournament_id): Path<i64>,
) -> impl IntoResponse {
    match state.db.get_tournament(tournament_id).await {
        Ok(None) => {
            return json_error(StatusCode::NOT_FOUND, "Tournament not found").into_response()
        }
        Err(e) => return internal_error(e).into_response(),
        Ok(Some(_)) => {}
    }
    match state.db.list_brackets(tournament_id).await {
        Ok(brackets) => (StatusCode::OK, Json(json!(brackets))).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

async fn create_bracket(
    State(state): State<AppState>,
    Path(tournament_id): Path<i64>,
    Json(req): Json<CreateBracketRequest>,
) -> impl IntoResponse {
    match state
        .service
        .create_bracket(tournament_id, &req.name, &req.snake_ids)
        .await
    {
        Ok(bracket) => (StatusCode::CREATED, Json(json!(bracket))).into_response(),
        Err(e) => service_error(e),
    }
}

async fn get_bracket(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    match state.service.bracket_detail(id).await {
        Ok(detail) => (StatusCode::OK, Json(json!(detail))).into_response(),
        Err(e) => service_error(e),
    }
}

async fn update_bracket(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateBracketRequest>,
) -> impl IntoResponse {
    match state
        .service
        .update_bracket(id, &req.name, &req.snake_ids)
        .await
    {
        Ok(bracket) => (StatusCode::OK, Json(json!(bracket))).into_response(),
        Err(e) => service_error(e),
    }
}

async fn current_games(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    match state.service.current_games(id).await {
        Ok(games) => (StatusCode::OK, Json(json!({ "games": games }))).into_response(),
        Err(e) => service_error(e),
    }
}

async fn export_csv(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    match state.service.export_csv(id).await {
        Ok(export) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export.filename),
                ),
            ],
            export.content,
        )
            .into_response(),
        Err(e) => service_error(e),
    }
}

async fn advance_round(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    match state.service.advance_round(id).await {
        Ok(seeded) => (StatusCode::CREATED, Json(json!(seeded))).into_response(),
        Err(e) => service_error(e),
    }
}

// ── Heat game handlers ────────────────────────────────────────────────

async fn create_game(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    match state.service.create_game(id).await {
        Ok(game) => (StatusCode::CREATED, Json(json!(game))).into_response(),
        Err(e) => service_error(e),
    }
}

async fn run_game(
    State(state): State<AppState>,
    Path((heat_id, number)): Path<(i64, i64)>,
    Query(params): Query<RunGameParams>,
) -> impl IntoResponse {
    let game = match state.service.run_game(heat_id, number).await {
        Ok(g) => g,
        Err(e) => return service_error(e),
    };

    // engine_id is always set after a successful dispatch
    let engine_id = game.engine_id.clone().unwrap_or_default();
    let mut url = format!("{}/{}", state.board_url, engine_id);
    if params.autoplay.unwrap_or(false) {
        url.push_str("?autoplay=true");
    }

    (StatusCode::OK, Json(json!({ "game": game, "url": url }))).into_response()
}

async fn record_result(
    State(state): State<AppState>,
    Path((heat_id, number)): Path<(i64, i64)>,
    Json(req): Json<RecordResultRequest>,
) -> impl IntoResponse {
    match state
        .service
        .record_result(
            heat_id,
            number,
            req.winner_snake_id,
            req.runner_up_snake_id,
        )
        .await
    {
        Ok(game) => (StatusCode::OK, Json(json!(game))).into_response(),
        Err(e) => service_error(e),
    }
}
