use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use game::{GameContext, GameRules};
use shared::{
    domain::UserId,
    error::{ApiError, ErrorCode},
    protocol::{
        FinishOutcome, Milestone, NewOrderOutcome, OrderPayload, PlayerSummary, StandingRow,
    },
};
use storage::Storage;

mod config;

use config::{load_settings, prepare_database_url};

#[derive(Clone)]
struct AppState {
    game: GameContext,
    admin_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    user_id: i64,
    #[serde(default)]
    first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlayerQuery {
    user_id: i64,
    #[serde(default)]
    first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ResetRequest {
    admin_id: i64,
}

#[derive(Debug, Serialize)]
struct ResetResponse {
    players_wiped: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|err| {
        error!(
            %database_url,
            %err,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        err
    })?;
    let game = GameContext {
        storage,
        rules: Arc::new(GameRules::standard()),
    };
    let state = AppState {
        game,
        admin_ids: settings.admin_ids,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "cafe server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/login", post(login))
        .route("/orders/new", post(http_new_order))
        .route("/orders/current", get(http_current_order))
        .route("/orders/done", post(http_finish_order))
        .route("/players", get(http_leaderboard))
        .route("/admin/reset", post(http_reset))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Storage | ErrorCode::Serialization => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<PlayerSummary>, (StatusCode, Json<ApiError>)> {
    let summary = game::register_player(
        &state.game,
        UserId(req.user_id),
        req.first_name.as_deref().unwrap_or_default(),
    )
    .await
    .map_err(reject)?;
    Ok(Json(summary))
}

async fn http_new_order(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PlayerQuery>,
) -> Result<Json<NewOrderOutcome>, (StatusCode, Json<ApiError>)> {
    let outcome = game::new_order(
        &state.game,
        UserId(q.user_id),
        q.first_name.as_deref().unwrap_or_default(),
    )
    .await
    .map_err(reject)?;
    Ok(Json(outcome))
}

async fn http_current_order(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PlayerQuery>,
) -> Result<Json<Option<OrderPayload>>, (StatusCode, Json<ApiError>)> {
    let order = game::current_order(&state.game, UserId(q.user_id))
        .await
        .map_err(reject)?;
    Ok(Json(order))
}

async fn http_finish_order(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PlayerQuery>,
) -> Result<Json<FinishOutcome>, (StatusCode, Json<ApiError>)> {
    let outcome = game::finish_order(&state.game, UserId(q.user_id))
        .await
        .map_err(reject)?;
    let outcome = match outcome {
        FinishOutcome::Completed(mut payload) => {
            payload.milestone = Milestone::for_total(payload.total_orders);
            FinishOutcome::Completed(payload)
        }
        other => other,
    };
    Ok(Json(outcome))
}

async fn http_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LeaderboardQuery>,
) -> Result<Json<Vec<StandingRow>>, (StatusCode, Json<ApiError>)> {
    let limit = q.limit.map(|limit| limit.clamp(1, 100));
    let standings = game::leaderboard(&state.game, limit)
        .await
        .map_err(reject)?;
    Ok(Json(standings))
}

async fn http_reset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<ResetResponse>, (StatusCode, Json<ApiError>)> {
    if !state.admin_ids.contains(&req.admin_id) {
        return Err(reject(ApiError::new(
            ErrorCode::Forbidden,
            "admin access required",
        )));
    }
    let players_wiped = game::reset_all_players(&state.game)
        .await
        .map_err(reject)?;
    info!(admin_id = req.admin_id, players_wiped, "database reset by admin");
    Ok(Json(ResetResponse { players_wiped }))
}
