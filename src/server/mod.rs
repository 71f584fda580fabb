use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::persistence::store::{FilePositionStore, validate_environment};
use crate::persistence::{BoardPositions, PositionStore};

const SAVED_MESSAGE: &str = "Positions saved successfully";

#[derive(Clone)]
struct AppState {
    store: Arc<FilePositionStore>,
}

#[derive(Debug, Deserialize)]
struct PositionsQuery {
    environment: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct SavedBody {
    message: &'static str,
    environment: String,
}

pub fn router(store: Arc<FilePositionStore>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/api/positions",
            get(handle_get_positions)
                .post(handle_save_positions)
                .put(handle_save_positions),
        )
        .with_state(AppState { store })
}

pub async fn run_positions_server(store: FilePositionStore, bind: &str) -> Result<()> {
    let positions_dir = store.dir().display().to_string();
    let app = router(Arc::new(store));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind HTTP server to `{bind}`"))?;
    let local_addr = listener.local_addr().ok();

    info!(
        positions_dir = %positions_dir,
        requested_bind = %bind,
        bound_addr = local_addr.map(|addr| addr.to_string()),
        "starting positions API"
    );

    axum::serve(listener, app)
        .await
        .context("HTTP server exited with an error")
}

async fn handle_health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn handle_get_positions(
    State(state): State<AppState>,
    Query(query): Query<PositionsQuery>,
) -> Response {
    let environment = query.environment.unwrap_or_default();
    if let Err(error) = validate_environment(&environment) {
        return error_response(StatusCode::BAD_REQUEST, &error);
    }

    match state.store.load(&environment).await {
        Ok(positions) => {
            debug!(
                environment = %environment,
                positions = positions.positions.len(),
                "served board positions"
            );
            (StatusCode::OK, Json(positions)).into_response()
        }
        Err(error) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &error),
    }
}

async fn handle_save_positions(
    State(state): State<AppState>,
    payload: Result<Json<BoardPositions>, JsonRejection>,
) -> Response {
    let positions = match payload {
        Ok(Json(positions)) => positions,
        Err(rejection) => {
            let error = anyhow::anyhow!("invalid request body: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, &error);
        }
    };
    if let Err(error) = validate_environment(&positions.environment) {
        return error_response(StatusCode::BAD_REQUEST, &error);
    }

    match state.store.save(&positions).await {
        Ok(()) => (
            StatusCode::OK,
            Json(SavedBody {
                message: SAVED_MESSAGE,
                environment: positions.environment,
            }),
        )
            .into_response(),
        Err(error) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &error),
    }
}

fn error_response(status: StatusCode, error: &anyhow::Error) -> Response {
    let details = error_details(error);
    warn!(
        status = status.as_u16(),
        error = %details,
        "positions request failed"
    );
    (status, Json(ErrorBody { error: details })).into_response()
}

fn error_details(error: &anyhow::Error) -> String {
    error
        .chain()
        .map(std::string::ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Json;
    use axum::body::to_bytes;
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::response::Response;

    use crate::graph::Position;
    use crate::persistence::store::FilePositionStore;
    use crate::persistence::{BoardPositions, NodePosition};
    use crate::test_support::{remove_dir_if_exists, temp_path};

    use super::{AppState, PositionsQuery, handle_get_positions, handle_save_positions};

    fn state_for(prefix: &str) -> (AppState, std::path::PathBuf) {
        let root = temp_path(prefix);
        let state = AppState {
            store: Arc::new(FilePositionStore::new(&root)),
        };
        (state, root)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    #[tokio::test]
    async fn get_without_environment_is_bad_request() {
        let (state, root) = state_for("server-missing-env");
        let response =
            handle_get_positions(State(state), Query(PositionsQuery { environment: None })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "environment is required");
        remove_dir_if_exists(&root);
    }

    #[tokio::test]
    async fn get_for_unknown_environment_returns_empty_positions() {
        let (state, root) = state_for("server-empty");
        let response = handle_get_positions(
            State(state),
            Query(PositionsQuery {
                environment: Some("dev".to_owned()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["environment"], "dev");
        assert_eq!(body["positions"], serde_json::json!([]));
        remove_dir_if_exists(&root);
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let (state, root) = state_for("server-roundtrip");
        let positions = BoardPositions {
            environment: "dev".to_owned(),
            positions: vec![NodePosition::new("service-worker", Position::new(500.0, 500.0))],
            edge_handles: Vec::new(),
        };

        let response =
            handle_save_positions(State(state.clone()), Ok(Json(positions.clone()))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Positions saved successfully");
        assert_eq!(body["environment"], "dev");

        let response = handle_get_positions(
            State(state),
            Query(PositionsQuery {
                environment: Some("dev".to_owned()),
            }),
        )
        .await;
        let loaded: BoardPositions =
            serde_json::from_value(body_json(response).await).expect("positions should decode");
        assert_eq!(loaded, positions);
        remove_dir_if_exists(&root);
    }

    #[tokio::test]
    async fn save_rejects_empty_or_unsafe_environment() {
        let (state, root) = state_for("server-bad-env");
        for environment in ["", "../etc"] {
            let response = handle_save_positions(
                State(state.clone()),
                Ok(Json(BoardPositions::empty(environment))),
            )
            .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{environment:?}");
        }
        assert!(!root.exists());
    }
}
