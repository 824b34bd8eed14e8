use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;

use culinary_core::models::{Recipe, RecipeForm};
use culinary_core::{RecipeRepository, RecipeStore, StoreError};

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    repository: Arc<RecipeRepository<RecipeStore>>,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConstraintViolation { .. } => Self::BadRequest(err.to_string()),
            StoreError::NotFound { id } => Self::NotFound(format!("Recipe {id} not found")),
            other => Self::Internal(other),
        }
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Recipe handlers ---

async fn list_recipes(State(state): State<AppState>) -> Result<Json<Vec<Recipe>>, ApiError> {
    Ok(Json(state.repository.list_all().await?))
}

async fn create_recipe(
    State(state): State<AppState>,
    Json(form): Json<RecipeForm>,
) -> Result<(StatusCode, Json<Recipe>), ApiError> {
    let draft = form.into_draft()?;
    let saved = state.repository.insert(draft).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Recipe>, ApiError> {
    Ok(Json(state.repository.get(id).await?))
}

async fn update_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<RecipeForm>,
) -> Result<Json<Recipe>, ApiError> {
    if form.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one field must be provided".to_string(),
        ));
    }
    let existing = state.repository.get(id).await?;
    let saved = state.repository.update(form.apply_to(existing)).await?;
    Ok(Json(saved))
}

async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let target = Recipe {
        id,
        ..Recipe::draft()
    };
    state.repository.delete(target).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/api/recipes/{id}",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

/// First and last four characters of the key, or nothing for keys too short to mask.
fn mask_key(key: &str) -> String {
    let len = key.chars().count();
    if len < 8 {
        return "****".to_string();
    }
    let head: String = key.chars().take(4).collect();
    let tail: String = key.chars().skip(len - 4).collect();
    format!("{head}...{tail}")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

pub async fn start_server(
    repository: Arc<RecipeRepository<RecipeStore>>,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        repository,
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {} (see api_key file in data directory)",
            mask_key(key)
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
