//! HTTP surface: direct CRUD endpoints plus the natural-language path.
//!
//! The NLP handler maps its [`DispatchOutcome`] onto the same statuses
//! the direct endpoints use, so both paths present one CRUD surface.

use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::info;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::nlp::dispatch::DispatchOutcome;
use crate::nlp::llm::LlmProvider;
use crate::nlp::service::NlpService;
use crate::user::store::UserStore;
use crate::user::{NewUser, User, UserPatch};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: String,
}

struct AppState {
    store: Arc<dyn UserStore>,
    nlp: NlpService,
}

pub struct Gateway;

impl Gateway {
    /// Binds the listener and serves until the process exits.
    pub async fn start(
        config: GatewayConfig,
        store: Arc<dyn UserStore>,
        provider: Arc<dyn LlmProvider>,
    ) -> anyhow::Result<()> {
        let state = Arc::new(AppState {
            store: store.clone(),
            nlp: NlpService::new(provider, store),
        });

        let router = Self::router(state);

        info!(bind_addr = %config.bind_addr, "starting user admin gateway");
        let listener = TcpListener::bind(config.bind_addr.as_str()).await?;
        axum::serve(listener, router.into_make_service()).await?;
        Ok(())
    }

    fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/admin", post(create_handler).get(list_handler))
            .route("/admin/nlp", post(nlp_handler))
            .route(
                "/admin/:id",
                get(get_handler).put(update_handler).delete(delete_handler),
            )
            .with_state(state)
    }
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewUser>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate()?;
    let user = state.store.create(body)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.store.get_all()?))
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    let user = state.store.get_by_id(id)?.ok_or(ApiError::TargetNotFound)?;
    Ok(Json(user))
}

async fn update_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, ApiError> {
    patch.validate()?;
    let user = state
        .store
        .update(id, patch)?
        .ok_or(ApiError::TargetNotFound)?;
    Ok(Json(user))
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::TargetNotFound)
    }
}

#[derive(Debug, Deserialize)]
struct NlpRequest {
    prompt: Option<String>,
    model: Option<String>,
}

async fn nlp_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NlpRequest>,
) -> Result<Response, ApiError> {
    let prompt = require_prompt(&request)?;
    let outcome = state.nlp.process(prompt, request.model.as_deref()).await?;
    Ok(outcome_response(outcome))
}

/// A request without a usable prompt is rejected before the model is
/// ever called.
fn require_prompt(request: &NlpRequest) -> Result<&str, ApiError> {
    request
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|prompt| !prompt.is_empty())
        .ok_or_else(|| ApiError::MissingProperty("prompt".to_string()))
}

fn outcome_response(outcome: DispatchOutcome) -> Response {
    match outcome {
        DispatchOutcome::Created(user) => (StatusCode::CREATED, Json(user)).into_response(),
        DispatchOutcome::All(users) => Json(users).into_response(),
        DispatchOutcome::One(user) => Json(user).into_response(),
        // A get that matched nothing is a normal outcome: 200 with null.
        DispatchOutcome::NoMatch => Json(Value::Null).into_response(),
        DispatchOutcome::Updated(user) => Json(user).into_response(),
        DispatchOutcome::Deleted => StatusCode::NO_CONTENT.into_response(),
    }
}
