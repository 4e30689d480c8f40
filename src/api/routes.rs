//! HTTP route handlers.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{get, post, put},
    Router,
};
use futures::stream::{Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::card::AgentCard;
use crate::config::Config;
use crate::dispatch::{DispatchError, Dispatcher, SubmitRequest};
use crate::executor::{AgentExecutor, ChatExecutor};
use crate::fanout::EventFanout;
use crate::llm::{LlmClient, OpenRouterClient};
use crate::notify::{PushConfig, PushError, PushRegistry};
use crate::store::{InMemoryTaskStore, TaskStore};
use crate::task::{Task, TaskEvent};

use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Process-wide immutable capability card
    pub card: Arc<AgentCard>,
    pub dispatcher: Arc<Dispatcher>,
}

/// Start the HTTP server.
pub async fn serve(config: Config, card: AgentCard) -> anyhow::Result<()> {
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    let client: Arc<dyn LlmClient> = Arc::new(OpenRouterClient::new(config.api_key.clone()));
    let executor: Arc<dyn AgentExecutor> =
        Arc::new(ChatExecutor::new(client, config.default_model.clone()));
    let fanout = EventFanout::new(
        config.stream_buffer_events,
        Duration::from_secs(config.stream_retention_secs),
    );
    let notifier = PushRegistry::new(config.push_notifications);
    let dispatcher = Dispatcher::new(store, executor, fanout, notifier);

    let state = Arc::new(AppState {
        config: config.clone(),
        card: Arc::new(card),
        dispatcher,
    });

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/card", get(get_card))
        .route("/.well-known/agent.json", get(get_card))
        .route("/api/tasks", post(submit_task).get(list_tasks))
        .route("/api/tasks/subscribe", post(submit_and_subscribe))
        .route("/api/tasks/:id", get(get_task))
        .route("/api/tasks/:id/cancel", post(cancel_task))
        .route("/api/tasks/:id/stream", get(stream_task))
        .route(
            "/api/tasks/:id/notifications",
            put(set_push_config).get(get_push_config),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    let shutdown_state = Arc::clone(&state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal(shutdown_state).await;
        })
        .await?;

    Ok(())
}

/// Wait for a shutdown signal, then wind down in-flight tasks.
async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, canceling in-flight tasks...");
    state.dispatcher.shutdown().await;
}

/// Map a dispatch error onto a caller-visible response.
fn error_response(err: DispatchError) -> (StatusCode, String) {
    let status = match err {
        DispatchError::NotFound(_) => StatusCode::NOT_FOUND,
        DispatchError::DuplicateTask(_) => StatusCode::CONFLICT,
        DispatchError::InvalidTransition { .. } => StatusCode::CONFLICT,
    };
    (status, err.to_string())
}

fn push_error_response(err: PushError) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, err.to_string())
}

/// Wrap a task event stream as SSE with named events and keep-alives.
fn sse_events(
    events: impl Stream<Item = TaskEvent> + Send + 'static,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = events.map(|ev| {
        Ok(Event::default()
            .event(ev.event_name())
            .json_data(&ev)
            .unwrap())
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        agent: state.card.name.clone(),
    })
}

/// Serve the agent capability card.
async fn get_card(State(state): State<Arc<AppState>>) -> Json<AgentCard> {
    Json((*state.card).clone())
}

/// Submit a task (or follow-up input) and return the snapshot for polling.
async fn submit_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitTaskRequest>,
) -> Result<Json<Task>, (StatusCode, String)> {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message is required".to_string()));
    }

    let task = state
        .dispatcher
        .submit(SubmitRequest {
            message,
            task_id: req.task_id,
            context_id: req.context_id,
        })
        .await
        .map_err(error_response)?;

    Ok(Json(task))
}

/// Submit a task and stream its events via SSE.
async fn submit_and_subscribe(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitTaskRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message is required".to_string()));
    }

    let task = state
        .dispatcher
        .submit(SubmitRequest {
            message,
            task_id: req.task_id,
            context_id: req.context_id,
        })
        .await
        .map_err(error_response)?;

    let events = state
        .dispatcher
        .subscribe(&task.id)
        .await
        .map_err(error_response)?;

    Ok(sse_events(events))
}

/// List tasks.
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTasksQuery>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    let tasks = state
        .dispatcher
        .list(params.context_id.as_deref())
        .await
        .map_err(error_response)?;

    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(50);
    let page = tasks.into_iter().skip(offset).take(limit).collect();
    Ok(Json(page))
}

/// Get task status and results.
async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, (StatusCode, String)> {
    state
        .dispatcher
        .get(&id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Request cancellation of a task.
async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    state
        .dispatcher
        .cancel(&id)
        .await
        .map_err(error_response)?;
    Ok(Json(serde_json::json!({
        "ok": true,
        "message": "cancellation requested"
    })))
}

/// Attach (or re-attach) to a task's event stream via SSE.
async fn stream_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let events = state
        .dispatcher
        .subscribe(&id)
        .await
        .map_err(error_response)?;
    Ok(sse_events(events))
}

/// Register a terminal-event callback for a task.
async fn set_push_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(config): Json<PushConfig>,
) -> Result<Json<PushConfig>, (StatusCode, String)> {
    // Reject registrations for unknown tasks up front.
    state.dispatcher.get(&id).await.map_err(error_response)?;

    state
        .dispatcher
        .notifier()
        .set(&id, config.clone())
        .await
        .map_err(push_error_response)?;
    Ok(Json(config))
}

/// Read back the registered terminal-event callback for a task.
async fn get_push_config(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PushConfig>, (StatusCode, String)> {
    state.dispatcher.get(&id).await.map_err(error_response)?;

    let config = state
        .dispatcher
        .notifier()
        .get(&id)
        .await
        .map_err(push_error_response)?;
    match config {
        Some(config) => Ok(Json(config)),
        None => Err((
            StatusCode::NOT_FOUND,
            format!("no push notification callback registered for task {}", id),
        )),
    }
}
