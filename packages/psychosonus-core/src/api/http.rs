//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to the coordinator handle, the
//! search service or the command registry.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::response::{api_ok, api_success};
use crate::api::ws::ws_handler;
use crate::api::AppState;
use crate::error::PsychosonusResult;
use crate::protocol_constants::{APP_NAME, SERVICE_ID};
use crate::services::{CatalogSource, PauseToggle};
use crate::track::Track;

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    source: CatalogSource,
}

#[derive(Deserialize)]
struct AddRequest {
    song: Track,
}

#[derive(Deserialize)]
struct RemoveRequest {
    index: usize,
}

#[derive(Deserialize)]
struct ConnectRequest {
    channel: String,
}

#[derive(Deserialize)]
struct CommandRequest {
    text: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/status", get(get_status))
        .route("/api/search", post(handle_search))
        .route("/api/queue", get(get_queue))
        .route("/api/queue/add", post(handle_add))
        .route("/api/queue/remove", post(handle_remove))
        .route("/api/queue/clear", post(handle_clear))
        .route("/api/control/pause", post(handle_pause))
        .route("/api/control/resume", post(handle_resume))
        .route("/api/control/skip", post(handle_skip))
        .route("/api/control/play", post(handle_play))
        .route("/api/control/stop", post(handle_stop))
        .route("/api/session/connect", post(handle_connect))
        .route("/api/session/disconnect", post(handle_disconnect))
        .route("/api/command", post(handle_command))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({
        "status": "ok",
        "service": SERVICE_ID,
        "name": APP_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "limits": {
            "maxQueueSize": state.config.max_queue_size,
        },
        "spotify": state.search.spotify_enabled(),
    }))
}

async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    api_success(state.handle.status())
}

async fn handle_search(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> PsychosonusResult<Response> {
    let results = state
        .search
        .search(&payload.query, payload.limit, payload.source)
        .await?;
    Ok(api_success(json!({ "results": results })))
}

// ─────────────────────────────────────────────────────────────────────────────
// Queue Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn get_queue(State(state): State<AppState>) -> impl IntoResponse {
    let queue = state.handle.snapshot();
    api_success(json!({
        "queue": queue,
        "size": state.handle.size(),
        "capacity": state.config.max_queue_size,
    }))
}

async fn handle_add(
    State(state): State<AppState>,
    Json(payload): Json<AddRequest>,
) -> PsychosonusResult<Response> {
    let outcome = state.handle.enqueue(payload.song).await?;
    Ok(api_success(outcome))
}

async fn handle_remove(
    State(state): State<AppState>,
    Json(payload): Json<RemoveRequest>,
) -> PsychosonusResult<Response> {
    state.handle.remove_at(payload.index)?;
    Ok(api_ok())
}

async fn handle_clear(State(state): State<AppState>) -> impl IntoResponse {
    state.handle.clear();
    api_ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Control Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Toggles pause; reports which way it went.
async fn handle_pause(State(state): State<AppState>) -> PsychosonusResult<Response> {
    let toggled = state.handle.toggle_pause().await?;
    Ok(api_success(json!({
        "paused": toggled == PauseToggle::Paused,
    })))
}

async fn handle_resume(State(state): State<AppState>) -> PsychosonusResult<Response> {
    state.handle.resume().await?;
    Ok(api_ok())
}

async fn handle_skip(State(state): State<AppState>) -> PsychosonusResult<Response> {
    let skipped = state.handle.skip().await?;
    Ok(api_success(json!({ "skipped": skipped })))
}

async fn handle_play(State(state): State<AppState>) -> PsychosonusResult<Response> {
    state.handle.force_play().await?;
    Ok(api_ok())
}

async fn handle_stop(State(state): State<AppState>) -> PsychosonusResult<Response> {
    state.handle.stop().await?;
    Ok(api_ok())
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn handle_connect(
    State(state): State<AppState>,
    Json(payload): Json<ConnectRequest>,
) -> PsychosonusResult<Response> {
    let outcome = state.handle.connect(&payload.channel).await?;
    Ok(api_success(outcome))
}

async fn handle_disconnect(State(state): State<AppState>) -> PsychosonusResult<Response> {
    state.handle.disconnect().await?;
    Ok(api_ok())
}

/// Runs chat-style command text. Text without the prefix is not a command.
async fn handle_command(
    State(state): State<AppState>,
    Json(payload): Json<CommandRequest>,
) -> PsychosonusResult<Response> {
    let reply = state
        .commands
        .dispatch(&payload.text, &state.handle, &state.search)
        .await?;
    Ok(match reply {
        Some(reply) => api_success(json!({ "handled": true, "reply": reply.text })),
        None => api_success(json!({ "handled": false })),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::events::BroadcastEventBridge;
    use crate::services::coordinator::test_support::*;
    use crate::services::{CoordinatorHandle, SearchService};
    use crate::state::Config;

    fn router_for(h: &Harness) -> Router {
        let handle = CoordinatorHandle::new(
            Arc::clone(&h.queue),
            &h.channels,
            h.events.clone(),
            Duration::from_secs(5),
        );
        let state = AppState::builder()
            .handle(handle)
            .search(SearchService::new(h.search.clone(), None))
            .event_bridge(Arc::new(BroadcastEventBridge::new(16)))
            .config(Arc::new(Config::default()))
            .build()
            .unwrap();
        create_router(state)
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn song(id: &str) -> Value {
        json!({
            "id": id,
            "title": format!("Video {id}"),
            "artist": "Uploader",
            "url": format!("https://www.youtube.com/watch?v={id}"),
            "source": "youtube"
        })
    }

    #[tokio::test]
    async fn health_reports_service() {
        let h = Harness::new(5);
        let (status, body) = call(&router_for(&h), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], SERVICE_ID);
        assert_eq!(body["spotify"], false);
    }

    #[tokio::test]
    async fn add_then_list_queue() {
        let h = Harness::new(5);
        let router = router_for(&h);

        let (status, body) = call(&router, "POST", "/api/queue/add", Some(json!({ "song": song("a") }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accepted"], true);
        assert_eq!(body["playbackStarted"], false);

        let (_, body) = call(&router, "GET", "/api/queue", None).await;
        assert_eq!(body["size"], 1);
        assert_eq!(body["queue"][0]["current"], false);
    }

    #[tokio::test]
    async fn remove_out_of_range_is_bad_request() {
        let h = Harness::new(5);
        let router = router_for(&h);

        let (status, body) = call(&router, "POST", "/api/queue/remove", Some(json!({ "index": 3 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_index");
    }

    #[tokio::test]
    async fn skip_while_disconnected_is_conflict() {
        let h = Harness::new(5);
        let (status, body) = call(&router_for(&h), "POST", "/api/control/skip", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "not_connected");
        assert_eq!(body["status"], 409);
    }

    #[tokio::test]
    async fn connect_and_add_starts_playback() {
        let h = Harness::new(5);
        let router = router_for(&h);

        let (status, body) = call(&router, "POST", "/api/session/connect", Some(json!({ "channel": "general" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["channel"], "general");

        let (_, body) = call(&router, "POST", "/api/queue/add", Some(json!({ "song": song("a") }))).await;
        assert_eq!(body["playbackStarted"], true);

        h.wait_for_plays(1).await;
        let (_, body) = call(&router, "GET", "/api/status", None).await;
        assert_eq!(body["connected"], true);
        assert_eq!(body["currentTrack"]["id"], "a");
    }

    #[tokio::test]
    async fn spotify_search_without_credentials_is_unavailable() {
        let h = Harness::new(5);
        let (status, body) = call(
            &router_for(&h),
            "POST",
            "/api/search",
            Some(json!({ "query": "song", "source": "spotify" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "service_unavailable");
    }

    #[tokio::test]
    async fn search_defaults_to_combined_catalogs() {
        let h = Harness::new(5);
        h.search.hit("lofi beats", "https://www.youtube.com/watch?v=lofi");
        let (status, body) = call(
            &router_for(&h),
            "POST",
            "/api/search",
            Some(json!({ "query": "lofi beats" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"][0]["url"], "https://www.youtube.com/watch?v=lofi");
    }

    #[tokio::test]
    async fn add_rejects_option_like_url() {
        let h = Harness::new(5);
        let mut bad = song("a");
        bad["url"] = json!("--batch-file=/etc/passwd");
        let (status, _) = call(&router_for(&h), "POST", "/api/queue/add", Some(json!({ "song": bad }))).await;
        assert!(status.is_client_error());
        assert_eq!(h.queue.size(), 0);
    }

    #[tokio::test]
    async fn blank_search_returns_empty_results() {
        let h = Harness::new(5);
        let (status, body) = call(&router_for(&h), "POST", "/api/search", Some(json!({ "query": "  " }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"], json!([]));
    }

    #[tokio::test]
    async fn command_endpoint_runs_and_ignores_plain_text() {
        let h = Harness::new(5);
        let router = router_for(&h);

        let (_, body) = call(&router, "POST", "/api/command", Some(json!({ "text": "!queue" }))).await;
        assert_eq!(body["handled"], true);
        assert_eq!(body["reply"], "📭 Queue is empty");

        let (_, body) = call(&router, "POST", "/api/command", Some(json!({ "text": "hello" }))).await;
        assert_eq!(body["handled"], false);

        let (status, _) = call(&router, "POST", "/api/command", Some(json!({ "text": "!nope" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
