//! `engram-remote-server` — HTTP+JSON command service implementing the
//! wire side of the remote Storage contract (spec §4.1) that
//! `engram::storage::remote::RemoteStorage` speaks as a client.
//!
//! Usage:
//!   ENGRAM_REMOTE_API_KEY=secret ENGRAM_REMOTE_DATA_DIR=./data \
//!     cargo run --package engram-remote-server
//!   curl -H "Authorization: Bearer secret" http://localhost:8090/stats

use axum::{
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use engram::{Bm25IndexStorage, Episode, LocalStorage, PersistedBm25Index, Storage, StorageStats};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type TagIndex = Arc<Mutex<HashMap<String, Vec<String>>>>;

#[derive(Clone)]
struct AppState {
    storage: Arc<LocalStorage>,
    tags: TagIndex,
    tags_path: PathBuf,
    api_key: Option<String>,
}

fn err(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

fn map_engram_err(e: engram::EngramError) -> (StatusCode, Json<serde_json::Value>) {
    err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn load_tag_index(path: &std::path::Path) -> HashMap<String, Vec<String>> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|data| serde_json::from_str(&data).ok())
        .unwrap_or_default()
}

fn save_tag_index(path: &std::path::Path, map: &HashMap<String, Vec<String>>) -> std::io::Result<()> {
    let data = serde_json::to_string_pretty(map).unwrap_or_else(|_| "{}".to_string());
    std::fs::write(path, data)
}

async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let Some(ref expected) = state.api_key else {
        return Ok(next.run(request).await);
    };
    let header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if header != Some(expected.as_str()) {
        return Err(err(StatusCode::UNAUTHORIZED, "missing or invalid bearer token").into_response());
    }
    Ok(next.run(request).await)
}

async fn health() -> &'static str {
    "ok"
}

async fn get_stats(State(state): State<AppState>) -> Result<Json<StorageStats>, (StatusCode, Json<serde_json::Value>)> {
    let stats = state.storage.get_stats().map_err(map_engram_err)?;
    Ok(Json(stats))
}

async fn put_episode(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(episode): Json<Episode>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    if episode.id != id {
        return Err(err(StatusCode::BAD_REQUEST, "body id does not match path id"));
    }
    state.storage.save_episode(&episode).map_err(map_engram_err)?;
    Ok(StatusCode::OK)
}

async fn get_episode(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Episode>, (StatusCode, Json<serde_json::Value>)> {
    match state.storage.get_episode(&id).map_err(map_engram_err)? {
        Some(ep) => Ok(Json(ep)),
        None => Err(err(StatusCode::NOT_FOUND, format!("no episode {id}"))),
    }
}

async fn delete_episode(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    match state.storage.delete_episode(&id) {
        Ok(true) => StatusCode::NO_CONTENT,
        Ok(false) => StatusCode::NOT_FOUND,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn get_all_episodes(
    State(state): State<AppState>,
) -> Result<Json<Vec<Episode>>, (StatusCode, Json<serde_json::Value>)> {
    Ok(Json(state.storage.get_all_episodes().map_err(map_engram_err)?))
}

async fn list_episode_ids(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, (StatusCode, Json<serde_json::Value>)> {
    Ok(Json(state.storage.list_episode_ids().map_err(map_engram_err)?))
}

async fn episodes_since(
    State(state): State<AppState>,
    Path(since_ms): Path<i64>,
) -> Result<Json<Vec<Episode>>, (StatusCode, Json<serde_json::Value>)> {
    Ok(Json(state.storage.get_episodes_since(since_ms).map_err(map_engram_err)?))
}

async fn get_bm25_index(
    State(state): State<AppState>,
) -> Result<Json<PersistedBm25Index>, (StatusCode, Json<serde_json::Value>)> {
    match state.storage.load_bm25_index().map_err(map_engram_err)? {
        Some(index) => Ok(Json(index)),
        None => Err(err(StatusCode::NOT_FOUND, "no persisted index")),
    }
}

async fn put_bm25_index(
    State(state): State<AppState>,
    Json(index): Json<PersistedBm25Index>,
) -> Result<StatusCode, (StatusCode, Json<serde_json::Value>)> {
    state.storage.save_bm25_index(&index).map_err(map_engram_err)?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct TagMember {
    id: String,
}

async fn add_tag_member(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Json(body): Json<TagMember>,
) -> StatusCode {
    let mut map = state.tags.lock().unwrap();
    let ids = map.entry(tag).or_default();
    if !ids.iter().any(|existing| existing == &body.id) {
        ids.push(body.id);
    }
    let _ = save_tag_index(&state.tags_path, &map);
    StatusCode::OK
}

async fn remove_tag_member(
    State(state): State<AppState>,
    Path((tag, id)): Path<(String, String)>,
) -> StatusCode {
    let mut map = state.tags.lock().unwrap();
    let Some(ids) = map.get_mut(&tag) else {
        return StatusCode::NOT_FOUND;
    };
    let before = ids.len();
    ids.retain(|existing| existing != &id);
    let removed = ids.len() != before;
    if ids.is_empty() {
        map.remove(&tag);
    }
    let _ = save_tag_index(&state.tags_path, &map);
    if removed {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn get_tag_members(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Json<Vec<String>> {
    let map = state.tags.lock().unwrap();
    Json(map.get(&tag).cloned().unwrap_or_default())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api_key = std::env::var("ENGRAM_REMOTE_API_KEY").ok();
    let data_dir = std::env::var("ENGRAM_REMOTE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./engram-remote-data"));
    std::fs::create_dir_all(&data_dir).expect("create data dir");

    let storage = Arc::new(LocalStorage::new(data_dir.clone()));
    storage.init().expect("initialize local storage");

    let tags_path = data_dir.join("remote-tags.json");
    let tags = Arc::new(Mutex::new(load_tag_index(&tags_path)));

    let state = AppState { storage, tags, tags_path, api_key: api_key.clone() };

    let trace = TraceLayer::new_for_http()
        .on_request(|req: &Request<_>, _: &tracing::Span| {
            tracing::info!(method = %req.method(), uri = %req.uri(), "request");
        })
        .on_response(|res: &Response, latency: std::time::Duration, _: &tracing::Span| {
            tracing::info!(status = %res.status(), latency_ms = %latency.as_millis(), "response");
        });

    let protected = Router::new()
        .route("/episodes/ids", get(list_episode_ids))
        .route("/episodes/since/:since_ms", get(episodes_since))
        .route("/episodes/:id", put(put_episode).get(get_episode).delete(delete_episode))
        .route("/episodes", get(get_all_episodes))
        .route("/index/bm25", get(get_bm25_index).put(put_bm25_index))
        .route("/tags/:tag", post(add_tag_member).get(get_tag_members))
        .route("/tags/:tag/:id", delete(remove_tag_member))
        .route("/stats", get(get_stats))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state.clone());

    let app = Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(trace)
        .layer(CorsLayer::permissive());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], 8090));
    tracing::info!("Listening on http://{}", addr);
    if api_key.is_none() {
        tracing::warn!("ENGRAM_REMOTE_API_KEY not set — all requests accepted (dev only)");
    }

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
