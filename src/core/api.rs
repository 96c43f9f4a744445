//! HTTP + WebSocket API for liveguard
//!
//! Thin clients run the face detector on-device and upload per-frame
//! measurements; the server owns one `LivenessSession` per id.
//!
//! Endpoints:
//! - POST /session/new - Create new session (optional config override)
//! - POST /session/{id}/frame - Submit one frame's measurements
//! - GET /session/{id} - Get session snapshot
//! - POST /session/{id}/cancel - Cancel session
//! - DELETE /session/{id} - Remove session, returning its final status
//! - WS /ws/{id} - Live event stream
//! - GET /health - Health check

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::config::LivenessConfig;
use crate::core::LivenessSession;
use crate::types::{
    ChallengeType, FaceObservation, FrameGeometry, LivenessError, LivenessEvent, LivenessResult,
    SessionSnapshot, StampedEvent,
};

/// Per-session broadcast buffer
const UPDATE_CHANNEL_CAPACITY: usize = 100;

/// Session state
#[derive(Debug)]
pub struct ApiSession {
    pub id: String,
    pub session: LivenessSession,
    pub last_frame_ms: u64,
    pub update_tx: broadcast::Sender<StampedEvent>,
}

impl ApiSession {
    fn publish(&self, events: &[LivenessEvent]) {
        for event in events {
            let _ = self
                .update_tx
                .send(StampedEvent::new(event.clone(), self.last_frame_ms));
        }
    }
}

/// App state
pub struct AppState {
    pub sessions: RwLock<HashMap<String, ApiSession>>,
    pub default_config: LivenessConfig,
}

/// Create new session request
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewSessionRequest {
    pub config: Option<LivenessConfig>,
    /// Deterministic challenge shuffle
    pub seed: Option<u64>,
}

/// Create new session response
#[derive(Debug, Serialize, Deserialize)]
pub struct NewSessionResponse {
    pub session_id: String,
    pub challenges: Vec<ChallengeType>,
    pub websocket_url: String,
}

/// Frame submission: detector output for one analysed camera frame
#[derive(Debug, Deserialize)]
pub struct FrameRequest {
    pub image_width: f64,
    pub image_height: f64,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub faces: Vec<FaceObservation>,
    /// Set when the client's detector failed on this frame
    #[serde(default)]
    pub error: Option<String>,
}

/// Events produced by a request plus the resulting snapshot
#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<LivenessEvent>,
    pub snapshot: SessionSnapshot,
}

/// Session status response
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub challenges: Vec<ChallengeType>,
    pub snapshot: SessionSnapshot,
    pub result: Option<LivenessResult>,
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions_active: usize,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, err: &LivenessError) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            code: err.code().to_string(),
            message: err.to_string(),
        }),
    )
}

fn not_found(id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            code: "NOT_FOUND".to_string(),
            message: format!("no session {}", id),
        }),
    )
}

/// Create the API router
pub fn create_router(default_config: LivenessConfig) -> Router {
    let state = Arc::new(AppState {
        sessions: RwLock::new(HashMap::new()),
        default_config,
    });

    Router::new()
        .route("/health", get(health))
        .route("/session/new", post(create_session))
        .route("/session/:id", get(get_session).delete(delete_session))
        .route("/session/:id/frame", post(submit_frame))
        .route("/session/:id/cancel", post(cancel_session))
        .route("/ws/:id", get(websocket_handler))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sessions = state.sessions.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        sessions_active: sessions.len(),
    })
}

/// Create new session
async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSessionRequest>,
) -> Result<Json<NewSessionResponse>, ApiError> {
    let config = req.config.unwrap_or_else(|| state.default_config.clone());
    let created = match req.seed {
        Some(seed) => LivenessSession::with_seed(config, seed),
        None => LivenessSession::new(config),
    };
    let mut session = created.map_err(|err| api_error(StatusCode::UNPROCESSABLE_ENTITY, &err))?;
    session.start();

    let session_id = generate_session_id();
    let challenges = session.challenges().to_vec();
    let (tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

    info!(%session_id, ?challenges, "session created");
    let mut sessions = state.sessions.write().await;
    sessions.insert(
        session_id.clone(),
        ApiSession {
            id: session_id.clone(),
            session,
            last_frame_ms: 0,
            update_tx: tx,
        },
    );

    Ok(Json(NewSessionResponse {
        websocket_url: format!("/ws/{}", session_id),
        session_id,
        challenges,
    }))
}

/// Get session status
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let sessions = state.sessions.read().await;
    let entry = sessions.get(&id).ok_or_else(|| not_found(&id))?;

    Ok(Json(SessionStatusResponse {
        session_id: entry.id.clone(),
        challenges: entry.session.challenges().to_vec(),
        snapshot: entry.session.snapshot(),
        result: entry.session.result().cloned(),
    }))
}

/// Remove a session; its websocket streams close
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let mut sessions = state.sessions.write().await;
    let entry = sessions.remove(&id).ok_or_else(|| not_found(&id))?;
    info!(session_id = %id, remaining = sessions.len(), "session removed");

    Ok(Json(SessionStatusResponse {
        session_id: entry.id,
        challenges: entry.session.challenges().to_vec(),
        snapshot: entry.session.snapshot(),
        result: entry.session.result().cloned(),
    }))
}

/// Feed one frame to the session
async fn submit_frame(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<FrameRequest>,
) -> Result<Json<EventsResponse>, ApiError> {
    let mut sessions = state.sessions.write().await;
    let entry = sessions.get_mut(&id).ok_or_else(|| not_found(&id))?;

    entry.last_frame_ms = req.timestamp_ms;
    let events = match req.error {
        Some(detail) => entry.session.record_failure(detail, req.timestamp_ms),
        None => {
            let geometry = FrameGeometry::new(req.image_width, req.image_height);
            entry.session.process(&req.faces, geometry, req.timestamp_ms)
        }
    };
    debug!(session_id = %id, events = events.len(), "frame processed");
    entry.publish(&events);

    Ok(Json(EventsResponse {
        events,
        snapshot: entry.session.snapshot(),
    }))
}

/// Cancel a session
async fn cancel_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EventsResponse>, ApiError> {
    let mut sessions = state.sessions.write().await;
    let entry = sessions.get_mut(&id).ok_or_else(|| not_found(&id))?;

    let events = entry.session.cancel();
    entry.publish(&events);
    info!(session_id = %id, "session cancelled");

    Ok(Json(EventsResponse {
        events,
        snapshot: entry.session.snapshot(),
    }))
}

/// WebSocket handler for live events
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state.sessions.read().await;
    let entry = sessions.get(&id).ok_or_else(|| not_found(&id))?;
    let rx = entry.update_tx.subscribe();
    drop(sessions);

    Ok(ws.on_upgrade(move |socket| handle_websocket(socket, rx)))
}

/// Forward session events until either side goes away
async fn handle_websocket(socket: WebSocket, mut rx: broadcast::Receiver<StampedEvent>) {
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(err) => {
                            warn!(%err, "event serialization failed");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket subscriber lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

/// Generate session ID
fn generate_session_id() -> String {
    format!("session_{:016x}", rand::random::<u64>())
}

/// Run the API server
pub async fn run_server(addr: &str, default_config: LivenessConfig) -> Result<(), LivenessError> {
    let router = create_router(default_config);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "liveguard API listening");
    info!("  POST /session/new        - Create session");
    info!("  POST /session/:id/frame  - Submit frame measurements");
    info!("  GET  /session/:id        - Get snapshot");
    info!("  POST /session/:id/cancel - Cancel session");
    info!("  DELETE /session/:id      - Remove session");
    info!("  WS   /ws/:id             - Live events");
    info!("  GET  /health             - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}
