use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use puzzle_core::{
    plan_rounds, AnswerRecord, GuessVerdict, Phase, Session, SessionError, SessionEvent,
    SessionStatus,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{now_millis, AppState};

const SWEEP_INTERVAL: Duration = Duration::from_secs(15);

pub(crate) struct SessionRecord {
    game_id: String,
    session: Session,
    ticker: Option<JoinHandle<()>>,
    /// Last player action or state change.
    touched: Instant,
}

impl SessionRecord {
    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    // Playing sessions are never expired; their ticker drives them to completion.
    fn expired(&self, now: Instant, grace: Duration, idle_ttl: Duration) -> bool {
        let age = now.saturating_duration_since(self.touched);
        match self.session.status() {
            SessionStatus::AwaitingStart => age >= idle_ttl,
            SessionStatus::Completed => age >= grace,
            SessionStatus::Playing => false,
        }
    }
}

/// What survives a finished playthrough.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub game_id: String,
    pub score: u32,
    pub total_rounds: usize,
    pub answers: Vec<AnswerRecord>,
    pub completed_at: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub id: String,
    pub game_id: String,
    pub status: SessionStatus,
    pub round: usize,
    pub total_rounds: usize,
    pub phase: Phase,
    pub time_left: u32,
    pub score: u32,
    pub image_url: String,
    /// Withheld until the round reaches its answer phase.
    pub answer: Option<String>,
    pub answers: Vec<AnswerRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    State(SessionView),
    Event(SessionEvent),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Guess { guess: String },
}

#[derive(Debug, thiserror::Error)]
enum SessionActionError {
    #[error("session not found")]
    SessionNotFound,
    #[error("{0}")]
    Session(#[from] SessionError),
}

impl SessionActionError {
    fn status(&self) -> StatusCode {
        match self {
            SessionActionError::SessionNotFound => StatusCode::NOT_FOUND,
            SessionActionError::Session(_) => StatusCode::CONFLICT,
        }
    }
}

fn to_view(session_id: &str, record: &SessionRecord) -> SessionView {
    let session = &record.session;
    let revealed = session.phase() == Phase::Answer || session.status() == SessionStatus::Completed;
    SessionView {
        id: session_id.to_string(),
        game_id: record.game_id.clone(),
        status: session.status(),
        round: session.round_index(),
        total_rounds: session.total_rounds(),
        phase: session.phase(),
        time_left: session.remaining(),
        score: session.score(),
        image_url: session.current_image_url().to_string(),
        answer: revealed.then(|| session.current_round().answer.clone()),
        answers: session.answers().to_vec(),
    }
}

fn completion_summary(
    session_id: &str,
    record: &SessionRecord,
    events: &[SessionEvent],
) -> Option<SessionSummary> {
    events.iter().find_map(|event| match event {
        SessionEvent::SessionCompleted { score, total } => Some(SessionSummary {
            session_id: session_id.to_string(),
            game_id: record.game_id.clone(),
            score: *score,
            total_rounds: *total,
            answers: record.session.answers().to_vec(),
            completed_at: now_millis(),
        }),
        _ => None,
    })
}

// Called once the session lock is released.
async fn publish(
    state: &AppState,
    session_id: &str,
    view: &SessionView,
    events: Vec<SessionEvent>,
    summary: Option<SessionSummary>,
) {
    if let Some(tx) = state.channels.read().await.get(session_id) {
        for event in events {
            let _ = tx.send(ServerMessage::Event(event));
        }
        let _ = tx.send(ServerMessage::State(view.clone()));
    }
    if let Some(summary) = summary {
        state.log_session(summary).await;
    }
}

#[derive(Deserialize)]
pub(crate) struct SessionParams {
    seed: Option<u64>,
}

pub(crate) async fn create_session(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    Query(params): Query<SessionParams>,
) -> impl IntoResponse {
    let session = {
        let catalog = state.catalog.read().await;
        let Some(game) = catalog.games.get(&game_id) else {
            return (StatusCode::NOT_FOUND, "game not found").into_response();
        };
        let mut rng = params
            .seed
            .map(ChaCha8Rng::seed_from_u64)
            .unwrap_or_else(ChaCha8Rng::from_entropy);
        let rounds = match plan_rounds(game, &catalog.images, &mut rng) {
            Ok(rounds) => rounds,
            Err(err) => return (StatusCode::CONFLICT, err.to_string()).into_response(),
        };
        match Session::new(rounds, game.settings) {
            Ok(session) => session,
            Err(err) => return (StatusCode::CONFLICT, err.to_string()).into_response(),
        }
    };

    let session_id = Uuid::new_v4().to_string();
    let record = SessionRecord {
        game_id: game_id.clone(),
        session,
        ticker: None,
        touched: Instant::now(),
    };
    let view = to_view(&session_id, &record);
    state
        .sessions
        .write()
        .await
        .insert(session_id.clone(), record);
    let (tx, _) = broadcast::channel(32);
    state.channels.write().await.insert(session_id.clone(), tx);

    info!(session = %session_id, game = %game_id, "created session");
    (StatusCode::CREATED, Json(view)).into_response()
}

pub(crate) async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let sessions = state.sessions.read().await;
    let Some(record) = sessions.get(&session_id) else {
        return (StatusCode::NOT_FOUND, "session not found").into_response();
    };
    (StatusCode::OK, Json(to_view(&session_id, record))).into_response()
}

pub(crate) async fn start_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let mut sessions = state.sessions.write().await;
    let Some(record) = sessions.get_mut(&session_id) else {
        return (StatusCode::NOT_FOUND, "session not found").into_response();
    };
    let events = match record.session.start() {
        Ok(events) => events,
        Err(err) => return (StatusCode::CONFLICT, err.to_string()).into_response(),
    };
    record.touched = Instant::now();
    if record.session.status() == SessionStatus::Playing {
        record.ticker = Some(spawn_ticker(state.clone(), session_id.clone()));
    }
    let view = to_view(&session_id, record);
    let summary = completion_summary(&session_id, record, &events);
    drop(sessions);

    publish(&state, &session_id, &view, events, summary).await;
    info!(session = %session_id, "session started");
    (StatusCode::OK, Json(view)).into_response()
}

#[derive(Deserialize)]
pub(crate) struct GuessRequest {
    guess: String,
}

#[derive(Serialize)]
struct GuessResponse {
    #[serde(flatten)]
    verdict: GuessVerdict,
    session: SessionView,
}

pub(crate) async fn submit_guess(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<GuessRequest>,
) -> impl IntoResponse {
    match apply_guess(&state, &session_id, &payload.guess).await {
        Ok((verdict, session)) => {
            (StatusCode::OK, Json(GuessResponse { verdict, session })).into_response()
        }
        Err(err) => (err.status(), err.to_string()).into_response(),
    }
}

async fn apply_guess(
    state: &AppState,
    session_id: &str,
    guess: &str,
) -> Result<(GuessVerdict, SessionView), SessionActionError> {
    let mut sessions = state.sessions.write().await;
    let record = sessions
        .get_mut(session_id)
        .ok_or(SessionActionError::SessionNotFound)?;

    let (verdict, events) = record.session.submit_guess(guess)?;
    record.touched = Instant::now();
    if record.session.status() != SessionStatus::Playing {
        record.stop_ticker();
    }
    let view = to_view(session_id, record);
    let summary = completion_summary(session_id, record, &events);
    drop(sessions);

    publish(state, session_id, &view, events, summary).await;
    debug!(session = %session_id, ?verdict, "guess judged");
    Ok((verdict, view))
}

pub(crate) async fn restart_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let mut sessions = state.sessions.write().await;
    let Some(record) = sessions.get_mut(&session_id) else {
        return (StatusCode::NOT_FOUND, "session not found").into_response();
    };
    record.stop_ticker();
    record.session.restart();
    record.touched = Instant::now();
    let view = to_view(&session_id, record);
    drop(sessions);

    publish(&state, &session_id, &view, Vec::new(), None).await;
    (StatusCode::OK, Json(view)).into_response()
}

pub(crate) async fn abandon_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    let Some(mut record) = state.sessions.write().await.remove(&session_id) else {
        return (StatusCode::NOT_FOUND, "session not found").into_response();
    };
    record.stop_ticker();
    // Dropping the sender ends every subscriber's stream.
    state.channels.write().await.remove(&session_id);

    info!(session = %session_id, "session abandoned");
    StatusCode::NO_CONTENT.into_response()
}

/// Evicts completed sessions past their grace period and sessions left
/// unstarted past the idle limit. Returns how many were dropped.
pub(crate) async fn sweep_sessions(state: &AppState, now: Instant) -> usize {
    let expired: Vec<String> = {
        let mut sessions = state.sessions.write().await;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, record)| {
                record.expired(now, state.session_grace, state.idle_session_ttl)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            if let Some(mut record) = sessions.remove(id) {
                record.stop_ticker();
            }
        }
        expired
    };
    if expired.is_empty() {
        return 0;
    }

    let mut channels = state.channels.write().await;
    for id in &expired {
        channels.remove(id);
    }
    info!(evicted = expired.len(), "swept expired sessions");
    expired.len()
}

pub fn spawn_session_sweeper(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            sweep_sessions(&state, Instant::now()).await;
        }
    })
}

fn spawn_ticker(state: AppState, session_id: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick resolves immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            if !tick_session(&state, &session_id).await {
                break;
            }
        }
        debug!(session = %session_id, "ticker stopped");
    })
}

/// Applies one clock tick; false once there is nothing left to tick.
async fn tick_session(state: &AppState, session_id: &str) -> bool {
    let mut sessions = state.sessions.write().await;
    let Some(record) = sessions.get_mut(session_id) else {
        return false;
    };
    let events = record.session.tick();
    let playing = record.session.status() == SessionStatus::Playing;
    if !playing {
        // This task is the ticker; detach rather than abort it.
        record.ticker = None;
        record.touched = Instant::now();
    }
    let view = to_view(session_id, record);
    let summary = completion_summary(session_id, record, &events);
    drop(sessions);

    publish(state, session_id, &view, events, summary).await;
    playing
}

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

async fn send_json(sender: &WsSender, msg: &ServerMessage) -> bool {
    let Ok(text) = serde_json::to_string(msg) else {
        return false;
    };
    sender.lock().await.send(Message::Text(text)).await.is_ok()
}

async fn handle_socket(stream: WebSocket, state: AppState, session_id: String) {
    let (sender, mut receiver) = stream.split();
    let sender: WsSender = Arc::new(Mutex::new(sender));

    let snapshot = {
        let sessions = state.sessions.read().await;
        sessions
            .get(&session_id)
            .map(|record| to_view(&session_id, record))
    };
    let rx = state
        .channels
        .read()
        .await
        .get(&session_id)
        .map(|tx| tx.subscribe());
    let (Some(snapshot), Some(mut rx)) = (snapshot, rx) else {
        let _ = sender
            .lock()
            .await
            .send(Message::Text("unknown session".into()))
            .await;
        return;
    };

    if !send_json(&sender, &ServerMessage::State(snapshot)).await {
        return;
    }

    // Forward broadcasts until the session goes away or the client hangs up.
    let sender_clone = sender.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if !send_json(&sender_clone, &msg).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "websocket subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let state_clone = state.clone();
    let sender_err = sender.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(Message::Text(text))) = receiver.next().await {
            if let Ok(ClientMessage::Guess { guess }) = serde_json::from_str(&text) {
                if let Err(e) = apply_guess(&state_clone, &session_id, &guess).await {
                    let _ = sender_err
                        .lock()
                        .await
                        .send(Message::Text(format!("error:{e}")))
                        .await;
                }
            }
        }
    });

    let _ = (&mut send_task).await;
    recv_task.abort();
}
