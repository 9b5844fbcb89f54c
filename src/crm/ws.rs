use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use fera_common::{LeadStatus, ScoredLead, Task, User};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::api::{ApiError, SharedState};
use super::auth::{Session, SessionEvent, SessionStore};

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── WebSocket message types ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    LeadCreated {
        lead: ScoredLead,
    },
    LeadUpdated {
        lead: ScoredLead,
    },
    LeadMoved {
        lead_id: String,
        from_status: Option<LeadStatus>,
        to_status: LeadStatus,
    },
    ActivityAdded {
        lead: ScoredLead,
    },
    LeadsDeleted {
        lead_ids: Vec<String>,
    },
    TaskCreated {
        task: Task,
    },
    TaskUpdated {
        task: Task,
    },
    TaskDeleted {
        task_id: String,
    },
    MemberRemoved {
        member_id: String,
    },
    ProfileUpdated {
        user: User,
    },
}

/// A serialized event plus its audience. `account_id: None` reaches every
/// connected account (roster changes are shared).
#[derive(Debug, Clone)]
pub struct WsEnvelope {
    pub account_id: Option<String>,
    pub payload: String,
}

impl WsEnvelope {
    fn is_for(&self, account_id: &str) -> bool {
        self.account_id.as_deref().is_none_or(|a| a == account_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

// ── WebSocket handler ────────────────────────────────────────────────

/// Browsers cannot set headers on the upgrade request, so the bearer token
/// travels in the query string. The socket lives only as long as its token.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    Query(params): Query<WsParams>,
) -> Result<impl IntoResponse, ApiError> {
    // Subscribe before resolving so a logout in between is still seen.
    let sessions = state.auth.subscribe();
    let session = state.auth.resolve(&params.token)?;
    let rx = state.ws_tx.subscribe();
    let auth = state.auth.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, session, auth, rx, sessions)))
}

async fn handle_socket(
    socket: WebSocket,
    session: Session,
    auth: Arc<SessionStore>,
    rx: broadcast::Receiver<WsEnvelope>,
    sessions: broadcast::Receiver<SessionEvent>,
) {
    debug!(account_id = %session.account_id, "WebSocket connected");
    let (sender, receiver) = socket.split();
    run_socket_loop(sender, receiver, rx, sessions, &auth, &session).await;
    debug!(account_id = %session.account_id, "WebSocket closed");
}

/// True when `event` ends the session identified by `token`.
fn ends_socket(event: &SessionEvent, token: &str) -> bool {
    matches!(event, SessionEvent::SignedOut { token: ended, .. } if ended == token)
}

/// Decide from one session-channel read whether the socket must close.
/// After a lag the token is looked up again, since its sign-out may have
/// been among the skipped events.
fn session_ended(
    result: Result<SessionEvent, broadcast::error::RecvError>,
    auth: &SessionStore,
    token: &str,
) -> bool {
    match result {
        Ok(event) => ends_socket(&event, token),
        Err(broadcast::error::RecvError::Lagged(_)) => auth.resolve(token).is_err(),
        Err(broadcast::error::RecvError::Closed) => true,
    }
}

/// Core WebSocket loop with ping/pong keepalive.
///
/// Combines broadcast forwarding, client message receiving, and periodic
/// ping/pong health checking into a single select loop. Only events meant
/// for the session's account are forwarded. If no Pong is received within
/// [`PONG_TIMEOUT`] after a Ping is sent, the connection is considered
/// dead and the loop exits. The loop also exits once the session's token
/// signs out or is revoked.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<WsEnvelope>,
    mut sessions: broadcast::Receiver<SessionEvent>,
    auth: &SessionStore,
    session: &Session,
) {
    let account_id = session.account_id.as_str();
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // The first tick completes immediately; consume it so the first real
    // ping fires after PING_INTERVAL has elapsed.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    break;
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            event = sessions.recv() => {
                if session_ended(event, auth, &session.token) {
                    debug!(account_id = %account_id, "Session ended; closing WebSocket");
                    break;
                }
            }

            result = rx.recv() => {
                match result {
                    Ok(envelope) if envelope.is_for(account_id) => {
                        if sender.send(Message::Text(envelope.payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(account_id = %account_id, skipped, "WebSocket receiver lagged");
                        continue;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    // Best-effort close frame
    let _ = sender.send(Message::Close(None)).await;
}

// ── Broadcast helpers ────────────────────────────────────────────────

/// Serialize and broadcast an event to one account's sockets.
/// Returns silently even if no clients are connected.
pub fn broadcast_to(tx: &broadcast::Sender<WsEnvelope>, account_id: &str, msg: &WsMessage) {
    send(tx, Some(account_id.to_string()), msg);
}

/// Serialize and broadcast an event to every connected account.
pub fn broadcast_all(tx: &broadcast::Sender<WsEnvelope>, msg: &WsMessage) {
    send(tx, None, msg);
}

fn send(tx: &broadcast::Sender<WsEnvelope>, account_id: Option<String>, msg: &WsMessage) {
    match serde_json::to_string(msg) {
        Ok(payload) => {
            let _ = tx.send(WsEnvelope {
                account_id,
                payload,
            });
        }
        Err(e) => warn!(error = %e, "Failed to serialize WsMessage"),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
