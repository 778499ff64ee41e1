//! WebSocket upgrade handler: authenticates the session cookie and
//! bridges the socket into the realtime session machine.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::Response;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use coursehub_entity::session::AuthSession;
use coursehub_realtime::protocol::{SUBPROTOCOL, ServerFrame};
use coursehub_realtime::session::run_session;

use crate::cookies::session_cookie;
use crate::state::AppState;

/// GET /ws — WebSocket upgrade with the `cca1` subprotocol.
///
/// Authentication replies (`U`, `E :Database error`) are delivered as
/// text frames after the upgrade, so the cookie is captured here and
/// checked once the socket exists.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
) -> Response {
    let cookie = session_cookie(&headers);
    ws.protocols([SUBPROTOCOL])
        .on_upgrade(move |socket| handle_socket(state, cookie, socket))
}

/// Authenticate, then run the session over the established socket.
async fn handle_socket(state: AppState, cookie: Option<String>, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let auth = match authenticate(&state, cookie.as_deref()).await {
        Ok(auth) => auth,
        Err(frame) => {
            let _ = ws_tx.send(Message::Text(frame.to_string())).await;
            return;
        }
    };

    // The session loop writes frames into `outbound`; the writer task
    // owns the sink and drains the queue until every sender is gone.
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(state.engine.perf.senq);
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if ws_tx.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    // The reader task blocks on the socket and feeds the session loop;
    // a read error or close simply ends the channel.
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(1);
    let reader = tokio::spawn(async move {
        while let Some(message) = ws_rx.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if inbound_tx.send(text).await.is_err() {
                        return;
                    }
                }
                Ok(Message::Close(_)) | Err(_) => return,
                Ok(_) => {}
            }
        }
    });

    let userid = auth.userid.clone();
    info!(userid = %userid, "WebSocket connection established");

    match run_session(state.engine.clone(), auth.userid, outbound_tx, inbound_rx).await {
        Ok(()) => info!(userid = %userid, "session closed"),
        Err(e) => debug!(userid = %userid, reason = %e.message, "session closed"),
    }

    // The session has torn down and dropped its senders; let the writer
    // flush any farewell frame, then stop reading.
    let _ = writer.await;
    reader.abort();
}

/// Resolve the cookie to an unexpired session row, or the frame to
/// send before closing.
async fn authenticate(
    state: &AppState,
    cookie: Option<&str>,
) -> Result<AuthSession, ServerFrame> {
    let Some(cookie) = cookie else {
        return Err(ServerFrame::Unauthenticated);
    };

    match state.sessions.find_by_cookie(cookie).await {
        Ok(Some(session)) if !session.is_expired(Utc::now().timestamp()) => Ok(session),
        Ok(_) => Err(ServerFrame::Unauthenticated),
        Err(e) => {
            warn!(error = %e, "database error during WebSocket authentication");
            Err(ServerFrame::error("Database error"))
        }
    }
}
