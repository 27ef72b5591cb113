//! Event socket lifecycle: handshake, listen loop, heartbeat, and the
//! reconnect supervisor.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tl_domain::error::{Error, Result};
use tl_domain::trace::TraceEvent;
use tl_protocol::{InboundFrame, NodeEvent, Ready};

use crate::node::Node;
use crate::player::Inbound;
use crate::reconnect::ReconnectBackoff;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Disconnected,
    Connecting,
    Connected,
    Listening,
    Reconnecting,
}

enum ListenOutcome {
    Lost(String),
    Shutdown,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handshake
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn header(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::Config(format!("invalid header value: {e}")))
}

/// Open the socket and wait for the node's `ready` frame.
///
/// On a reconnect with a resume key, the previous session is offered back
/// to the node (`Session-Id` on v4, `Resume-Key` on v3).
pub(crate) async fn open(node: &Node, reconnecting: bool) -> Result<(WsStream, Ready)> {
    node.set_socket_state(SocketState::Connecting);
    let cfg = node.config();
    let major = node.state().api_major();
    let url = format!("{}/v{major}/websocket", cfg.ws_uri());

    let failure = |message: String| Error::NodeConnectionFailure {
        node: node.identifier().to_owned(),
        message,
    };

    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| failure(e.to_string()))?;
    let headers = request.headers_mut();
    headers.insert("Authorization", header(&cfg.password)?);
    headers.insert("User-Id", header(&node.shared().user_id.to_string())?);
    headers.insert("Client-Name", header(&node.shared().client_name)?);

    if reconnecting {
        if let Some(ref key) = cfg.resume_key {
            if major >= 4 {
                if let Some(sid) = node.session_id() {
                    headers.insert("Session-Id", header(&sid)?);
                }
            } else {
                headers.insert("Resume-Key", header(key)?);
            }
        }
    }

    tracing::info!(node = %node.identifier(), url = %url, reconnecting, "connecting to node");
    let (mut ws, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| failure(e.to_string()))?;

    // ── Wait for ready ───────────────────────────────────────────────
    let ready = tokio::time::timeout(cfg.handshake_timeout(), async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Ok(InboundFrame::Ready(ready)) = serde_json::from_str(&text) {
                        return Ok(ready);
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => return Err(e.to_string()),
            }
        }
        Err("connection closed before ready".to_owned())
    })
    .await;

    match ready {
        Ok(Ok(ready)) => {
            tracing::info!(
                node = %node.identifier(),
                session_id = %ready.session_id,
                resumed = ready.resumed,
                "node ready"
            );
            Ok((ws, ready))
        }
        Ok(Err(message)) => Err(failure(message)),
        Err(_) => Err(failure("timed out waiting for ready".into())),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Supervisor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) fn spawn_supervisor(node: Node, ws: WsStream) -> JoinHandle<()> {
    tokio::spawn(supervise(node, ws))
}

/// listen -> connection lost -> reconnect, until shutdown or the reconnect
/// budget runs out.
async fn supervise(node: Node, mut ws: WsStream) {
    let shutdown = node.shutdown_token();
    let backoff = ReconnectBackoff::from(&node.config().reconnect);

    loop {
        match listen(&node, ws, &shutdown).await {
            ListenOutcome::Shutdown => {
                tracing::debug!(node = %node.identifier(), "socket closed on shutdown");
                return;
            }
            ListenOutcome::Lost(reason) => {
                tracing::warn!(node = %node.identifier(), reason = %reason, "connection lost");
                node.on_connection_lost(&reason).await;
            }
        }

        match reconnect(&node, &backoff, &shutdown).await {
            Some(next) => ws = next,
            None => return,
        }
    }
}

async fn reconnect(
    node: &Node,
    backoff: &ReconnectBackoff,
    shutdown: &CancellationToken,
) -> Option<WsStream> {
    let mut attempt: u32 = 0;
    loop {
        if shutdown.is_cancelled() {
            return None;
        }
        if backoff.should_give_up(attempt) {
            tracing::error!(
                node = %node.identifier(),
                attempts = attempt,
                "max reconnect attempts exhausted"
            );
            node.set_socket_state(SocketState::Disconnected);
            return None;
        }

        node.set_socket_state(SocketState::Reconnecting);
        let delay = backoff.delay_for_attempt(attempt);
        TraceEvent::ReconnectScheduled {
            node: node.identifier().to_owned(),
            attempt: attempt + 1,
            delay_ms: delay.as_millis() as u64,
        }
        .emit();

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.cancelled() => return None,
        }

        match open(node, true).await {
            Ok((ws, ready)) => {
                node.handle_ready(ready);
                return Some(ws);
            }
            Err(e) => {
                tracing::warn!(
                    node = %node.identifier(),
                    attempt = attempt + 1,
                    error = %e,
                    "reconnect failed"
                );
                node.set_socket_state(SocketState::Reconnecting);
            }
        }
        attempt += 1;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Listen loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn listen(node: &Node, ws: WsStream, shutdown: &CancellationToken) -> ListenOutcome {
    node.set_socket_state(SocketState::Listening);
    let (mut sink, mut stream) = ws.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(16);

    // Ping task: keep the connection warm.
    let ping_tx = outbound_tx.clone();
    let heartbeat = node.config().heartbeat();
    let ping_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(heartbeat);
        interval.tick().await;
        loop {
            interval.tick().await;
            if ping_tx.send(Message::Ping(Vec::new())).await.is_err() {
                break;
            }
        }
    });

    // Writer task: the only owner of the sink.
    let writer_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    let outcome = loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => handle_frame(node, &text),
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("closed by node ({} {})", f.code, f.reason))
                        .unwrap_or_else(|| "closed by node".to_owned());
                    break ListenOutcome::Lost(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break ListenOutcome::Lost(e.to_string()),
                None => break ListenOutcome::Lost("stream ended".to_owned()),
            },
            _ = shutdown.cancelled() => {
                let _ = outbound_tx.send(Message::Close(None)).await;
                break ListenOutcome::Shutdown;
            }
        }
    };

    ping_task.abort();
    drop(outbound_tx);
    match outcome {
        ListenOutcome::Shutdown => {
            let _ = tokio::time::timeout(Duration::from_secs(1), writer_task).await;
        }
        ListenOutcome::Lost(_) => writer_task.abort(),
    }
    outcome
}

fn drop_frame(node: &Node, op: &str, reason: &str) {
    tracing::warn!(node = %node.identifier(), op, reason, "dropping frame");
    TraceEvent::FrameDropped {
        node: node.identifier().to_owned(),
        op: op.to_owned(),
        reason: reason.to_owned(),
    }
    .emit();
}

/// Route one inbound frame.  Player-bound frames go to that player's inbox
/// so each guild sees its events in arrival order.
pub(crate) fn handle_frame(node: &Node, text: &str) {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            drop_frame(node, "unparsed", &e.to_string());
            return;
        }
    };

    match frame {
        InboundFrame::Ready(ready) => {
            tracing::debug!(node = %node.identifier(), session_id = %ready.session_id, "ignoring repeated ready");
        }
        InboundFrame::Stats(stats) => node.set_stats(stats),
        InboundFrame::PlayerUpdate(update) => match node.get_player(update.guild_id) {
            Some(player) => player.deliver(Inbound::State(update.state)),
            None => tracing::debug!(
                node = %node.identifier(),
                guild_id = update.guild_id,
                "player update for unknown guild"
            ),
        },
        InboundFrame::Event(NodeEvent::Unknown) => {
            drop_frame(node, "event", "unknown event type");
        }
        InboundFrame::Event(event) => {
            let Some(guild_id) = event.guild_id() else {
                return;
            };
            match node.get_player(guild_id) {
                Some(player) => player.deliver(Inbound::Event(event)),
                None => tracing::debug!(
                    node = %node.identifier(),
                    guild_id,
                    kind = event.kind(),
                    "event for unknown guild"
                ),
            }
        }
        InboundFrame::Unknown => drop_frame(node, "unknown", "unrecognised op"),
    }
}
