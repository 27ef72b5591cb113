//! In-process mock audio node: REST routes plus the event socket, served
//! by axum on an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tl_client::{
    ClientConfig, NodeConfig, NodePool, ReconnectConfig, Track, VoiceGateway,
};
use tl_domain::{ChannelId, GuildId};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

// ── Recorded traffic ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub body: Value,
}

enum SocketCmd {
    Send(String),
    Close,
}

pub struct MockState {
    name: String,
    version: String,
    password: String,
    sessions: AtomicUsize,
    calls: Mutex<Vec<Call>>,
    patch_delay: Mutex<Duration>,
    sockets: Mutex<Vec<mpsc::UnboundedSender<SocketCmd>>>,
    ws_headers: Mutex<Vec<HeaderMap>>,
}

pub struct MockNode {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockNode {
    pub async fn start(name: &str) -> Self {
        Self::start_with_version(name, "4.0.8").await
    }

    pub async fn start_with_version(name: &str, version: &str) -> Self {
        let state = Arc::new(MockState {
            name: name.to_owned(),
            version: version.to_owned(),
            password: "youshallnotpass".to_owned(),
            sessions: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            patch_delay: Mutex::new(Duration::ZERO),
            sockets: Mutex::new(Vec::new()),
            ws_headers: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/version", get(self::version))
            .route("/v4/websocket", get(websocket))
            .route("/v4/loadtracks", get(load_tracks))
            .route("/v4/decodetrack", get(decode_track))
            .route("/v4/sessions/:sid", patch(record))
            .route("/v4/sessions/:sid/players/:gid", patch(record).delete(record))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    /// Node config pointing at this mock with fast reconnects.
    pub fn config(&self, identifier: &str) -> NodeConfig {
        let mut cfg = NodeConfig::new(identifier);
        cfg.host = self.addr.ip().to_string();
        cfg.port = self.addr.port();
        cfg.handshake_timeout_ms = 2_000;
        cfg.request_timeout_ms = 2_000;
        cfg.reconnect = ReconnectConfig {
            initial_delay_ms: 50,
            max_delay_ms: 200,
            backoff_factor: 2.0,
            max_attempts: 0,
        };
        cfg
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().clone()
    }

    pub fn calls_to(&self, method: Method, path_fragment: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method && c.path.contains(path_fragment))
            .collect()
    }

    pub fn set_patch_delay(&self, delay: Duration) {
        *self.state.patch_delay.lock() = delay;
    }

    pub fn session_count(&self) -> usize {
        self.state.sessions.load(Ordering::SeqCst)
    }

    pub fn ws_headers(&self) -> Vec<HeaderMap> {
        self.state.ws_headers.lock().clone()
    }

    /// Push a raw frame to every open socket.
    pub fn push(&self, frame: Value) {
        let text = frame.to_string();
        self.state
            .sockets
            .lock()
            .retain(|tx| tx.send(SocketCmd::Send(text.clone())).is_ok());
    }

    pub fn push_text(&self, text: &str) {
        self.state
            .sockets
            .lock()
            .retain(|tx| tx.send(SocketCmd::Send(text.to_owned())).is_ok());
    }

    /// Close every open socket from the node side.
    pub fn close_sockets(&self) {
        for tx in self.state.sockets.lock().drain(..) {
            let _ = tx.send(SocketCmd::Close);
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────────

async fn version(State(st): State<Arc<MockState>>) -> String {
    st.version.clone()
}

async fn load_tracks(Query(q): Query<std::collections::HashMap<String, String>>) -> Json<Value> {
    let identifier = q.get("identifier").cloned().unwrap_or_default();
    Json(json!({
        "loadType": "search",
        "data": [track_json(&format!("enc:{identifier}"), 180_000)]
    }))
}

async fn decode_track(Query(q): Query<std::collections::HashMap<String, String>>) -> Json<Value> {
    let encoded = q.get("encodedTrack").cloned().unwrap_or_default();
    Json(track_json(&encoded, 180_000))
}

async fn record(
    State(st): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    st.calls.lock().push(Call {
        method: method.clone(),
        path: uri.path().to_owned(),
        query: uri.query().map(str::to_owned),
        body,
    });

    if method == Method::DELETE {
        return StatusCode::NO_CONTENT.into_response();
    }
    let delay = *st.patch_delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    Json(json!({ "resuming": true, "timeout": 60 })).into_response()
}

async fn websocket(
    State(st): State<Arc<MockState>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == st.password);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    st.ws_headers.lock().push(headers);
    ws.on_upgrade(move |socket| serve_socket(st, socket))
}

async fn serve_socket(st: Arc<MockState>, mut socket: WebSocket) {
    let n = st.sessions.fetch_add(1, Ordering::SeqCst) + 1;
    let ready = json!({
        "op": "ready",
        "resumed": false,
        "sessionId": format!("{}-{n}", st.name),
    });
    if socket.send(Message::Text(ready.to_string())).await.is_err() {
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    st.sockets.lock().push(tx);

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(SocketCmd::Send(text)) => {
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(SocketCmd::Close) | None => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

// ── Fixtures ────────────────────────────────────────────────────────────

pub fn track_json(encoded: &str, length: u64) -> Value {
    json!({
        "encoded": encoded,
        "info": {
            "identifier": encoded,
            "isSeekable": true,
            "author": "mock",
            "length": length,
            "isStream": false,
            "position": 0,
            "title": format!("title of {encoded}"),
            "uri": null,
            "sourceName": "http"
        },
        "pluginInfo": {}
    })
}

pub fn track(encoded: &str, length: u64) -> Track {
    serde_json::from_value(track_json(encoded, length)).unwrap()
}

/// A voice gateway that records every op-4 request.
#[derive(Default)]
pub struct RecordingVoice {
    pub updates: Mutex<Vec<(GuildId, Option<ChannelId>, bool, bool)>>,
}

#[async_trait::async_trait]
impl VoiceGateway for RecordingVoice {
    async fn update_voice_state(
        &self,
        guild_id: GuildId,
        channel_id: Option<ChannelId>,
        self_deaf: bool,
        self_mute: bool,
    ) -> tl_client::Result<()> {
        self.updates
            .lock()
            .push((guild_id, channel_id, self_deaf, self_mute));
        Ok(())
    }
}

pub const BOT_USER: u64 = 1_000;

pub fn pool(voice: Arc<RecordingVoice>) -> NodePool {
    let config = ClientConfig {
        user_id: BOT_USER,
        ..Default::default()
    };
    NodePool::new(config, voice).unwrap()
}

/// Poll `cond` every 10ms until it holds or `timeout` elapses.
pub async fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
