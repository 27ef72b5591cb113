/// Shared error type used across all tunelink crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("websocket: {0}")]
    WebSocket(String),

    #[error("config: {0}")]
    Config(String),

    // ── Nodes / pool ─────────────────────────────────────────────────
    #[error("node {0} is not available")]
    NodeUnavailable(String),

    #[error("node {node}: connection failed: {message}")]
    NodeConnectionFailure { node: String, message: String },

    #[error("REST request failed with status {status}: {message}")]
    RestRequestFailed { status: u16, message: String },

    #[error("incompatible node version {found}, at least {required} is required")]
    IncompatibleVersion { found: String, required: String },

    #[error("no nodes are available")]
    NoNodesAvailable,

    #[error("a node with identifier {0:?} already exists")]
    DuplicateIdentifier(String),

    #[error("no available node with identifier {0:?}")]
    UnknownIdentifier(String),

    // ── Player ───────────────────────────────────────────────────────
    #[error("seek position {position} is outside 0..={length}")]
    InvalidSeekPosition { position: i64, length: u64 },

    #[error("volume {0} is outside 0..=500")]
    InvalidVolume(u16),

    #[error("voice: {0}")]
    Voice(String),

    // ── Queue ────────────────────────────────────────────────────────
    #[error("queue is full ({max_size} items)")]
    QueueFull { max_size: usize },

    #[error("queue is empty")]
    QueueEmpty,

    #[error("queue is looping a single track")]
    QueueLoopingTrack,

    #[error("track is not in the queue")]
    QueueItemNotFound,

    // ── Tracks / filters ─────────────────────────────────────────────
    #[error("track load failed: {0}")]
    TrackLoadFailed(String),

    #[error("no filter with tag {0:?}")]
    FilterTagInvalid(String),

    #[error("filter tag {0:?} is already in use")]
    FilterTagInUse(String),

    #[error("a {0} filter is already applied")]
    FilterKindInUse(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
