use serde::Serialize;

/// Structured trace events emitted across all tunelink crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    RestCall {
        node: String,
        method: String,
        path: String,
        status: u16,
        duration_ms: u64,
    },
    NodeConnected {
        node: String,
        session_id: String,
        resumed: bool,
        version: String,
    },
    NodeDisconnected {
        node: String,
        players: usize,
        reason: String,
    },
    ReconnectScheduled {
        node: String,
        attempt: u32,
        delay_ms: u64,
    },
    PlayersDestroyed {
        node: String,
        count: usize,
    },
    PlayerMigrated {
        guild_id: u64,
        from_node: String,
        to_node: String,
        position_ms: u64,
    },
    FrameDropped {
        node: String,
        op: String,
        reason: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "tl_event");
    }
}
