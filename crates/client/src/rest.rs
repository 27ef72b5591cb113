//! REST control plane for a single node.
//!
//! `RestClient` wraps a `reqwest::Client` and reads the owning node's
//! shared [`NodeState`] (availability, negotiated version, session id) so
//! every call is routed to the right versioned path and session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use parking_lot::RwLock;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tl_domain::config::NodeConfig;
use tl_domain::error::{Error, Result};
use tl_domain::trace::TraceEvent;
use tl_domain::track::{Playlist, RequestContext, Track};
use tl_domain::version::Version;
use tl_domain::{GuildId, UserId};
use tl_protocol::rest::{
    ErrorResponse, FreeAddressRequest, NodeInfo, PlayerInfo, RawLoadResult, RoutePlannerStatus,
    SearchResult, Stats, UpdatePlayerRequest, UpdateSessionRequest,
};
use tl_protocol::{LoadResult, API_VERSION};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Shared node state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// State written by the event socket and read by the REST client.
#[derive(Debug)]
pub struct NodeState {
    identifier: String,
    available: AtomicBool,
    session_id: RwLock<Option<String>>,
    version: RwLock<Option<Version>>,
}

impl NodeState {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            available: AtomicBool::new(false),
            session_id: RwLock::new(None),
            version: RwLock::new(None),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    pub(crate) fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    pub(crate) fn set_session_id(&self, id: impl Into<String>) {
        *self.session_id.write() = Some(id.into());
    }

    pub fn version(&self) -> Option<Version> {
        *self.version.read()
    }

    pub(crate) fn set_version(&self, version: Version) {
        *self.version.write() = Some(version);
    }

    /// Major version used for `/vN` paths.
    pub fn api_major(&self) -> u32 {
        self.version().map(|v| v.major).unwrap_or(API_VERSION)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / response plumbing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Prefix the path with `/vN`.
    pub include_version: bool,
    /// Appended as the last path segment.
    pub guild_id: Option<GuildId>,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Send even when the node is not marked available.
    pub ignore_availability: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            include_version: true,
            guild_id: None,
            query: Vec::new(),
            body: None,
            ignore_availability: false,
        }
    }
}

impl RequestOptions {
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn guild(mut self, guild_id: GuildId) -> Self {
        self.guild_id = Some(guild_id);
        self
    }

    pub fn json<T: serde::Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RestBody {
    Empty,
    Text(String),
    Json(serde_json::Value),
}

impl RestBody {
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Self::Json(v) => Ok(serde_json::from_value(v)?),
            Self::Text(t) => Ok(serde_json::from_str(&t)?),
            Self::Empty => Err(Error::Http("expected a JSON body, got none".into())),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Text(t) => t,
            Self::Json(v) => v.to_string(),
            Self::Empty => String::new(),
        }
    }
}

/// `base[/vN]/path[/guild][?query]`
pub fn build_uri(
    base: &str,
    api_major: Option<u32>,
    path: &str,
    guild_id: Option<GuildId>,
    query: &[(String, String)],
) -> Result<Url> {
    let mut raw = base.trim_end_matches('/').to_owned();
    if let Some(major) = api_major {
        raw.push_str(&format!("/v{major}"));
    }
    let path = path.trim_matches('/');
    if !path.is_empty() {
        raw.push('/');
        raw.push_str(path);
    }
    if let Some(guild) = guild_id {
        raw.push_str(&format!("/{guild}"));
    }

    let mut url = Url::parse(&raw).map_err(|e| Error::Config(format!("invalid URI {raw}: {e}")))?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in query {
            pairs.append_pair(k, v);
        }
    }
    Ok(url)
}

pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Search helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SearchType {
    #[default]
    YouTube,
    YouTubeMusic,
    SoundCloud,
    Spotify,
    AppleMusic,
    Deezer,
    YandexMusic,
    /// Any other source plugin prefix, without the trailing colon.
    Custom(String),
}

impl SearchType {
    pub fn prefix(&self) -> &str {
        match self {
            Self::YouTube => "ytsearch",
            Self::YouTubeMusic => "ytmsearch",
            Self::SoundCloud => "scsearch",
            Self::Spotify => "spsearch",
            Self::AppleMusic => "amsearch",
            Self::Deezer => "dzsearch",
            Self::YandexMusic => "ymsearch",
            Self::Custom(p) => p,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub search_type: SearchType,
    pub context: RequestContext,
}

/// LavaSearch result kinds for [`RestClient::search_extended`].
pub const DEFAULT_SEARCH_TYPES: &[&str] = &["track", "playlist", "album", "artist"];

fn url_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^https?://(?:www\.)?.+").ok())
        .as_ref()
}

/// Leave absolute `http(s)://` URLs alone; everything else, colons
/// included, gets the search scheme prefix.
pub fn prepare_query(query: &str, search_type: &SearchType) -> String {
    let query = query.trim();
    if url_re().is_some_and(|re| re.is_match(query)) {
        query.to_owned()
    } else {
        format!("{}:{query}", search_type.prefix())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    password: String,
    user_id: UserId,
    client_name: String,
    state: std::sync::Arc<NodeState>,
}

impl RestClient {
    pub fn new(
        cfg: &NodeConfig,
        user_id: UserId,
        client_name: &str,
        state: std::sync::Arc<NodeState>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(cfg.request_timeout())
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.http_uri(),
            password: cfg.password.clone(),
            user_id,
            client_name: client_name.to_owned(),
            state,
        })
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    // ── request helpers ──────────────────────────────────────────────

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        rb.header("Authorization", &self.password)
            .header("User-Id", self.user_id.to_string())
            .header("Client-Name", &self.client_name)
    }

    fn url(&self, path: &str, opts: &RequestOptions) -> Result<Url> {
        let major = opts.include_version.then(|| self.state.api_major());
        build_uri(&self.base_url, major, path, opts.guild_id, &opts.query)
    }

    fn session_path(&self, suffix: &str) -> Result<String> {
        let sid = self
            .state
            .session_id()
            .ok_or_else(|| Error::NodeUnavailable(self.state.identifier.clone()))?;
        Ok(format!("sessions/{sid}{suffix}"))
    }

    /// Issue one request and decode the body by content type.
    ///
    /// * Non-2xx responses become [`Error::RestRequestFailed`] carrying the
    ///   node's error message.
    /// * `204` and any `DELETE` yield [`RestBody::Empty`].
    /// * Emits a `TraceEvent::RestCall` for every response.
    pub async fn send(&self, method: Method, path: &str, opts: RequestOptions) -> Result<RestBody> {
        if !opts.ignore_availability && !self.state.is_available() {
            return Err(Error::NodeUnavailable(self.state.identifier.clone()));
        }

        let url = self.url(path, &opts)?;
        let mut rb = self.decorate(self.http.request(method.clone(), url));
        if let Some(ref body) = opts.body {
            rb = rb.json(body);
        }

        let start = Instant::now();
        let resp = rb.send().await.map_err(from_reqwest)?;
        let status = resp.status();

        TraceEvent::RestCall {
            node: self.state.identifier.clone(),
            method: method.to_string(),
            path: path.to_owned(),
            status: status.as_u16(),
            duration_ms: start.elapsed().as_millis() as u64,
        }
        .emit();

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .ok()
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or(text);
            tracing::debug!(
                node = %self.state.identifier,
                status = status.as_u16(),
                message = %message,
                "REST request failed"
            );
            return Err(Error::RestRequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        if status == StatusCode::NO_CONTENT || method == Method::DELETE {
            return Ok(RestBody::Empty);
        }

        let is_text = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/plain"));
        let text = resp.text().await.map_err(from_reqwest)?;

        if is_text {
            Ok(RestBody::Text(text))
        } else if text.trim().is_empty() {
            Ok(RestBody::Empty)
        } else {
            Ok(RestBody::Json(serde_json::from_str(&text)?))
        }
    }

    // ── node info ────────────────────────────────────────────────────

    /// `GET /version`, unversioned and sent regardless of availability.
    pub async fn version(&self) -> Result<String> {
        let opts = RequestOptions {
            include_version: false,
            ignore_availability: true,
            ..Default::default()
        };
        let body = self.send(Method::GET, "version", opts).await?;
        Ok(body.into_text().trim().to_owned())
    }

    pub async fn info(&self) -> Result<NodeInfo> {
        self.send(Method::GET, "info", RequestOptions::default())
            .await?
            .into_json()
    }

    pub async fn stats(&self) -> Result<Stats> {
        self.send(Method::GET, "stats", RequestOptions::default())
            .await?
            .into_json()
    }

    // ── tracks ───────────────────────────────────────────────────────

    /// `GET /loadtracks` for an identifier, URL, or prefixed search.
    pub async fn load_tracks(&self, identifier: &str) -> Result<LoadResult> {
        let opts = RequestOptions::default().query("identifier", identifier);
        let raw: RawLoadResult = self
            .send(Method::GET, "loadtracks", opts)
            .await?
            .into_json()?;
        raw.into_result()
            .map_err(|e| Error::TrackLoadFailed(e.to_string()))
    }

    pub async fn search(&self, query: &str, opts: &SearchOptions) -> Result<LoadResult> {
        let identifier = prepare_query(query, &opts.search_type);
        let result = self.load_tracks(&identifier).await?;
        Ok(attach_context(result, &opts.context))
    }

    /// LavaSearch `GET /loadsearch`.  `types` defaults to
    /// [`DEFAULT_SEARCH_TYPES`] when empty.
    pub async fn search_extended(
        &self,
        query: &str,
        types: &[&str],
        opts: &SearchOptions,
    ) -> Result<SearchResult> {
        let types = if types.is_empty() {
            DEFAULT_SEARCH_TYPES
        } else {
            types
        };
        let req = RequestOptions::default()
            .query("query", prepare_query(query, &opts.search_type))
            .query("types", types.join(","));
        let body = self.send(Method::GET, "loadsearch", req).await?;
        let mut result: SearchResult = match body {
            RestBody::Empty => SearchResult::default(),
            other => other.into_json()?,
        };

        let ctx = &opts.context;
        if !ctx.is_empty() {
            result.tracks = result.tracks.iter().map(|t| t.with_context(ctx)).collect();
            for list in [&mut result.albums, &mut result.artists, &mut result.playlists] {
                *list = list.iter().map(|p| p.with_context(ctx)).collect();
            }
        }
        Ok(result)
    }

    /// Recommendations seeded by the tracks' source identifiers (LavaSrc
    /// `sprec:`).
    pub async fn recommendations(
        &self,
        seed_tracks: &[Track],
        ctx: &RequestContext,
    ) -> Result<LoadResult> {
        let ids: Vec<&str> = seed_tracks
            .iter()
            .map(|t| t.info.identifier.as_str())
            .collect();
        let opts = SearchOptions {
            search_type: SearchType::Custom("sprec".into()),
            context: ctx.clone(),
        };
        self.search(&format!("seed_tracks={}", ids.join(",")), &opts)
            .await
    }

    pub async fn decode_track(&self, encoded: &str) -> Result<Track> {
        let opts = RequestOptions::default().query("encodedTrack", encoded);
        self.send(Method::GET, "decodetrack", opts)
            .await?
            .into_json()
    }

    pub async fn decode_tracks(&self, encoded: &[String]) -> Result<Vec<Track>> {
        let opts = RequestOptions::default().json(&encoded)?;
        self.send(Method::POST, "decodetracks", opts)
            .await?
            .into_json()
    }

    // ── players ──────────────────────────────────────────────────────

    pub async fn get_players(&self) -> Result<Vec<PlayerInfo>> {
        let path = self.session_path("/players")?;
        self.send(Method::GET, &path, RequestOptions::default())
            .await?
            .into_json()
    }

    pub async fn get_player(&self, guild_id: GuildId) -> Result<PlayerInfo> {
        let path = self.session_path("/players")?;
        self.send(Method::GET, &path, RequestOptions::default().guild(guild_id))
            .await?
            .into_json()
    }

    pub async fn update_player(
        &self,
        guild_id: GuildId,
        req: &UpdatePlayerRequest,
        no_replace: bool,
    ) -> Result<()> {
        let path = self.session_path("/players")?;
        let opts = RequestOptions::default()
            .guild(guild_id)
            .query("noReplace", no_replace.to_string())
            .json(req)?;
        self.send(Method::PATCH, &path, opts).await?;
        Ok(())
    }

    pub async fn destroy_player(&self, guild_id: GuildId) -> Result<()> {
        let path = self.session_path("/players")?;
        self.send(Method::DELETE, &path, RequestOptions::default().guild(guild_id))
            .await?;
        Ok(())
    }

    pub async fn update_session(&self, req: &UpdateSessionRequest) -> Result<()> {
        let path = self.session_path("")?;
        let opts = RequestOptions::default().json(req)?;
        self.send(Method::PATCH, &path, opts).await?;
        Ok(())
    }

    // ── route planner ────────────────────────────────────────────────

    /// `None` when the node has no route planner configured.
    pub async fn route_planner_status(&self) -> Result<Option<RoutePlannerStatus>> {
        match self
            .send(Method::GET, "routeplanner/status", RequestOptions::default())
            .await?
        {
            RestBody::Empty => Ok(None),
            body => body.into_json().map(Some),
        }
    }

    pub async fn free_address(&self, address: &str) -> Result<()> {
        let opts = RequestOptions::default().json(&FreeAddressRequest {
            address: address.to_owned(),
        })?;
        self.send(Method::POST, "routeplanner/free/address", opts)
            .await?;
        Ok(())
    }

    pub async fn free_all_addresses(&self) -> Result<()> {
        self.send(
            Method::POST,
            "routeplanner/free/all",
            RequestOptions::default(),
        )
        .await?;
        Ok(())
    }
}

fn attach_context(result: LoadResult, ctx: &RequestContext) -> LoadResult {
    if ctx.is_empty() {
        return result;
    }
    match result {
        LoadResult::Track(t) => LoadResult::Track(t.with_context(ctx)),
        LoadResult::Playlist(p) => LoadResult::Playlist(Playlist::with_context(&p, ctx)),
        LoadResult::Search(ts) => {
            LoadResult::Search(ts.iter().map(|t| t.with_context(ctx)).collect())
        }
        LoadResult::Empty => LoadResult::Empty,
    }
}
