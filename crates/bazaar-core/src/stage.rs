//! Staged catalog snapshots and download statistics, cached for an hour.
//!
//! Both caches prefer stale data over nothing: a failed refresh logs and
//! keeps serving what was fetched last.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bazaar_schema::{PackageKind, StageIndex, UsageIndex};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::cache::Clock;
use crate::config::BazaarConfig;
use crate::error::{BazaarError, Result};
use crate::io::download::DownloadError;

/// How long a refreshed index is served without asking the network again.
pub const INDEX_TTL: Duration = Duration::from_secs(60 * 60);

async fn get_json<T: DeserializeOwned>(client: &Client, url: &str, what: &str) -> Result<T> {
    let resp = client
        .get(url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await
        .map_err(|e| {
            error!(url, error = %e, "get {what} failed");
            DownloadError::Network
        })?;

    if resp.status() != StatusCode::OK {
        error!(url, status = %resp.status(), "get {what} failed");
        return Err(DownloadError::Network.into());
    }

    let body = resp.bytes().await.map_err(|e| {
        error!(url, error = %e, "read {what} failed");
        DownloadError::Network
    })?;
    serde_json::from_slice(&body).map_err(|e| {
        error!(url, error = %e, "parse {what} failed");
        BazaarError::parse(what, e)
    })
}

/// Source of the marketplace commit hash the staged indexes are pinned to.
#[async_trait]
pub trait BazaarHashSource: Send + Sync + fmt::Debug {
    async fn current_hash(&self, client: &Client) -> Result<String>;
}

/// Always the same hash.
#[derive(Debug, Clone)]
pub struct StaticHash(pub String);

#[async_trait]
impl BazaarHashSource for StaticHash {
    async fn current_hash(&self, _client: &Client) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Reads the `bazaar` field of a JSON document.
#[derive(Debug, Clone)]
pub struct RemoteHash {
    url: String,
}

#[derive(Deserialize)]
struct HashDocument {
    #[serde(default)]
    bazaar: String,
}

impl RemoteHash {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl BazaarHashSource for RemoteHash {
    async fn current_hash(&self, client: &Client) -> Result<String> {
        let doc: HashDocument = get_json(client, &self.url, "bazaar hash").await?;
        if doc.bazaar.trim().is_empty() {
            error!(url = %self.url, "bazaar hash document carries no hash");
            return Err(DownloadError::Network.into());
        }
        Ok(doc.bazaar)
    }
}

/// The hash source a config asks for: pinned if `bazaar_hash` is set,
/// otherwise looked up at [`BazaarConfig::resolved_hash_url`].
pub fn hash_source_for(config: &BazaarConfig) -> Arc<dyn BazaarHashSource> {
    match config.bazaar_hash.as_deref().filter(|h| !h.is_empty()) {
        Some(hash) => Arc::new(StaticHash(hash.to_string())),
        None => Arc::new(RemoteHash::new(config.resolved_hash_url())),
    }
}

#[derive(Default)]
struct StageState {
    refreshed_at: Option<Instant>,
    entries: HashMap<PackageKind, Arc<StageIndex>>,
}

/// Per-kind staged index cache.
///
/// One refresh timestamp is shared by all kinds; a kind is served from cache
/// only if that timestamp is younger than [`INDEX_TTL`] and the kind has an
/// entry. The lock is held across the refresh, so concurrent callers never
/// fetch twice.
pub struct StageIndexCache {
    client: Client,
    config: Arc<BazaarConfig>,
    hash_source: Arc<dyn BazaarHashSource>,
    clock: Arc<dyn Clock>,
    state: Mutex<StageState>,
}

impl StageIndexCache {
    pub fn new(
        client: Client,
        config: Arc<BazaarConfig>,
        hash_source: Arc<dyn BazaarHashSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            config,
            hash_source,
            clock,
            state: Mutex::new(StageState::default()),
        }
    }

    /// Staged index for `kind`, refreshing it when stale.
    ///
    /// Returns the previous index (or `None` if there never was one) when
    /// the refresh fails.
    pub async fn get(&self, kind: PackageKind) -> Option<Arc<StageIndex>> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        let fresh = state
            .refreshed_at
            .is_some_and(|t| now.duration_since(t) < INDEX_TTL);
        if fresh {
            if let Some(index) = state.entries.get(&kind) {
                debug!(kind = %kind, "stage index cache hit");
                return Some(index.clone());
            }
        }

        match self.fetch(kind).await {
            Ok(index) => {
                let index = Arc::new(index);
                state.entries.insert(kind, index.clone());
                state.refreshed_at = Some(now);
                Some(index)
            }
            Err(e) => {
                error!(kind = %kind, error = %e, "refresh stage index failed, serving previous");
                state.entries.get(&kind).cloned()
            }
        }
    }

    /// Whatever is cached for `kind`, without refreshing.
    pub async fn cached(&self, kind: PackageKind) -> Option<Arc<StageIndex>> {
        self.state.lock().await.entries.get(&kind).cloned()
    }

    async fn fetch(&self, kind: PackageKind) -> Result<StageIndex> {
        let hash = self.hash_source.current_hash(&self.client).await?;
        let url = format!(
            "{}/raw/{hash}/stage/{}.json",
            self.config.bazaar_repo.trim_end_matches('/'),
            kind.plural()
        );
        let index: StageIndex = get_json(&self.client, &url, "stage index").await?;
        debug!(kind = %kind, hash = %hash, repos = index.repos.len(), "refreshed stage index");
        Ok(index)
    }
}

impl fmt::Debug for StageIndexCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageIndexCache")
            .field("hash_source", &self.hash_source)
            .finish_non_exhaustive()
    }
}

struct UsageState {
    refreshed_at: Option<Instant>,
    index: Arc<UsageIndex>,
}

/// Package download counts from the stats server.
pub struct UsageIndexCache {
    client: Client,
    config: Arc<BazaarConfig>,
    clock: Arc<dyn Clock>,
    state: Mutex<UsageState>,
}

impl UsageIndexCache {
    pub fn new(client: Client, config: Arc<BazaarConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            config,
            clock,
            state: Mutex::new(UsageState {
                refreshed_at: None,
                index: Arc::new(UsageIndex::new()),
            }),
        }
    }

    /// The usage index, refreshed when older than [`INDEX_TTL`]. Empty until
    /// the first successful fetch.
    pub async fn get(&self) -> Arc<UsageIndex> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();

        if state
            .refreshed_at
            .is_some_and(|t| now.duration_since(t) < INDEX_TTL)
        {
            return state.index.clone();
        }

        let url = format!(
            "{}/bazaar/index.json",
            self.config.stat_server.trim_end_matches('/')
        );
        match get_json::<UsageIndex>(&self.client, &url, "bazaar usage index").await {
            Ok(index) => {
                state.index = Arc::new(index);
                state.refreshed_at = Some(now);
            }
            Err(e) => error!(error = %e, "refresh usage index failed, serving previous"),
        }
        state.index.clone()
    }

    /// Downloads recorded for the package `name`, zero if unknown.
    pub async fn downloads(&self, name: &str) -> u64 {
        self.get().await.get(name).map_or(0, |e| e.downloads)
    }
}

impl fmt::Debug for UsageIndexCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsageIndexCache").finish_non_exhaustive()
    }
}
