//! Package and repository-file downloads.
//!
//! Requests are coalesced per repository reference: while a fetch for a
//! reference is in flight, further callers for the same reference wait for it
//! and receive its outcome instead of starting a second transfer. The registry
//! entry is dropped once the fetch completes, so a later call fetches afresh.

use std::sync::Arc;

use bazaar_schema::{ReferenceError, RepoRef};
use bytes::Bytes;
use dashmap::DashMap;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, error};

use crate::Reporter;
use crate::config::BazaarConfig;
use crate::release;

/// Download failures. Messages are safe to show to end users; transport
/// detail is logged, never carried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    #[error(transparent)]
    InvalidReference(#[from] ReferenceError),

    #[error("get bazaar package failed, please check your network")]
    Network,

    #[error("get bazaar package failed, please check package's repository [{repo}]")]
    ReleaseNotFound { repo: String },

    #[error("get bazaar package failed, no tag of [{repo}] points at [{hash}] within {pages} pages")]
    TagPagesExhausted {
        repo: String,
        hash: String,
        pages: u32,
    },
}

type Outcome = Result<Bytes, DownloadError>;

/// `<host>/<owner>/<repo>/raw/<hash>/<path>`
pub fn raw_file_url(host: &str, reference: &RepoRef, path: &str) -> String {
    format!(
        "{}/{}/{}/raw/{}/{}",
        host.trim_end_matches('/'),
        reference.owner,
        reference.repo,
        reference.hash,
        path.trim_start_matches('/')
    )
}

fn report_outcome(reporter: &dyn Reporter, key: &str, outcome: &Outcome) {
    match outcome {
        Ok(data) => reporter.done(key, &format!("{} bytes", data.len())),
        Err(e) => reporter.failed(key, &e.to_string()),
    }
}

/// Fetches package archives and repository files.
#[derive(Debug)]
pub struct Downloader {
    client: Client,
    config: Arc<BazaarConfig>,
    in_flight: DashMap<String, Arc<OnceCell<Outcome>>>,
}

impl Downloader {
    pub fn new(client: Client, config: Arc<BazaarConfig>) -> Self {
        Self {
            client,
            config,
            in_flight: DashMap::new(),
        }
    }

    /// Download the archive (no path) or the repository file (with path)
    /// addressed by `reference`.
    ///
    /// Progress goes to `reporter` when one is given. A successful transfer
    /// reports a download count for `system_id`, in the background.
    ///
    /// When the reference is already being fetched, the caller joins that
    /// fetch: its `reporter` receives only the final outcome, and its
    /// `system_id` is not counted.
    ///
    /// # Errors
    ///
    /// See [`DownloadError`]. Concurrent callers for the same reference get
    /// the same outcome.
    pub async fn download(
        &self,
        reference: &RepoRef,
        reporter: Option<&dyn Reporter>,
        system_id: Option<&str>,
    ) -> Result<Bytes, DownloadError> {
        let key = reference.to_string();
        let cell = self.in_flight.entry(key.clone()).or_default().clone();

        let mut fetched_here = false;
        let outcome = cell
            .get_or_init(|| {
                fetched_here = true;
                self.fetch(reference, reporter, system_id)
            })
            .await
            .clone();

        self.in_flight.remove_if(&key, |_, v| Arc::ptr_eq(v, &cell));

        if !fetched_here {
            if let Some(r) = reporter {
                report_outcome(r, &reference.package_key(), &outcome);
            }
        }
        outcome
    }

    /// Like [`download`](Self::download), for a reference in string form
    /// (`owner/repo@hash[/path]`, optionally behind the canonical host).
    pub async fn download_str(
        &self,
        reference: &str,
        reporter: Option<&dyn Reporter>,
        system_id: Option<&str>,
    ) -> Result<Bytes, DownloadError> {
        let reference = RepoRef::parse(reference).map_err(|e| {
            error!(error = %e, "invalid repository reference");
            e
        })?;
        self.download(&reference, reporter, system_id).await
    }

    /// Number of references with a fetch currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    async fn fetch(
        &self,
        reference: &RepoRef,
        reporter: Option<&dyn Reporter>,
        system_id: Option<&str>,
    ) -> Outcome {
        let url = match &reference.path {
            Some(path) => raw_file_url(&self.config.github_host, reference, path),
            None => release::resolve_download_url(&self.client, &self.config, reference).await?,
        };

        let progress_key = reference.package_key();
        let result = self.fetch_url(&url, &progress_key, reporter).await;
        if let Some(r) = reporter {
            report_outcome(r, &progress_key, &result);
        }
        let data = result?;

        if let Some(id) = system_id.filter(|id| !id.is_empty()) {
            if !reference.is_documentation() {
                self.report_download(reference, id);
            }
        }

        Ok(data)
    }

    async fn fetch_url(
        &self,
        url: &str,
        progress_key: &str,
        reporter: Option<&dyn Reporter>,
    ) -> Outcome {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await
            .map_err(|e| {
                error!(url, error = %e, "get bazaar package failed");
                DownloadError::Network
            })?;

        if response.status() != StatusCode::OK {
            error!(url, status = %response.status(), "get bazaar package failed");
            return Err(DownloadError::Network);
        }

        let total = response.content_length();
        let mut buf = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                error!(url, error = %e, "read bazaar package body failed");
                DownloadError::Network
            })?;
            buf.extend_from_slice(&chunk);
            if let Some(r) = reporter {
                r.downloading(progress_key, buf.len() as u64, total);
            }
        }

        Ok(Bytes::from(buf))
    }

    /// Fire-and-forget download counter.
    fn report_download(&self, reference: &RepoRef, system_id: &str) {
        let client = self.client.clone();
        let url = format!(
            "{}/apis/siyuan/bazaar/addBazaarPackageDownloadCount",
            self.config.cloud_server.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "systemID": system_id,
            "repo": reference.slug(),
        });

        tokio::spawn(async move {
            match client
                .post(&url)
                .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => debug!(url = %url, status = %resp.status(), "reported package download"),
                Err(e) => debug!(url = %url, error = %e, "report package download failed"),
            }
        });
    }
}
