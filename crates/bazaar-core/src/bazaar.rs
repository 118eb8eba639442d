//! The marketplace client: catalog, installed packages, install/uninstall and
//! READMEs, backed by process-wide caches.

use std::sync::Arc;
use std::time::Duration;

use bazaar_schema::reference::strip_host;
use bazaar_schema::{
    AnyDescriptor, Descriptor, GITHUB_HOST, PackageKind, RepoRef, StageRepo, UsageIndex,
    format_updated, human_size, is_incompatible,
};
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::Reporter;
use crate::cache::{Clock, SystemClock, TtlCache};
use crate::config::BazaarConfig;
use crate::error::{BazaarError, Result};
use crate::io::download::{Downloader, raw_file_url};
use crate::io::install::{dir_size, install_package, uninstall_package};
use crate::metadata::scan_installed;
use crate::outdated::mark_outdated;
use crate::readme::{MarkdownRenderer, fetch_readme};
use crate::stage::{BazaarHashSource, StageIndexCache, UsageIndexCache, hash_source_for};

/// Catalog descriptors, keyed by `owner/repo@hash`.
pub const PACKAGE_TTL: Duration = Duration::from_secs(6 * 60 * 60);
pub const PACKAGE_SWEEP: Duration = Duration::from_secs(30 * 60);

/// Installed sizes, keyed by repository URL.
pub const INSTALL_SIZE_TTL: Duration = Duration::from_secs(48 * 60 * 60);
pub const INSTALL_SIZE_SWEEP: Duration = Duration::from_secs(6 * 60 * 60);

/// Descriptor downloads in flight while building a catalog.
const CATALOG_CONCURRENCY: usize = 8;

#[derive(Debug)]
pub struct Bazaar {
    config: Arc<BazaarConfig>,
    client: Client,
    stage: StageIndexCache,
    usage: UsageIndexCache,
    packages: TtlCache<String, AnyDescriptor>,
    install_sizes: TtlCache<String, u64>,
    downloader: Downloader,
}

impl Bazaar {
    /// A client using the system clock and the hash source `config` asks for.
    pub fn new(config: BazaarConfig, client: Client) -> Self {
        let hash_source = hash_source_for(&config);
        Self::with_parts(config, client, hash_source, Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: BazaarConfig,
        client: Client,
        hash_source: Arc<dyn BazaarHashSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            stage: StageIndexCache::new(
                client.clone(),
                config.clone(),
                hash_source,
                clock.clone(),
            ),
            usage: UsageIndexCache::new(client.clone(), config.clone(), clock.clone()),
            packages: TtlCache::new(PACKAGE_TTL, PACKAGE_SWEEP, clock.clone()),
            install_sizes: TtlCache::new(INSTALL_SIZE_TTL, INSTALL_SIZE_SWEEP, clock),
            downloader: Downloader::new(client.clone(), config.clone()),
            client,
            config,
        }
    }

    pub fn config(&self) -> &BazaarConfig {
        &self.config
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    pub fn stage_cache(&self) -> &StageIndexCache {
        &self.stage
    }

    pub fn package_cache(&self) -> &TtlCache<String, AnyDescriptor> {
        &self.packages
    }

    /// Whether a package declaring `min_app_version` is too new for the
    /// running app. Always false when no app version is configured.
    pub fn is_incompatible(&self, min_app_version: &str) -> bool {
        !self.config.app_version.is_empty()
            && is_incompatible(
                min_app_version,
                &self.config.app_version,
                self.config.strict_min_app_version,
            )
    }

    /// Every package of kind `D` in the marketplace, most recently updated
    /// first. Entries whose descriptor cannot be fetched are skipped.
    pub async fn catalog<D: Descriptor>(&self) -> Vec<D> {
        let Some(index) = self.stage.get(D::KIND).await else {
            return Vec::new();
        };
        let usage = self.usage.get().await;

        let mut packages: Vec<D> = futures::stream::iter(index.repos.iter())
            .map(|entry| self.catalog_entry::<D>(entry, &usage))
            .buffer_unordered(CATALOG_CONCURRENCY)
            .filter_map(|d| async move { d })
            .collect()
            .await;

        packages.sort_by(|a, b| b.package().updated.cmp(&a.package().updated));
        packages
    }

    async fn catalog_entry<D: Descriptor>(&self, entry: &StageRepo, usage: &UsageIndex) -> Option<D> {
        let reference = match entry.repo_ref() {
            Ok(r) => r,
            Err(e) => {
                warn!(kind = %D::KIND, error = %e, "skipping catalog entry");
                return None;
            }
        };
        let key = reference.package_key();

        let mut descriptor = match self.packages.get(&key).and_then(D::from_any) {
            Some(d) => {
                debug!(key = %key, "package cache hit");
                d
            }
            None => {
                let d = self.fetch_catalog_descriptor::<D>(entry, &reference).await?;
                self.packages.put(key, d.clone().into_any());
                d
            }
        };

        let pkg = descriptor.package_mut();
        pkg.downloads = usage.get(&pkg.name).map_or(0, |u| u.downloads);
        pkg.installed = !pkg.name.is_empty() && self.config.install_dir(D::KIND, &pkg.name).exists();
        Some(descriptor)
    }

    async fn fetch_catalog_descriptor<D: Descriptor>(
        &self,
        entry: &StageRepo,
        reference: &RepoRef,
    ) -> Option<D> {
        let file = reference.with_path(D::KIND.descriptor_file());
        let data = match self.downloader.download(&file, None, None).await {
            Ok(data) => data,
            Err(e) => {
                warn!(reference = %file, error = %e, "skipping catalog entry");
                return None;
            }
        };
        let mut descriptor: D = match serde_json::from_slice(&data) {
            Ok(d) => d,
            Err(e) => {
                warn!(reference = %file, error = %e, "skipping malformed catalog descriptor");
                return None;
            }
        };

        let host = &self.config.github_host;
        let pkg = descriptor.package_mut();
        pkg.url = pkg.url.trim_end_matches('/').to_string();
        pkg.repo_url = format!("{GITHUB_HOST}/{}", reference.slug());
        pkg.repo_hash = reference.hash.clone();
        pkg.preview_url = raw_file_url(host, reference, "preview.png");
        pkg.preview_url_thumb = pkg.preview_url.clone();
        pkg.icon_url = raw_file_url(host, reference, "icon.png");
        pkg.stars = entry.stars;
        pkg.open_issues = entry.open_issues;
        pkg.size = entry.size;
        pkg.h_size = human_size(entry.size);
        pkg.install_size = entry.install_size;
        pkg.h_install_size = human_size(entry.install_size);
        pkg.updated = entry.updated.clone();
        pkg.h_updated = format_updated(&entry.updated);
        pkg.localize(self.config.locale);
        pkg.incompatible = self.is_incompatible(&pkg.min_app_version);
        Some(descriptor)
    }

    /// Installed packages of kind `D`, with sizes and compatibility filled in.
    ///
    /// # Errors
    ///
    /// Fails only if the kind's root directory exists but cannot be listed.
    pub async fn installed<D: Descriptor>(&self) -> Result<Vec<D>> {
        let config = self.config.clone();
        let entries = tokio::task::spawn_blocking(move || scan_installed::<D>(&config))
            .await
            .map_err(|e| BazaarError::filesystem(format!("scan installed packages failed: {e}")))??;

        let mut installed = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut descriptor = entry.descriptor;
            let size_key = if descriptor.package().url.is_empty() {
                entry.path.display().to_string()
            } else {
                descriptor.package().url.clone()
            };

            let size = match self.install_sizes.get(&size_key) {
                Some(size) => size,
                None => {
                    let path = entry.path.clone();
                    let size = tokio::task::spawn_blocking(move || dir_size(&path))
                        .await
                        .unwrap_or_default();
                    self.install_sizes.put(size_key, size);
                    size
                }
            };

            let incompatible = self.is_incompatible(&descriptor.package().min_app_version);
            let pkg = descriptor.package_mut();
            pkg.install_size = size;
            pkg.h_install_size = human_size(size);
            pkg.incompatible = incompatible;
            installed.push(descriptor);
        }
        Ok(installed)
    }

    /// Installed packages of kind `D` that have a newer catalog release. Each
    /// carries the catalog commit hash to update to.
    pub async fn outdated<D: Descriptor>(&self) -> Result<Vec<D>> {
        let mut installed = self.installed::<D>().await?;
        if installed.is_empty() {
            return Ok(installed);
        }
        let catalog = self.catalog::<D>().await;
        mark_outdated(&mut installed, &catalog, &self.config.host_prefix());
        installed.retain(|d| d.package().outdated);
        Ok(installed)
    }

    /// Download the package `repo_url@repo_hash` and install it as
    /// `dir_name`, replacing any previous installation.
    ///
    /// # Errors
    ///
    /// Reference, download and filesystem failures, see [`BazaarError`].
    pub async fn install(
        &self,
        kind: PackageKind,
        repo_url: &str,
        repo_hash: &str,
        dir_name: &str,
        reporter: Option<&dyn Reporter>,
    ) -> Result<()> {
        check_dir_name(dir_name)?;
        let reference = RepoRef::parse(&format!("{}@{repo_hash}", strip_host(repo_url)))?;

        let data = self
            .downloader
            .download(&reference, reporter, self.config.system_id.as_deref())
            .await?;

        let install_dir = self.config.install_dir(kind, dir_name);
        install_package(data, install_dir, self.config.package_tmp_dir()).await?;

        self.packages.invalidate(&reference.package_key());
        self.install_sizes
            .invalidate(&format!("{GITHUB_HOST}/{}", reference.slug()));
        info!(kind = %kind, package = %dir_name, reference = %reference, "installed package");
        Ok(())
    }

    /// Remove the installed package `dir_name`. Removing a package that is
    /// not installed succeeds.
    ///
    /// # Errors
    ///
    /// `remove community package [<dir_name>] failed`.
    pub async fn uninstall(&self, kind: PackageKind, dir_name: &str) -> Result<()> {
        check_dir_name(dir_name)?;
        uninstall_package(self.config.install_dir(kind, dir_name)).await?;
        self.packages.flush();
        info!(kind = %kind, package = %dir_name, "uninstalled package");
        Ok(())
    }

    /// README of the catalog package `repo_url@repo_hash`, rendered.
    ///
    /// Empty if the staged index for `kind` was never loaded or does not list
    /// the package. Download failures are returned as the content.
    pub async fn readme(
        &self,
        kind: PackageKind,
        repo_url: &str,
        repo_hash: &str,
        renderer: &dyn MarkdownRenderer,
    ) -> String {
        let Some(index) = self.stage.cached(kind).await else {
            return String::new();
        };
        let url = format!("{}@{repo_hash}", strip_host(repo_url));
        let Some(entry) = index.find(&url) else {
            debug!(url = %url, "package not in stage index");
            return String::new();
        };
        fetch_readme(&self.downloader, repo_url, entry, self.config.locale, renderer).await
    }

    /// Drop expired cache entries now.
    pub fn sweep_caches(&self) {
        self.packages.sweep();
        self.install_sizes.sweep();
    }
}

/// Package directory names must stay inside their kind root.
fn check_dir_name(dir_name: &str) -> Result<()> {
    let bad = dir_name.is_empty()
        || dir_name == "."
        || dir_name == ".."
        || dir_name.contains(['/', '\\']);
    if bad {
        return Err(BazaarError::filesystem(format!(
            "invalid package name [{dir_name}]"
        )));
    }
    Ok(())
}
