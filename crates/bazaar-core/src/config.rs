//! Client configuration: directories, locale, app version and server URLs.
//!
//! Resolution order: built-in defaults, then an optional `bazaar.toml`, then
//! `BAZAAR_*` environment variables.

use std::path::{Path, PathBuf};

use bazaar_schema::{GITHUB_HOST, Locale, PackageKind};
use dirs::home_dir;
use serde::{Deserialize, Serialize};

use crate::error::{BazaarError, Result};

/// Returns the client home directory, or None if the user's home cannot be resolved.
pub fn try_bazaar_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("BAZAAR_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".bazaar"))
}

/// Returns the client home directory (`~/.bazaar`), or `./.bazaar` when no
/// home directory exists.
pub fn bazaar_home() -> PathBuf {
    try_bazaar_home().unwrap_or_else(|| PathBuf::from(".bazaar"))
}

/// Default config file: ~/.bazaar/bazaar.toml
pub fn config_path() -> PathBuf {
    bazaar_home().join("bazaar.toml")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BazaarConfig {
    /// Root holding `plugins/`, `widgets/`, `templates/`.
    pub data_dir: PathBuf,
    /// Override for the themes root (defaults to `<data_dir>/themes`).
    pub themes_dir: Option<PathBuf>,
    /// Override for the icons root (defaults to `<data_dir>/icons`).
    pub icons_dir: Option<PathBuf>,
    /// Scratch space for archives; must be writable.
    pub temp_dir: PathBuf,
    pub locale: Locale,
    /// Running app version, used for compatibility checks. Empty disables them.
    pub app_version: String,
    pub github_host: String,
    pub github_api: String,
    /// Marketplace repository hosting the staged indexes.
    pub bazaar_repo: String,
    pub stat_server: String,
    pub cloud_server: String,
    /// URL of the document carrying the current marketplace commit hash in
    /// its `bazaar` field. Defaults to the cloud version endpoint.
    pub hash_url: Option<String>,
    /// Pin the marketplace commit hash instead of looking it up.
    pub bazaar_hash: Option<String>,
    /// Anonymized installation id for download telemetry.
    pub system_id: Option<String>,
    /// Treat packages without `minAppVersion` as requiring the default minimum.
    pub strict_min_app_version: bool,
    /// Upper bound on tag pages scanned per release lookup.
    pub max_tag_pages: u32,
}

impl Default for BazaarConfig {
    fn default() -> Self {
        let home = bazaar_home();
        Self {
            data_dir: home.join("data"),
            themes_dir: None,
            icons_dir: None,
            temp_dir: home.join("temp"),
            locale: Locale::Default,
            app_version: String::new(),
            github_host: GITHUB_HOST.to_string(),
            github_api: "https://api.github.com".to_string(),
            bazaar_repo: format!("{GITHUB_HOST}/siyuan-note/bazaar"),
            stat_server: "https://bazaar.b3logfile.com".to_string(),
            cloud_server: "https://liuyun.io".to_string(),
            hash_url: None,
            bazaar_hash: None,
            system_id: None,
            strict_min_app_version: false,
            max_tag_pages: 64,
        }
    }
}

impl BazaarConfig {
    /// Load configuration from `path` (or the default config file if it
    /// exists), then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Fails if an explicitly given file cannot be read, or if any config
    /// file is not valid TOML.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML config file; missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BazaarError::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| BazaarError::Config(format!("{}: {e}", path.display())))
    }

    /// Apply `BAZAAR_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("BAZAAR_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("BAZAAR_TEMP_DIR") {
            self.temp_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("BAZAAR_LOCALE") {
            self.locale = v.parse().unwrap_or_default();
        }
        if let Ok(v) = std::env::var("BAZAAR_APP_VERSION") {
            self.app_version = v;
        }
        if let Ok(v) = std::env::var("BAZAAR_HASH") {
            self.bazaar_hash = Some(v);
        }
        if let Ok(v) = std::env::var("BAZAAR_SYSTEM_ID") {
            self.system_id = Some(v);
        }
        if let Ok(v) = std::env::var("BAZAAR_GITHUB_HOST") {
            self.github_host = v;
        }
        if let Ok(v) = std::env::var("BAZAAR_GITHUB_API") {
            self.github_api = v;
        }
        if let Ok(v) = std::env::var("BAZAAR_STRICT_MIN_APP_VERSION") {
            self.strict_min_app_version = v == "1" || v.eq_ignore_ascii_case("true");
        }
    }

    /// A config rooted entirely inside `root`, pointing every remote at
    /// `server`. Used by tests and sandboxes.
    pub fn sandboxed(root: &Path, server: &str) -> Self {
        let server = server.trim_end_matches('/').to_string();
        Self {
            data_dir: root.join("data"),
            temp_dir: root.join("temp"),
            github_host: server.clone(),
            github_api: server.clone(),
            bazaar_repo: format!("{server}/siyuan-note/bazaar"),
            stat_server: server.clone(),
            cloud_server: server,
            ..Self::default()
        }
    }

    /// Directory holding installed packages of `kind`.
    pub fn kind_root(&self, kind: PackageKind) -> PathBuf {
        match kind {
            PackageKind::Theme => self
                .themes_dir
                .clone()
                .unwrap_or_else(|| self.data_dir.join(kind.plural())),
            PackageKind::Icon => self
                .icons_dir
                .clone()
                .unwrap_or_else(|| self.data_dir.join(kind.plural())),
            _ => self.data_dir.join(kind.plural()),
        }
    }

    /// Installation directory of one package.
    pub fn install_dir(&self, kind: PackageKind, name: &str) -> PathBuf {
        self.kind_root(kind).join(name)
    }

    /// Scratch directory for downloaded archives.
    pub fn package_tmp_dir(&self) -> PathBuf {
        self.temp_dir.join("bazaar").join("package")
    }

    /// Canonical host prefix (`https://github.com/`) for outdated checks.
    ///
    /// Descriptors always name the canonical host, whichever `github_host`
    /// downloads go through.
    pub fn host_prefix(&self) -> String {
        format!("{GITHUB_HOST}/")
    }

    /// Where the current marketplace commit hash is published.
    pub fn resolved_hash_url(&self) -> String {
        self.hash_url.clone().unwrap_or_else(|| {
            format!(
                "{}/apis/siyuan/version?ver={}",
                self.cloud_server.trim_end_matches('/'),
                self.app_version
            )
        })
    }
}
