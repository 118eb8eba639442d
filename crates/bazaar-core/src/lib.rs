//! Marketplace client pipeline: catalog caching, release resolution,
//! downloads, installation and outdated detection.

pub mod bazaar;
pub mod cache;
pub mod config;
pub mod error;
pub mod io;
pub mod metadata;
pub mod outdated;
pub mod readme;
pub mod release;
pub mod reporter;
pub mod stage;

pub use bazaar::Bazaar;
pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use config::BazaarConfig;
pub use error::{BazaarError, Result};
pub use io::download::{DownloadError, Downloader};
pub use readme::{MarkdownRenderer, RawMarkdown};
pub use reporter::{ChannelReporter, NullReporter, Progress, Reporter};
pub use stage::{BazaarHashSource, RemoteHash, StageIndexCache, StaticHash, UsageIndexCache};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("bazaar-core/", env!("CARGO_PKG_VERSION"));
