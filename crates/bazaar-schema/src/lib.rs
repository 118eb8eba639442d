//! Shared data model for the bazaar marketplace client.
//!
//! Everything in this crate is pure: no network, no filesystem. The pipeline
//! crate (`bazaar-core`) consumes these types when it talks to the remote
//! catalog and to local installation directories.

pub mod locale;
pub mod package;
pub mod reference;
pub mod stage;
pub mod version;

// Re-exports
pub use locale::{Locale, LocalizedText};
pub use package::{
    AnyDescriptor, Descriptor, Funding, Icon, Package, PackageKind, Plugin, Template, Theme,
    Widget, preferred_readme,
};
pub use reference::{ReferenceError, RepoRef};
pub use stage::{
    StageIndex, StagePackage, StageRepo, UsageEntry, UsageIndex, format_updated, human_size,
};
pub use version::{DEFAULT_MIN_APP_VERSION, compare_versions, is_incompatible, is_newer};

/// Canonical hosting provider. Only packages served from here can be checked
/// for updates.
pub const GITHUB_HOST: &str = "https://github.com";
