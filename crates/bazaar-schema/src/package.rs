//! Package descriptors for the five marketplace package kinds.
//!
//! All kinds share the [`Package`] shape; each kind gets its own type so the
//! file a descriptor was read from (`theme.json`, `plugin.json`, ...) stays
//! visible in signatures. [`Descriptor`] abstracts over them and
//! [`AnyDescriptor`] is the closed sum used where kinds are mixed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::locale::{Locale, LocalizedText};

/// The five families of marketplace packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    /// Appearance themes.
    Theme,
    /// Icon sets.
    Icon,
    /// Plugins.
    Plugin,
    /// Embeddable widgets.
    Widget,
    /// Document templates.
    Template,
}

impl PackageKind {
    /// Every kind, in catalog order.
    pub const ALL: [Self; 5] = [
        Self::Theme,
        Self::Icon,
        Self::Plugin,
        Self::Widget,
        Self::Template,
    ];

    /// Singular name, also the descriptor file stem (`plugin` -> `plugin.json`).
    pub fn name(self) -> &'static str {
        match self {
            Self::Theme => "theme",
            Self::Icon => "icon",
            Self::Plugin => "plugin",
            Self::Widget => "widget",
            Self::Template => "template",
        }
    }

    /// Plural name, used for staged index files and local directories.
    pub fn plural(self) -> &'static str {
        match self {
            Self::Theme => "themes",
            Self::Icon => "icons",
            Self::Plugin => "plugins",
            Self::Widget => "widgets",
            Self::Template => "templates",
        }
    }

    /// Descriptor file name inside a package directory.
    pub fn descriptor_file(self) -> String {
        format!("{}.json", self.name())
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PackageKind {
    type Err = String;

    /// Accepts singular or plural names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.name() == lower || k.plural() == lower)
            .ok_or_else(|| format!("Unknown package kind: '{s}'"))
    }
}

/// Sponsorship links declared by a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Funding {
    /// Open Collective slug.
    #[serde(default)]
    pub open_collective: String,
    /// Patreon user name.
    #[serde(default)]
    pub patreon: String,
    /// GitHub Sponsors user name.
    #[serde(default)]
    pub github: String,
    /// Arbitrary funding URLs.
    #[serde(default)]
    pub custom: Vec<String>,
}

impl Funding {
    /// The single funding URL surfaced to users, or an empty string.
    pub fn preferred_url(&self) -> String {
        if !self.open_collective.is_empty() {
            return format!("https://opencollective.com/{}", self.open_collective);
        }
        if !self.patreon.is_empty() {
            return format!("https://www.patreon.com/{}", self.patreon);
        }
        if !self.github.is_empty() {
            return format!("https://github.com/sponsors/{}", self.github);
        }
        self.custom.first().cloned().unwrap_or_default()
    }
}

/// Shared descriptor shape for every package kind.
///
/// The first block of fields comes from the descriptor file written by the
/// package author. The rest are filled in by the client from the catalog and
/// from the local installation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Package {
    /// Author handle.
    pub author: String,
    /// Source repository URL (no trailing slash once loaded).
    pub url: String,
    /// Semantic version without a `v` prefix.
    pub version: String,
    /// Minimum app version this package supports; empty if undeclared.
    pub min_app_version: String,
    /// Supported backends (platforms).
    pub backends: Vec<String>,
    /// Supported frontends.
    pub frontends: Vec<String>,
    /// Localized display name.
    pub display_name: Option<LocalizedText>,
    /// Localized description.
    pub description: Option<LocalizedText>,
    /// Localized README file paths.
    pub readme: Option<LocalizedText>,
    /// Sponsorship links.
    pub funding: Option<Funding>,
    /// Search keywords.
    pub keywords: Vec<String>,

    /// Resolved funding URL.
    pub preferred_funding: String,
    /// Display name for the active locale.
    pub preferred_name: String,
    /// Description for the active locale.
    pub preferred_desc: String,
    /// README path for the active locale.
    pub preferred_readme: String,

    /// Package name (directory name).
    pub name: String,
    /// `owner/repo` or full repository URL in the catalog.
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    /// Commit hash of the catalog snapshot of this package.
    pub repo_hash: String,
    /// Preview image URL.
    #[serde(rename = "previewURL")]
    pub preview_url: String,
    /// Preview thumbnail URL.
    #[serde(rename = "previewURLThumb")]
    pub preview_url_thumb: String,
    /// Icon URL.
    #[serde(rename = "iconURL")]
    pub icon_url: String,

    /// Installed locally.
    pub installed: bool,
    /// A newer catalog version exists.
    pub outdated: bool,
    /// Currently active (themes/icons).
    pub current: bool,
    /// Last update timestamp as reported by the catalog.
    pub updated: String,
    /// Repository stars.
    pub stars: u64,
    /// Open issues.
    pub open_issues: u64,
    /// Package archive size in bytes.
    pub size: u64,
    /// Human-readable archive size.
    pub h_size: String,
    /// Installed size in bytes.
    pub install_size: u64,
    /// Human-readable installed size.
    pub h_install_size: String,
    /// Human-readable install date.
    pub h_install_date: String,
    /// Human-readable update date.
    pub h_updated: String,
    /// Download count.
    pub downloads: u64,

    /// Requires a newer app version than the running one.
    pub incompatible: bool,
}

impl Package {
    /// Display name for `locale`; falls back to `name` when no localized
    /// record exists.
    pub fn preferred_name_for(&self, locale: Locale) -> String {
        match &self.display_name {
            Some(dn) => dn.resolve(locale).to_string(),
            None => self.name.clone(),
        }
    }

    /// Description for `locale`, empty when undeclared.
    pub fn preferred_desc_for(&self, locale: Locale) -> String {
        self.description
            .as_ref()
            .map(|d| d.resolve(locale).to_string())
            .unwrap_or_default()
    }

    /// README path for `locale`, `README.md` when undeclared.
    pub fn preferred_readme_for(&self, locale: Locale) -> String {
        preferred_readme(self.readme.as_ref(), locale)
    }

    /// Populate the `preferred*` fields for `locale`.
    pub fn localize(&mut self, locale: Locale) {
        self.preferred_name = self.preferred_name_for(locale);
        self.preferred_desc = self.preferred_desc_for(locale);
        self.preferred_readme = self.preferred_readme_for(locale);
        self.preferred_funding = self
            .funding
            .as_ref()
            .map(Funding::preferred_url)
            .unwrap_or_default();
    }

    /// The `(url, name, author)` join key. Version is deliberately excluded.
    pub fn identity(&self) -> (&str, &str, &str) {
        (&self.url, &self.name, &self.author)
    }
}

/// README path for `locale` from an optional localization record.
/// `README.md` when the record is absent or resolves to a blank path.
pub fn preferred_readme(readme: Option<&LocalizedText>, locale: Locale) -> String {
    readme
        .map(|r| r.resolve(locale).trim())
        .filter(|path| !path.is_empty())
        .unwrap_or("README.md")
        .to_string()
}

/// Uniform access to the five descriptor families.
pub trait Descriptor: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Kind this descriptor type belongs to.
    const KIND: PackageKind;

    /// Shared package fields.
    fn package(&self) -> &Package;

    /// Shared package fields, mutably.
    fn package_mut(&mut self) -> &mut Package;

    /// Erase into the sum type.
    fn into_any(self) -> AnyDescriptor;

    /// Recover from the sum type; `None` if `any` holds another kind.
    fn from_any(any: AnyDescriptor) -> Option<Self>;
}

/// An appearance theme (`theme.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    /// Shared package fields.
    #[serde(flatten)]
    pub package: Package,
    /// Supported appearance modes (`light`, `dark`).
    #[serde(default)]
    pub modes: Vec<String>,
}

macro_rules! plain_descriptor {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            /// Shared package fields.
            #[serde(flatten)]
            pub package: Package,
        }

        impl Descriptor for $name {
            const KIND: PackageKind = $kind;

            fn package(&self) -> &Package {
                &self.package
            }

            fn package_mut(&mut self) -> &mut Package {
                &mut self.package
            }

            fn into_any(self) -> AnyDescriptor {
                AnyDescriptor::$name(self)
            }

            fn from_any(any: AnyDescriptor) -> Option<Self> {
                match any {
                    AnyDescriptor::$name(d) => Some(d),
                    _ => None,
                }
            }
        }
    };
}

plain_descriptor!(
    /// An icon set (`icon.json`).
    Icon,
    PackageKind::Icon
);
plain_descriptor!(
    /// A plugin (`plugin.json`).
    Plugin,
    PackageKind::Plugin
);
plain_descriptor!(
    /// A widget (`widget.json`).
    Widget,
    PackageKind::Widget
);
plain_descriptor!(
    /// A document template (`template.json`).
    Template,
    PackageKind::Template
);

impl Descriptor for Theme {
    const KIND: PackageKind = PackageKind::Theme;

    fn package(&self) -> &Package {
        &self.package
    }

    fn package_mut(&mut self) -> &mut Package {
        &mut self.package
    }

    fn into_any(self) -> AnyDescriptor {
        AnyDescriptor::Theme(self)
    }

    fn from_any(any: AnyDescriptor) -> Option<Self> {
        match any {
            AnyDescriptor::Theme(t) => Some(t),
            _ => None,
        }
    }
}

/// Any descriptor, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyDescriptor {
    /// A theme.
    Theme(Theme),
    /// An icon set.
    Icon(Icon),
    /// A plugin.
    Plugin(Plugin),
    /// A widget.
    Widget(Widget),
    /// A template.
    Template(Template),
}

impl AnyDescriptor {
    /// Kind of the wrapped descriptor.
    pub fn kind(&self) -> PackageKind {
        match self {
            Self::Theme(_) => PackageKind::Theme,
            Self::Icon(_) => PackageKind::Icon,
            Self::Plugin(_) => PackageKind::Plugin,
            Self::Widget(_) => PackageKind::Widget,
            Self::Template(_) => PackageKind::Template,
        }
    }

    /// Shared package fields of the wrapped descriptor.
    pub fn package(&self) -> &Package {
        match self {
            Self::Theme(d) => &d.package,
            Self::Icon(d) => &d.package,
            Self::Plugin(d) => &d.package,
            Self::Widget(d) => &d.package,
            Self::Template(d) => &d.package,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLUGIN_JSON: &str = r#"{
        "name": "sample-plugin",
        "author": "alice",
        "url": "https://github.com/alice/sample-plugin",
        "version": "0.3.1",
        "minAppVersion": "2.10.0",
        "backends": ["all"],
        "frontends": ["desktop"],
        "displayName": {"default": "Sample", "zh_CN": "示例"},
        "description": {"default": "A sample", "en_US": "A sample plugin"},
        "readme": {"default": "README.md", "zh_CN": "README_zh_CN.md"},
        "funding": {"custom": ["https://example.com/donate"]},
        "keywords": ["sample"]
    }"#;

    #[test]
    fn test_parse_plugin_descriptor() {
        let plugin: Plugin = serde_json::from_str(PLUGIN_JSON).unwrap();
        let pkg = plugin.package();
        assert_eq!(pkg.name, "sample-plugin");
        assert_eq!(pkg.min_app_version, "2.10.0");
        assert_eq!(pkg.frontends, vec!["desktop".to_string()]);
        assert_eq!(pkg.identity(), (
            "https://github.com/alice/sample-plugin",
            "sample-plugin",
            "alice"
        ));
        assert!(!pkg.installed);
    }

    #[test]
    fn test_localize_fills_preferred_fields() {
        let mut plugin: Plugin = serde_json::from_str(PLUGIN_JSON).unwrap();
        plugin.package_mut().localize(Locale::ZhCn);
        let pkg = plugin.package();
        assert_eq!(pkg.preferred_name, "示例");
        assert_eq!(pkg.preferred_desc, "A sample");
        assert_eq!(pkg.preferred_readme, "README_zh_CN.md");
        assert_eq!(pkg.preferred_funding, "https://example.com/donate");

        plugin.package_mut().localize(Locale::EnUs);
        assert_eq!(plugin.package().preferred_name, "Sample");
        assert_eq!(plugin.package().preferred_desc, "A sample plugin");
        assert_eq!(plugin.package().preferred_readme, "README.md");
    }

    #[test]
    fn test_missing_records_use_fallbacks() {
        let pkg = Package {
            name: "bare".to_string(),
            ..Package::default()
        };
        assert_eq!(pkg.preferred_name_for(Locale::EnUs), "bare");
        assert_eq!(pkg.preferred_desc_for(Locale::EnUs), "");
        assert_eq!(pkg.preferred_readme_for(Locale::EnUs), "README.md");
    }

    #[test]
    fn test_blank_readme_record_uses_default_file() {
        let blank = LocalizedText {
            default: "  ".to_string(),
            ..LocalizedText::default()
        };
        assert_eq!(preferred_readme(Some(&blank), Locale::ZhCht), "README.md");
        assert_eq!(
            preferred_readme(Some(&LocalizedText::default()), Locale::EnUs),
            "README.md"
        );
    }

    #[test]
    fn test_funding_priority() {
        let mut funding = Funding {
            open_collective: "oc".to_string(),
            patreon: "pt".to_string(),
            github: "gh".to_string(),
            custom: vec!["https://c".to_string()],
        };
        assert_eq!(funding.preferred_url(), "https://opencollective.com/oc");
        funding.open_collective.clear();
        assert_eq!(funding.preferred_url(), "https://www.patreon.com/pt");
        funding.patreon.clear();
        assert_eq!(funding.preferred_url(), "https://github.com/sponsors/gh");
        funding.github.clear();
        assert_eq!(funding.preferred_url(), "https://c");
        funding.custom.clear();
        assert_eq!(funding.preferred_url(), "");
    }

    #[test]
    fn test_theme_keeps_modes_and_flattened_fields() {
        let theme: Theme = serde_json::from_str(
            r#"{"name":"dusk","author":"bob","version":"1.0.0","modes":["dark"]}"#,
        )
        .unwrap();
        assert_eq!(theme.modes, vec!["dark".to_string()]);
        assert_eq!(theme.package().name, "dusk");

        let any = theme.clone().into_any();
        assert_eq!(any.kind(), PackageKind::Theme);
        assert_eq!(any.package().author, "bob");
        assert_eq!(Theme::from_any(any.clone()), Some(theme));
        assert_eq!(Plugin::from_any(any), None);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(PackageKind::Plugin.descriptor_file(), "plugin.json");
        assert_eq!(PackageKind::Icon.plural(), "icons");
        assert_eq!("templates".parse::<PackageKind>().unwrap(), PackageKind::Template);
        assert_eq!("Theme".parse::<PackageKind>().unwrap(), PackageKind::Theme);
        assert!("fonts".parse::<PackageKind>().is_err());
    }
}
