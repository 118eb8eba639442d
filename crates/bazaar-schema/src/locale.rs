//! Locale-aware selection of localized package metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display locale of the running application.
///
/// Only three locales carry dedicated translations in package descriptors;
/// anything else behaves like [`Locale::Default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Locale {
    /// Simplified Chinese (`zh_CN`).
    ZhCn,
    /// Traditional Chinese (`zh_CHT`).
    ZhCht,
    /// English (`en_US`).
    EnUs,
    /// Any other locale.
    #[default]
    Default,
}

impl Locale {
    /// The code as it appears in descriptor files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ZhCn => "zh_CN",
            Self::ZhCht => "zh_CHT",
            Self::EnUs => "en_US",
            Self::Default => "default",
        }
    }
}

impl FromStr for Locale {
    type Err = std::convert::Infallible;

    /// Never fails: unknown codes map to [`Locale::Default`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        Ok(match normalized.as_str() {
            "zh_CN" => Self::ZhCn,
            "zh_CHT" | "zh_TW" | "zh_HK" => Self::ZhCht,
            "en_US" => Self::EnUs,
            _ => Self::Default,
        })
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Locale {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Locale {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().unwrap_or_default())
    }
}

/// A per-field localization record (display name, description, readme path).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    /// Fallback value used when no translation applies.
    #[serde(default)]
    pub default: String,
    /// Simplified Chinese.
    #[serde(default, rename = "zh_CN")]
    pub zh_cn: String,
    /// Traditional Chinese.
    #[serde(default, rename = "zh_CHT")]
    pub zh_cht: String,
    /// English.
    #[serde(default, rename = "en_US")]
    pub en_us: String,
}

impl LocalizedText {
    /// Pick the best-fit string for `locale`.
    ///
    /// Starts from `default`. `zh_CHT` falls back to `zh_CN` before giving up;
    /// `en_US` and unrecognized locales both prefer the English field. Empty
    /// fields never override, so the result is empty only if every candidate
    /// on the fallback path is empty.
    pub fn resolve(&self, locale: Locale) -> &str {
        let preferred = match locale {
            Locale::ZhCn => [self.zh_cn.as_str(), ""],
            Locale::ZhCht => [self.zh_cht.as_str(), self.zh_cn.as_str()],
            Locale::EnUs | Locale::Default => [self.en_us.as_str(), ""],
        };

        preferred
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or(&self.default)
    }
}
