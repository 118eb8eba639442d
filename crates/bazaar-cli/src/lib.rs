//! bazaar - marketplace package client
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Command-line front end over [`bazaar_core::Bazaar`]: browse the catalog,
//! inspect installed packages, install, update and remove them.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.bazaar/
//! ├── bazaar.toml   # Optional configuration
//! ├── data/         # plugins/, widgets/, templates/, themes/, icons/
//! └── temp/         # Scratch space for archives
//! ```

pub mod cmd;
pub mod ui;

use std::path::PathBuf;

use bazaar_schema::{Locale, PackageKind};
use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "bazaar")]
#[command(author, version, about = "bazaar - marketplace package client")]
pub struct Cli {
    /// Config file (defaults to ~/.bazaar/bazaar.toml)
    #[arg(long, global = true, env = "BAZAAR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Locale for names and descriptions (zh_CN, zh_CHT, en_US)
    #[arg(long, global = true)]
    pub locale: Option<String>,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Locale override, if one was given.
    pub fn locale(&self) -> Option<Locale> {
        self.locale.as_deref().map(|l| l.parse().unwrap_or_default())
    }
}

/// Package kinds as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Appearance themes
    #[value(alias = "themes")]
    Theme,
    /// Icon sets
    #[value(alias = "icons")]
    Icon,
    /// Plugins
    #[value(alias = "plugins")]
    Plugin,
    /// Widgets
    #[value(alias = "widgets")]
    Widget,
    /// Document templates
    #[value(alias = "templates")]
    Template,
}

impl From<KindArg> for PackageKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Theme => Self::Theme,
            KindArg::Icon => Self::Icon,
            KindArg::Plugin => Self::Plugin,
            KindArg::Widget => Self::Widget,
            KindArg::Template => Self::Template,
        }
    }
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List marketplace packages of a kind
    List {
        /// Package kind
        kind: KindArg,
    },
    /// List installed packages of a kind
    Installed {
        /// Package kind
        kind: KindArg,
    },
    /// List installed packages with a newer marketplace release
    Outdated {
        /// Package kind
        kind: KindArg,
    },
    /// Install a package from the marketplace
    Install {
        /// Package kind
        kind: KindArg,
        /// Repository reference: owner/repo@commit
        reference: String,
        /// Installation directory name (defaults to the package name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Install every available update of a kind
    Upgrade {
        /// Package kind
        kind: KindArg,
    },
    /// Remove an installed package
    Uninstall {
        /// Package kind
        kind: KindArg,
        /// Installation directory name
        name: String,
    },
    /// Show the README of a marketplace package
    Readme {
        /// Package kind
        kind: KindArg,
        /// Repository reference: owner/repo@commit
        reference: String,
    },
}
