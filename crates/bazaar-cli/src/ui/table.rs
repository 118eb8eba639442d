//! Package tables
//!
//! Renders descriptor lists with comfy-table, or as JSON for scripting.

use anyhow::Result;
use bazaar_schema::{Descriptor, Package};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table};

/// Column layout for a package table
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Columns {
    /// Marketplace: Name | Version | Author | Downloads | Stars | Size | Updated | Status
    Catalog,
    /// Local: Name | Version | Author | Size | Installed | Status
    Installed,
    /// Updates: Name | Version | Repository | Update
    Outdated,
}

impl Columns {
    fn header(self) -> &'static [&'static str] {
        match self {
            Self::Catalog => &[
                "Name",
                "Version",
                "Author",
                "Downloads",
                "Stars",
                "Size",
                "Updated",
                "Status",
            ],
            Self::Installed => &["Name", "Version", "Author", "Size", "Installed", "Status"],
            Self::Outdated => &["Name", "Version", "Repository", "Update"],
        }
    }
}

fn display_name(pkg: &Package) -> &str {
    if pkg.preferred_name.trim().is_empty() {
        &pkg.name
    } else {
        &pkg.preferred_name
    }
}

fn status(pkg: &Package) -> Cell {
    if pkg.incompatible {
        Cell::new("incompatible").fg(Color::Red)
    } else if pkg.outdated {
        Cell::new("outdated").fg(Color::Yellow)
    } else if pkg.installed {
        Cell::new("installed").fg(Color::Green)
    } else {
        Cell::new("")
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..7).unwrap_or(hash)
}

fn row(pkg: &Package, columns: Columns) -> Vec<Cell> {
    let name = Cell::new(display_name(pkg)).fg(Color::Cyan);
    let right = |s: String| Cell::new(s).set_alignment(CellAlignment::Right);
    match columns {
        Columns::Catalog => vec![
            name,
            Cell::new(&pkg.version),
            Cell::new(&pkg.author),
            right(pkg.downloads.to_string()),
            right(pkg.stars.to_string()),
            right(pkg.h_size.clone()),
            Cell::new(&pkg.h_updated),
            status(pkg),
        ],
        Columns::Installed => vec![
            name,
            Cell::new(&pkg.version),
            Cell::new(&pkg.author),
            right(pkg.h_install_size.clone()),
            Cell::new(&pkg.h_install_date),
            status(pkg),
        ],
        Columns::Outdated => vec![
            name,
            Cell::new(&pkg.version),
            Cell::new(&pkg.url),
            Cell::new(short_hash(&pkg.repo_hash)).fg(Color::Yellow),
        ],
    }
}

/// Build the table for `packages`.
pub fn package_table<D: Descriptor>(packages: &[D], columns: Columns) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(columns.header().iter().copied());
    for d in packages {
        table.add_row(row(d.package(), columns));
    }
    table
}

/// Print `packages` as a table, or as pretty JSON when `json` is set.
pub fn print_packages<D: Descriptor>(packages: &[D], columns: Columns, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(packages)?);
    } else {
        println!("{}", package_table(packages, columns));
        println!("  {} package(s)", packages.len());
    }
    Ok(())
}
