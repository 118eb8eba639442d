//! Subcommand implementations.

use anyhow::{Context, Result, bail};
use bazaar_core::{Bazaar, RawMarkdown, Reporter};
use bazaar_schema::{Descriptor, Icon, PackageKind, Plugin, RepoRef, Template, Theme, Widget};

use crate::ui::progress::TerminalProgress;
use crate::ui::table::{Columns, print_packages};

/// Run `$body` with `D` bound to the descriptor type of `$kind`.
macro_rules! with_kind {
    ($kind:expr, $d:ident => $body:expr) => {
        match $kind {
            PackageKind::Theme => {
                type $d = Theme;
                $body
            }
            PackageKind::Icon => {
                type $d = Icon;
                $body
            }
            PackageKind::Plugin => {
                type $d = Plugin;
                $body
            }
            PackageKind::Widget => {
                type $d = Widget;
                $body
            }
            PackageKind::Template => {
                type $d = Template;
                $body
            }
        }
    };
}

/// List marketplace packages
pub async fn list(bazaar: &Bazaar, kind: PackageKind, json: bool) -> Result<()> {
    with_kind!(kind, D => {
        let packages = bazaar.catalog::<D>().await;
        if packages.is_empty() && !json {
            println!("  No {} available. Check your network.", kind.plural());
            return Ok(());
        }
        print_packages(&packages, Columns::Catalog, json)
    })
}

/// List installed packages
pub async fn installed(bazaar: &Bazaar, kind: PackageKind, json: bool) -> Result<()> {
    with_kind!(kind, D => {
        let packages = bazaar
            .installed::<D>()
            .await
            .context("Failed to list installed packages")?;
        if packages.is_empty() && !json {
            println!("  No {} installed.", kind.plural());
            return Ok(());
        }
        print_packages(&packages, Columns::Installed, json)
    })
}

/// List installed packages with updates
pub async fn outdated(bazaar: &Bazaar, kind: PackageKind, json: bool) -> Result<()> {
    with_kind!(kind, D => {
        let packages = bazaar
            .outdated::<D>()
            .await
            .context("Failed to check for updates")?;
        if packages.is_empty() && !json {
            println!("  All {} are up to date.", kind.plural());
            return Ok(());
        }
        print_packages(&packages, Columns::Outdated, json)
    })
}

/// Name a marketplace package installs under: its catalog name, or the
/// repository name if the catalog does not list it.
async fn catalog_name<D: Descriptor>(bazaar: &Bazaar, reference: &RepoRef) -> String {
    let slug = reference.slug();
    bazaar
        .catalog::<D>()
        .await
        .into_iter()
        .map(|d| d.package().clone())
        .find(|p| p.repo_hash == reference.hash && p.repo_url.ends_with(&slug))
        .map(|p| p.name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| reference.repo.clone())
}

/// Install one package
pub async fn install(
    bazaar: &Bazaar,
    kind: PackageKind,
    reference: &str,
    name: Option<&str>,
) -> Result<()> {
    let reference = RepoRef::parse(reference)?;
    let name = match name {
        Some(n) => n.to_string(),
        None => with_kind!(kind, D => catalog_name::<D>(bazaar, &reference).await),
    };

    let progress = TerminalProgress::new();
    let reporter: &dyn Reporter = &progress;
    bazaar
        .install(kind, &reference.slug(), &reference.hash, &name, Some(reporter))
        .await
        .with_context(|| format!("Failed to install {kind} '{name}'"))?;
    progress.finish();

    println!(
        "  Installed {kind} '{name}' into {}",
        bazaar.config().install_dir(kind, &name).display()
    );
    Ok(())
}

/// Install all available updates
pub async fn upgrade(bazaar: &Bazaar, kind: PackageKind) -> Result<()> {
    let updates: Vec<_> = with_kind!(kind, D => {
        bazaar
            .outdated::<D>()
            .await
            .context("Failed to check for updates")?
            .into_iter()
            .map(|d| d.package().clone())
            .collect()
    });

    if updates.is_empty() {
        println!("  All {} are up to date.", kind.plural());
        return Ok(());
    }

    let mut failed = 0;
    for pkg in &updates {
        let progress = TerminalProgress::new();
        let reporter: &dyn Reporter = &progress;
        match bazaar
            .install(kind, &pkg.url, &pkg.repo_hash, &pkg.name, Some(reporter))
            .await
        {
            Ok(()) => {
                progress.finish();
                println!("  Updated {kind} '{}'", pkg.name);
            }
            Err(e) => {
                progress.finish();
                eprintln!("  Failed to update {kind} '{}': {e}", pkg.name);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} updates failed", updates.len());
    }
    Ok(())
}

/// Remove one package
pub async fn uninstall(bazaar: &Bazaar, kind: PackageKind, name: &str) -> Result<()> {
    bazaar.uninstall(kind, name).await?;
    println!("  Removed {kind} '{name}'");
    Ok(())
}

/// Print a package README
pub async fn readme(bazaar: &Bazaar, kind: PackageKind, reference: &str) -> Result<()> {
    let reference = RepoRef::parse(reference)?;
    // README lookup reads the cached stage index only.
    if bazaar.stage_cache().get(kind).await.is_none() {
        bail!("Failed to load the {kind} catalog");
    }

    let content = bazaar
        .readme(kind, &reference.slug(), &reference.hash, &RawMarkdown)
        .await;
    if content.is_empty() {
        bail!("{} is not listed in the {kind} catalog", reference.package_key());
    }
    println!("{content}");
    Ok(())
}
