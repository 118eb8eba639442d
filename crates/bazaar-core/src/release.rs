//! Commit hash -> release tag -> package archive URL.
//!
//! Catalog entries pin a package to a commit. The archive itself is published
//! as a release asset, so we walk the repository's tag list until we find the
//! tag pointing at that commit.

use bazaar_schema::RepoRef;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use crate::config::BazaarConfig;
use crate::io::download::DownloadError;

/// Tags requested per page.
pub const TAGS_PER_PAGE: u32 = 32;

/// Asset every release must carry.
pub const PACKAGE_ASSET: &str = "package.zip";

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
    commit: TagCommit,
}

#[derive(Debug, Deserialize)]
struct TagCommit {
    sha: String,
}

/// `<host>/<owner>/<repo>/releases/download/<tag>/package.zip`
pub fn release_asset_url(host: &str, reference: &RepoRef, tag: &str) -> String {
    format!(
        "{}/{}/{}/releases/download/{tag}/{PACKAGE_ASSET}",
        host.trim_end_matches('/'),
        reference.owner,
        reference.repo
    )
}

async fn fetch_tag_page(
    client: &Client,
    api: &str,
    reference: &RepoRef,
    page: u32,
) -> Result<Vec<Tag>, DownloadError> {
    let url = format!(
        "{}/repos/{}/{}/tags",
        api.trim_end_matches('/'),
        reference.owner,
        reference.repo
    );

    let resp = client
        .get(&url)
        .query(&[("per_page", TAGS_PER_PAGE), ("page", page)])
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .send()
        .await
        .map_err(|e| {
            error!(url = %url, page, error = %e, "list repository tags failed");
            DownloadError::Network
        })?;

    if !resp.status().is_success() {
        error!(url = %url, page, status = %resp.status(), "list repository tags failed");
        return Err(DownloadError::Network);
    }

    resp.json().await.map_err(|e| {
        error!(url = %url, page, error = %e, "decode repository tags failed");
        DownloadError::Network
    })
}

/// Find the release asset URL for the commit `reference.hash`.
///
/// # Errors
///
/// - [`DownloadError::ReleaseNotFound`] if the tag list ends without a match.
/// - [`DownloadError::TagPagesExhausted`] if `max_tag_pages` pages were
///   scanned without reaching the end.
/// - [`DownloadError::Network`] on any transport or status failure; there is
///   no retry.
pub async fn resolve_download_url(
    client: &Client,
    config: &BazaarConfig,
    reference: &RepoRef,
) -> Result<String, DownloadError> {
    let max_pages = config.max_tag_pages.max(1);

    for page in 1..=max_pages {
        let tags = fetch_tag_page(client, &config.github_api, reference, page).await?;
        if tags.is_empty() {
            error!(repo = %reference.slug(), hash = %reference.hash, "no tag matches commit");
            return Err(DownloadError::ReleaseNotFound {
                repo: reference.slug(),
            });
        }

        if let Some(tag) = tags.iter().find(|t| t.commit.sha == reference.hash) {
            debug!(repo = %reference.slug(), tag = %tag.name, page, "resolved release tag");
            return Ok(release_asset_url(&config.github_host, reference, &tag.name));
        }
    }

    error!(repo = %reference.slug(), pages = max_pages, "tag pagination exhausted");
    Err(DownloadError::TagPagesExhausted {
        repo: reference.slug(),
        hash: reference.hash.clone(),
        pages: max_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn tags_json(tags: &[(&str, &str)]) -> String {
        let items: Vec<String> = tags
            .iter()
            .map(|(name, sha)| format!(r#"{{"name":"{name}","commit":{{"sha":"{sha}"}}}}"#))
            .collect();
        format!("[{}]", items.join(","))
    }

    fn page(n: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("per_page".into(), "32".into()),
            Matcher::UrlEncoded("page".into(), n.into()),
        ])
    }

    #[tokio::test]
    async fn test_resolves_on_second_page() {
        let mut server = Server::new_async().await;
        let config = BazaarConfig::sandboxed(std::path::Path::new("/tmp"), &server.url());

        let _p1 = server
            .mock("GET", "/repos/alice/plug/tags")
            .match_query(page("1"))
            .with_status(200)
            .with_body(tags_json(&[("v0.2.0", "bbb"), ("v0.1.0", "ccc")]))
            .create_async()
            .await;
        let _p2 = server
            .mock("GET", "/repos/alice/plug/tags")
            .match_query(page("2"))
            .with_status(200)
            .with_body(tags_json(&[("v0.0.1", "aaa")]))
            .create_async()
            .await;

        let client = Client::new();
        let reference = RepoRef::new("alice", "plug", "aaa");
        let url = resolve_download_url(&client, &config, &reference)
            .await
            .unwrap();
        assert_eq!(
            url,
            format!("{}/alice/plug/releases/download/v0.0.1/package.zip", server.url())
        );
    }

    #[tokio::test]
    async fn test_empty_page_is_not_found() {
        let mut server = Server::new_async().await;
        let config = BazaarConfig::sandboxed(std::path::Path::new("/tmp"), &server.url());

        let _p1 = server
            .mock("GET", "/repos/alice/plug/tags")
            .match_query(page("1"))
            .with_status(200)
            .with_body(tags_json(&[("v0.1.0", "ccc")]))
            .create_async()
            .await;
        let _p2 = server
            .mock("GET", "/repos/alice/plug/tags")
            .match_query(page("2"))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let err = resolve_download_url(&Client::new(), &config, &RepoRef::new("alice", "plug", "zzz"))
            .await
            .unwrap_err();
        assert_eq!(err, DownloadError::ReleaseNotFound {
            repo: "alice/plug".to_string()
        });
    }

    #[tokio::test]
    async fn test_page_ceiling() {
        let mut server = Server::new_async().await;
        let mut config = BazaarConfig::sandboxed(std::path::Path::new("/tmp"), &server.url());
        config.max_tag_pages = 2;

        let m = server
            .mock("GET", "/repos/alice/plug/tags")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(tags_json(&[("v0.1.0", "ccc")]))
            .expect(2)
            .create_async()
            .await;

        let err = resolve_download_url(&Client::new(), &config, &RepoRef::new("alice", "plug", "zzz"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::TagPagesExhausted { pages: 2, .. }));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_error_aborts_without_retry() {
        let mut server = Server::new_async().await;
        let config = BazaarConfig::sandboxed(std::path::Path::new("/tmp"), &server.url());

        let m = server
            .mock("GET", "/repos/alice/plug/tags")
            .match_query(Matcher::Any)
            .with_status(403)
            .expect(1)
            .create_async()
            .await;

        let err = resolve_download_url(&Client::new(), &config, &RepoRef::new("alice", "plug", "aaa"))
            .await
            .unwrap_err();
        assert_eq!(err, DownloadError::Network);
        m.assert_async().await;
    }
}
