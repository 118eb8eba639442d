//! Package README retrieval and rendering.

use bazaar_schema::reference::strip_host;
use bazaar_schema::{Locale, RepoRef, StageRepo, preferred_readme};

use crate::io::download::Downloader;

/// Turns README markdown into whatever the caller displays.
pub trait MarkdownRenderer: Send + Sync {
    /// Render `markdown`; relative links resolve against `link_base`.
    fn render(&self, markdown: &str, link_base: &str) -> String;
}

/// Returns the markdown unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawMarkdown;

impl MarkdownRenderer for RawMarkdown {
    fn render(&self, markdown: &str, _link_base: &str) -> String {
        markdown.to_string()
    }
}

/// CDN base that relative README links resolve against.
pub fn link_base(repo_url: &str) -> String {
    format!("https://cdn.jsdelivr.net/gh/{}", strip_host(repo_url))
}

/// Decode README bytes: UTF-16 with a byte order mark, otherwise UTF-8.
pub fn decode_text(data: &[u8]) -> String {
    fn utf16(data: &[u8], from_bytes: fn([u8; 2]) -> u16) -> String {
        let units: Vec<u16> = data
            .chunks_exact(2)
            .map(|c| from_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    }

    match data {
        [0xFF, 0xFE, rest @ ..] if data.len() > 2 => utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] if data.len() > 2 => utf16(rest, u16::from_be_bytes),
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        _ => String::from_utf8_lossy(data).into_owned(),
    }
}

/// Fetch and render the README of a catalog entry.
///
/// The locale's README is tried first, then the default one if it differs.
/// Failures are not errors: their messages become the returned content.
pub async fn fetch_readme(
    downloader: &Downloader,
    repo_url: &str,
    entry: &StageRepo,
    locale: Locale,
    renderer: &dyn MarkdownRenderer,
) -> String {
    let reference = match entry.repo_ref() {
        Ok(r) => r,
        Err(e) => return e.to_string(),
    };
    let readme = entry.package.as_ref().and_then(|p| p.readme.as_ref());

    let preferred = preferred_readme(readme, locale);
    let data = match fetch_file(downloader, &reference, &preferred).await {
        Ok(data) => data,
        Err(first) => {
            let default = readme.map(|r| r.default.trim()).unwrap_or_default();
            if default == preferred || default.is_empty() {
                return first;
            }
            match fetch_file(downloader, &reference, default).await {
                Ok(data) => data,
                Err(second) => return format!("{first}<br>{second}"),
            }
        }
    };

    renderer.render(&decode_text(&data), &link_base(repo_url))
}

/// Fetch one repository file. A reference without a path would address the
/// release archive, so a blank `file` fails without a request.
async fn fetch_file(
    downloader: &Downloader,
    reference: &RepoRef,
    file: &str,
) -> Result<bytes::Bytes, String> {
    let failed = |e: &dyn std::fmt::Display| {
        format!("Load bazaar package's README.md({file}) failed: {e}")
    };
    let target = reference.with_path(file);
    if target.path.as_deref().is_none_or(|p| p.trim().is_empty()) {
        return Err(failed(&"empty README path"));
    }
    downloader
        .download(&target, None, None)
        .await
        .map_err(|e| failed(&e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BazaarConfig;
    use mockito::Server;
    use std::sync::Arc;

    struct Tagged;

    impl MarkdownRenderer for Tagged {
        fn render(&self, markdown: &str, link_base: &str) -> String {
            format!("<{link_base}>{markdown}")
        }
    }

    fn entry(readme: &str) -> StageRepo {
        serde_json::from_str(&format!(
            r#"{{"url":"alice/plug@abc","package":{{"readme":{readme}}}}}"#
        ))
        .unwrap()
    }

    fn downloader(server: &Server) -> Downloader {
        let config = BazaarConfig::sandboxed(std::path::Path::new("/tmp"), &server.url());
        Downloader::new(reqwest::Client::new(), Arc::new(config))
    }

    #[test]
    fn test_decode_utf16() {
        let le: Vec<u8> = [0xFF, 0xFE]
            .into_iter()
            .chain("hi".encode_utf16().flat_map(u16::to_le_bytes))
            .collect();
        let be: Vec<u8> = [0xFE, 0xFF]
            .into_iter()
            .chain("hé".encode_utf16().flat_map(u16::to_be_bytes))
            .collect();
        assert_eq!(decode_text(&le), "hi");
        assert_eq!(decode_text(&be), "hé");
        assert_eq!(decode_text(b"\xEF\xBB\xBF# t"), "# t");
        assert_eq!(decode_text(b"plain"), "plain");
    }

    #[test]
    fn test_link_base() {
        assert_eq!(
            link_base("https://github.com/alice/plug"),
            "https://cdn.jsdelivr.net/gh/alice/plug"
        );
    }

    #[tokio::test]
    async fn test_preferred_readme_rendered() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/alice/plug/raw/abc/README_zh_CN.md")
            .with_status(200)
            .with_body("# 你好")
            .create_async()
            .await;

        let out = fetch_readme(
            &downloader(&server),
            "https://github.com/alice/plug",
            &entry(r#"{"default":"README.md","zh_CN":"README_zh_CN.md"}"#),
            Locale::ZhCn,
            &Tagged,
        )
        .await;
        assert_eq!(out, "<https://cdn.jsdelivr.net/gh/alice/plug># 你好");
    }

    #[tokio::test]
    async fn test_falls_back_to_default() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/alice/plug/raw/abc/README_en_US.md")
            .with_status(404)
            .create_async()
            .await;
        let _default = server
            .mock("GET", "/alice/plug/raw/abc/README.md")
            .with_status(200)
            .with_body("# Hello")
            .create_async()
            .await;

        let out = fetch_readme(
            &downloader(&server),
            "alice/plug",
            &entry(r#"{"default":"README.md","en_US":"README_en_US.md"}"#),
            Locale::EnUs,
            &RawMarkdown,
        )
        .await;
        assert_eq!(out, "# Hello");
    }

    #[tokio::test]
    async fn test_blank_readme_record_never_fetches_archive() {
        let mut server = Server::new_async().await;
        let tags = server
            .mock("GET", mockito::Matcher::Regex("^/repos/".to_string()))
            .expect(0)
            .create_async()
            .await;
        let readme = server
            .mock("GET", "/alice/plug/raw/abc/README.md")
            .with_status(200)
            .with_body("# Fallback")
            .expect(1)
            .create_async()
            .await;

        let out = fetch_readme(
            &downloader(&server),
            "alice/plug",
            &entry(r#"{"default":""}"#),
            Locale::EnUs,
            &RawMarkdown,
        )
        .await;
        assert_eq!(out, "# Fallback");
        tags.assert_async().await;
        readme.assert_async().await;
    }

    #[tokio::test]
    async fn test_blank_path_is_not_downloaded() {
        let server = Server::new_async().await;
        let reference = RepoRef::new("alice", "plug", "abc");
        for file in ["", "/", " "] {
            let err = fetch_file(&downloader(&server), &reference, file)
                .await
                .unwrap_err();
            assert_eq!(
                err,
                format!("Load bazaar package's README.md({file}) failed: empty README path")
            );
        }
    }

    #[tokio::test]
    async fn test_errors_become_content() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let d = downloader(&server);
        let out = fetch_readme(
            &d,
            "alice/plug",
            &entry(r#"{"default":"README.md","en_US":"README_en_US.md"}"#),
            Locale::EnUs,
            &RawMarkdown,
        )
        .await;
        assert_eq!(
            out,
            "Load bazaar package's README.md(README_en_US.md) failed: get bazaar package failed, please check your network\
             <br>Load bazaar package's README.md(README.md) failed: get bazaar package failed, please check your network"
        );

        let out = fetch_readme(&d, "alice/plug", &entry("null"), Locale::EnUs, &RawMarkdown).await;
        assert_eq!(
            out,
            "Load bazaar package's README.md(README.md) failed: get bazaar package failed, please check your network"
        );
    }
}
