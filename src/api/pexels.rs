use crate::config::ImagesConfig;
use crate::logw;
use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use tokio::fs;

const SEARCH_URL: &str = "https://api.pexels.com/v1/search";

fn extract_photo_url(resp_json: &str) -> Option<String> {
    let root: serde_json::Value = serde_json::from_str(resp_json).ok()?;
    let photos = root.get("photos")?.as_array()?;
    for photo in photos {
        let src = photo.get("src")?;
        // Portrait crop suits the vertical video format; fall back to the
        // large rendition when missing.
        if let Some(url) = src.get("portrait").and_then(|v| v.as_str()) {
            return Some(url.to_string());
        }
        if let Some(url) = src.get("large").and_then(|v| v.as_str()) {
            return Some(url.to_string());
        }
    }
    None
}

/// Find one stock photo for `query`. `page` offsets the search so repeated
/// queries across paragraphs don't all land on the same photo.
pub async fn pexels_search_photo(
    client: &Client,
    cfg: &ImagesConfig,
    query: &str,
    page: usize,
) -> Result<Option<String>> {
    let page_param = page.to_string();
    let resp = client
        .get(SEARCH_URL)
        .header("Authorization", &cfg.api_key)
        .query(&[
            ("query", query),
            ("per_page", "1"),
            ("orientation", "portrait"),
            ("page", page_param.as_str()),
        ])
        .timeout(std::time::Duration::from_secs(60))
        .send()
        .await
        .context("Pexels request failed")?;

    let status = resp.status();
    let raw = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        logw(format!("Pexels HTTP {} for query \"{}\"", status.as_u16(), query));
        if !raw.is_empty() {
            let snippet = raw.chars().take(400).collect::<String>();
            logw(format!("Pexels raw body: {}", snippet));
        }
        return Ok(None);
    }

    Ok(extract_photo_url(&raw))
}

pub async fn pexels_download_to_file(
    client: &Client,
    cfg: &ImagesConfig,
    query: &str,
    page: usize,
    out_path: &Path,
) -> Result<bool> {
    let url = match pexels_search_photo(client, cfg, query, page).await? {
        Some(url) => url,
        None => {
            logw(format!("Pexels: no photo found for \"{}\"", query));
            return Ok(false);
        }
    };

    let bytes = client
        .get(&url)
        .timeout(std::time::Duration::from_secs(120))
        .send()
        .await
        .context("Pexels photo download failed")?
        .bytes()
        .await
        .context("Pexels photo read failed")?;

    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }
    fs::write(out_path, &bytes).await?;

    Ok(fs::metadata(out_path).await.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_portrait_rendition() {
        let raw = r#"{"photos":[{"src":{"large":"https://x/large.jpg","portrait":"https://x/portrait.jpg"}}]}"#;
        assert_eq!(
            extract_photo_url(raw).as_deref(),
            Some("https://x/portrait.jpg")
        );
    }

    #[test]
    fn empty_results_yield_none() {
        assert!(extract_photo_url(r#"{"photos":[]}"#).is_none());
        assert!(extract_photo_url("{not json").is_none());
    }
}
