use crate::config::UploadConfig;
use crate::logw;
use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use tokio::fs;

fn extract_video_url(resp_json: &str) -> Option<String> {
    let root: serde_json::Value = serde_json::from_str(resp_json).ok()?;
    root.get("url")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Push the finished video to the configured endpoint. Returns the public
/// URL the endpoint reports, or `None` on a non-success response (logged,
/// caller decides whether that fails the job).
pub async fn upload_video(
    client: &Client,
    cfg: &UploadConfig,
    title: &str,
    video_path: &Path,
) -> Result<Option<String>> {
    let bytes = fs::read(video_path)
        .await
        .with_context(|| format!("read final video: {}", video_path.display()))?;

    let resp = client
        .post(&cfg.url)
        .bearer_auth(&cfg.token)
        .header("Content-Type", "video/mp4")
        .header("X-Video-Title", title)
        .body(bytes)
        .timeout(std::time::Duration::from_secs(1800))
        .send()
        .await
        .context("Upload request failed")?;

    let status = resp.status();
    let raw = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        logw(format!("Upload failed HTTP {}", status.as_u16()));
        if !raw.is_empty() {
            let snippet = raw.chars().take(400).collect::<String>();
            logw(format!("Upload raw body: {}", snippet));
        }
        return Ok(None);
    }

    match extract_video_url(&raw) {
        Some(url) => Ok(Some(url)),
        None => {
            logw("Upload response had no url field; treating as accepted.".to_string());
            Ok(Some(String::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_url_field() {
        assert_eq!(
            extract_video_url(r#"{"url":"https://example.com/v/abc"}"#).as_deref(),
            Some("https://example.com/v/abc")
        );
        assert!(extract_video_url(r#"{"id":"abc"}"#).is_none());
    }
}
