use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use crate::api::pexels;
use crate::config::ImagesConfig;
use crate::fsutil::{ensure_dir, file_exists};
use crate::manifest::JobManifest;
use crate::payload::{JobPayload, STATUS_COMPLETED, STATUS_FAILED};
use crate::runner::{Step, STEP_IMAGES};
use crate::steps::{job_folder, IMAGES_DIR};
use crate::{logi, logok, logw};

const QUERY_WORDS: usize = 3;
const MIN_WORD_LEN: usize = 4;

/// Build a stock-photo query from a paragraph: the first few substantial
/// words carry the scene.
pub(crate) fn query_from_paragraph(paragraph: &str) -> String {
    paragraph
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() >= MIN_WORD_LEN)
        .take(QUERY_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fetch one stock photo per paragraph. Falls back to the story title when
/// a paragraph query finds nothing.
pub struct ImagesStep {
    client: Client,
    cfg: ImagesConfig,
}

impl ImagesStep {
    pub fn new(client: Client, cfg: ImagesConfig) -> Self {
        Self { client, cfg }
    }
}

#[async_trait]
impl Step for ImagesStep {
    async fn run(&self, mut payload: JobPayload) -> Result<JobPayload> {
        let (folder, slug) = job_folder(&payload)?;
        let folder = folder.to_path_buf();
        let slug = slug.to_string();

        if payload.paragraphs.is_empty() {
            anyhow::bail!("no story paragraphs to illustrate");
        }

        ensure_dir(&folder.join(IMAGES_DIR)).await?;

        let title = payload.title.clone().unwrap_or_default();
        let mut rel_files = Vec::new();
        let mut abs_files = Vec::new();
        let total = payload.paragraphs.len();

        for (idx, paragraph) in payload.paragraphs.iter().enumerate() {
            let rel = format!("{}/{:03}.jpg", IMAGES_DIR, idx + 1);
            let path = folder.join(&rel);

            if file_exists(&path).await {
                logok(format!("Image {}/{} cached: {}", idx + 1, total, rel));
                rel_files.push(rel);
                abs_files.push(path);
                continue;
            }

            let mut query = query_from_paragraph(paragraph);
            if query.is_empty() {
                query = title.clone();
            }

            logi(format!("Image {}/{} query \"{}\" -> {}", idx + 1, total, query, rel));
            let mut got =
                pexels::pexels_download_to_file(&self.client, &self.cfg, &query, idx + 1, &path)
                    .await?;

            if !got && !title.is_empty() && query != title {
                logw(format!(
                    "No photo for \"{}\"; retrying with title query",
                    query
                ));
                got = pexels::pexels_download_to_file(&self.client, &self.cfg, &title, idx + 1, &path)
                    .await?;
            }

            if !got {
                let manifest = JobManifest {
                    images_status: Some(STATUS_FAILED.to_string()),
                    ..Default::default()
                };
                manifest.save_merged(&folder, &slug).await?;
                anyhow::bail!("no stock photo found for segment {}/{}", idx + 1, total);
            }

            rel_files.push(rel);
            abs_files.push(path);
        }

        let manifest = JobManifest {
            image_files: rel_files,
            images_status: Some(STATUS_COMPLETED.to_string()),
            ..Default::default()
        };
        manifest.save_merged(&folder, &slug).await?;

        logok(format!("Images fetched: {}", abs_files.len()));
        payload.image_files = abs_files;
        payload.set_status(STEP_IMAGES, STATUS_COMPLETED);
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_takes_substantial_words() {
        assert_eq!(
            query_from_paragraph("The old lighthouse keeper walked slowly home."),
            "lighthouse keeper walked"
        );
    }

    #[test]
    fn query_strips_punctuation_and_short_words() {
        assert_eq!(
            query_from_paragraph("\"Storm!\" he said, watching waves crash."),
            "Storm said watching"
        );
        assert_eq!(query_from_paragraph("a an it"), "");
    }
}
