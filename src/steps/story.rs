use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tokio::fs;

use crate::api::openai;
use crate::config::StoryConfig;
use crate::fsutil::{ensure_dir, file_exists};
use crate::manifest::{slugify, JobManifest};
use crate::payload::{JobPayload, STATUS_COMPLETED};
use crate::runner::{Step, STEP_STORY};
use crate::steps::STORY_FILE;
use crate::{logi, logok};

/// First step: ask the model for a story, derive the job slug, create the
/// job directory and seed the manifest.
pub struct StoryStep {
    client: Client,
    cfg: StoryConfig,
}

impl StoryStep {
    pub fn new(client: Client, cfg: StoryConfig) -> Self {
        Self { client, cfg }
    }
}

#[async_trait]
impl Step for StoryStep {
    async fn run(&self, mut payload: JobPayload) -> Result<JobPayload> {
        if let (Some(folder), Some(story)) = (&payload.folder, &payload.story) {
            if !story.is_empty()
                && !payload.paragraphs.is_empty()
                && file_exists(&folder.join(STORY_FILE)).await
            {
                logok(format!("Using cached story in {}", folder.display()));
                payload.set_status(STEP_STORY, STATUS_COMPLETED);
                return Ok(payload);
            }
        }

        logi(format!("Requesting story about \"{}\"...", self.cfg.topic));
        let plan = openai::openai_write_story(&self.client, &self.cfg).await?;
        if plan.title.is_empty() || plan.paragraphs.is_empty() {
            anyhow::bail!("story generation returned an empty plan");
        }

        let slug = slugify(&plan.title);
        if slug.is_empty() {
            anyhow::bail!("story title \"{}\" produced an empty slug", plan.title);
        }

        let folder = self.cfg.jobs_root.join(&slug);
        ensure_dir(&folder).await?;

        let story_text = plan.full_text();
        fs::write(folder.join(STORY_FILE), story_text.as_bytes()).await?;

        let manifest = JobManifest {
            title: Some(plan.title.clone()),
            safe_title: Some(slug.clone()),
            story: Some(story_text.clone()),
            paragraphs: plan.paragraphs.clone(),
            story_status: Some(STATUS_COMPLETED.to_string()),
            ..Default::default()
        };
        manifest.save_merged(&folder, &slug).await?;

        logok(format!(
            "Story written: \"{}\" -> {}",
            plan.title,
            folder.display()
        ));

        payload.title = Some(plan.title);
        payload.safe_title = Some(slug);
        payload.story = Some(story_text);
        payload.paragraphs = plan.paragraphs;
        payload.folder = Some(folder);
        payload.set_status(STEP_STORY, STATUS_COMPLETED);
        Ok(payload)
    }
}
