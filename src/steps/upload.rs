use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::api::upload;
use crate::config::UploadConfig;
use crate::manifest::JobManifest;
use crate::payload::{JobPayload, STATUS_COMPLETED};
use crate::runner::{Step, STEP_UPLOAD};
use crate::steps::job_folder;
use crate::{logi, logok};

/// Terminal step: push the final video to the configured endpoint and
/// record the published URL. Completing this step marks the whole job done
/// for future scans.
pub struct UploadStep {
    client: Client,
    cfg: UploadConfig,
}

impl UploadStep {
    pub fn new(client: Client, cfg: UploadConfig) -> Self {
        Self { client, cfg }
    }
}

#[async_trait]
impl Step for UploadStep {
    async fn run(&self, mut payload: JobPayload) -> Result<JobPayload> {
        let (folder, slug) = job_folder(&payload)?;
        let folder = folder.to_path_buf();
        let slug = slug.to_string();

        if payload.status(STEP_UPLOAD) == Some(STATUS_COMPLETED) && payload.video_url.is_some() {
            logok(format!("Already uploaded: {}", slug));
            return Ok(payload);
        }

        let final_video = payload
            .final_video
            .clone()
            .context("no final video to upload")?;
        let title = payload.title.clone().unwrap_or_else(|| slug.clone());

        logi(format!("Uploading {} ...", final_video.display()));
        let url = upload::upload_video(&self.client, &self.cfg, &title, &final_video)
            .await?
            .context("upload endpoint rejected the video")?;

        let manifest = JobManifest {
            video_url: Some(url.clone()),
            upload_status: Some(STATUS_COMPLETED.to_string()),
            ..Default::default()
        };
        manifest.save_merged(&folder, &slug).await?;

        if url.is_empty() {
            logok("Upload accepted.".to_string());
        } else {
            logok(format!("Upload accepted: {}", url));
        }
        payload.video_url = Some(url);
        payload.set_status(STEP_UPLOAD, STATUS_COMPLETED);
        Ok(payload)
    }
}
