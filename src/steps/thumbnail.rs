use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::ffmpeg;
use crate::fsutil::file_exists;
use crate::manifest::JobManifest;
use crate::payload::{JobPayload, STATUS_COMPLETED};
use crate::runner::{Step, STEP_THUMBNAIL};
use crate::steps::{job_folder, THUMB_FILE};
use crate::{logi, logok};

/// Crop the lead image into the vertical thumbnail.
pub struct ThumbnailStep;

impl ThumbnailStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ThumbnailStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for ThumbnailStep {
    async fn run(&self, mut payload: JobPayload) -> Result<JobPayload> {
        let (folder, slug) = job_folder(&payload)?;
        let folder = folder.to_path_buf();
        let slug = slug.to_string();

        let out = folder.join(THUMB_FILE);

        if file_exists(&out).await {
            logok(format!("Thumbnail cached: {}", out.display()));
        } else {
            let lead = payload
                .image_files
                .first()
                .context("no images available for the thumbnail")?;
            logi(format!("Rendering thumbnail -> {}", out.display()));
            if !ffmpeg::ffmpeg_make_thumbnail(lead, &out).await? {
                anyhow::bail!("thumbnail render failed");
            }
        }

        let manifest = JobManifest {
            thumbnail_file: Some(THUMB_FILE.to_string()),
            thumbnail_status: Some(STATUS_COMPLETED.to_string()),
            ..Default::default()
        };
        manifest.save_merged(&folder, &slug).await?;

        payload.thumbnail = Some(out);
        payload.set_status(STEP_THUMBNAIL, STATUS_COMPLETED);
        Ok(payload)
    }
}
