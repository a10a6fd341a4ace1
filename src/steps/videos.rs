use anyhow::Result;
use async_trait::async_trait;

use crate::ffmpeg;
use crate::fsutil::{ensure_dir, file_exists};
use crate::manifest::JobManifest;
use crate::payload::{JobPayload, STATUS_COMPLETED};
use crate::runner::{Step, STEP_VIDEOS};
use crate::steps::{job_folder, VIDEO_DIR};
use crate::{logi, logok};

/// Render one vertical segment per paragraph: the paragraph's image held
/// for the length of its narration.
pub struct VideosStep;

impl VideosStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VideosStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Step for VideosStep {
    async fn run(&self, mut payload: JobPayload) -> Result<JobPayload> {
        let (folder, slug) = job_folder(&payload)?;
        let folder = folder.to_path_buf();
        let slug = slug.to_string();

        if payload.audio_files.is_empty() {
            anyhow::bail!("no narration segments to render");
        }
        if payload.image_files.len() != payload.audio_files.len() {
            anyhow::bail!(
                "segment mismatch: {} images for {} narrations",
                payload.image_files.len(),
                payload.audio_files.len()
            );
        }

        ensure_dir(&folder.join(VIDEO_DIR)).await?;

        let mut rel_files = Vec::new();
        let mut abs_files = Vec::new();
        let total = payload.audio_files.len();

        for (idx, (audio, image)) in payload
            .audio_files
            .iter()
            .zip(payload.image_files.iter())
            .enumerate()
        {
            let rel = format!("{}/{:03}.mp4", VIDEO_DIR, idx + 1);
            let path = folder.join(&rel);

            if file_exists(&path).await {
                logok(format!("Segment {}/{} cached: {}", idx + 1, total, rel));
                rel_files.push(rel);
                abs_files.push(path);
                continue;
            }

            let narration_dur = ffmpeg::ffprobe_duration_seconds(audio).await?;
            logi(format!(
                "Rendering segment {}/{} ({:.2}s) -> {}",
                idx + 1,
                total,
                narration_dur,
                rel
            ));
            if !ffmpeg::ffmpeg_still_clip(image, audio, narration_dur, &path).await? {
                anyhow::bail!("failed to render segment {}/{}", idx + 1, total);
            }

            rel_files.push(rel);
            abs_files.push(path);
        }

        let manifest = JobManifest {
            video_files: rel_files,
            videos_status: Some(STATUS_COMPLETED.to_string()),
            ..Default::default()
        };
        manifest.save_merged(&folder, &slug).await?;

        logok(format!("Segments rendered: {}", abs_files.len()));
        payload.video_files = abs_files;
        payload.set_status(STEP_VIDEOS, STATUS_COMPLETED);
        Ok(payload)
    }
}
