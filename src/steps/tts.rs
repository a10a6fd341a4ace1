use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use crate::api::elevenlabs;
use crate::config::TtsConfig;
use crate::fsutil::{ensure_dir, file_exists};
use crate::manifest::JobManifest;
use crate::payload::{JobPayload, STATUS_COMPLETED, STATUS_FAILED};
use crate::runner::{Step, STEP_TTS};
use crate::steps::{job_folder, AUDIO_DIR};
use crate::{logi, logok};

/// Narrate each story paragraph into its own mp3. Existing segment files
/// are kept, so a resumed run only pays for the missing ones.
pub struct TtsStep {
    client: Client,
    cfg: TtsConfig,
}

impl TtsStep {
    pub fn new(client: Client, cfg: TtsConfig) -> Self {
        Self { client, cfg }
    }
}

#[async_trait]
impl Step for TtsStep {
    async fn run(&self, mut payload: JobPayload) -> Result<JobPayload> {
        let (folder, slug) = job_folder(&payload)?;
        let folder = folder.to_path_buf();
        let slug = slug.to_string();

        if payload.paragraphs.is_empty() {
            anyhow::bail!("no story paragraphs to narrate");
        }

        ensure_dir(&folder.join(AUDIO_DIR)).await?;

        let mut rel_files = Vec::new();
        let mut abs_files = Vec::new();
        let total = payload.paragraphs.len();

        for (idx, paragraph) in payload.paragraphs.iter().enumerate() {
            let rel = format!("{}/{:03}.mp3", AUDIO_DIR, idx + 1);
            let path = folder.join(&rel);

            if file_exists(&path).await {
                logok(format!("TTS segment {}/{} cached: {}", idx + 1, total, rel));
            } else {
                logi(format!("TTS segment {}/{} -> {}", idx + 1, total, rel));
                if !elevenlabs::elevenlabs_tts_to_mp3(&self.client, &self.cfg, paragraph, &path)
                    .await?
                {
                    let manifest = JobManifest {
                        tts_status: Some(STATUS_FAILED.to_string()),
                        ..Default::default()
                    };
                    manifest.save_merged(&folder, &slug).await?;
                    anyhow::bail!("TTS failed for segment {}/{}", idx + 1, total);
                }
            }

            rel_files.push(rel);
            abs_files.push(path);
        }

        let manifest = JobManifest {
            audio_files: rel_files,
            tts_status: Some(STATUS_COMPLETED.to_string()),
            ..Default::default()
        };
        manifest.save_merged(&folder, &slug).await?;

        logok(format!("Narration complete: {} segments", abs_files.len()));
        payload.audio_files = abs_files;
        payload.set_status(STEP_TTS, STATUS_COMPLETED);
        Ok(payload)
    }
}
