use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use ai_story_shorts::config::Config;
use ai_story_shorts::fsutil::{ensure_dir, prune_dir_except};
use ai_story_shorts::init;
use ai_story_shorts::inspector::ArtifactInspector;
use ai_story_shorts::manifest::JobManifest;
use ai_story_shorts::payload::JobPayload;
use ai_story_shorts::runner::{
    CompletionHook, PipelineRunner, STEP_FINALIZE, STEP_IMAGES, STEP_ORDER, STEP_STORY,
    STEP_THUMBNAIL, STEP_TTS, STEP_UPLOAD, STEP_VIDEOS,
};
use ai_story_shorts::steps::{
    FinalizeStep, ImagesStep, StoryStep, ThumbnailStep, TtsStep, UploadStep, VideosStep,
};

/// Runs after the pipeline: stamp the manifest and, when configured, prune
/// the job directory down to the manifest alone. The manifest is the only
/// proof of completion for future scans and is never removed.
struct FinishJob {
    prune: bool,
}

#[async_trait]
impl CompletionHook for FinishJob {
    async fn on_complete(&self, payload: &JobPayload) -> Result<()> {
        let (Some(folder), Some(slug)) = (&payload.folder, &payload.safe_title) else {
            return Ok(());
        };

        let manifest = JobManifest {
            completed_at: Some(Utc::now()),
            ..Default::default()
        };
        manifest.save_merged(folder, slug).await?;

        if self.prune && payload.video_url.is_some() {
            let keep = format!("{}.json", slug);
            prune_dir_except(folder, &keep).await?;
            info!(job = %slug, "pruned intermediate artifacts");
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    init::ensure_directories().await?;
    if !init::check_ffmpeg().await {
        eprintln!("[WARNING] FFmpeg not found in PATH. Please install FFmpeg.");
    }

    let cfg = Config::load("config.json").await?;
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .context("Failed to build HTTP client")?;

    ensure_dir(&cfg.jobs_root()).await?;

    let inspector = ArtifactInspector::new(cfg.jobs_root(), STEP_ORDER);

    let runner = PipelineRunner::new(STEP_ORDER)
        .register(STEP_STORY, Arc::new(StoryStep::new(client.clone(), cfg.story())))
        .register(STEP_TTS, Arc::new(TtsStep::new(client.clone(), cfg.tts())))
        .register(STEP_IMAGES, Arc::new(ImagesStep::new(client.clone(), cfg.images())))
        .register(STEP_VIDEOS, Arc::new(VideosStep::new()))
        .register(STEP_THUMBNAIL, Arc::new(ThumbnailStep::new()))
        .register(STEP_FINALIZE, Arc::new(FinalizeStep::new(cfg.finalize())))
        .register(STEP_UPLOAD, Arc::new(UploadStep::new(client.clone(), cfg.upload())))
        .with_step_delay(Duration::from_millis(cfg.step_delay_ms))
        .with_logger(Arc::new(|step| info!(step, "pipeline step")))
        .with_completion_hook(Arc::new(FinishJob {
            prune: cfg.prune_after_upload,
        }));

    let payload = runner.run(&inspector).await?;

    match (&payload.safe_title, &payload.video_url) {
        (Some(slug), Some(url)) if !url.is_empty() => {
            info!(job = %slug, url = %url, "pipeline finished")
        }
        (Some(slug), _) => info!(job = %slug, "pipeline finished"),
        _ => info!("pipeline finished with nothing to do"),
    }

    Ok(())
}
