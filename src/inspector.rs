use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::debug;

use crate::fsutil::{dir_exists, file_exists, list_files_with_ext};
use crate::manifest::{is_plausible_slug, JobManifest};
use crate::payload::STATUS_COMPLETED;
use crate::runner;
use crate::runner::{ResumeLookup, ResumePoint};
use crate::steps::{AUDIO_DIR, IMAGES_DIR, STORY_FILE, VIDEO_DIR};

/// Reconstructs "where did we leave off" straight from the filesystem.
/// There is no separate job queue: the jobs root directory is the queue.
pub struct ArtifactInspector {
    root: PathBuf,
    order: Vec<String>,
}

impl ArtifactInspector {
    pub fn new<S: Into<String>>(root: impl Into<PathBuf>, order: impl IntoIterator<Item = S>) -> Self {
        Self {
            root: root.into(),
            order: order.into_iter().map(Into::into).collect(),
        }
    }

    /// Scan all candidate job directories, newest first, and return the
    /// first usable resume point. Any error probing one candidate only
    /// disqualifies that candidate; a corrupt job can never block the rest.
    pub async fn scan(&self) -> Option<ResumePoint> {
        let candidates = match self.candidate_dirs().await {
            Ok(dirs) => dirs,
            Err(err) => {
                debug!(root = %self.root.display(), %err, "jobs root not scannable");
                return None;
            }
        };

        for dir in candidates {
            match self.probe_candidate(&dir).await {
                Ok(Some(point)) => return Some(point),
                Ok(None) => {}
                Err(err) => {
                    debug!(job = %dir.display(), %err, "candidate probe failed, skipping");
                }
            }
        }

        None
    }

    /// Job subdirectories under the root, most recently modified first.
    /// Hidden entries and names that could not have come out of `slugify`
    /// are dropped up front.
    async fn candidate_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut dirs: Vec<(SystemTime, PathBuf)> = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') || !is_plausible_slug(&name) {
                continue;
            }

            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                Err(_) => continue,
            };
            if !meta.is_dir() {
                continue;
            }

            let modified = meta.modified().unwrap_or(UNIX_EPOCH);
            dirs.push((modified, path));
        }

        dirs.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(dirs.into_iter().map(|(_, path)| path).collect())
    }

    async fn probe_candidate(&self, dir: &Path) -> Result<Option<ResumePoint>> {
        let manifest = JobManifest::load_dir(dir).await?;

        // Fully finished jobs are not candidates at all.
        if let Some(last) = self.order.last() {
            if self.step_complete(last, &manifest, dir).await {
                return Ok(None);
            }
        }

        // Walk backward so the job resumes as late as possible: the first
        // step (from the end) whose predecessor is durably complete wins.
        for index in (1..self.order.len()).rev() {
            if self.step_complete(&self.order[index - 1], &manifest, dir).await {
                let payload = manifest.to_payload(dir);
                return Ok(Some(ResumePoint {
                    step: self.order[index].clone(),
                    payload,
                }));
            }
        }

        Ok(None)
    }

    /// The three-legged completion marker: recorded status, artifact
    /// presence, and (for list-producing steps) agreement between the
    /// recorded list and what is actually on disk. The record alone is
    /// never trusted.
    async fn step_complete(&self, step: &str, manifest: &JobManifest, dir: &Path) -> bool {
        if manifest.status_for(step) != Some(STATUS_COMPLETED) {
            return false;
        }

        match step {
            runner::STEP_STORY => {
                manifest.story.as_deref().is_some_and(|s| !s.is_empty())
                    && !manifest.paragraphs.is_empty()
                    && file_exists(&dir.join(STORY_FILE)).await
            }
            runner::STEP_TTS => {
                self.files_consistent(&manifest.audio_files, dir, AUDIO_DIR, ".mp3", ".mp3")
                    .await
            }
            runner::STEP_IMAGES => {
                self.files_consistent(&manifest.image_files, dir, IMAGES_DIR, ".jpg", ".jpeg")
                    .await
            }
            runner::STEP_VIDEOS => {
                self.files_consistent(&manifest.video_files, dir, VIDEO_DIR, ".mp4", ".mp4")
                    .await
            }
            runner::STEP_THUMBNAIL => match &manifest.thumbnail_file {
                Some(rel) => file_exists(&dir.join(rel)).await,
                None => false,
            },
            runner::STEP_FINALIZE => match &manifest.final_video {
                Some(rel) => file_exists(&dir.join(rel)).await,
                None => false,
            },
            runner::STEP_UPLOAD => manifest.video_url.is_some(),
            _ => false,
        }
    }

    /// A recorded file list counts only if it is non-empty, every listed
    /// file exists, and the on-disk directory holds exactly as many files.
    /// A directory that exists but is missing its files is not complete.
    async fn files_consistent(
        &self,
        listed: &[String],
        dir: &Path,
        subdir: &str,
        ext1: &str,
        ext2: &str,
    ) -> bool {
        if listed.is_empty() {
            return false;
        }

        let artifact_dir = dir.join(subdir);
        if !dir_exists(&artifact_dir).await {
            return false;
        }

        for rel in listed {
            if !file_exists(&dir.join(rel)).await {
                return false;
            }
        }

        match list_files_with_ext(&artifact_dir, ext1, ext2).await {
            Ok(on_disk) => on_disk.len() == listed.len(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ResumeLookup for ArtifactInspector {
    async fn resume_point(&self) -> Option<ResumePoint> {
        self.scan().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::STEP_ORDER;
    use std::time::Duration;

    async fn write_job(
        root: &Path,
        slug: &str,
        manifest: JobManifest,
        files: &[&str],
    ) -> PathBuf {
        let dir = root.join(slug);
        fs::create_dir_all(&dir).await.unwrap();
        for rel in files {
            let path = dir.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await.unwrap();
            }
            fs::write(&path, b"artifact").await.unwrap();
        }
        let mut manifest = manifest;
        manifest.safe_title = Some(slug.to_string());
        manifest.save_merged(&dir, slug).await.unwrap();
        dir
    }

    fn completed() -> Option<String> {
        Some(STATUS_COMPLETED.to_string())
    }

    fn story_done() -> JobManifest {
        JobManifest {
            title: Some("The Lighthouse".to_string()),
            story: Some("Once there was a keeper.".to_string()),
            paragraphs: vec!["Once there was a keeper.".to_string()],
            story_status: completed(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn backward_scan_resumes_as_late_as_possible() {
        let root = tempfile::tempdir().unwrap();

        // Steps 1-4 durably complete, step 5 (thumbnail) not started.
        let mut manifest = story_done();
        manifest.tts_status = completed();
        manifest.audio_files = vec!["audio/001.mp3".to_string(), "audio/002.mp3".to_string()];
        manifest.images_status = completed();
        manifest.image_files = vec!["images/001.jpg".to_string(), "images/002.jpg".to_string()];
        manifest.videos_status = completed();
        manifest.video_files = vec!["video/001.mp4".to_string(), "video/002.mp4".to_string()];

        write_job(
            root.path(),
            "the-lighthouse",
            manifest,
            &[
                "story.txt",
                "audio/001.mp3",
                "audio/002.mp3",
                "images/001.jpg",
                "images/002.jpg",
                "video/001.mp4",
                "video/002.mp4",
            ],
        )
        .await;

        let inspector = ArtifactInspector::new(root.path(), STEP_ORDER);
        let point = inspector.scan().await.unwrap();
        assert_eq!(point.step, "thumbnail");
        assert_eq!(point.payload.video_files.len(), 2);
    }

    #[tokio::test]
    async fn terminal_job_is_not_a_candidate() {
        let root = tempfile::tempdir().unwrap();

        let mut done = story_done();
        done.tts_status = completed();
        done.audio_files = vec!["audio/001.mp3".to_string()];
        done.finalize_status = completed();
        done.final_video = Some("final.mp4".to_string());
        done.upload_status = completed();
        done.video_url = Some("https://example.com/v/abc".to_string());

        write_job(
            root.path(),
            "job-done",
            done,
            &["story.txt", "audio/001.mp3", "final.mp4"],
        )
        .await;

        let inspector = ArtifactInspector::new(root.path(), STEP_ORDER);
        assert!(inspector.scan().await.is_none());
    }

    #[tokio::test]
    async fn terminal_job_skipped_even_when_most_recent() {
        let root = tempfile::tempdir().unwrap();

        write_job(root.path(), "job-old", story_done(), &["story.txt"]).await;

        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut done = story_done();
        done.upload_status = completed();
        done.video_url = Some("https://example.com/v/abc".to_string());
        write_job(root.path(), "job-new-done", done, &["story.txt"]).await;

        let inspector = ArtifactInspector::new(root.path(), STEP_ORDER);
        let point = inspector.scan().await.unwrap();
        assert_eq!(point.step, "tts");
        assert_eq!(point.payload.safe_title.as_deref(), Some("job-old"));
    }

    #[tokio::test]
    async fn most_recently_modified_job_wins() {
        let root = tempfile::tempdir().unwrap();

        write_job(root.path(), "job-old", story_done(), &["story.txt"]).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        write_job(root.path(), "job-new", story_done(), &["story.txt"]).await;

        let inspector = ArtifactInspector::new(root.path(), STEP_ORDER);
        let point = inspector.scan().await.unwrap();
        assert_eq!(point.payload.safe_title.as_deref(), Some("job-new"));
    }

    #[tokio::test]
    async fn concrete_scenario_resumes_at_images() {
        let root = tempfile::tempdir().unwrap();

        let mut manifest = story_done();
        manifest.tts_status = completed();
        manifest.audio_files = vec!["audio/001.mp3".to_string()];

        let dir = write_job(
            root.path(),
            "the-lighthouse",
            manifest,
            &["story.txt", "audio/001.mp3"],
        )
        .await;

        let inspector = ArtifactInspector::new(root.path(), ["story", "tts", "images"]);
        let point = inspector.scan().await.unwrap();
        assert_eq!(point.step, "images");
        assert_eq!(point.payload.audio_files, vec![dir.join("audio/001.mp3")]);
    }

    #[tokio::test]
    async fn record_claiming_completion_without_files_falls_back() {
        let root = tempfile::tempdir().unwrap();

        // images_status says completed but the directory has no images.
        let mut manifest = story_done();
        manifest.tts_status = completed();
        manifest.audio_files = vec!["audio/001.mp3".to_string()];
        manifest.images_status = completed();
        manifest.image_files = vec!["images/001.jpg".to_string()];

        write_job(
            root.path(),
            "the-lighthouse",
            manifest,
            &["story.txt", "audio/001.mp3"],
        )
        .await;

        let inspector = ArtifactInspector::new(root.path(), STEP_ORDER);
        let point = inspector.scan().await.unwrap();
        assert_eq!(point.step, "images");
    }

    #[tokio::test]
    async fn extra_files_on_disk_fail_the_structural_check() {
        let root = tempfile::tempdir().unwrap();

        let mut manifest = story_done();
        manifest.tts_status = completed();
        manifest.audio_files = vec!["audio/001.mp3".to_string()];

        write_job(
            root.path(),
            "the-lighthouse",
            manifest,
            &["story.txt", "audio/001.mp3", "audio/002.mp3"],
        )
        .await;

        let inspector = ArtifactInspector::new(root.path(), STEP_ORDER);
        let point = inspector.scan().await.unwrap();
        // tts is not trusted, so the job resumes at tts (story is intact).
        assert_eq!(point.step, "tts");
    }

    #[tokio::test]
    async fn corrupt_manifest_skips_to_next_candidate() {
        let root = tempfile::tempdir().unwrap();

        write_job(root.path(), "job-old", story_done(), &["story.txt"]).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let broken = root.path().join("job-broken");
        fs::create_dir_all(&broken).await.unwrap();
        fs::write(broken.join("job-broken.json"), b"{not json").await.unwrap();

        let inspector = ArtifactInspector::new(root.path(), STEP_ORDER);
        let point = inspector.scan().await.unwrap();
        assert_eq!(point.payload.safe_title.as_deref(), Some("job-old"));
    }

    #[tokio::test]
    async fn placeholder_and_hidden_directories_are_ignored() {
        let root = tempfile::tempdir().unwrap();

        let bogus = root.path().join("[object Promise]");
        fs::create_dir_all(&bogus).await.unwrap();
        story_done().save_merged(&bogus, "bogus").await.unwrap();
        fs::write(bogus.join("story.txt"), b"x").await.unwrap();

        let hidden = root.path().join(".staging");
        fs::create_dir_all(&hidden).await.unwrap();

        let inspector = ArtifactInspector::new(root.path(), STEP_ORDER);
        assert!(inspector.scan().await.is_none());
    }

    #[tokio::test]
    async fn job_with_nothing_complete_is_not_resumable() {
        let root = tempfile::tempdir().unwrap();

        // Manifest exists but the story step never finished.
        let manifest = JobManifest {
            title: Some("The Lighthouse".to_string()),
            story_status: Some("writing".to_string()),
            ..Default::default()
        };
        write_job(root.path(), "the-lighthouse", manifest, &[]).await;

        let inspector = ArtifactInspector::new(root.path(), STEP_ORDER);
        assert!(inspector.scan().await.is_none());
    }

    #[tokio::test]
    async fn empty_root_yields_none() {
        let root = tempfile::tempdir().unwrap();
        let inspector = ArtifactInspector::new(root.path(), STEP_ORDER);
        assert!(inspector.scan().await.is_none());
    }
}
