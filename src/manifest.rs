use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::payload::JobPayload;
use crate::runner;

/// Errors from reading or writing a job's manifest record. Typed so the
/// inspector can treat an unreadable record as "skip this candidate"
/// without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("no manifest record found in {0}")]
    NotFound(PathBuf),
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write manifest {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The durable per-job record. One JSON file per job directory, named after
/// the job's safe title. Every write merges into what is already on disk so
/// a crash between steps never erases recorded progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobManifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paragraphs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_status: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audio_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_status: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images_status: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub video_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub videos_status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalize_status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobManifest {
    /// Fold `newer` into `self`; populated incoming fields win, absent
    /// ones keep the existing value.
    pub fn merge(&mut self, newer: JobManifest) {
        merge_opt(&mut self.title, newer.title);
        merge_opt(&mut self.safe_title, newer.safe_title);
        merge_opt(&mut self.story, newer.story);
        merge_vec(&mut self.paragraphs, newer.paragraphs);
        merge_opt(&mut self.story_status, newer.story_status);
        merge_vec(&mut self.audio_files, newer.audio_files);
        merge_opt(&mut self.tts_status, newer.tts_status);
        merge_vec(&mut self.image_files, newer.image_files);
        merge_opt(&mut self.images_status, newer.images_status);
        merge_vec(&mut self.video_files, newer.video_files);
        merge_opt(&mut self.videos_status, newer.videos_status);
        merge_opt(&mut self.thumbnail_file, newer.thumbnail_file);
        merge_opt(&mut self.thumbnail_status, newer.thumbnail_status);
        merge_opt(&mut self.final_video, newer.final_video);
        merge_opt(&mut self.finalize_status, newer.finalize_status);
        merge_opt(&mut self.video_url, newer.video_url);
        merge_opt(&mut self.upload_status, newer.upload_status);
        merge_opt(&mut self.created_at, newer.created_at);
        merge_opt(&mut self.updated_at, newer.updated_at);
        merge_opt(&mut self.completed_at, newer.completed_at);
    }

    pub fn status_for(&self, step: &str) -> Option<&str> {
        let slot = match step {
            runner::STEP_STORY => &self.story_status,
            runner::STEP_TTS => &self.tts_status,
            runner::STEP_IMAGES => &self.images_status,
            runner::STEP_VIDEOS => &self.videos_status,
            runner::STEP_THUMBNAIL => &self.thumbnail_status,
            runner::STEP_FINALIZE => &self.finalize_status,
            runner::STEP_UPLOAD => &self.upload_status,
            _ => return None,
        };
        slot.as_deref()
    }

    /// Locate the manifest record inside a job directory: the first
    /// `*.json` file found. Callers keep exactly one per job.
    pub async fn find_in_dir(dir: &Path) -> Result<PathBuf, ManifestError> {
        let mut entries = fs::read_dir(dir).await.map_err(|source| ManifestError::Read {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut candidates: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| ManifestError::Read {
            path: dir.to_path_buf(),
            source,
        })? {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "json") {
                candidates.push(path);
            }
        }

        candidates.sort();
        candidates
            .into_iter()
            .next()
            .ok_or_else(|| ManifestError::NotFound(dir.to_path_buf()))
    }

    pub async fn load_dir(dir: &Path) -> Result<Self, ManifestError> {
        let path = Self::find_in_dir(dir).await?;
        Self::load(&path).await
    }

    pub async fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).await.map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Merge this record into whatever is already on disk and rewrite it.
    /// The on-disk file is replaced via a temp-and-rename so a crash
    /// mid-write leaves the previous record intact.
    pub async fn save_merged(&self, dir: &Path, safe_title: &str) -> Result<(), ManifestError> {
        let path = dir.join(format!("{}.json", safe_title));

        let mut merged = match Self::load(&path).await {
            Ok(existing) => existing,
            Err(ManifestError::Read { .. }) | Err(ManifestError::NotFound(_)) => Self::default(),
            Err(err) => return Err(err),
        };
        merged.merge(self.clone());
        if merged.created_at.is_none() {
            merged.created_at = Some(Utc::now());
        }
        merged.updated_at = Some(Utc::now());

        let json = serde_json::to_string_pretty(&merged).map_err(|source| ManifestError::Parse {
            path: path.clone(),
            source,
        })?;

        let tmp = dir.join(format!("{}.json.tmp", safe_title));
        fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|source| ManifestError::Write {
                path: tmp.clone(),
                source,
            })?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|source| ManifestError::Write { path, source })
    }

    /// Rebuild the runner payload from the recorded fields plus the job's
    /// directory and slug. Recorded paths are relative to the job dir.
    pub fn to_payload(&self, dir: &Path) -> JobPayload {
        let slug = self
            .safe_title
            .clone()
            .or_else(|| dir.file_name().map(|n| n.to_string_lossy().into_owned()));

        let join = |rel: &String| dir.join(rel);

        let mut payload = JobPayload {
            folder: Some(dir.to_path_buf()),
            safe_title: slug,
            title: self.title.clone(),
            story: self.story.clone(),
            paragraphs: self.paragraphs.clone(),
            audio_files: self.audio_files.iter().map(join).collect(),
            image_files: self.image_files.iter().map(join).collect(),
            video_files: self.video_files.iter().map(join).collect(),
            thumbnail: self.thumbnail_file.as_ref().map(join),
            final_video: self.final_video.as_ref().map(join),
            video_url: self.video_url.clone(),
            ..Default::default()
        };

        for step in runner::STEP_ORDER {
            if let Some(status) = self.status_for(step) {
                payload.set_status(step, status);
            }
        }

        payload
    }
}

fn merge_opt<T>(slot: &mut Option<T>, newer: Option<T>) {
    if newer.is_some() {
        *slot = newer;
    }
}

fn merge_vec<T>(slot: &mut Vec<T>, newer: Vec<T>) {
    if !newer.is_empty() {
        *slot = newer;
    }
}

/// Derive a filesystem-safe slug from a human title: lowercase ASCII
/// alphanumerics with single dashes between words.
pub fn slugify(title: &str) -> String {
    let mut out = String::new();
    let mut last_dash = true;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

fn slug_regex() -> Option<&'static Regex> {
    static SLUG_RE: OnceCell<Regex> = OnceCell::new();
    SLUG_RE
        .get_or_try_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$"))
        .ok()
}

/// A job directory name is only considered if it looks like something
/// `slugify` could have produced. An upstream bug once created a literal
/// placeholder folder from an unresolved async title; anything with
/// brackets, spaces, or other stray characters is ignored.
pub fn is_plausible_slug(name: &str) -> bool {
    slug_regex().map(|re| re.is_match(name)).unwrap_or(false)
}
