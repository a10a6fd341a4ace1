use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";
pub const STATUS_SKIPPED: &str = "skipped";

/// The record threaded through the pipeline. Each step fills in the fields
/// for what it produced; fields written by an earlier step are never
/// cleared, only overwritten with newer values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobPayload {
    pub folder: Option<PathBuf>,
    pub safe_title: Option<String>,
    pub title: Option<String>,
    pub story: Option<String>,
    #[serde(default)]
    pub paragraphs: Vec<String>,
    #[serde(default)]
    pub audio_files: Vec<PathBuf>,
    #[serde(default)]
    pub image_files: Vec<PathBuf>,
    #[serde(default)]
    pub video_files: Vec<PathBuf>,
    pub thumbnail: Option<PathBuf>,
    pub final_video: Option<PathBuf>,
    pub video_url: Option<String>,
    #[serde(default)]
    pub statuses: BTreeMap<String, String>,
}

impl JobPayload {
    /// True when no step has written anything yet. Gates the runner's
    /// completion hook.
    pub fn is_empty(&self) -> bool {
        self.folder.is_none()
            && self.safe_title.is_none()
            && self.title.is_none()
            && self.story.is_none()
            && self.paragraphs.is_empty()
            && self.audio_files.is_empty()
            && self.image_files.is_empty()
            && self.video_files.is_empty()
            && self.thumbnail.is_none()
            && self.final_video.is_none()
            && self.video_url.is_none()
            && self.statuses.is_empty()
    }

    /// Fold `newer` into `self`. Populated incoming fields win; absent
    /// incoming fields keep whatever was already there.
    pub fn merge(&mut self, newer: JobPayload) {
        merge_opt(&mut self.folder, newer.folder);
        merge_opt(&mut self.safe_title, newer.safe_title);
        merge_opt(&mut self.title, newer.title);
        merge_opt(&mut self.story, newer.story);
        merge_vec(&mut self.paragraphs, newer.paragraphs);
        merge_vec(&mut self.audio_files, newer.audio_files);
        merge_vec(&mut self.image_files, newer.image_files);
        merge_vec(&mut self.video_files, newer.video_files);
        merge_opt(&mut self.thumbnail, newer.thumbnail);
        merge_opt(&mut self.final_video, newer.final_video);
        merge_opt(&mut self.video_url, newer.video_url);
        for (step, status) in newer.statuses {
            self.statuses.insert(step, status);
        }
    }

    pub fn set_status(&mut self, step: &str, status: impl Into<String>) {
        self.statuses.insert(step.to_string(), status.into());
    }

    pub fn status(&self, step: &str) -> Option<&str> {
        self.statuses.get(step).map(String::as_str)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_by_default() {
        assert!(JobPayload::default().is_empty());
    }

    #[test]
    fn merge_keeps_earlier_fields() {
        let mut base = JobPayload {
            title: Some("A Winter Tale".to_string()),
            story: Some("Once...".to_string()),
            paragraphs: vec!["Once...".to_string()],
            ..Default::default()
        };

        let mut newer = JobPayload::default();
        newer.audio_files = vec![PathBuf::from("audio/001.mp3")];
        newer.set_status("tts", STATUS_COMPLETED);

        base.merge(newer);

        assert_eq!(base.title.as_deref(), Some("A Winter Tale"));
        assert_eq!(base.paragraphs.len(), 1);
        assert_eq!(base.audio_files.len(), 1);
        assert_eq!(base.status("tts"), Some(STATUS_COMPLETED));
    }

    #[test]
    fn merge_overwrites_with_newer_values() {
        let mut base = JobPayload {
            title: Some("draft".to_string()),
            ..Default::default()
        };
        base.set_status("story", "writing");
        base.set_status("images", STATUS_SKIPPED);

        let mut newer = JobPayload {
            title: Some("final".to_string()),
            ..Default::default()
        };
        newer.set_status("story", STATUS_COMPLETED);

        base.merge(newer);
        assert_eq!(base.title.as_deref(), Some("final"));
        assert_eq!(base.status("story"), Some(STATUS_COMPLETED));
        assert_eq!(base.status("images"), Some(STATUS_SKIPPED));
    }
}
