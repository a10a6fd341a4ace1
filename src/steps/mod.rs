use anyhow::{Context, Result};
use std::path::Path;

use crate::payload::JobPayload;

pub mod finalize;
pub mod images;
pub mod story;
pub mod thumbnail;
pub mod tts;
pub mod upload;
pub mod videos;

pub use finalize::FinalizeStep;
pub use images::ImagesStep;
pub use story::StoryStep;
pub use thumbnail::ThumbnailStep;
pub use tts::TtsStep;
pub use upload::UploadStep;
pub use videos::VideosStep;

/// Per-job artifact layout. The inspector's completion markers and the
/// steps must agree on these names.
pub const STORY_FILE: &str = "story.txt";
pub const AUDIO_DIR: &str = "audio";
pub const IMAGES_DIR: &str = "images";
pub const VIDEO_DIR: &str = "video";
pub const THUMB_FILE: &str = "thumbnail.jpg";
pub const FINAL_FILE: &str = "final.mp4";

/// Every step after `story` needs the job directory and slug the first
/// step established.
pub(crate) fn job_folder(payload: &JobPayload) -> Result<(&Path, &str)> {
    let folder = payload
        .folder
        .as_deref()
        .context("payload missing job folder (story step has not run)")?;
    let slug = payload
        .safe_title
        .as_deref()
        .context("payload missing safe title (story step has not run)")?;
    Ok((folder, slug))
}
