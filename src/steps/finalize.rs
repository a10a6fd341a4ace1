use anyhow::Result;
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::FinalizeConfig;
use crate::ffmpeg;
use crate::fsutil::{file_exists, list_files_with_ext};
use crate::manifest::JobManifest;
use crate::payload::{JobPayload, STATUS_COMPLETED};
use crate::runner::{Step, STEP_FINALIZE};
use crate::steps::{job_folder, FINAL_FILE, VIDEO_DIR};
use crate::{logi, logok, logw};

const MAX_BGM_PARTS: usize = 200;
const BGM_MIN_TRACK_SECONDS: f64 = 60.0;
const BGM_TRACK_OFFSET_SECONDS: f64 = 40.0;

fn now_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Concatenate the rendered segments and, when background music is
/// available, lay a quiet bed under the narration.
pub struct FinalizeStep {
    cfg: FinalizeConfig,
}

impl FinalizeStep {
    pub fn new(cfg: FinalizeConfig) -> Self {
        Self { cfg }
    }

    /// Pick random tracks long enough to skip their intro, slice what is
    /// needed, and concat the slices until the bed covers the video.
    async fn build_bgm(&self, folder: &Path, final_dur: f64) -> Result<Option<std::path::PathBuf>> {
        let songs = list_files_with_ext(&self.cfg.music_dir, ".mp3", ".m4a").await?;
        if songs.is_empty() {
            return Ok(None);
        }

        let mut rng = rand::rngs::StdRng::seed_from_u64(now_seed());
        let bgm_list = folder.join(format!("{}/bgm_list.txt", VIDEO_DIR));
        let mut bgml = fs::File::create(&bgm_list).await?;

        logi(format!("Building BGM track list ({} songs available)...", songs.len()));

        let mut covered = 0.0;
        let mut part = 0;
        let mut attempts = 0;
        while covered + 0.01 < final_dur {
            attempts += 1;
            if attempts > MAX_BGM_PARTS * 4 {
                logw("Gave up building a full BGM bed; using what we have.".to_string());
                break;
            }
            let idx = rng.gen_range(0..songs.len());
            let song = &songs[idx];
            let sd = match ffmpeg::ffprobe_duration_seconds(song).await {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sd <= BGM_MIN_TRACK_SECONDS {
                continue;
            }
            let start = BGM_TRACK_OFFSET_SECONDS;
            let avail = sd - start;
            if avail <= 1.0 {
                continue;
            }
            let need = final_dur - covered;
            let take = if avail < need { avail } else { need };

            let part_name = format!("bgm_part_{}.m4a", part + 1);
            let part_path = folder.join(format!("{}/{}", VIDEO_DIR, part_name));

            if !ffmpeg::ffmpeg_trim_audio(song, start, take, &part_path).await? {
                continue;
            }
            bgml.write_all(format!("file '{}'\n", part_name).as_bytes())
                .await?;
            covered += take;
            part += 1;
            if part > MAX_BGM_PARTS {
                break;
            }
        }
        bgml.flush().await?;

        logok(format!(
            "BGM parts created: {} (covered {:.2}s / {:.2}s)",
            part, covered, final_dur
        ));

        let bgm_out = folder.join(format!("{}/bgm.m4a", VIDEO_DIR));
        if !ffmpeg::ffmpeg_concat_audio(&bgm_list, &bgm_out).await? {
            logw("BGM concat failed; output narration-only.".to_string());
            return Ok(None);
        }
        Ok(Some(bgm_out))
    }
}

#[async_trait]
impl Step for FinalizeStep {
    async fn run(&self, mut payload: JobPayload) -> Result<JobPayload> {
        let (folder, slug) = job_folder(&payload)?;
        let folder = folder.to_path_buf();
        let slug = slug.to_string();

        let out_final = folder.join(FINAL_FILE);

        if file_exists(&out_final).await {
            logok(format!("Final video cached: {}", out_final.display()));
        } else {
            if payload.video_files.is_empty() {
                anyhow::bail!("no rendered segments to assemble");
            }

            // Scratch files live in the job root so the segment directory
            // keeps exactly one mp4 per narrated paragraph.
            let concat_list = folder.join("concat_list.txt");
            let mut listf = fs::File::create(&concat_list).await?;
            for segment in &payload.video_files {
                let name = segment
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                listf
                    .write_all(format!("file '{}/{}'\n", VIDEO_DIR, name).as_bytes())
                    .await?;
            }
            listf.flush().await?;

            let tmp_concat = folder.join("concat_tmp.mp4");
            logi(format!("Concatenating {} segments -> {}", payload.video_files.len(), tmp_concat.display()));
            if !ffmpeg::ffmpeg_concat_videos(&concat_list, &tmp_concat).await? {
                anyhow::bail!("segment concat failed");
            }

            let final_dur = ffmpeg::ffprobe_duration_seconds(&tmp_concat).await?;
            logok(format!("Final duration: {:.2} seconds", final_dur));

            match self.build_bgm(&folder, final_dur).await? {
                Some(bgm) => {
                    logi(format!("Mixing narration + BGM -> {}", out_final.display()));
                    if !ffmpeg::ffmpeg_mix_bgm(&tmp_concat, &bgm, &out_final).await? {
                        logw("Mix failed; output narration-only.".to_string());
                        fs::rename(&tmp_concat, &out_final).await?;
                    } else {
                        let _ = fs::remove_file(&tmp_concat).await;
                    }
                }
                None => {
                    logw("No background music; output will be narration-only.".to_string());
                    fs::rename(&tmp_concat, &out_final).await?;
                }
            }
            logok(format!("Wrote final video: {}", out_final.display()));
        }

        let manifest = JobManifest {
            final_video: Some(FINAL_FILE.to_string()),
            finalize_status: Some(STATUS_COMPLETED.to_string()),
            ..Default::default()
        };
        manifest.save_merged(&folder, &slug).await?;

        payload.final_video = Some(out_final);
        payload.set_status(STEP_FINALIZE, STATUS_COMPLETED);
        Ok(payload)
    }
}
