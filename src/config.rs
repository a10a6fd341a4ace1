use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "open_api_key")]
    pub openai_key: String,
    #[serde(rename = "openai_model")]
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(rename = "elevenlabs_api_key")]
    pub elevenlabs_key: String,
    #[serde(rename = "eleven_voice_id")]
    #[serde(default = "default_voice_id")]
    pub eleven_voice_id: String,
    #[serde(rename = "eleven_model_id")]
    #[serde(default = "default_model_id")]
    pub eleven_model_id: String,
    #[serde(rename = "pexels_api_key")]
    pub pexels_key: String,
    pub upload_url: String,
    pub upload_token: String,
    #[serde(default = "default_story_topic")]
    pub story_topic: String,
    #[serde(default = "default_jobs_root")]
    pub jobs_root: String,
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    #[serde(default)]
    pub prune_after_upload: bool,
}

fn default_openai_model() -> String {
    "gpt-5.2".to_string()
}

fn default_voice_id() -> String {
    "JBFqnCBsd6RMkjVDRZzb".to_string()
}

fn default_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_story_topic() -> String {
    "an unexpected act of kindness with a twist ending".to_string()
}

fn default_jobs_root() -> String {
    "jobs".to_string()
}

fn default_step_delay_ms() -> u64 {
    1500
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let config: Config = serde_json::from_str(&content)?;

        if config.openai_key.is_empty() {
            anyhow::bail!("config.json: open_api_key missing");
        }
        if config.elevenlabs_key.is_empty() {
            anyhow::bail!("config.json: elevenlabs_api_key missing");
        }
        if config.pexels_key.is_empty() {
            anyhow::bail!("config.json: pexels_api_key missing");
        }
        if config.upload_url.is_empty() || config.upload_token.is_empty() {
            anyhow::bail!("config.json: upload_url/upload_token missing");
        }

        Ok(config)
    }

    pub fn jobs_root(&self) -> PathBuf {
        PathBuf::from(&self.jobs_root)
    }
}

/// Per-step configuration, split out so each step can be built and tested
/// without the rest of the config.
#[derive(Debug, Clone)]
pub struct StoryConfig {
    pub api_key: String,
    pub model: String,
    pub topic: String,
    pub jobs_root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
}

#[derive(Debug, Clone)]
pub struct ImagesConfig {
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct FinalizeConfig {
    pub music_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub url: String,
    pub token: String,
}

impl Config {
    pub fn story(&self) -> StoryConfig {
        StoryConfig {
            api_key: self.openai_key.clone(),
            model: self.openai_model.clone(),
            topic: self.story_topic.clone(),
            jobs_root: self.jobs_root(),
        }
    }

    pub fn tts(&self) -> TtsConfig {
        TtsConfig {
            api_key: self.elevenlabs_key.clone(),
            voice_id: self.eleven_voice_id.clone(),
            model_id: self.eleven_model_id.clone(),
        }
    }

    pub fn images(&self) -> ImagesConfig {
        ImagesConfig {
            api_key: self.pexels_key.clone(),
        }
    }

    pub fn finalize(&self) -> FinalizeConfig {
        FinalizeConfig {
            music_dir: PathBuf::from("backgroundmusic"),
        }
    }

    pub fn upload(&self) -> UploadConfig {
        UploadConfig {
            url: self.upload_url.clone(),
            token: self.upload_token.clone(),
        }
    }
}
