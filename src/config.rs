use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub openai_api_key: String,
    #[serde(default = "default_openai_model")]
    pub openai_model_name: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default)]
    pub news_api_key: String,
    #[serde(default = "default_news_provider")]
    pub news_provider: String,
    pub elevenlabs_api_key: String,
    #[serde(default = "default_voice_id")]
    pub eleven_voice_id: String,
    #[serde(default = "default_model_id")]
    pub eleven_model_id: String,
    #[serde(default = "default_coingecko_base_url")]
    pub coingecko_base_url: String,
    #[serde(default = "default_true")]
    pub use_market_data: bool,
    #[serde(default = "default_target_duration")]
    pub target_duration_s: u32,
    #[serde(default = "default_whisper_bin")]
    pub whisper_bin: String,
    #[serde(default = "default_whisper_model")]
    pub whisper_model: String,
    #[serde(default = "default_tasks_dir")]
    pub tasks_dir: String,
    #[serde(default = "default_media_dir")]
    pub media_dir: String,
    #[serde(default = "default_bgm_dir")]
    pub bgm_dir: String,
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_news_provider() -> String {
    "auto".to_string()
}

fn default_voice_id() -> String {
    "JBFqnCBsd6RMkjVDRZzb".to_string()
}

fn default_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_coingecko_base_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_true() -> bool {
    true
}

fn default_target_duration() -> u32 {
    50
}

fn default_whisper_bin() -> String {
    "whisper".to_string()
}

fn default_whisper_model() -> String {
    "base".to_string()
}

fn default_tasks_dir() -> String {
    "storage/tasks".to_string()
}

fn default_media_dir() -> String {
    "local_media".to_string()
}

fn default_bgm_dir() -> String {
    "backgroundmusic".to_string()
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let config: Config = serde_json::from_str(&content)?;

        if config.openai_api_key.is_empty() {
            anyhow::bail!("config.json: openai_api_key missing");
        }
        if config.elevenlabs_api_key.is_empty() {
            anyhow::bail!("config.json: elevenlabs_api_key missing");
        }

        Ok(config)
    }

    pub fn tasks_path(&self) -> PathBuf {
        PathBuf::from(&self.tasks_dir)
    }

    pub fn media_path(&self) -> PathBuf {
        PathBuf::from(&self.media_dir)
    }

    pub fn bgm_path(&self) -> PathBuf {
        PathBuf::from(&self.bgm_dir)
    }
}
