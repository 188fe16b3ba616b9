use crate::api::{
    coingecko::CoinGeckoMarket, ddg::DdgSearchProvider, elevenlabs::ElevenLabsSynthesizer,
    newsapi::NewsApiProvider, openai::OpenAiClient, whisper::WhisperCli,
};
use crate::config::Config;
use crate::content::{MarketSnapshot, SourceItem};
use crate::ffmpeg::FfmpegCompositor;
use crate::material::MaterialInfo;
use crate::params::VideoParams;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Transport/auth/quota failure of the text-generation capability.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generation API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("generation returned an empty response")]
    EmptyResponse,
}

/// Failure of the speech-synthesis capability.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("synthesis transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("synthesis API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("synthesis produced no audio data")]
    NoAudio,
    #[error("failed to store audio file: {0}")]
    Io(#[from] std::io::Error),
}

/// Free-text generation from a single prompt.
#[async_trait]
pub trait TextGenerate: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// One source of news/web content. Best-effort: `Ok(None)` means the
/// provider had nothing for this subject; errors are swallowed by the
/// content selector and treated as "try the next provider".
#[async_trait]
pub trait ContentProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self, subject: &str, language: &str) -> Result<Option<SourceItem>>;
}

/// Structured market metrics for a canonical asset id.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn snapshot(&self, asset_id: &str) -> Result<Option<MarketSnapshot>>;
}

/// Text-to-speech. Writes the synthesized narration to `out_path`.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        out_path: &Path,
    ) -> Result<(), SynthesisError>;
}

/// Speech-to-subtitles. Best-effort: returns false when no subtitle file
/// could be produced.
#[async_trait]
pub trait SubtitleTranscriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path, out_srt_path: &Path) -> Result<bool>;
}

/// The compositing engine. Sub-steps return `Ok(false)` when the engine ran
/// but produced no output file.
#[async_trait]
pub trait Compositor: Send + Sync {
    /// Duration of a media file in seconds.
    async fn probe_duration(&self, media_path: &Path) -> Result<f64>;

    /// Concatenate the materials, in the given order, into one silent
    /// timeline capped per clip by `params.video_clip_duration`.
    async fn combine_clips(
        &self,
        materials: &[MaterialInfo],
        params: &VideoParams,
        out_path: &Path,
    ) -> Result<bool>;

    /// Mux narration audio and the optional subtitle track into the final
    /// artifact.
    async fn mux_final(
        &self,
        combined_path: &Path,
        audio_path: &Path,
        subtitle_path: Option<&Path>,
        params: &VideoParams,
        out_path: &Path,
    ) -> Result<bool>;
}

/// Every external capability the pipeline consumes, bundled for injection
/// into the orchestrator. Tests substitute mocks; `from_config` wires the
/// real clients.
pub struct Capabilities {
    pub text: Arc<dyn TextGenerate>,
    pub content_providers: Vec<Arc<dyn ContentProvider>>,
    pub market: Option<Arc<dyn MarketData>>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub transcriber: Arc<dyn SubtitleTranscriber>,
    pub compositor: Arc<dyn Compositor>,
}

impl Capabilities {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        let mut content_providers: Vec<Arc<dyn ContentProvider>> = Vec::new();
        let provider = cfg.news_provider.trim().to_ascii_lowercase();
        if matches!(provider.as_str(), "auto" | "newsapi") && !cfg.news_api_key.is_empty() {
            content_providers.push(Arc::new(NewsApiProvider::new(
                client.clone(),
                cfg.news_api_key.clone(),
            )));
        }
        if matches!(provider.as_str(), "auto" | "websearch") {
            content_providers.push(Arc::new(DdgSearchProvider::new(client.clone())));
        }

        let market: Option<Arc<dyn MarketData>> = if cfg.use_market_data {
            Some(Arc::new(CoinGeckoMarket::new(
                client.clone(),
                cfg.coingecko_base_url.clone(),
            )))
        } else {
            None
        };

        Ok(Self {
            text: Arc::new(OpenAiClient::new(
                client.clone(),
                cfg.openai_api_key.clone(),
                cfg.openai_model_name.clone(),
                cfg.openai_base_url.clone(),
            )),
            content_providers,
            market,
            speech: Arc::new(ElevenLabsSynthesizer::new(
                client,
                cfg.elevenlabs_api_key.clone(),
                cfg.eleven_voice_id.clone(),
                cfg.eleven_model_id.clone(),
            )),
            transcriber: Arc::new(WhisperCli::new(
                cfg.whisper_bin.clone(),
                cfg.whisper_model.clone(),
            )),
            compositor: Arc::new(FfmpegCompositor::new(cfg.bgm_path())),
        })
    }
}
