use crate::capability::{SpeechSynthesizer, SynthesisError};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// ElevenLabs text-to-speech client.
pub struct ElevenLabsSynthesizer {
    client: Client,
    api_key: String,
    default_voice_id: String,
    model_id: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(
        client: Client,
        api_key: String,
        default_voice_id: String,
        model_id: String,
    ) -> Self {
        Self {
            client,
            api_key,
            default_voice_id,
            model_id,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        out_path: &Path,
    ) -> Result<(), SynthesisError> {
        let voice_id = if voice.trim().is_empty() {
            &self.default_voice_id
        } else {
            voice
        };
        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{voice_id}?output_format=mp3_44100_128"
        );

        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
        });

        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(400)
                .collect();
            return Err(SynthesisError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(SynthesisError::NoAudio);
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(out_path, &bytes).await?;

        Ok(())
    }
}
