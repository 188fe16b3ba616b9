use crate::capability::SubtitleTranscriber;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tokio::process::Command;
use tracing::warn;

/// Speech-to-subtitles via the Whisper command line tool. The tool writes
/// `{audio stem}.srt` into the output directory; we move it onto the
/// requested path.
pub struct WhisperCli {
    bin: String,
    model: String,
}

impl WhisperCli {
    pub fn new(bin: String, model: String) -> Self {
        Self { bin, model }
    }
}

#[async_trait]
impl SubtitleTranscriber for WhisperCli {
    async fn transcribe(&self, audio_path: &Path, out_srt_path: &Path) -> Result<bool> {
        let out_dir = out_srt_path.parent().unwrap_or_else(|| Path::new("."));

        let status = Command::new(&self.bin)
            .arg(audio_path)
            .args(["--model", &self.model])
            .args(["--output_format", "srt"])
            .arg("--output_dir")
            .arg(out_dir)
            .status()
            .await
            .with_context(|| format!("failed to run transcriber '{}'", self.bin))?;

        if !status.success() {
            warn!(bin = %self.bin, "transcription exited with failure");
            return Ok(false);
        }

        let produced = audio_path
            .file_stem()
            .map(|stem| out_dir.join(format!("{}.srt", stem.to_string_lossy())))
            .filter(|path| path.exists());

        let Some(produced) = produced else {
            return Ok(false);
        };

        if produced != out_srt_path {
            fs::rename(&produced, out_srt_path)
                .await
                .with_context(|| format!("move subtitle to {}", out_srt_path.display()))?;
        }

        Ok(out_srt_path.exists())
    }
}
