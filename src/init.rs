use crate::config::Config;
use anyhow::Result;
use tokio::fs;
use tracing::info;

/// Create the directories a run expects to find.
pub async fn ensure_directories(cfg: &Config) -> Result<()> {
    for dir in [cfg.tasks_path(), cfg.media_path(), cfg.bgm_path()] {
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            info!("created directory: {}", dir.display());
        }
    }
    Ok(())
}

pub async fn check_ffmpeg() -> bool {
    match tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
