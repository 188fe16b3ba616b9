use crate::capability::Compositor;
use crate::material::MaterialInfo;
use crate::params::VideoParams;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::warn;

const XFADE_OVERLAP: f64 = 0.5;
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a"];

async fn run_cmd(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }

    let mut cmd = Command::new(&args[0]);
    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    let status = cmd.status().await.context("command execution failed")?;
    if !status.success() {
        return Err(anyhow::anyhow!("command failed: {:?}", args));
    }

    Ok(())
}

pub async fn ffprobe_duration_seconds(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe duration failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed for {}", path.display()));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if duration <= 0.1 {
        return Err(anyhow::anyhow!("invalid duration for {}", path.display()));
    }
    Ok(duration)
}

fn is_still_image(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| {
            matches!(
                ext.to_ascii_lowercase().as_str(),
                "png" | "jpg" | "jpeg"
            )
        })
        .unwrap_or(false)
}

/// `#RRGGBB` to the ASS `&HBBGGRR&` form used by force_style.
fn hex_to_ass_color(hex: &str) -> String {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return "&HFFFFFF&".to_string();
    }
    let (r, g, b) = (&digits[0..2], &digits[2..4], &digits[4..6]);
    format!("&H{}{}{}&", b, g, r).to_uppercase()
}

/// Escape a path for use inside the subtitles filter argument.
fn escape_filter_path(path: &Path) -> String {
    path.display()
        .to_string()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Start offset of each xfade transition for the given part durations.
fn xfade_offsets(durations: &[f64], overlap: f64) -> Vec<f64> {
    let mut offsets = Vec::new();
    let mut elapsed = 0.0;
    for (index, duration) in durations.iter().enumerate() {
        if index + 1 == durations.len() {
            break;
        }
        elapsed += duration - overlap;
        offsets.push(elapsed.max(0.0));
    }
    offsets
}

async fn list_files_with_exts(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return out;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(ext) = path.extension().and_then(OsStr::to_str) {
            if extensions.contains(&ext.to_ascii_lowercase().as_str()) {
                out.push(path);
            }
        }
    }
    out
}

/// Compositing engine backed by the ffmpeg/ffprobe binaries.
pub struct FfmpegCompositor {
    bgm_dir: PathBuf,
}

impl FfmpegCompositor {
    pub fn new(bgm_dir: PathBuf) -> Self {
        Self { bgm_dir }
    }

    /// Re-encode one material into a normalized, silent part capped at the
    /// clip duration limit.
    async fn encode_part(
        &self,
        material: &MaterialInfo,
        params: &VideoParams,
        out_part: &Path,
    ) -> Result<bool> {
        let duration = material.duration.min(params.video_clip_duration).max(0.1);
        let (width, height) = params.video_aspect.dimensions();
        let filter = format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black,fps=30,format=yuv420p",
            w = width,
            h = height
        );

        let mut args = vec![
            "ffmpeg".to_string(),
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
        ];
        if is_still_image(&material.url) {
            args.push("-loop".to_string());
            args.push("1".to_string());
        }
        args.extend([
            "-t".to_string(),
            format!("{duration:.3}"),
            "-i".to_string(),
            material.url.display().to_string(),
            "-vf".to_string(),
            filter,
            "-an".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-crf".to_string(),
            "22".to_string(),
            out_part.display().to_string(),
        ]);

        run_cmd(&args).await?;
        Ok(out_part.exists())
    }

    async fn concat_parts(&self, parts: &[PathBuf], list_path: &Path, out: &Path) -> Result<bool> {
        let mut list_file = fs::File::create(list_path).await?;
        for part in parts {
            list_file
                .write_all(format!("file '{}'\n", part.display()).as_bytes())
                .await?;
        }
        list_file.flush().await?;

        let args = vec![
            "ffmpeg".to_string(),
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            list_path.display().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-crf".to_string(),
            "22".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            out.display().to_string(),
        ];
        run_cmd(&args).await?;
        Ok(out.exists())
    }

    async fn xfade_parts(
        &self,
        parts: &[PathBuf],
        durations: &[f64],
        transition: &str,
        out: &Path,
    ) -> Result<bool> {
        let offsets = xfade_offsets(durations, XFADE_OVERLAP);

        let mut filter = String::new();
        let mut last_label = "0:v".to_string();
        for (index, offset) in offsets.iter().enumerate() {
            let next_label = format!("x{}", index + 1);
            filter.push_str(&format!(
                "[{last_label}][{}:v]xfade=transition={transition}:duration={XFADE_OVERLAP}:offset={offset:.3}[{next_label}];",
                index + 1
            ));
            last_label = next_label;
        }
        let filter = filter.trim_end_matches(';').to_string();

        let mut args = vec![
            "ffmpeg".to_string(),
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
        ];
        for part in parts {
            args.push("-i".to_string());
            args.push(part.display().to_string());
        }
        args.extend([
            "-filter_complex".to_string(),
            filter,
            "-map".to_string(),
            format!("[{last_label}]"),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-crf".to_string(),
            "22".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            out.display().to_string(),
        ]);
        run_cmd(&args).await?;
        Ok(out.exists())
    }

    async fn pick_bgm(&self) -> Option<PathBuf> {
        let songs = list_files_with_exts(&self.bgm_dir, AUDIO_EXTENSIONS).await;
        if songs.is_empty() {
            return None;
        }
        let mut rng = StdRng::from_entropy();
        songs.choose(&mut rng).cloned()
    }
}

#[async_trait]
impl Compositor for FfmpegCompositor {
    async fn probe_duration(&self, media_path: &Path) -> Result<f64> {
        ffprobe_duration_seconds(media_path).await
    }

    async fn combine_clips(
        &self,
        materials: &[MaterialInfo],
        params: &VideoParams,
        out_path: &Path,
    ) -> Result<bool> {
        if materials.is_empty() {
            return Ok(false);
        }

        let parent = out_path.parent().unwrap_or_else(|| Path::new("."));
        let parts_dir = tempfile::tempdir_in(parent).context("create parts dir")?;

        let mut parts = Vec::new();
        let mut durations = Vec::new();
        for (index, material) in materials.iter().enumerate() {
            let part = parts_dir.path().join(format!("part-{}.mp4", index + 1));
            if !self.encode_part(material, params, &part).await? {
                warn!(url = %material.url.display(), "failed to encode material, skipping");
                continue;
            }
            durations.push(material.duration.min(params.video_clip_duration));
            parts.push(part);
        }

        if parts.is_empty() {
            return Ok(false);
        }

        match params.video_transition_mode.xfade_name() {
            Some(transition) if parts.len() > 1 => {
                self.xfade_parts(&parts, &durations, transition, out_path)
                    .await
            }
            _ => {
                let list_path = parts_dir.path().join("concat.txt");
                self.concat_parts(&parts, &list_path, out_path).await
            }
        }
    }

    async fn mux_final(
        &self,
        combined_path: &Path,
        audio_path: &Path,
        subtitle_path: Option<&Path>,
        params: &VideoParams,
        out_path: &Path,
    ) -> Result<bool> {
        let bgm = if params.bgm_volume > 0.0 {
            self.pick_bgm().await
        } else {
            None
        };

        let mut args = vec![
            "ffmpeg".to_string(),
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            combined_path.display().to_string(),
            "-i".to_string(),
            audio_path.display().to_string(),
        ];
        if let Some(bgm_path) = &bgm {
            args.push("-i".to_string());
            args.push(bgm_path.display().to_string());
        }

        let mut filter = String::new();
        let video_label = if let Some(srt) = subtitle_path {
            let color = hex_to_ass_color(&params.text_fore_color);
            let outline = hex_to_ass_color(&params.stroke_color);
            filter.push_str(&format!(
                "[0:v]subtitles='{}':force_style='FontSize={},PrimaryColour={},OutlineColour={},Outline={:.1},Alignment=2'[v];",
                escape_filter_path(srt),
                params.font_size,
                color,
                outline,
                params.stroke_width
            ));
            "[v]"
        } else {
            "0:v"
        };

        let audio_label = if bgm.is_some() {
            filter.push_str(&format!(
                "[1:a]volume={:.2}[va];[2:a]volume={:.2}[ba];[va][ba]amix=inputs=2:duration=first:dropout_transition=2[a];",
                params.voice_volume, params.bgm_volume
            ));
            "[a]"
        } else {
            filter.push_str(&format!("[1:a]volume={:.2}[a];", params.voice_volume));
            "[a]"
        };
        let filter = filter.trim_end_matches(';').to_string();

        args.extend([
            "-filter_complex".to_string(),
            filter,
            "-map".to_string(),
            video_label.to_string(),
            "-map".to_string(),
            audio_label.to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-crf".to_string(),
            "22".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
            "-shortest".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            out_path.display().to_string(),
        ]);

        run_cmd(&args).await?;
        Ok(out_path.exists())
    }
}
