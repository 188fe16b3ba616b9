use crate::assembly;
use crate::capability::Capabilities;
use crate::content;
use crate::material;
use crate::params::VideoParams;
use crate::retry::RetryPolicy;
use crate::script;
use crate::subtitle::{self, SubtitleSegment};
use crate::terms;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// Lifecycle state of one task. Terminal states are reached exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// Owner of a task's lifecycle. Stages receive it explicitly; only the
/// orchestrator and the assembly pipeline it drives may transition state or
/// advance the progress counter.
#[derive(Debug)]
pub struct TaskTracker {
    id: String,
    state: TaskState,
    progress: f32,
    error: Option<String>,
    created_at: DateTime<Utc>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: TaskState::Pending,
            progress: 0.0,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn begin(&mut self) {
        if self.state == TaskState::Pending {
            self.state = TaskState::Processing;
        }
    }

    /// Monotonic progress in [0, 100]. Updates outside a processing run are
    /// ignored.
    pub fn set_progress(&mut self, percent: f32) {
        if self.state != TaskState::Processing {
            return;
        }
        let clamped = percent.clamp(0.0, 100.0);
        if clamped > self.progress {
            self.progress = clamped;
        }
    }

    pub fn complete(&mut self) {
        if self.state == TaskState::Processing {
            self.state = TaskState::Completed;
            self.progress = 100.0;
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        if !self.state.is_terminal() {
            self.state = TaskState::Failed;
            self.error = Some(message.into());
        }
    }

    /// Record a hard stage failure and hand the error back for propagation.
    pub fn abort(&mut self, err: anyhow::Error) -> anyhow::Error {
        self.fail(format!("{err:#}"));
        err
    }
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Durable results of a completed task.
#[derive(Debug)]
pub struct TaskOutcome {
    pub task_id: String,
    pub combined_videos: Vec<PathBuf>,
    pub final_videos: Vec<PathBuf>,
}

#[derive(Serialize)]
struct ScriptData<'a> {
    script: &'a str,
    search_terms: &'a [String],
    params: &'a VideoParams,
    created_at: String,
}

async fn save_script_data(
    task_dir: &Path,
    script: &str,
    terms: &[String],
    params: &VideoParams,
    created_at: DateTime<Utc>,
) -> Result<()> {
    let data = ScriptData {
        script,
        search_terms: terms,
        params,
        created_at: created_at.to_rfc3339(),
    };
    let path = task_dir.join("script.json");
    let json = serde_json::to_string_pretty(&data).context("serialize script data")?;
    fs::write(&path, json)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Coarse selection guidance used when no subtitle segments are available:
/// one span per clip-duration slice of the narration.
fn coarse_segments(audio_duration: f64, clip_duration: f64) -> Vec<SubtitleSegment> {
    let span = if clip_duration > 0.0 { clip_duration } else { material::MAX_CLIP_SECONDS };
    let count = (audio_duration / span).ceil().max(1.0) as usize;
    (0..count)
        .map(|i| {
            let start = i as f64 * span;
            SubtitleSegment {
                start,
                end: (start + span).min(audio_duration),
                text: String::new(),
            }
        })
        .collect()
}

/// Run the full generation pipeline for one task.
///
/// Stages execute strictly in sequence; the first hard failure marks the
/// task failed and aborts everything downstream. The returned outcome lists
/// exactly `params.video_count` final videos.
pub async fn run_task(
    caps: &Capabilities,
    policy: &RetryPolicy,
    params: &VideoParams,
    tracker: &mut TaskTracker,
    tasks_root: &Path,
    media_root: &Path,
    target_seconds: u32,
) -> Result<TaskOutcome> {
    tracker.begin();
    info!(task_id = tracker.id(), subject = %params.video_subject, "task started");

    let task_dir = tasks_root.join(tracker.id());
    if let Err(err) = fs::create_dir_all(&task_dir).await {
        return Err(tracker.abort(
            anyhow::Error::from(err).context(format!("create task dir {}", task_dir.display())),
        ));
    }

    // Stage 1: content acquisition with provider fallback.
    let source = content::select(
        &caps.content_providers,
        &params.video_subject,
        &params.video_language,
    )
    .await;
    let market_line = content::market_line(caps.market.as_ref(), &params.video_subject).await;

    // Stage 2: constrained script generation.
    let script = match script::generate(
        caps.text.as_ref(),
        policy,
        &params.video_subject,
        &source,
        &market_line,
        target_seconds,
    )
    .await
    {
        Ok(script) => script,
        Err(err) => return Err(tracker.abort(err)),
    };

    // Stage 3: search terms (degrades, never fails).
    let term_amount = params.paragraph_number.max(1);
    let terms = terms::generate(
        caps.text.as_ref(),
        policy,
        &params.video_subject,
        &script,
        term_amount,
    )
    .await;

    if let Err(err) =
        save_script_data(&task_dir, &script, &terms, params, tracker.created_at()).await
    {
        return Err(tracker.abort(err));
    }

    // Stage 4: audio synthesis. Missing or empty audio kills the task.
    let audio_path = task_dir.join("audio.mp3");
    if let Err(err) = caps
        .speech
        .synthesize(&script, &params.voice_name, &audio_path)
        .await
    {
        return Err(tracker.abort(anyhow::Error::from(err)));
    }
    if fs::metadata(&audio_path).await.is_err() {
        return Err(tracker.abort(anyhow::anyhow!(
            "audio synthesis produced no file at {}",
            audio_path.display()
        )));
    }
    let audio_duration = caps
        .compositor
        .probe_duration(&audio_path)
        .await
        .unwrap_or(0.0)
        .ceil();
    if audio_duration <= 0.0 {
        return Err(tracker.abort(anyhow::anyhow!("synthesized audio has zero duration")));
    }
    info!(audio_duration, "audio ready");

    // Stage 5: subtitles, best-effort.
    let mut subtitle_path: Option<PathBuf> = None;
    if params.subtitle_enabled {
        let srt_path = task_dir.join("subtitle.srt");
        match caps.transcriber.transcribe(&audio_path, &srt_path).await {
            Ok(true) if fs::metadata(&srt_path).await.is_ok() => {
                if let Err(err) = subtitle::correct(&srt_path, &script) {
                    warn!("subtitle correction failed: {err:#}");
                }
                subtitle_path = Some(srt_path);
            }
            Ok(_) => warn!("transcription produced no subtitle file"),
            Err(err) => warn!("transcription failed: {err:#}"),
        }
    }

    let mut segments = subtitle_path
        .as_deref()
        .map(subtitle::parse_file)
        .unwrap_or_default();
    if segments.is_empty() {
        segments = coarse_segments(audio_duration, params.video_clip_duration);
        warn!(
            count = segments.len(),
            "no subtitle segments available, using coarse selection spans"
        );
    }

    // Stage 6: material selection. An entirely empty set is a hard failure.
    let materials = material::select(&terms, &segments, media_root);
    if materials.is_empty() {
        return Err(tracker.abort(anyhow::anyhow!(
            "no valid materials found under {}",
            media_root.display()
        )));
    }

    // Stage 7: assembly, with task-local progress reporting.
    let assembled = match assembly::produce_all(
        caps.compositor.as_ref(),
        &materials,
        &audio_path,
        subtitle_path.as_deref(),
        params,
        &task_dir,
        tracker,
    )
    .await
    {
        Ok(assembled) => assembled,
        Err(err) => return Err(tracker.abort(err)),
    };

    tracker.complete();
    info!(
        task_id = tracker.id(),
        outputs = assembled.final_videos.len(),
        "task completed"
    );

    Ok(TaskOutcome {
        task_id: tracker.id().to_string(),
        combined_videos: assembled.combined_videos,
        final_videos: assembled.final_videos,
    })
}
