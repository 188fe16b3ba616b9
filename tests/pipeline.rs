//! End-to-end orchestrator runs against mock capabilities.

use ai_news_shorts::capability::{
    Capabilities, Compositor, ContentProvider, GenerationError, MarketData, SpeechSynthesizer,
    SubtitleTranscriber, TextGenerate,
};
use ai_news_shorts::content::{MarketSnapshot, SourceItem};
use ai_news_shorts::material::MaterialInfo;
use ai_news_shorts::params::VideoParams;
use ai_news_shorts::retry::RetryPolicy;
use ai_news_shorts::task::{self, TaskState, TaskTracker};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct MockText {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl MockText {
    fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompt(&self, index: usize) -> String {
        self.prompts.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl TextGenerate for MockText {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(GenerationError::EmptyResponse)
    }
}

struct MockNews {
    item: Option<SourceItem>,
    fail: bool,
}

#[async_trait]
impl ContentProvider for MockNews {
    fn name(&self) -> &'static str {
        "newsapi"
    }

    async fn fetch(&self, _subject: &str, _language: &str) -> Result<Option<SourceItem>> {
        if self.fail {
            anyhow::bail!("provider unreachable");
        }
        Ok(self.item.clone())
    }
}

struct MockMarket;

#[async_trait]
impl MarketData for MockMarket {
    async fn snapshot(&self, asset_id: &str) -> Result<Option<MarketSnapshot>> {
        if asset_id != "bitcoin" {
            return Ok(None);
        }
        Ok(Some(MarketSnapshot {
            price: Some(64250.0),
            change_24h: Some(2.1),
            change_7d: None,
            market_cap: Some(1.2e12),
            volume: Some(3.1e10),
        }))
    }
}

struct MockSpeech {
    write_file: bool,
}

#[async_trait]
impl SpeechSynthesizer for MockSpeech {
    async fn synthesize(
        &self,
        _text: &str,
        _voice: &str,
        out_path: &Path,
    ) -> Result<(), ai_news_shorts::capability::SynthesisError> {
        if self.write_file {
            std::fs::write(out_path, b"mp3-bytes").unwrap();
        }
        Ok(())
    }
}

struct MockTranscriber {
    srt: String,
    calls: AtomicUsize,
}

impl MockTranscriber {
    fn new(srt: &str) -> Arc<Self> {
        Arc::new(Self {
            srt: srt.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubtitleTranscriber for MockTranscriber {
    async fn transcribe(&self, _audio_path: &Path, out_srt_path: &Path) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::write(out_srt_path, &self.srt)?;
        Ok(true)
    }
}

struct MockCompositor {
    audio_duration: f64,
    combines: AtomicUsize,
    muxes: AtomicUsize,
    seen_materials: Mutex<Vec<MaterialInfo>>,
}

impl MockCompositor {
    fn new(audio_duration: f64) -> Arc<Self> {
        Arc::new(Self {
            audio_duration,
            combines: AtomicUsize::new(0),
            muxes: AtomicUsize::new(0),
            seen_materials: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Compositor for MockCompositor {
    async fn probe_duration(&self, _media_path: &Path) -> Result<f64> {
        if self.audio_duration <= 0.0 {
            anyhow::bail!("invalid duration");
        }
        Ok(self.audio_duration)
    }

    async fn combine_clips(
        &self,
        materials: &[MaterialInfo],
        _params: &VideoParams,
        out_path: &Path,
    ) -> Result<bool> {
        self.combines.fetch_add(1, Ordering::SeqCst);
        self.seen_materials
            .lock()
            .unwrap()
            .extend(materials.iter().cloned());
        std::fs::write(out_path, b"combined")?;
        Ok(true)
    }

    async fn mux_final(
        &self,
        _combined_path: &Path,
        _audio_path: &Path,
        _subtitle_path: Option<&Path>,
        _params: &VideoParams,
        out_path: &Path,
    ) -> Result<bool> {
        self.muxes.fetch_add(1, Ordering::SeqCst);
        std::fs::write(out_path, b"final")?;
        Ok(true)
    }
}

const THREE_SEGMENT_SRT: &str = "1\n\
00:00:00,000 --> 00:00:04,000\n\
bitcoin pushed higher overnight\n\
\n\
2\n\
00:00:04,000 --> 00:00:08,000\n\
etf inflows resumed across the market\n\
\n\
3\n\
00:00:08,000 --> 00:00:12,000\n\
analysts stayed cautious on leverage\n\
\n";

fn in_window_script() -> String {
    "bitcoin held steady near its recent highs today as traders weighed fresh inflation data. "
        .repeat(5)
}

fn media_library() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    for dir in ["bitcoin", "market"] {
        let dir_path = root.path().join(dir);
        std::fs::create_dir_all(&dir_path).unwrap();
        std::fs::write(dir_path.join("clip.mp4"), b"media").unwrap();
    }
    root
}

struct Harness {
    caps: Capabilities,
    text: Arc<MockText>,
    transcriber: Arc<MockTranscriber>,
    compositor: Arc<MockCompositor>,
}

fn harness(
    news: MockNews,
    text_responses: Vec<String>,
    write_audio: bool,
    audio_duration: f64,
) -> Harness {
    let text = MockText::new(text_responses);
    let transcriber = MockTranscriber::new(THREE_SEGMENT_SRT);
    let compositor = MockCompositor::new(audio_duration);
    let caps = Capabilities {
        text: text.clone(),
        content_providers: vec![Arc::new(news)],
        market: Some(Arc::new(MockMarket)),
        speech: Arc::new(MockSpeech {
            write_file: write_audio,
        }),
        transcriber: transcriber.clone(),
        compositor: compositor.clone(),
    };
    Harness {
        caps,
        text,
        transcriber,
        compositor,
    }
}

#[tokio::test]
async fn bitcoin_happy_path_completes_with_one_video() {
    let media = media_library();
    let tasks = tempfile::tempdir().unwrap();

    let news = MockNews {
        item: Some(SourceItem {
            title: "Bitcoin climbs as ETF inflows resume".to_string(),
            body: "Spot ETF products recorded a third week of inflows.".to_string(),
            url: "https://example.com/article".to_string(),
        }),
        fail: false,
    };
    let harness = harness(
        news,
        vec![
            in_window_script(),
            // Three terms so the segment count exercises one fallback pick:
            // "ledger review" matches neither media directory.
            r#"["bitcoin price", "crypto market", "ledger review"]"#.to_string(),
        ],
        true,
        42.0,
    );

    let params = VideoParams::new("bitcoin");
    let mut tracker = TaskTracker::new();

    let outcome = task::run_task(
        &harness.caps,
        &RetryPolicy::immediate(5),
        &params,
        &mut tracker,
        tasks.path(),
        media.path(),
        50,
    )
    .await
    .unwrap();

    assert_eq!(tracker.state(), TaskState::Completed);
    assert_eq!(tracker.progress(), 100.0);
    assert_eq!(outcome.final_videos.len(), 1);
    assert!(outcome.final_videos[0].ends_with("final-1.mp4"));
    assert!(outcome.combined_videos[0].ends_with("combined-1.mp4"));
    assert!(outcome.final_videos[0].exists());

    // The script prompt embedded the article and the resolved market line.
    let script_prompt = harness.text.prompt(0);
    assert!(script_prompt.contains("Bitcoin climbs as ETF inflows resume"));
    assert!(script_prompt.contains("[reference data]"));

    // One material per parsed segment, each clamped to the ceiling.
    let seen = harness.compositor.seen_materials.lock().unwrap();
    assert_eq!(seen.len(), 3);
    for material in seen.iter() {
        assert!(material.duration <= 6.0);
    }
    drop(seen);

    // Durable artifacts live under the task directory.
    let task_dir = tasks.path().join(tracker.id());
    assert!(task_dir.join("script.json").exists());
    assert!(task_dir.join("audio.mp3").exists());
    assert!(task_dir.join("subtitle.srt").exists());

    let script_json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(task_dir.join("script.json")).unwrap())
            .unwrap();
    assert_eq!(
        script_json["search_terms"].as_array().unwrap().len(),
        3
    );
    assert_eq!(script_json["params"]["video_subject"], "bitcoin");
    assert_eq!(harness.transcriber.calls(), 1);
}

#[tokio::test]
async fn missing_audio_file_fails_before_subtitle_work() {
    let media = media_library();
    let tasks = tempfile::tempdir().unwrap();

    // Every content provider fails; the script is still generated from
    // generic knowledge.
    let news = MockNews {
        item: None,
        fail: true,
    };
    let harness = harness(news, vec![in_window_script()], false, 42.0);

    let params = VideoParams::new("unknown-asset-zzz");
    let mut tracker = TaskTracker::new();

    let err = task::run_task(
        &harness.caps,
        &RetryPolicy::immediate(5),
        &params,
        &mut tracker,
        tasks.path(),
        media.path(),
        50,
    )
    .await
    .unwrap_err();

    assert_eq!(tracker.state(), TaskState::Failed);
    assert!(err.to_string().contains("no file"));
    assert!(tracker.error().is_some());
    assert_eq!(harness.transcriber.calls(), 0);
    assert_eq!(harness.compositor.combines.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn zero_audio_duration_fails_the_task() {
    let media = media_library();
    let tasks = tempfile::tempdir().unwrap();

    let news = MockNews {
        item: None,
        fail: false,
    };
    let harness = harness(
        news,
        vec![
            in_window_script(),
            r#"["bitcoin price"]"#.to_string(),
        ],
        true,
        0.0,
    );

    let params = VideoParams::new("bitcoin");
    let mut tracker = TaskTracker::new();

    let err = task::run_task(
        &harness.caps,
        &RetryPolicy::immediate(5),
        &params,
        &mut tracker,
        tasks.path(),
        media.path(),
        50,
    )
    .await
    .unwrap_err();

    assert_eq!(tracker.state(), TaskState::Failed);
    assert!(err.to_string().contains("zero duration"));
    assert_eq!(harness.transcriber.calls(), 0);
    assert_eq!(harness.compositor.muxes.load(Ordering::SeqCst), 0);
    assert!(tracker.progress() < 100.0);
}

#[tokio::test]
async fn empty_media_library_fails_the_task() {
    let media = tempfile::tempdir().unwrap();
    let tasks = tempfile::tempdir().unwrap();

    let news = MockNews {
        item: None,
        fail: false,
    };
    let harness = harness(
        news,
        vec![
            in_window_script(),
            r#"["bitcoin price"]"#.to_string(),
        ],
        true,
        42.0,
    );

    let params = VideoParams::new("bitcoin");
    let mut tracker = TaskTracker::new();

    let err = task::run_task(
        &harness.caps,
        &RetryPolicy::immediate(5),
        &params,
        &mut tracker,
        tasks.path(),
        media.path(),
        50,
    )
    .await
    .unwrap_err();

    assert_eq!(tracker.state(), TaskState::Failed);
    assert!(err.to_string().contains("no valid materials"));
    assert_eq!(harness.compositor.combines.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn multi_output_batch_returns_distinct_paths() {
    let media = media_library();
    let tasks = tempfile::tempdir().unwrap();

    let news = MockNews {
        item: None,
        fail: false,
    };
    let harness = harness(
        news,
        vec![
            in_window_script(),
            r#"["bitcoin price", "crypto market"]"#.to_string(),
        ],
        true,
        42.0,
    );

    let mut params = VideoParams::new("bitcoin");
    params.video_count = 2;
    let mut tracker = TaskTracker::new();

    let outcome = task::run_task(
        &harness.caps,
        &RetryPolicy::immediate(5),
        &params,
        &mut tracker,
        tasks.path(),
        media.path(),
        50,
    )
    .await
    .unwrap();

    assert_eq!(tracker.state(), TaskState::Completed);
    assert_eq!(outcome.final_videos.len(), 2);
    assert_ne!(outcome.final_videos[0], outcome.final_videos[1]);
    assert_eq!(harness.compositor.combines.load(Ordering::SeqCst), 2);
    assert_eq!(harness.compositor.muxes.load(Ordering::SeqCst), 2);
}
