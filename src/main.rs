use ai_news_shorts::capability::Capabilities;
use ai_news_shorts::config::Config;
use ai_news_shorts::init;
use ai_news_shorts::params::{VideoAspect, VideoParams};
use ai_news_shorts::retry::RetryPolicy;
use ai_news_shorts::task::{self, TaskTracker};
use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "ai-news-shorts", about = "Generate narrated news shorts for a subject")]
struct Args {
    /// Subject keyword driving content search and script generation
    subject: String,

    /// Number of final videos to produce
    #[arg(long, default_value_t = 1)]
    count: u32,

    /// Content/search language tag
    #[arg(long, default_value = "en-US")]
    language: String,

    /// Voice id for speech synthesis (defaults to the configured voice)
    #[arg(long, default_value = "")]
    voice: String,

    /// Render landscape output instead of portrait
    #[arg(long)]
    landscape: bool,

    /// Skip subtitle transcription and burn-in
    #[arg(long)]
    no_subtitles: bool,

    /// Path to the configuration file
    #[arg(long, default_value = "config.json")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config).await?;

    init::ensure_directories(&cfg).await?;
    if !init::check_ffmpeg().await {
        warn!("ffmpeg not found in PATH; assembly will fail without it");
    }

    let caps = Capabilities::from_config(&cfg)?;
    let policy = RetryPolicy::standard();

    let mut params = VideoParams::new(&args.subject);
    params.video_language = args.language;
    params.video_count = args.count.max(1);
    params.voice_name = args.voice;
    params.subtitle_enabled = !args.no_subtitles;
    if args.landscape {
        params.video_aspect = VideoAspect::Landscape;
    }

    let mut tracker = TaskTracker::new();
    info!(task_id = tracker.id(), "starting generation");

    match task::run_task(
        &caps,
        &policy,
        &params,
        &mut tracker,
        &cfg.tasks_path(),
        &cfg.media_path(),
        cfg.target_duration_s,
    )
    .await
    {
        Ok(outcome) => {
            for path in &outcome.final_videos {
                println!("{}", path.display());
            }
            Ok(())
        }
        Err(err) => {
            error!(
                task_id = tracker.id(),
                "generation failed: {err:#}"
            );
            std::process::exit(1);
        }
    }
}
