use serde::{Deserialize, Serialize};

/// Target frame geometry of the produced videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoAspect {
    #[default]
    Portrait,
    Landscape,
}

impl VideoAspect {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            VideoAspect::Portrait => (1080, 1920),
            VideoAspect::Landscape => (1920, 1080),
        }
    }
}

/// Ordering of the selected materials on the combined timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoConcatMode {
    Sequential,
    #[default]
    Random,
}

/// Transition rendered between consecutive clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoTransitionMode {
    #[default]
    None,
    Fade,
    SlideLeft,
    SlideRight,
}

impl VideoTransitionMode {
    /// ffmpeg xfade transition name, or None for a plain cut.
    pub fn xfade_name(self) -> Option<&'static str> {
        match self {
            VideoTransitionMode::None => None,
            VideoTransitionMode::Fade => Some("fade"),
            VideoTransitionMode::SlideLeft => Some("slideleft"),
            VideoTransitionMode::SlideRight => Some("slideright"),
        }
    }
}

/// Read-only parameter bundle for one task. Every pipeline stage consumes
/// it; none owns or mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoParams {
    pub video_subject: String,
    #[serde(default = "default_language")]
    pub video_language: String,
    #[serde(default = "default_paragraph_number")]
    pub paragraph_number: usize,
    #[serde(default)]
    pub voice_name: String,
    #[serde(default = "default_voice_rate")]
    pub voice_rate: f32,
    #[serde(default = "default_true")]
    pub subtitle_enabled: bool,
    #[serde(default)]
    pub video_aspect: VideoAspect,
    #[serde(default)]
    pub video_concat_mode: VideoConcatMode,
    #[serde(default)]
    pub video_transition_mode: VideoTransitionMode,
    #[serde(default = "default_clip_duration")]
    pub video_clip_duration: f64,
    #[serde(default = "default_video_count")]
    pub video_count: u32,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_fore_color")]
    pub text_fore_color: String,
    #[serde(default = "default_stroke_color")]
    pub stroke_color: String,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f32,
    #[serde(default = "default_voice_volume")]
    pub voice_volume: f32,
    #[serde(default = "default_bgm_volume")]
    pub bgm_volume: f32,
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_paragraph_number() -> usize {
    5
}

fn default_voice_rate() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_clip_duration() -> f64 {
    6.0
}

fn default_video_count() -> u32 {
    1
}

fn default_font_size() -> u32 {
    60
}

fn default_fore_color() -> String {
    "#FFFFFF".to_string()
}

fn default_stroke_color() -> String {
    "#000000".to_string()
}

fn default_stroke_width() -> f32 {
    1.5
}

fn default_voice_volume() -> f32 {
    1.0
}

fn default_bgm_volume() -> f32 {
    0.2
}

impl VideoParams {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            video_subject: subject.into(),
            video_language: default_language(),
            paragraph_number: default_paragraph_number(),
            voice_name: String::new(),
            voice_rate: default_voice_rate(),
            subtitle_enabled: true,
            video_aspect: VideoAspect::default(),
            video_concat_mode: VideoConcatMode::default(),
            video_transition_mode: VideoTransitionMode::default(),
            video_clip_duration: default_clip_duration(),
            video_count: default_video_count(),
            font_size: default_font_size(),
            text_fore_color: default_fore_color(),
            stroke_color: default_stroke_color(),
            stroke_width: default_stroke_width(),
            voice_volume: default_voice_volume(),
            bgm_volume: default_bgm_volume(),
        }
    }
}
