use crate::subtitle::SubtitleSegment;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use unicode_normalization::UnicodeNormalization;
use walkdir::WalkDir;

/// Ceiling on how long any single material plays.
pub const MAX_CLIP_SECONDS: f64 = 6.0;

const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "png", "jpg", "jpeg"];

/// A visual asset assigned to one subtitle segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialInfo {
    pub url: PathBuf,
    pub duration: f64,
}

/// Case-folded, accent-decomposed form used for term/directory matching.
fn normalize(text: &str) -> String {
    text.to_lowercase().nfd().collect()
}

fn list_subdirectories(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect()
}

fn list_media_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect()
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Segment duration clamp: at most the fixed ceiling, at most the segment's
/// own span when that span is positive.
fn clamp_duration(segment_duration: f64) -> f64 {
    if segment_duration > 0.0 {
        MAX_CLIP_SECONDS.min(segment_duration)
    } else {
        MAX_CLIP_SECONDS
    }
}

/// Map each subtitle segment to a local clip, cycling through the terms.
///
/// A directory matches when any token of the normalized term is a substring
/// of the normalized directory name. No match degrades to a random
/// directory; an empty library yields no material for the segment. The
/// caller fails the task when the whole result set is empty.
pub fn select(
    terms: &[String],
    segments: &[SubtitleSegment],
    media_root: &Path,
) -> Vec<MaterialInfo> {
    if terms.is_empty() {
        warn!("no search terms available for material selection");
        return Vec::new();
    }

    let subdirs = list_subdirectories(media_root);
    if subdirs.is_empty() {
        warn!(root = %media_root.display(), "local media root has no subdirectories");
        return Vec::new();
    }
    info!(
        root = %media_root.display(),
        count = subdirs.len(),
        "scanning local media taxonomy"
    );

    let normalized_dirs: Vec<String> = subdirs
        .iter()
        .map(|dir| normalize(&dir_name(dir)))
        .collect();

    // Fresh entropy per call so picks stay uncorrelated across segments and
    // tasks.
    let mut rng = StdRng::from_entropy();
    let mut selected = Vec::new();

    for (index, segment) in segments.iter().enumerate() {
        let term = &terms[index % terms.len()];
        let normalized_term = normalize(term);

        let matching: Vec<&PathBuf> = subdirs
            .iter()
            .zip(&normalized_dirs)
            .filter(|(_, dir)| {
                normalized_term
                    .split_whitespace()
                    .any(|token| dir.contains(token))
            })
            .map(|(path, _)| path)
            .collect();

        let chosen_dir = if matching.is_empty() {
            let fallback = subdirs.choose(&mut rng);
            if let Some(dir) = fallback {
                warn!(
                    term = %term,
                    dir = %dir_name(dir),
                    "no matching media directory, using random fallback"
                );
            }
            fallback
        } else {
            matching.choose(&mut rng).copied()
        };

        let Some(chosen_dir) = chosen_dir else {
            continue;
        };

        let files = list_media_files(chosen_dir);
        let Some(file) = files.choose(&mut rng) else {
            warn!(dir = %dir_name(chosen_dir), "no eligible media files in directory");
            continue;
        };

        let duration = clamp_duration(segment.duration());
        info!(
            segment = index,
            file = %file.display(),
            duration,
            "material selected"
        );
        selected.push(MaterialInfo {
            url: file.clone(),
            duration,
        });
    }

    selected
}
