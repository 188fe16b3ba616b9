use crate::capability::Compositor;
use crate::material::MaterialInfo;
use crate::params::{VideoConcatMode, VideoParams};
use crate::task::TaskTracker;
use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tracing::info;

/// Paths produced by one assembly run, indexed 1-based on disk.
#[derive(Debug, Default)]
pub struct AssemblyOutput {
    pub combined_videos: Vec<PathBuf>,
    pub final_videos: Vec<PathBuf>,
}

/// Combine and mux every requested output.
///
/// Progress starts from a base of 50 and advances in two equal increments
/// per output (combine, then final mux), reaching 100 only after the last
/// mux. Any sub-step failure aborts the whole batch.
pub async fn produce_all(
    compositor: &dyn Compositor,
    materials: &[MaterialInfo],
    audio_path: &Path,
    subtitle_path: Option<&Path>,
    params: &VideoParams,
    task_dir: &Path,
    tracker: &mut TaskTracker,
) -> Result<AssemblyOutput> {
    if materials.is_empty() {
        anyhow::bail!("no materials available for assembly");
    }

    let count = params.video_count.max(1);
    // A batch always gets randomized ordering so its outputs differ.
    let concat_mode = if count == 1 {
        params.video_concat_mode
    } else {
        VideoConcatMode::Random
    };

    let mut output = AssemblyOutput::default();
    let mut progress = 50.0_f32;
    let step = 50.0_f32 / count as f32 / 2.0;

    for index in 1..=count {
        let mut ordered: Vec<MaterialInfo> = materials.to_vec();
        if concat_mode == VideoConcatMode::Random {
            let mut rng = StdRng::from_entropy();
            ordered.shuffle(&mut rng);
        }

        let combined_path = task_dir.join(format!("combined-{index}.mp4"));
        info!(index, path = %combined_path.display(), "combining video");
        if !compositor
            .combine_clips(&ordered, params, &combined_path)
            .await?
        {
            anyhow::bail!("combining failed for output {index}");
        }
        progress += step;
        tracker.set_progress(progress);

        let final_path = task_dir.join(format!("final-{index}.mp4"));
        info!(index, path = %final_path.display(), "muxing final video");
        if !compositor
            .mux_final(&combined_path, audio_path, subtitle_path, params, &final_path)
            .await?
        {
            anyhow::bail!("final mux failed for output {index}");
        }
        progress += step;
        tracker.set_progress(progress);

        output.combined_videos.push(combined_path);
        output.final_videos.push(final_path);
    }

    Ok(output)
}
