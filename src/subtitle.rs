use crate::script::collapse_whitespace;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// One timed span of subtitle text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl SubtitleSegment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// `HH:MM:SS,mmm` (or `.mmm`) to fractional seconds.
fn srt_time_to_seconds(ts: &str) -> Option<f64> {
    let mut parts = ts.trim().split([':', ',', '.']);
    let hh: f64 = parts.next()?.trim().parse().ok()?;
    let mm: f64 = parts.next()?.trim().parse().ok()?;
    let ss: f64 = parts.next()?.trim().parse().ok()?;
    let ms: f64 = match parts.next() {
        Some(raw) => raw.trim().parse().ok()?,
        None => 0.0,
    };
    Some(hh * 3600.0 + mm * 60.0 + ss + ms / 1000.0)
}

fn strip_markup(line: &str) -> String {
    line.replace("<i>", "").replace("</i>", "")
}

/// Parse a sequential timed-text file into ordered segments.
///
/// Groups are (index line, time-range line, one or more text lines, blank
/// separator). Malformed groups are skipped; a missing or unreadable file
/// yields an empty sequence, never an error. Callers treat an empty result
/// as "no segment-level guidance available".
pub fn parse_file(path: &Path) -> Vec<SubtitleSegment> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    parse_str(&content)
}

pub fn parse_str(content: &str) -> Vec<SubtitleSegment> {
    let lines: Vec<&str> = content.lines().collect();
    let mut segments: Vec<SubtitleSegment> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();
        if line.is_empty() || line.parse::<u64>().is_err() {
            i += 1;
            continue;
        }

        let Some(time_line) = lines.get(i + 1) else {
            break;
        };
        let Some((start_raw, end_raw)) = time_line.split_once("-->") else {
            i += 1;
            continue;
        };
        let (Some(start), Some(end)) = (
            srt_time_to_seconds(start_raw),
            srt_time_to_seconds(end_raw),
        ) else {
            i += 2;
            continue;
        };

        let mut text_lines = Vec::new();
        let mut j = i + 2;
        while j < lines.len() && !lines[j].trim().is_empty() {
            text_lines.push(strip_markup(lines[j].trim()));
            j += 1;
        }

        let text = text_lines.join(" ");
        let monotonic = segments.last().map(|prev| start >= prev.start).unwrap_or(true);
        if end > start && monotonic && !text.is_empty() {
            segments.push(SubtitleSegment { start, end, text });
        }

        i = j + 1;
    }

    segments
}

/// Best-effort in-place correction of a generated subtitle file against the
/// narration script: strips markup, collapses whitespace inside each text
/// line, and warns when the subtitle text diverges badly from the script.
/// Never fails the pipeline over subtitle quality.
pub fn correct(path: &Path, script: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read subtitle file: {}", path.display()))?;

    let mut out = String::with_capacity(content.len());
    for line in content.lines() {
        let trimmed = line.trim_end();
        if trimmed.trim().is_empty()
            || trimmed.trim().parse::<u64>().is_ok()
            || trimmed.contains("-->")
        {
            out.push_str(trimmed);
        } else {
            out.push_str(&collapse_whitespace(&strip_markup(trimmed)));
        }
        out.push('\n');
    }

    let subtitle_chars: usize = parse_str(&out)
        .iter()
        .map(|segment| segment.text.chars().count())
        .sum();
    let script_chars = script.chars().count();
    if script_chars > 0 {
        let ratio = subtitle_chars as f64 / script_chars as f64;
        if !(0.5..=1.5).contains(&ratio) {
            warn!(
                subtitle_chars,
                script_chars, "subtitle text diverges from the narration script"
            );
        }
    }

    std::fs::write(path, out)
        .with_context(|| format!("write subtitle file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\n\
00:00:00,000 --> 00:00:02,500\n\
bitcoin pushed higher overnight\n\
\n\
2\n\
00:00:02,500 --> 00:00:05,000\n\
as ETF inflows\n\
resumed across the board\n\
\n\
3\n\
00:00:05,200 --> 00:00:09,750\n\
analysts stayed cautious\n";

    #[test]
    fn parses_groups_with_multiline_text() {
        let segments = parse_str(SAMPLE);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].end, 2.5);
        assert_eq!(segments[1].text, "as ETF inflows resumed across the board");
        assert_eq!(segments[2].start, 5.2);
        assert_eq!(segments[2].end, 9.75);
    }

    #[test]
    fn segments_are_time_ordered() {
        let segments = parse_str(SAMPLE);
        for segment in &segments {
            assert!(segment.start < segment.end);
        }
        for pair in segments.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
    }

    #[test]
    fn malformed_groups_are_skipped() {
        let content = "1\n\
00:00:00,000 --> 00:00:02,000\n\
good one\n\
\n\
2\n\
not a time line\n\
orphan text\n\
\n\
3\n\
00:00:04,000 --> 00:00:03,000\n\
end before start\n\
\n\
4\n\
00:00:05,000 --> 00:00:06,000\n\
<i>good two</i>\n";
        let segments = parse_str(content);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].text, "good two");
    }

    #[test]
    fn missing_file_yields_empty() {
        assert!(parse_file(Path::new("does/not/exist.srt")).is_empty());
    }

    #[test]
    fn timestamps_parse_both_separators() {
        assert_eq!(srt_time_to_seconds("00:01:02,500"), Some(62.5));
        assert_eq!(srt_time_to_seconds("01:00:00.250"), Some(3600.25));
        assert_eq!(srt_time_to_seconds("garbage"), None);
    }

    #[test]
    fn correct_rewrites_text_lines_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subtitle.srt");
        std::fs::write(
            &path,
            "1\n00:00:00,000 --> 00:00:02,000\n<i>hello   there</i>\n\n",
        )
        .unwrap();

        correct(&path, "hello there").unwrap();

        let segments = parse_file(&path);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "hello there");
    }
}
