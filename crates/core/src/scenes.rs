//! Scene interval construction and transcript alignment.
//!
//! A scene is a half-open interval `[start_s, end_s)` bounded by detected
//! visual cuts. Intervals for one video are non-overlapping and cover
//! `[0, duration_s)` in order.

use serde::{Deserialize, Serialize};

/// Minimum scene length in seconds; shorter intervals merge into the next.
pub const MIN_SCENE_LEN_SECS: f64 = 1.0;

/// Cut timestamps closer than this are treated as the same cut.
const CUT_EPSILON: f64 = 1e-3;

/// A transcribed speech segment with absolute timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start_s: f64,
    pub end_s: f64,
    pub text: String,
}

/// A scene interval `[start_s, end_s)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneInterval {
    pub start_s: f64,
    pub end_s: f64,
}

impl SceneInterval {
    pub fn len_secs(&self) -> f64 {
        self.end_s - self.start_s
    }
}

/// Build scene intervals from detected cut timestamps.
///
/// Cuts outside `(0, duration_s)` are dropped, near-duplicates collapsed.
/// With no usable cuts the whole video is a single scene.
pub fn intervals_from_cuts(cuts: &[f64], duration_s: f64) -> Vec<SceneInterval> {
    let mut boundaries: Vec<f64> = cuts
        .iter()
        .copied()
        .filter(|&t| t > CUT_EPSILON && t < duration_s - CUT_EPSILON)
        .collect();
    boundaries.sort_by(|a, b| a.total_cmp(b));
    boundaries.dedup_by(|a, b| (*a - *b).abs() < CUT_EPSILON);

    let mut intervals = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0.0;
    for cut in boundaries {
        intervals.push(SceneInterval {
            start_s: start,
            end_s: cut,
        });
        start = cut;
    }
    intervals.push(SceneInterval {
        start_s: start,
        end_s: duration_s,
    });
    intervals
}

/// Merge intervals shorter than `min_len` into the next interval.
///
/// The final interval has no successor, so a short tail merges backward
/// into its predecessor instead. A single interval is always kept, however
/// short.
pub fn merge_short_scenes(intervals: Vec<SceneInterval>, min_len: f64) -> Vec<SceneInterval> {
    let mut merged: Vec<SceneInterval> = Vec::with_capacity(intervals.len());
    let mut carry_start: Option<f64> = None;

    let count = intervals.len();
    for (i, interval) in intervals.into_iter().enumerate() {
        let start = carry_start.take().unwrap_or(interval.start_s);
        let candidate = SceneInterval {
            start_s: start,
            end_s: interval.end_s,
        };

        if candidate.len_secs() < min_len && i + 1 < count {
            // Too short: extend the next interval backward to cover it.
            carry_start = Some(start);
            continue;
        }

        if candidate.len_secs() < min_len {
            // Short tail: merge into the previous interval if there is one.
            if let Some(prev) = merged.last_mut() {
                prev.end_s = candidate.end_s;
                continue;
            }
        }

        merged.push(candidate);
    }

    merged
}

/// Collect the transcript for a scene `[start_s, end_s)`.
///
/// Every segment overlapping the interval (`seg.start < end && seg.end >
/// start`) contributes its trimmed text, whitespace-joined in time order.
/// Segments spanning a cut appear in both neighboring scenes.
pub fn scene_transcript(segments: &[TranscriptSegment], start_s: f64, end_s: f64) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in segments {
        if segment.start_s < end_s && segment.end_s > start_s {
            let text = segment.text.trim();
            if !text.is_empty() {
                parts.push(text);
            }
        }
    }
    parts.join(" ")
}
