//! FFmpeg/FFprobe command wrappers for the indexing pipeline.
//!
//! Media probing, audio extraction, frame sampling, and scene-cut
//! detection all shell out to the ffmpeg binaries so no decoder state
//! lives in this process.

use std::path::Path;

use serde::Deserialize;

/// Default scene-change score threshold for the ffmpeg `scene` filter
/// (scores are in `0..1`; lower is more sensitive).
pub const DEFAULT_SCENE_THRESHOLD: f64 = 0.3;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("media file not found: {0}")]
    MediaNotFound(String),
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub index: i32,
    pub codec_name: Option<String>,
    pub codec_type: Option<String>,
    pub duration: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
    pub size: Option<String>,
    pub format_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run `ffprobe` on a media file and return the parsed JSON output.
///
/// A non-zero exit means the probe could not decode the file at all.
pub async fn probe_media(path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    if !path.exists() {
        return Err(FfmpegError::MediaNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

/// Transcode a video's audio track to mono 16 kHz signed 16-bit PCM WAV.
pub async fn extract_audio_wav(video_path: &Path, audio_path: &Path) -> Result<(), FfmpegError> {
    let output = tokio::process::Command::new("ffmpeg")
        .arg("-i")
        .arg(video_path)
        .args(["-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1", "-y"])
        .arg(audio_path)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(())
}

/// Decode a single frame at `timestamp_secs` as JPEG bytes.
pub async fn extract_frame_jpeg(
    video_path: &Path,
    timestamp_secs: f64,
) -> Result<Vec<u8>, FfmpegError> {
    let output = tokio::process::Command::new("ffmpeg")
        .args(["-ss", &format!("{timestamp_secs:.3}"), "-i"])
        .arg(video_path)
        .args(["-frames:v", "1", "-f", "image2", "-c:v", "mjpeg", "pipe:1"])
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() || output.stdout.is_empty() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(output.stdout)
}

/// Detect scene-change timestamps with the ffmpeg `scene` score filter.
///
/// Frames whose content score exceeds `threshold` are selected and logged
/// by `showinfo`; the returned timestamps are the cut points in seconds,
/// in presentation order. An empty result means no cuts were found.
pub async fn detect_scene_cuts(
    video_path: &Path,
    threshold: f64,
) -> Result<Vec<f64>, FfmpegError> {
    let filter = format!("select='gt(scene,{threshold})',showinfo");
    let output = tokio::process::Command::new("ffmpeg")
        .arg("-i")
        .arg(video_path)
        .args(["-vf", &filter, "-an", "-f", "null", "-"])
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    // showinfo logs to stderr.
    let stderr = String::from_utf8_lossy(&output.stderr);
    Ok(parse_showinfo_timestamps(&stderr))
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Find the first stream of the given codec type in the probe output.
fn first_stream_of_type<'a>(
    probe: &'a FfprobeOutput,
    codec_type: &str,
) -> Option<&'a FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some(codec_type))
}

/// Parse the media duration in seconds from ffprobe output.
///
/// Prefers the format-level duration, falling back to the first video
/// stream. Returns `None` when neither is present or parseable.
pub fn parse_duration(probe: &FfprobeOutput) -> Option<f64> {
    if let Some(d) = &probe.format.duration {
        if let Ok(secs) = d.parse::<f64>() {
            return Some(secs);
        }
    }
    first_stream_of_type(probe, "video")
        .and_then(|s| s.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
}

/// Whether the probed media contains a video stream.
pub fn has_video_stream(probe: &FfprobeOutput) -> bool {
    first_stream_of_type(probe, "video").is_some()
}

/// Whether the probed media contains an audio stream.
pub fn has_audio_stream(probe: &FfprobeOutput) -> bool {
    first_stream_of_type(probe, "audio").is_some()
}

/// Extract `pts_time` values from ffmpeg `showinfo` stderr output.
pub fn parse_showinfo_timestamps(stderr: &str) -> Vec<f64> {
    let mut timestamps = Vec::new();
    for line in stderr.lines() {
        if !line.contains("Parsed_showinfo") {
            continue;
        }
        if let Some(ts) = parse_pts_time(line) {
            timestamps.push(ts);
        }
    }
    timestamps
}

/// Parse the `pts_time:` field out of a single showinfo line.
fn parse_pts_time(line: &str) -> Option<f64> {
    let idx = line.find("pts_time:")?;
    let rest = &line[idx + "pts_time:".len()..];
    let token: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    token.parse::<f64>().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(format_duration: Option<&str>, streams: Vec<FfprobeStream>) -> FfprobeOutput {
        FfprobeOutput {
            streams,
            format: FfprobeFormat {
                duration: format_duration.map(|s| s.to_string()),
                size: None,
                format_name: None,
            },
        }
    }

    fn stream(codec_type: &str, duration: Option<&str>) -> FfprobeStream {
        FfprobeStream {
            index: 0,
            codec_name: Some("h264".into()),
            codec_type: Some(codec_type.into()),
            duration: duration.map(|s| s.to_string()),
        }
    }

    #[test]
    fn duration_prefers_format_level() {
        let p = probe(Some("124.5"), vec![stream("video", Some("60.0"))]);
        assert!((parse_duration(&p).unwrap() - 124.5).abs() < 1e-9);
    }

    #[test]
    fn duration_falls_back_to_video_stream() {
        let p = probe(None, vec![stream("video", Some("60.0"))]);
        assert!((parse_duration(&p).unwrap() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn missing_duration_is_none() {
        let p = probe(None, vec![stream("video", None)]);
        assert!(parse_duration(&p).is_none());
    }

    #[test]
    fn stream_type_detection() {
        let p = probe(None, vec![stream("video", None), stream("audio", None)]);
        assert!(has_video_stream(&p));
        assert!(has_audio_stream(&p));

        let silent = probe(None, vec![stream("video", None)]);
        assert!(!has_audio_stream(&silent));
    }

    #[test]
    fn parses_showinfo_pts_times() {
        let stderr = "\
[Parsed_showinfo_1 @ 0x5555] n:   0 pts:  12800 pts_time:4.26667 duration:512\n\
some unrelated ffmpeg banner line\n\
[Parsed_showinfo_1 @ 0x5555] n:   1 pts:  25600 pts_time:8.53333 duration:512\n";
        let timestamps = parse_showinfo_timestamps(stderr);
        assert_eq!(timestamps.len(), 2);
        assert!((timestamps[0] - 4.26667).abs() < 1e-5);
        assert!((timestamps[1] - 8.53333).abs() < 1e-5);
    }

    #[test]
    fn showinfo_lines_without_pts_time_are_skipped() {
        let stderr = "[Parsed_showinfo_1 @ 0x5555] config in time_base: 1/3000\n";
        assert!(parse_showinfo_timestamps(stderr).is_empty());
    }
}
