//! Video and job state machines.
//!
//! Each state set is defined exactly once here and persisted as its
//! canonical lowercase string. Decoding goes through `sqlx::Type`, so an
//! unknown string in the database is a decode error rather than a silently
//! invented state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// VideoState
// ---------------------------------------------------------------------------

/// Lifecycle state of a video.
///
/// | From       | To         | Trigger                                  |
/// |------------|------------|------------------------------------------|
/// | —          | uploading  | upload init                              |
/// | uploading  | validating | upload complete (object present)         |
/// | validating | processing | pipeline entry                           |
/// | processing | indexed    | commit stage succeeds                    |
/// | validating | failed     | fatal validation failure                 |
/// | processing | failed     | fatal pipeline failure                   |
/// | non-terminal | deleted  | user delete                              |
///
/// `indexed`, `failed`, and `deleted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum VideoState {
    Uploading,
    Validating,
    Processing,
    Indexed,
    Failed,
    Deleted,
}

impl VideoState {
    /// Canonical lowercase string, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Validating => "validating",
            Self::Processing => "processing",
            Self::Indexed => "indexed",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Indexed | Self::Failed | Self::Deleted)
    }

    /// Whether the state machine permits `self -> to`.
    pub fn can_transition_to(&self, to: VideoState) -> bool {
        if to == Self::Deleted {
            return !self.is_terminal();
        }
        matches!(
            (self, to),
            (Self::Uploading, Self::Validating)
                | (Self::Validating, Self::Processing)
                | (Self::Processing, Self::Indexed)
                | (Self::Validating, Self::Failed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for VideoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(Self::Uploading),
            "validating" => Ok(Self::Validating),
            "processing" => Ok(Self::Processing),
            "indexed" => Ok(Self::Indexed),
            "failed" => Ok(Self::Failed),
            "deleted" => Ok(Self::Deleted),
            other => Err(CoreError::Internal(format!("Unknown video state '{other}'"))),
        }
    }
}

/// Validate a video state transition, returning a `Conflict` on violation.
pub fn validate_video_transition(from: VideoState, to: VideoState) -> Result<(), CoreError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Invalid video state transition {from} -> {to}"
        )))
    }
}

// ---------------------------------------------------------------------------
// JobStage
// ---------------------------------------------------------------------------

/// The ten pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum JobStage {
    UploadValidate,
    AudioExtract,
    Asr,
    SceneDetect,
    Align,
    EmbedText,
    SampleFrames,
    EmbedVision,
    BuildSidecar,
    Commit,
}

impl JobStage {
    /// All stages in execution order.
    pub const ALL: [JobStage; 10] = [
        Self::UploadValidate,
        Self::AudioExtract,
        Self::Asr,
        Self::SceneDetect,
        Self::Align,
        Self::EmbedText,
        Self::SampleFrames,
        Self::EmbedVision,
        Self::BuildSidecar,
        Self::Commit,
    ];

    /// Canonical lowercase string, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UploadValidate => "upload_validate",
            Self::AudioExtract => "audio_extract",
            Self::Asr => "asr",
            Self::SceneDetect => "scene_detect",
            Self::Align => "align",
            Self::EmbedText => "embed_text",
            Self::SampleFrames => "sample_frames",
            Self::EmbedVision => "embed_vision",
            Self::BuildSidecar => "build_sidecar",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// Execution state of a single pipeline job row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// A job in `pending` or `running` occupies its `(video, stage)` slot.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_flow_transitions_are_permitted() {
        assert!(VideoState::Uploading.can_transition_to(VideoState::Validating));
        assert!(VideoState::Validating.can_transition_to(VideoState::Processing));
        assert!(VideoState::Processing.can_transition_to(VideoState::Indexed));
        assert!(VideoState::Validating.can_transition_to(VideoState::Failed));
        assert!(VideoState::Processing.can_transition_to(VideoState::Failed));
    }

    #[test]
    fn terminal_states_admit_no_transitions() {
        for terminal in [VideoState::Indexed, VideoState::Failed, VideoState::Deleted] {
            for to in [
                VideoState::Uploading,
                VideoState::Validating,
                VideoState::Processing,
                VideoState::Indexed,
                VideoState::Failed,
                VideoState::Deleted,
            ] {
                assert!(
                    !terminal.can_transition_to(to),
                    "{terminal} -> {to} should be rejected"
                );
            }
        }
    }

    #[test]
    fn non_terminal_states_can_be_deleted() {
        assert!(VideoState::Uploading.can_transition_to(VideoState::Deleted));
        assert!(VideoState::Validating.can_transition_to(VideoState::Deleted));
        assert!(VideoState::Processing.can_transition_to(VideoState::Deleted));
    }

    #[test]
    fn skipping_states_is_rejected() {
        assert!(!VideoState::Uploading.can_transition_to(VideoState::Processing));
        assert!(!VideoState::Uploading.can_transition_to(VideoState::Indexed));
        assert!(!VideoState::Validating.can_transition_to(VideoState::Indexed));
        assert!(!VideoState::Uploading.can_transition_to(VideoState::Failed));
    }

    #[test]
    fn validate_transition_reports_conflict() {
        let err = validate_video_transition(VideoState::Indexed, VideoState::Processing)
            .expect_err("terminal transition must fail");
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn state_strings_round_trip() {
        for state in [
            VideoState::Uploading,
            VideoState::Validating,
            VideoState::Processing,
            VideoState::Indexed,
            VideoState::Failed,
            VideoState::Deleted,
        ] {
            assert_eq!(state.as_str().parse::<VideoState>().unwrap(), state);
        }
    }

    #[test]
    fn unknown_state_string_is_rejected() {
        assert!("archived".parse::<VideoState>().is_err());
        assert!("UPLOADING".parse::<VideoState>().is_err());
    }

    #[test]
    fn stage_order_matches_pipeline() {
        let names: Vec<&str> = JobStage::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            [
                "upload_validate",
                "audio_extract",
                "asr",
                "scene_detect",
                "align",
                "embed_text",
                "sample_frames",
                "embed_vision",
                "build_sidecar",
                "commit",
            ]
        );
    }

    #[test]
    fn active_job_states() {
        assert!(JobState::Pending.is_active());
        assert!(JobState::Running.is_active());
        assert!(!JobState::Completed.is_active());
        assert!(!JobState::Failed.is_active());
        assert!(!JobState::Cancelled.is_active());
    }
}
