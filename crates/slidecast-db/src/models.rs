//! Internal Rust models matching the database schema.
//!
//! The central piece here is [`JobStage`]: a closed state machine whose
//! single `can_transition` table is the only authority on which stage
//! changes are legal. Query functions derive their SQL guard lists from it,
//! so the store can never accept a transition the table rejects.

use chrono::{DateTime, Utc};
use slidecast_common::{AvatarOption, InputKind, JobId, Slide, StylePreset};
use serde::{Deserialize, Serialize};

/// Pipeline stage of a job.
///
/// `Pending` is the initial state; `Completed` and `Failed` are terminal.
/// Transitions run strictly forward along the pipeline order, with two
/// exceptions: any non-terminal stage may fail, and a failed or stuck job
/// may be reset to `Pending` by a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Pending,
    Parsing,
    GeneratingScript,
    GeneratingSlides,
    GeneratingAudio,
    ComposingVideo,
    Completed,
    Failed,
}

/// All stages, in pipeline order.
pub const ALL_STAGES: &[JobStage] = &[
    JobStage::Pending,
    JobStage::Parsing,
    JobStage::GeneratingScript,
    JobStage::GeneratingSlides,
    JobStage::GeneratingAudio,
    JobStage::ComposingVideo,
    JobStage::Completed,
    JobStage::Failed,
];

impl JobStage {
    /// Whether this stage is terminal (no further transitions except retry
    /// from `Failed`).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The authoritative transition table.
    pub fn can_transition(self, to: JobStage) -> bool {
        use JobStage::*;
        match (self, to) {
            // Strictly forward along the pipeline
            (Pending, Parsing)
            | (Parsing, GeneratingScript)
            | (GeneratingScript, GeneratingSlides)
            | (GeneratingSlides, GeneratingAudio)
            | (GeneratingAudio, ComposingVideo)
            | (ComposingVideo, Completed) => true,
            // Any non-terminal stage may fail
            (from, Failed) => !from.is_terminal(),
            // Retry: failed or stuck-in-progress back to pending
            (Failed, Pending) => true,
            (from, Pending) => !from.is_terminal() && from != Pending,
            _ => false,
        }
    }

    /// Stages from which `to` may legally be entered. Query functions turn
    /// this into `WHERE stage IN (...)` guards.
    pub fn predecessors(to: JobStage) -> Vec<JobStage> {
        ALL_STAGES
            .iter()
            .copied()
            .filter(|from| from.can_transition(to))
            .collect()
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Parsing => write!(f, "parsing"),
            Self::GeneratingScript => write!(f, "generating_script"),
            Self::GeneratingSlides => write!(f, "generating_slides"),
            Self::GeneratingAudio => write!(f, "generating_audio"),
            Self::ComposingVideo => write!(f, "composing_video"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "parsing" => Ok(Self::Parsing),
            "generating_script" => Ok(Self::GeneratingScript),
            "generating_slides" => Ok(Self::GeneratingSlides),
            "generating_audio" => Ok(Self::GeneratingAudio),
            "composing_video" => Ok(Self::ComposingVideo),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid job stage: {}", s)),
        }
    }
}

/// Video generation job model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub original_filename: String,
    pub input_path: String,
    pub input_kind: InputKind,
    pub style: StylePreset,
    pub avatar: AvatarOption,
    pub stage: JobStage,
    /// 0-100, monotone non-decreasing within one run.
    pub progress: i64,
    pub status_message: Option<String>,
    pub error_message: Option<String>,
    pub extracted_text: Option<String>,
    pub sections: Option<Vec<slidecast_common::Section>>,
    pub figures: Option<Vec<String>>,
    pub slide_script: Option<Vec<Slide>>,
    /// Index-aligned with `slide_script`.
    pub slide_images: Option<Vec<String>>,
    /// Directory holding per-slide narration clips.
    pub audio_path: Option<String>,
    pub video_path: Option<String>,
    pub video_duration_secs: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set only when the job reaches `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_roundtrip() {
        for stage in ALL_STAGES {
            assert_eq!(stage.to_string().parse::<JobStage>().unwrap(), *stage);
        }
    }

    #[test]
    fn test_forward_transitions() {
        assert!(JobStage::Pending.can_transition(JobStage::Parsing));
        assert!(JobStage::Parsing.can_transition(JobStage::GeneratingScript));
        assert!(JobStage::GeneratingScript.can_transition(JobStage::GeneratingSlides));
        assert!(JobStage::GeneratingSlides.can_transition(JobStage::GeneratingAudio));
        assert!(JobStage::GeneratingAudio.can_transition(JobStage::ComposingVideo));
        assert!(JobStage::ComposingVideo.can_transition(JobStage::Completed));
    }

    #[test]
    fn test_no_skipping_stages() {
        assert!(!JobStage::Pending.can_transition(JobStage::GeneratingScript));
        assert!(!JobStage::Parsing.can_transition(JobStage::ComposingVideo));
        assert!(!JobStage::GeneratingAudio.can_transition(JobStage::Completed));
    }

    #[test]
    fn test_no_backward_transitions() {
        assert!(!JobStage::GeneratingSlides.can_transition(JobStage::Parsing));
        assert!(!JobStage::ComposingVideo.can_transition(JobStage::GeneratingAudio));
    }

    #[test]
    fn test_any_non_terminal_may_fail() {
        for stage in ALL_STAGES {
            assert_eq!(stage.can_transition(JobStage::Failed), !stage.is_terminal());
        }
    }

    #[test]
    fn test_retry_transitions() {
        // Failed and stuck intermediate stages may reset to pending
        assert!(JobStage::Failed.can_transition(JobStage::Pending));
        assert!(JobStage::Parsing.can_transition(JobStage::Pending));
        assert!(JobStage::ComposingVideo.can_transition(JobStage::Pending));
        // Completed and pending may not
        assert!(!JobStage::Completed.can_transition(JobStage::Pending));
        assert!(!JobStage::Pending.can_transition(JobStage::Pending));
    }

    #[test]
    fn test_terminal_stages_are_dead_ends() {
        for to in ALL_STAGES {
            if *to != JobStage::Pending {
                assert!(!JobStage::Failed.can_transition(*to));
            }
            assert!(!JobStage::Completed.can_transition(*to));
        }
    }

    #[test]
    fn test_predecessors_match_table() {
        let preds = JobStage::predecessors(JobStage::Parsing);
        assert_eq!(preds, vec![JobStage::Pending]);

        let preds = JobStage::predecessors(JobStage::Pending);
        assert!(preds.contains(&JobStage::Failed));
        assert!(preds.contains(&JobStage::Parsing));
        assert!(!preds.contains(&JobStage::Completed));
        assert!(!preds.contains(&JobStage::Pending));
    }
}
