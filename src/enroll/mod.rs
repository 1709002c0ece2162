//! Per-meeting enrollment: diarized clusters in, committed profile samples out.
//!
//! Types for the meeting record that the workflow persists between stages.
//! The record is the resume point: every completed stage is written to disk
//! before the state advances, so an interrupted run picks up where it left
//! off instead of repeating minutes-long external calls.

pub mod batch;
pub mod workflow;

pub use workflow::EnrollmentWorkflow;

use crate::embedding::Embedding;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stage of a meeting's enrollment. Strictly ordered; a meeting never moves
/// backwards except by re-ingesting at `Diarized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MeetingState {
    Unprocessed,
    Diarized,
    Embedded,
    Labeled,
    Committed,
}

/// One diarization segment as delivered by the external diarizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiarizedSegment {
    pub speaker_label: String,
    pub start_secs: f64,
    pub end_secs: f64,
}

impl DiarizedSegment {
    pub fn duration(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// A time window within the meeting audio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TimeWindow {
    pub fn duration(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Aggregated per-speaker view of the diarization output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerCluster {
    pub label: String,
    pub segments: u32,
    pub total_secs: f64,
    /// All speech windows for this speaker, in meeting order.
    pub windows: Vec<TimeWindow>,
    /// Averaged speaker embedding, set by the embedding stage.
    pub embedding: Option<Embedding>,
}

/// Resolution of one detected speaker: enroll under an entity, or skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum LabelDecision {
    Assign { slug: String },
    Skip,
}

/// Outcome of committing one speaker mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
    Applied,
    AlreadyApplied,
    Skipped,
    Failed { reason: String },
}

/// Per-speaker line of a commit report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitEntry {
    pub speaker_label: String,
    pub entity: Option<String>,
    pub outcome: CommitOutcome,
}

/// Result of committing a meeting's labeled speakers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitReport {
    pub meeting_id: String,
    pub entries: Vec<CommitEntry>,
    pub committed_at: DateTime<Utc>,
}

impl CommitReport {
    /// Number of mappings that failed.
    pub fn failed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, CommitOutcome::Failed { .. }))
            .count()
    }

    /// Number of mappings newly written this run.
    pub fn applied(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == CommitOutcome::Applied)
            .count()
    }

    /// True when no mapping failed.
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }
}

/// Persisted state of one meeting's enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub schema_version: String,
    pub meeting_id: String,
    /// Opaque reference to the meeting audio, passed through to the extractor.
    pub audio_ref: String,
    pub committee: Option<String>,
    pub meeting_date: NaiveDate,
    pub state: MeetingState,
    pub speakers: BTreeMap<String, SpeakerCluster>,
    pub labels: BTreeMap<String, LabelDecision>,
    pub commit: Option<CommitReport>,
}

impl MeetingRecord {
    /// Whether every detected speaker has an assignment or an explicit skip.
    pub fn fully_labeled(&self) -> bool {
        self.speakers.keys().all(|label| self.labels.contains_key(label))
    }

    /// Speakers still awaiting a labeling decision.
    pub fn unresolved(&self) -> Vec<&str> {
        self.speakers
            .keys()
            .filter(|label| !self.labels.contains_key(*label))
            .map(String::as_str)
            .collect()
    }
}
