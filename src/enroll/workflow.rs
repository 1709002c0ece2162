//! The per-meeting enrollment state machine.
//!
//! `Unprocessed -> Diarized -> Embedded -> Labeled -> Committed`, with the
//! record persisted after every completed stage. The embedding stage calls
//! the external extractor, which can take minutes per meeting; if it aborts
//! mid-flight the on-disk record is untouched and the meeting stays at
//! `Diarized`, so the stage is safe to re-invoke.

use crate::defaults;
use crate::enroll::{
    CommitEntry, CommitOutcome, CommitReport, DiarizedSegment, LabelDecision, MeetingRecord,
    MeetingState, SpeakerCluster, TimeWindow,
};
use crate::error::{Result, RollcallError};
use crate::extractor::EmbeddingExtractor;
use crate::embedding::Embedding;
use crate::profile::VoiceSample;
use crate::roster::RosterIndex;
use crate::store::ProfileStore;
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Drives meetings through the enrollment stages, persisting after each one.
pub struct EnrollmentWorkflow {
    workdir: PathBuf,
    min_segment_secs: f64,
    max_segments_per_speaker: usize,
}

impl EnrollmentWorkflow {
    /// Open (creating if needed) a workflow rooted at `workdir`.
    pub fn open(workdir: &Path) -> Result<Self> {
        fs::create_dir_all(workdir)?;
        Ok(Self {
            workdir: workdir.to_path_buf(),
            min_segment_secs: defaults::MIN_SEGMENT_SECS,
            max_segments_per_speaker: defaults::MAX_SEGMENTS_PER_SPEAKER,
        })
    }

    /// Override the segment selection policy for the embedding stage.
    pub fn with_segment_policy(mut self, min_segment_secs: f64, max_segments: usize) -> Self {
        self.min_segment_secs = min_segment_secs;
        self.max_segments_per_speaker = max_segments;
        self
    }

    fn record_path(&self, meeting_id: &str) -> PathBuf {
        self.workdir.join(format!("{meeting_id}.json"))
    }

    fn load(&self, meeting_id: &str) -> Result<MeetingRecord> {
        let path = self.record_path(meeting_id);
        let contents = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RollcallError::MeetingNotFound {
                    meeting_id: meeting_id.to_string(),
                }
            } else {
                RollcallError::Io(e)
            }
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Persist a record atomically: temp file, then rename.
    fn persist(&self, record: &MeetingRecord) -> Result<()> {
        let path = self.record_path(&record.meeting_id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Read a meeting's current record.
    pub fn record(&self, meeting_id: &str) -> Result<MeetingRecord> {
        self.load(meeting_id)
    }

    /// Meeting ids with a persisted record, sorted.
    pub fn list_meetings(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.workdir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Record the diarizer's output and move the meeting to `Diarized`.
    ///
    /// Re-ingesting a meeting still at `Diarized` replaces its segments;
    /// once embeddings exist the meeting is past this stage and re-ingest is
    /// a `WorkflowState` error.
    pub fn ingest_diarization(
        &self,
        meeting_id: &str,
        audio_ref: &str,
        committee: Option<&str>,
        meeting_date: NaiveDate,
        segments: &[DiarizedSegment],
    ) -> Result<MeetingRecord> {
        match self.load(meeting_id) {
            Ok(existing) if existing.state > MeetingState::Diarized => {
                return Err(RollcallError::WorkflowState {
                    meeting_id: meeting_id.to_string(),
                    message: format!(
                        "cannot re-ingest diarization in state {:?}",
                        existing.state
                    ),
                });
            }
            Ok(_) | Err(RollcallError::MeetingNotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let mut speakers: BTreeMap<String, SpeakerCluster> = BTreeMap::new();
        for segment in segments {
            let cluster = speakers
                .entry(segment.speaker_label.clone())
                .or_insert_with(|| SpeakerCluster {
                    label: segment.speaker_label.clone(),
                    segments: 0,
                    total_secs: 0.0,
                    windows: Vec::new(),
                    embedding: None,
                });
            cluster.segments += 1;
            cluster.total_secs += segment.duration();
            cluster.windows.push(TimeWindow {
                start_secs: segment.start_secs,
                end_secs: segment.end_secs,
            });
        }

        let record = MeetingRecord {
            schema_version: defaults::SCHEMA_VERSION.to_string(),
            meeting_id: meeting_id.to_string(),
            audio_ref: audio_ref.to_string(),
            committee: committee.map(str::to_string),
            meeting_date,
            state: MeetingState::Diarized,
            speakers,
            labels: BTreeMap::new(),
            commit: None,
        };
        self.persist(&record)?;
        Ok(record)
    }

    /// Pick the windows worth embedding for one cluster: the longest ones
    /// above the minimum duration, capped. If nothing clears the minimum,
    /// the single longest window is used rather than dropping the speaker.
    fn representative_windows(&self, cluster: &SpeakerCluster) -> Vec<TimeWindow> {
        let mut qualifying: Vec<TimeWindow> = cluster
            .windows
            .iter()
            .copied()
            .filter(|w| w.duration() >= self.min_segment_secs)
            .collect();
        qualifying.sort_by(|a, b| b.duration().total_cmp(&a.duration()));
        qualifying.truncate(self.max_segments_per_speaker);

        if qualifying.is_empty()
            && let Some(longest) = cluster
                .windows
                .iter()
                .copied()
                .max_by(|a, b| a.duration().total_cmp(&b.duration()))
        {
            qualifying.push(longest);
        }
        qualifying
    }

    /// Run the external extractor over every speaker cluster and move the
    /// meeting to `Embedded`.
    ///
    /// All clusters are computed before anything is persisted; a failure on
    /// any extraction leaves the on-disk record at its previous state, so a
    /// retry restarts this stage cleanly.
    pub fn compute_embeddings(
        &self,
        meeting_id: &str,
        extractor: &dyn EmbeddingExtractor,
    ) -> Result<MeetingRecord> {
        let mut record = self.load(meeting_id)?;
        match record.state {
            MeetingState::Diarized | MeetingState::Embedded => {}
            state => {
                return Err(RollcallError::WorkflowState {
                    meeting_id: meeting_id.to_string(),
                    message: format!("cannot compute embeddings in state {state:?}"),
                });
            }
        }

        for cluster in record.speakers.values_mut() {
            let windows = self.representative_windows(cluster);
            if windows.is_empty() {
                return Err(RollcallError::Extraction {
                    message: format!("speaker {} has no speech windows", cluster.label),
                });
            }
            let mut embeddings = Vec::with_capacity(windows.len());
            for window in &windows {
                let embedding =
                    extractor.extract(&record.audio_ref, window.start_secs, window.end_secs)?;
                embeddings.push(embedding);
            }
            cluster.embedding = Some(Embedding::mean(&embeddings)?);
        }

        record.state = MeetingState::Embedded;
        self.persist(&record)?;
        Ok(record)
    }

    /// Record a labeling decision for one detected speaker.
    ///
    /// Persists immediately so partial labeling survives interruption. The
    /// meeting becomes `Labeled` once every speaker has a resolution;
    /// decisions may be revised until the meeting is committed.
    pub fn label_speaker(
        &self,
        meeting_id: &str,
        speaker_label: &str,
        decision: LabelDecision,
    ) -> Result<MeetingRecord> {
        let mut record = self.load(meeting_id)?;
        match record.state {
            MeetingState::Embedded | MeetingState::Labeled => {}
            state => {
                return Err(RollcallError::WorkflowState {
                    meeting_id: meeting_id.to_string(),
                    message: format!("cannot label speakers in state {state:?}"),
                });
            }
        }
        if !record.speakers.contains_key(speaker_label) {
            return Err(RollcallError::WorkflowState {
                meeting_id: meeting_id.to_string(),
                message: format!("unknown speaker label {speaker_label}"),
            });
        }

        record
            .labels
            .insert(speaker_label.to_string(), decision);
        if record.fully_labeled() {
            record.state = MeetingState::Labeled;
        }
        self.persist(&record)?;
        Ok(record)
    }

    /// Commit every labeled mapping to the profile store.
    ///
    /// Evaluated per mapping: one failure is recorded in the report and does
    /// not block or roll back the others. The meeting advances to
    /// `Committed` only when no mapping failed; otherwise it stays `Labeled`
    /// and a retry re-attempts the failures, with the store's duplicate
    /// detection turning everything already written into `AlreadyApplied`.
    /// Committing a `Committed` meeting writes nothing.
    pub fn commit(
        &self,
        meeting_id: &str,
        store: &ProfileStore,
        roster: &RosterIndex,
    ) -> Result<CommitReport> {
        let mut record = self.load(meeting_id)?;
        match record.state {
            MeetingState::Labeled => {}
            MeetingState::Committed => {
                // Idempotent: report every mapping as already applied
                let entries = record
                    .labels
                    .iter()
                    .map(|(label, decision)| match decision {
                        LabelDecision::Assign { slug } => CommitEntry {
                            speaker_label: label.clone(),
                            entity: Some(slug.clone()),
                            outcome: CommitOutcome::AlreadyApplied,
                        },
                        LabelDecision::Skip => CommitEntry {
                            speaker_label: label.clone(),
                            entity: None,
                            outcome: CommitOutcome::Skipped,
                        },
                    })
                    .collect();
                return Ok(CommitReport {
                    meeting_id: meeting_id.to_string(),
                    entries,
                    committed_at: Utc::now(),
                });
            }
            state => {
                let message = if state < MeetingState::Labeled && !record.fully_labeled() {
                    format!(
                        "commit requires all speakers labeled ({} unresolved)",
                        record.unresolved().len()
                    )
                } else {
                    format!("cannot commit in state {state:?}")
                };
                return Err(RollcallError::WorkflowState {
                    meeting_id: meeting_id.to_string(),
                    message,
                });
            }
        }

        let mut entries = Vec::with_capacity(record.labels.len());
        for (label, decision) in &record.labels {
            let slug = match decision {
                LabelDecision::Skip => {
                    entries.push(CommitEntry {
                        speaker_label: label.clone(),
                        entity: None,
                        outcome: CommitOutcome::Skipped,
                    });
                    continue;
                }
                LabelDecision::Assign { slug } => slug,
            };

            let outcome = self.commit_mapping(&record, label, slug, store, roster);
            entries.push(CommitEntry {
                speaker_label: label.clone(),
                entity: Some(slug.clone()),
                outcome,
            });
        }

        let report = CommitReport {
            meeting_id: meeting_id.to_string(),
            entries,
            committed_at: Utc::now(),
        };
        if report.is_clean() {
            record.state = MeetingState::Committed;
        }
        record.commit = Some(report.clone());
        self.persist(&record)?;
        Ok(report)
    }

    /// Commit one speaker -> entity mapping; never propagates, only reports.
    fn commit_mapping(
        &self,
        record: &MeetingRecord,
        label: &str,
        slug: &str,
        store: &ProfileStore,
        roster: &RosterIndex,
    ) -> CommitOutcome {
        let cluster = match record.speakers.get(label) {
            Some(c) => c,
            None => {
                return CommitOutcome::Failed {
                    reason: format!("no cluster for speaker {label}"),
                };
            }
        };
        let embedding = match &cluster.embedding {
            Some(e) => e.clone(),
            None => {
                return CommitOutcome::Failed {
                    reason: format!("speaker {label} has no embedding"),
                };
            }
        };

        // Lazy profile creation for entities known to the roster
        if !store.exists(slug) {
            match roster.descriptor_for(slug) {
                Some(descriptor) => {
                    if let Err(e) = store.ensure(descriptor) {
                        return CommitOutcome::Failed {
                            reason: e.to_string(),
                        };
                    }
                }
                None => {
                    return CommitOutcome::Failed {
                        reason: format!("{slug} has no profile and is not on the roster"),
                    };
                }
            }
        }

        let sample = VoiceSample {
            meeting_id: record.meeting_id.clone(),
            speaker_label: label.to_string(),
            clip_ref: format!("{}#{}", record.audio_ref, label),
            segments: cluster.segments,
            total_secs: cluster.total_secs,
            meeting_date: record.meeting_date,
            committee: record.committee.clone(),
            added: Utc::now(),
            embedding,
        };

        match store.add_sample(slug, sample) {
            Ok(_) => CommitOutcome::Applied,
            Err(RollcallError::DuplicateSample { .. }) => CommitOutcome::AlreadyApplied,
            Err(e) => CommitOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}
