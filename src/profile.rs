//! Profile documents: the per-legislator voice identity records.
//!
//! A profile collects immutable voice samples and a derived aggregate
//! embedding. Mutation helpers here keep the aggregate and stats in sync
//! with the sample list on every change; the store is responsible for
//! locking and durable persistence.

use crate::defaults;
use crate::embedding::Embedding;
use crate::error::{Result, RollcallError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identity and organizational attributes of an enrolled legislator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub slug: String,
    pub name: String,
    pub chamber: String,
    pub district: String,
    pub party: String,
    pub committees: BTreeSet<String>,
}

/// Reference to one sample within a profile.
///
/// Meeting id plus the diarization-local speaker label is unique: a speaker
/// cluster from one meeting is enrolled at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRef {
    pub meeting_id: String,
    pub speaker_label: String,
}

/// One enrolled voice sample. Immutable once created; a mislabeled sample is
/// corrected by removing it and adding a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSample {
    pub meeting_id: String,
    pub speaker_label: String,
    /// Opaque reference to the extracted audio clip (path, URL, object key).
    pub clip_ref: String,
    pub segments: u32,
    pub total_secs: f64,
    pub meeting_date: NaiveDate,
    pub committee: Option<String>,
    pub added: DateTime<Utc>,
    pub embedding: Embedding,
}

impl VoiceSample {
    /// The reference identifying this sample within its profile.
    pub fn sample_ref(&self) -> SampleRef {
        SampleRef {
            meeting_id: self.meeting_id.clone(),
            speaker_label: self.speaker_label.clone(),
        }
    }
}

/// Derived enrollment statistics, rebuilt on every sample change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProfileStats {
    pub total_samples: u32,
    pub total_segments: u32,
    pub total_speech_secs: f64,
    pub meetings: Vec<String>,
    pub first_enrolled: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// A legislator's voice profile document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub schema_version: String,
    pub entity: EntityDescriptor,
    pub samples: Vec<VoiceSample>,
    /// Unit-normalized mean of the sample embeddings; `None` until the first
    /// sample is attached, and again after the last one is removed.
    pub aggregate: Option<Embedding>,
    pub stats: ProfileStats,
    pub created: DateTime<Utc>,
}

impl Profile {
    /// Create an empty profile for an entity.
    pub fn new(entity: EntityDescriptor) -> Self {
        Self {
            schema_version: defaults::SCHEMA_VERSION.to_string(),
            entity,
            samples: Vec::new(),
            aggregate: None,
            stats: ProfileStats::default(),
            created: Utc::now(),
        }
    }

    /// Whether at least one sample has been enrolled.
    pub fn is_enrolled(&self) -> bool {
        !self.samples.is_empty()
    }

    /// Find a sample by reference.
    pub fn find_sample(&self, sample_ref: &SampleRef) -> Option<&VoiceSample> {
        self.samples.iter().find(|s| {
            s.meeting_id == sample_ref.meeting_id && s.speaker_label == sample_ref.speaker_label
        })
    }

    /// Append a sample and recompute the aggregate and stats.
    ///
    /// # Errors
    /// `DuplicateSample` if a sample with the same meeting id and speaker
    /// label is already attached.
    pub fn attach_sample(&mut self, sample: VoiceSample) -> Result<()> {
        if self.find_sample(&sample.sample_ref()).is_some() {
            return Err(RollcallError::DuplicateSample {
                slug: self.entity.slug.clone(),
                meeting_id: sample.meeting_id,
                speaker_label: sample.speaker_label,
            });
        }
        self.samples.push(sample);
        self.recompute()
    }

    /// Remove a sample and recompute the aggregate and stats.
    ///
    /// Removing the last sample returns the profile to the unenrolled state.
    pub fn detach_sample(&mut self, sample_ref: &SampleRef) -> Result<VoiceSample> {
        let index = self
            .samples
            .iter()
            .position(|s| {
                s.meeting_id == sample_ref.meeting_id
                    && s.speaker_label == sample_ref.speaker_label
            })
            .ok_or_else(|| RollcallError::SampleNotFound {
                slug: self.entity.slug.clone(),
                meeting_id: sample_ref.meeting_id.clone(),
                speaker_label: sample_ref.speaker_label.clone(),
            })?;
        let removed = self.samples.remove(index);
        self.recompute()?;
        Ok(removed)
    }

    /// Rebuild the aggregate embedding and stats from the current samples.
    fn recompute(&mut self) -> Result<()> {
        if self.samples.is_empty() {
            self.aggregate = None;
            self.stats = ProfileStats {
                last_updated: Some(Utc::now()),
                ..ProfileStats::default()
            };
            return Ok(());
        }

        let embeddings: Vec<Embedding> =
            self.samples.iter().map(|s| s.embedding.clone()).collect();
        self.aggregate = Some(Embedding::mean(&embeddings)?);

        let mut meetings: Vec<String> = Vec::new();
        let mut total_segments = 0u32;
        let mut total_speech_secs = 0.0f64;
        for sample in &self.samples {
            total_segments += sample.segments;
            total_speech_secs += sample.total_secs;
            if !meetings.contains(&sample.meeting_id) {
                meetings.push(sample.meeting_id.clone());
            }
        }

        let first_enrolled = self
            .stats
            .first_enrolled
            .or_else(|| self.samples.iter().map(|s| s.added).min());

        self.stats = ProfileStats {
            total_samples: self.samples.len() as u32,
            total_segments,
            total_speech_secs,
            meetings,
            first_enrolled,
            last_updated: Some(Utc::now()),
        };
        Ok(())
    }

    /// Verify the stored aggregate against the sample embeddings.
    ///
    /// Used by the store as a consistency check before persisting; a failure
    /// here is an internal invariant violation, never a caller mistake.
    pub fn verify_aggregate(&self) -> Result<()> {
        match (&self.aggregate, self.samples.is_empty()) {
            (None, true) => Ok(()),
            (None, false) => Err(RollcallError::StaleAggregate {
                slug: self.entity.slug.clone(),
                message: "aggregate missing with samples present".to_string(),
            }),
            (Some(_), true) => Err(RollcallError::StaleAggregate {
                slug: self.entity.slug.clone(),
                message: "aggregate present without samples".to_string(),
            }),
            (Some(aggregate), false) => {
                let embeddings: Vec<Embedding> =
                    self.samples.iter().map(|s| s.embedding.clone()).collect();
                let expected = Embedding::mean(&embeddings)?;
                let drift = aggregate
                    .values()
                    .iter()
                    .zip(expected.values())
                    .map(|(a, b)| (a - b).abs())
                    .fold(0.0f32, f32::max);
                if drift > defaults::AGGREGATE_EPSILON {
                    return Err(RollcallError::StaleAggregate {
                        slug: self.entity.slug.clone(),
                        message: format!("aggregate drift {drift} exceeds tolerance"),
                    });
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn descriptor(slug: &str) -> EntityDescriptor {
        EntityDescriptor {
            slug: slug.to_string(),
            name: slug.replace('_', " "),
            chamber: "House".to_string(),
            district: "1".to_string(),
            party: "Democrat".to_string(),
            committees: ["HJC".to_string()].into(),
        }
    }

    pub fn sample(meeting_id: &str, speaker_label: &str, embedding: Embedding) -> VoiceSample {
        VoiceSample {
            meeting_id: meeting_id.to_string(),
            speaker_label: speaker_label.to_string(),
            clip_ref: format!("clips/{meeting_id}_{speaker_label}.wav"),
            segments: 4,
            total_secs: 30.0,
            meeting_date: NaiveDate::from_ymd_opt(2025, 1, 23).unwrap(),
            committee: Some("HJC".to_string()),
            added: Utc::now(),
            embedding,
        }
    }
}
