//! Context-aware speaker matching over a profile store snapshot.
//!
//! `Matcher` captures every enrolled aggregate once; `identify` is then a
//! pure ranking over that snapshot, deterministic and safe to call from any
//! number of threads. A committee context narrows the first ranking pass to
//! that committee's roster and grants its members a small additive prior;
//! when even the best in-committee candidate is unacceptable the engine
//! re-ranks the full candidate set so guest speakers are never missed.

use crate::config::MatchingConfig;
use crate::embedding::Embedding;
use crate::error::{Result, RollcallError};
use crate::profile::Profile;
use crate::roster::RosterIndex;
use crate::store::ProfileStore;
use serde::Serialize;
use std::collections::BTreeSet;

/// Coarse reliability classification of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidenceTier {
    High,
    Medium,
    Unassigned,
}

/// One ranked identification candidate.
#[derive(Debug, Clone, Serialize)]
pub struct MatchCandidate {
    pub slug: String,
    pub name: String,
    pub raw_similarity: f32,
    pub boosted_score: f32,
    pub tier: ConfidenceTier,
    pub sample_count: u32,
    /// Whether the candidate sits on the queried committee.
    pub in_context: bool,
}

/// Full result of an identification query.
///
/// The top candidate is always present when any profile is enrolled, even
/// at `Unassigned` confidence, so low-confidence decisions stay auditable.
#[derive(Debug, Clone, Serialize)]
pub struct Identification {
    pub ranked: Vec<MatchCandidate>,
    pub context: Option<String>,
    /// True when a committee context was given but the restricted pass had
    /// no acceptable candidate, so the full set was ranked instead.
    pub used_fallback: bool,
}

impl Identification {
    /// Best-ranked candidate, if any profile was enrolled at all.
    pub fn top(&self) -> Option<&MatchCandidate> {
        self.ranked.first()
    }
}

struct Candidate {
    slug: String,
    name: String,
    aggregate: Embedding,
    committees: BTreeSet<String>,
    sample_count: u32,
}

/// Read-only matcher over a fixed snapshot of enrolled profiles.
pub struct Matcher {
    candidates: Vec<Candidate>,
    known_committees: BTreeSet<String>,
    config: MatchingConfig,
}

impl Matcher {
    /// Snapshot the store and build a matcher.
    pub fn from_store(
        store: &ProfileStore,
        roster: &RosterIndex,
        config: &MatchingConfig,
    ) -> Result<Self> {
        Ok(Self::from_profiles(store.snapshot()?, roster, config))
    }

    /// Build a matcher from an already-loaded snapshot.
    ///
    /// Profiles without an aggregate (nothing enrolled yet) are not
    /// candidates and are dropped here.
    pub fn from_profiles(
        profiles: Vec<Profile>,
        roster: &RosterIndex,
        config: &MatchingConfig,
    ) -> Self {
        let candidates = profiles
            .into_iter()
            .filter_map(|profile| {
                let aggregate = profile.aggregate?;
                Some(Candidate {
                    slug: profile.entity.slug,
                    name: profile.entity.name,
                    aggregate,
                    committees: profile.entity.committees,
                    sample_count: profile.stats.total_samples,
                })
            })
            .collect();
        let known_committees = roster
            .entries()
            .flat_map(|e| e.committees.iter().cloned())
            .collect();
        Self {
            candidates,
            known_committees,
            config: config.clone(),
        }
    }

    /// Number of candidate profiles in the snapshot.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    fn tier(&self, boosted: f32) -> ConfidenceTier {
        if boosted >= self.config.high_threshold {
            ConfidenceTier::High
        } else if boosted >= self.config.accept_threshold {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Unassigned
        }
    }

    /// Score and sort candidates, restricted to committee members when
    /// `members_only` is set. The boost applies to committee members in
    /// either pass.
    fn rank(&self, unknown: &Embedding, context: Option<&str>, members_only: bool) -> Vec<MatchCandidate> {
        let mut ranked: Vec<MatchCandidate> = self
            .candidates
            .iter()
            .filter_map(|candidate| {
                let in_context = context
                    .map(|code| candidate.committees.contains(code))
                    .unwrap_or(false);
                if members_only && !in_context {
                    return None;
                }
                let raw = unknown.cosine(&candidate.aggregate);
                let boosted = if in_context {
                    raw + self.config.committee_boost
                } else {
                    raw
                };
                Some(MatchCandidate {
                    slug: candidate.slug.clone(),
                    name: candidate.name.clone(),
                    raw_similarity: raw,
                    boosted_score: boosted,
                    tier: self.tier(boosted),
                    sample_count: candidate.sample_count,
                    in_context,
                })
            })
            .collect();

        // Score desc, then sample count desc (better-evidenced profile),
        // then slug for determinism
        ranked.sort_by(|a, b| {
            b.boosted_score
                .total_cmp(&a.boosted_score)
                .then_with(|| b.sample_count.cmp(&a.sample_count))
                .then_with(|| a.slug.cmp(&b.slug))
        });
        ranked
    }

    /// Rank enrolled candidates against an unknown embedding.
    ///
    /// A weak best match is a legitimate `Unassigned` result, never an
    /// error; errors are reserved for malformed input.
    pub fn identify(
        &self,
        unknown: &Embedding,
        context: Option<&str>,
    ) -> Result<Identification> {
        if unknown.dim() != self.config.embedding_dim {
            return Err(RollcallError::InvalidEmbeddingDimension {
                expected: self.config.embedding_dim,
                actual: unknown.dim(),
            });
        }
        if let Some(code) = context
            && !self.known_committees.contains(code)
        {
            return Err(RollcallError::UnknownCommittee {
                code: code.to_string(),
            });
        }

        if let Some(code) = context {
            let restricted = self.rank(unknown, Some(code), true);
            let acceptable = restricted
                .first()
                .is_some_and(|top| top.boosted_score >= self.config.accept_threshold);
            if acceptable {
                return Ok(Identification {
                    ranked: restricted,
                    context: Some(code.to_string()),
                    used_fallback: false,
                });
            }
            // No acceptable in-committee candidate: the speaker may be a
            // guest, so rank everyone (members keep their boost)
            return Ok(Identification {
                ranked: self.rank(unknown, Some(code), false),
                context: Some(code.to_string()),
                used_fallback: true,
            });
        }

        Ok(Identification {
            ranked: self.rank(unknown, None, false),
            context: None,
            used_fallback: false,
        })
    }
}
