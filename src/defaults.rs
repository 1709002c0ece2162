//! Default configuration constants for rollcall.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

/// Profile document schema version, stored in every profile for migrations.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Default embedding dimension.
///
/// Matches the output of the wespeaker-voxceleb-resnet34-LM speaker model
/// used by the enrollment pipeline. Every embedding entering the store must
/// have this dimension.
pub const EMBEDDING_DIM: usize = 192;

/// Minimum boosted score for a match to be accepted at all.
///
/// Below this, the candidate is reported but tiered `Unassigned` and the
/// committee-restricted pass falls back to the full candidate set.
pub const ACCEPT_THRESHOLD: f32 = 0.70;

/// Boosted score at or above which a match is considered high confidence.
pub const HIGH_THRESHOLD: f32 = 0.90;

/// Additive prior applied to candidates on the queried committee.
///
/// Additive rather than multiplicative so low or negative similarities are
/// shifted, not distorted. Kept small: it should re-order near-ties, not
/// promote weak matches across a tier boundary.
pub const COMMITTEE_BOOST: f32 = 0.05;

/// Minimum segment length in seconds worth embedding.
///
/// Shorter utterances ("aye", "second") produce unstable speaker embeddings.
pub const MIN_SEGMENT_SECS: f64 = 2.0;

/// Maximum diarized segments embedded per detected speaker.
///
/// The longest segments are taken first; beyond this count the extra
/// extractor calls cost minutes and barely move the averaged embedding.
pub const MAX_SEGMENTS_PER_SPEAKER: usize = 10;

/// Sample count below which an enrolled profile is flagged as weak.
pub const MIN_SAMPLES: u32 = 3;

/// Tolerance for verifying a recomputed aggregate against its samples.
pub const AGGREGATE_EPSILON: f32 = 1e-4;
