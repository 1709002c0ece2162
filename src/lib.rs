//! rollcall - Speaker identification for legislative committee recordings
//!
//! Voice-profile storage, enrollment, and matching for "who said what" in
//! committee hearings. Diarization and the embedding model run upstream;
//! this crate owns the durable profiles and everything derived from them.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod coverage;
pub mod defaults;
pub mod embedding;
pub mod enroll;
pub mod error;
pub mod extractor;
pub mod matcher;
pub mod profile;
pub mod roster;
pub mod store;

// Core trait seam (audio window → embedding)
pub use extractor::{EmbeddingExtractor, MockExtractor};

// Error handling
pub use error::{Result, RollcallError};

// Config
pub use config::{Config, MatchingConfig};

// Data model
pub use embedding::Embedding;
pub use profile::{EntityDescriptor, Profile, ProfileStats, SampleRef, VoiceSample};
pub use roster::{slugify, RosterEntry, RosterIndex};
pub use store::{BootstrapReport, ProfileStore};

// Enrollment and matching
pub use coverage::{coverage_report, CoverageEntry, CoverageReport};
pub use enroll::EnrollmentWorkflow;
pub use matcher::{ConfidenceTier, Identification, MatchCandidate, Matcher};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(
                ver.contains('+'),
                "With GIT_HASH set, version should contain '+', got: {}",
                ver
            );
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(
                hash_part.len(),
                7,
                "Git hash should be 7 chars, got: {}",
                hash_part
            );
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
