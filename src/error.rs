//! Error types for rollcall.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RollcallError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Profile store errors
    #[error("Profile not found: {slug}")]
    NotFound { slug: String },

    #[error("Profile already exists: {slug}")]
    DuplicateProfile { slug: String },

    #[error("Sample already enrolled for {slug}: {meeting_id}/{speaker_label}")]
    DuplicateSample {
        slug: String,
        meeting_id: String,
        speaker_label: String,
    },

    #[error("Sample not found for {slug}: {meeting_id}/{speaker_label}")]
    SampleNotFound {
        slug: String,
        meeting_id: String,
        speaker_label: String,
    },

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidEmbeddingDimension { expected: usize, actual: usize },

    #[error("Aggregate embedding inconsistent for {slug}: {message}")]
    StaleAggregate { slug: String, message: String },

    // Embedding math errors
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    // Roster / matching errors
    #[error("Unknown committee code: {code}")]
    UnknownCommittee { code: String },

    // Enrollment workflow errors
    #[error("Meeting {meeting_id}: {message}")]
    WorkflowState { meeting_id: String, message: String },

    #[error("Unknown meeting: {meeting_id}")]
    MeetingNotFound { meeting_id: String },

    // External collaborator errors
    #[error("Embedding extraction failed: {message}")]
    Extraction { message: String },

    // Persistence errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, RollcallError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_not_found_display() {
        let error = RollcallError::NotFound {
            slug: "christine_chandler".to_string(),
        };
        assert_eq!(error.to_string(), "Profile not found: christine_chandler");
    }

    #[test]
    fn test_duplicate_profile_display() {
        let error = RollcallError::DuplicateProfile {
            slug: "gail_chasey".to_string(),
        };
        assert_eq!(error.to_string(), "Profile already exists: gail_chasey");
    }

    #[test]
    fn test_duplicate_sample_display() {
        let error = RollcallError::DuplicateSample {
            slug: "gail_chasey".to_string(),
            meeting_id: "hjc_012325".to_string(),
            speaker_label: "SPEAKER_07".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Sample already enrolled for gail_chasey: hjc_012325/SPEAKER_07"
        );
    }

    #[test]
    fn test_invalid_embedding_dimension_display() {
        let error = RollcallError::InvalidEmbeddingDimension {
            expected: 192,
            actual: 3,
        };
        assert_eq!(
            error.to_string(),
            "Invalid embedding dimension: expected 192, got 3"
        );
    }

    #[test]
    fn test_unknown_committee_display() {
        let error = RollcallError::UnknownCommittee {
            code: "XYZ".to_string(),
        };
        assert_eq!(error.to_string(), "Unknown committee code: XYZ");
    }

    #[test]
    fn test_workflow_state_display() {
        let error = RollcallError::WorkflowState {
            meeting_id: "hjc_012325".to_string(),
            message: "commit requires all speakers labeled".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Meeting hjc_012325: commit requires all speakers labeled"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: RollcallError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: RollcallError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: RollcallError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RollcallError>();
        assert_sync::<RollcallError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);

        fn returns_error() -> Result<i32> {
            Err(RollcallError::Other("test error".to_string()))
        }
        assert!(returns_error().is_err());
    }
}
