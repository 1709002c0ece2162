//! Configuration loading with TOML file and environment overrides.

use crate::defaults;
use crate::error::{Result, RollcallError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub matching: MatchingConfig,
    pub enrollment: EnrollmentConfig,
    pub coverage: CoverageConfig,
}

/// Profile store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Root of the profile database; defaults to the XDG data directory.
    pub database_dir: Option<PathBuf>,
    pub roster_path: PathBuf,
}

/// Matching engine thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchingConfig {
    pub embedding_dim: usize,
    pub accept_threshold: f32,
    pub high_threshold: f32,
    pub committee_boost: f32,
}

/// Enrollment workflow configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnrollmentConfig {
    /// Where meeting records live; defaults to `<database_dir>/meetings`.
    pub workdir: Option<PathBuf>,
    pub min_segment_secs: f64,
    pub max_segments_per_speaker: usize,
}

/// Coverage reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoverageConfig {
    pub min_samples: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_dir: None,
            roster_path: PathBuf::from("roster.json"),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            embedding_dim: defaults::EMBEDDING_DIM,
            accept_threshold: defaults::ACCEPT_THRESHOLD,
            high_threshold: defaults::HIGH_THRESHOLD,
            committee_boost: defaults::COMMITTEE_BOOST,
        }
    }
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            workdir: None,
            min_segment_secs: defaults::MIN_SEGMENT_SECS,
            max_segments_per_speaker: defaults::MAX_SEGMENTS_PER_SPEAKER,
        }
    }
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            min_samples: defaults::MIN_SAMPLES,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML or inconsistent
    /// values. Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RollcallError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                RollcallError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing; invalid TOML is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(RollcallError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - ROLLCALL_DATABASE_DIR → store.database_dir
    /// - ROLLCALL_ROSTER → store.roster_path
    /// - ROLLCALL_WORKDIR → enrollment.workdir
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("ROLLCALL_DATABASE_DIR")
            && !dir.is_empty()
        {
            self.store.database_dir = Some(PathBuf::from(dir));
        }

        if let Ok(roster) = std::env::var("ROLLCALL_ROSTER")
            && !roster.is_empty()
        {
            self.store.roster_path = PathBuf::from(roster);
        }

        if let Ok(workdir) = std::env::var("ROLLCALL_WORKDIR")
            && !workdir.is_empty()
        {
            self.enrollment.workdir = Some(PathBuf::from(workdir));
        }

        self
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<()> {
        if self.matching.embedding_dim == 0 {
            return Err(RollcallError::ConfigInvalidValue {
                key: "matching.embedding_dim".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.matching.accept_threshold > self.matching.high_threshold {
            return Err(RollcallError::ConfigInvalidValue {
                key: "matching.accept_threshold".to_string(),
                message: "must not exceed matching.high_threshold".to_string(),
            });
        }
        if self.enrollment.min_segment_secs < 0.0 {
            return Err(RollcallError::ConfigInvalidValue {
                key: "enrollment.min_segment_secs".to_string(),
                message: "must not be negative".to_string(),
            });
        }
        if self.enrollment.max_segments_per_speaker == 0 {
            return Err(RollcallError::ConfigInvalidValue {
                key: "enrollment.max_segments_per_speaker".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Resolved profile database root.
    pub fn database_dir(&self) -> PathBuf {
        self.store.database_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("rollcall")
        })
    }

    /// Resolved enrollment workdir.
    pub fn workdir(&self) -> PathBuf {
        self.enrollment
            .workdir
            .clone()
            .unwrap_or_else(|| self.database_dir().join("meetings"))
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/rollcall/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rollcall")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_rollcall_env() {
        remove_env("ROLLCALL_DATABASE_DIR");
        remove_env("ROLLCALL_ROSTER");
        remove_env("ROLLCALL_WORKDIR");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.store.database_dir, None);
        assert_eq!(config.store.roster_path, PathBuf::from("roster.json"));

        assert_eq!(config.matching.embedding_dim, 192);
        assert_eq!(config.matching.accept_threshold, 0.70);
        assert_eq!(config.matching.high_threshold, 0.90);
        assert_eq!(config.matching.committee_boost, 0.05);

        assert_eq!(config.enrollment.min_segment_secs, 2.0);
        assert_eq!(config.enrollment.max_segments_per_speaker, 10);

        assert_eq!(config.coverage.min_samples, 3);
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [store]
            database_dir = "/var/lib/rollcall"
            roster_path = "/etc/rollcall/roster.json"

            [matching]
            embedding_dim = 256
            accept_threshold = 0.65
            high_threshold = 0.85
            committee_boost = 0.1

            [enrollment]
            workdir = "/var/lib/rollcall/meetings"
            min_segment_secs = 3.0
            max_segments_per_speaker = 5

            [coverage]
            min_samples = 5
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(
            config.store.database_dir,
            Some(PathBuf::from("/var/lib/rollcall"))
        );
        assert_eq!(config.matching.embedding_dim, 256);
        assert_eq!(config.matching.accept_threshold, 0.65);
        assert_eq!(config.enrollment.min_segment_secs, 3.0);
        assert_eq!(config.coverage.min_samples, 5);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let toml_content = r#"
            [matching]
            embedding_dim = 512
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.matching.embedding_dim, 512);
        // Everything else should be defaults
        assert_eq!(config.matching.accept_threshold, 0.70);
        assert_eq!(config.store.roster_path, PathBuf::from("roster.json"));
        assert_eq!(config.coverage.min_samples, 3);
    }

    #[test]
    fn test_env_override_database_dir() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_rollcall_env();

        set_env("ROLLCALL_DATABASE_DIR", "/tmp/rollcall_test_db");
        let config = Config::default().with_env_overrides();

        assert_eq!(
            config.store.database_dir,
            Some(PathBuf::from("/tmp/rollcall_test_db"))
        );

        clear_rollcall_env();
    }

    #[test]
    fn test_env_override_all() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_rollcall_env();

        set_env("ROLLCALL_DATABASE_DIR", "/data");
        set_env("ROLLCALL_ROSTER", "/data/roster.json");
        set_env("ROLLCALL_WORKDIR", "/data/meetings");

        let config = Config::default().with_env_overrides();

        assert_eq!(config.store.database_dir, Some(PathBuf::from("/data")));
        assert_eq!(config.store.roster_path, PathBuf::from("/data/roster.json"));
        assert_eq!(
            config.enrollment.workdir,
            Some(PathBuf::from("/data/meetings"))
        );

        clear_rollcall_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_rollcall_env();

        set_env("ROLLCALL_ROSTER", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.store.roster_path, PathBuf::from("roster.json"));

        clear_rollcall_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let invalid_toml = r#"
            [store
            database_dir = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        assert!(Config::load(temp_file.path()).is_err());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let toml_content = r#"
            [matching]
            accept_threshold = 0.95
            high_threshold = 0.90
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());
        assert!(matches!(
            result,
            Err(RollcallError::ConfigInvalidValue { .. })
        ));
    }

    #[test]
    fn test_zero_embedding_dim_rejected() {
        let config = Config {
            matching: MatchingConfig {
                embedding_dim: 0,
                ..MatchingConfig::default()
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_rollcall_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_workdir_defaults_under_database_dir() {
        let config = Config {
            store: StoreConfig {
                database_dir: Some(PathBuf::from("/data/rollcall")),
                ..StoreConfig::default()
            },
            ..Config::default()
        };
        assert_eq!(config.workdir(), PathBuf::from("/data/rollcall/meetings"));
    }

    #[test]
    fn test_default_path_is_xdg_compliant() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();

        assert!(path_str.contains("rollcall"));
        assert!(path_str.ends_with("config.toml"));
    }
}
