use std::{fs, io, path::Path, path::PathBuf};

use serde::Deserialize;
use singer_events::{IngestLimits, DEFAULT_MAX_LINE_BYTES};
use thiserror::Error;

use crate::router::{PublishMode, RouterOptions};
use crate::validator::ValidationMode;

pub const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config file `{path}`: {message}")]
    Invalid { path: PathBuf, message: String },
    #[error("no Pub/Sub project id: set `project_id` in the config or GOOGLE_CLOUD_PROJECT")]
    MissingProjectId,
}

/// Options read from the `--config` JSON file. Unknown keys are ignored.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    #[serde(alias = "google_project_id")]
    pub project_id: Option<String>,
    /// Publish every stream to this topic instead of one topic per stream.
    pub topic: Option<String>,
    pub disable_collection: bool,
    pub log_level: Option<String>,
    pub access_token: Option<String>,
    pub validation: ValidationMode,
    pub publish_mode: PublishMode,
    pub publish_timeout_secs: u64,
    pub max_line_bytes: usize,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            topic: None,
            disable_collection: false,
            log_level: None,
            access_token: None,
            validation: ValidationMode::default(),
            publish_mode: PublishMode::default(),
            publish_timeout_secs: DEFAULT_PUBLISH_TIMEOUT_SECS,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl std::fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetConfig")
            .field("project_id", &self.project_id)
            .field("topic", &self.topic)
            .field("disable_collection", &self.disable_collection)
            .field("log_level", &self.log_level)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("validation", &self.validation)
            .field("publish_mode", &self.publish_mode)
            .field("publish_timeout_secs", &self.publish_timeout_secs)
            .field("max_line_bytes", &self.max_line_bytes)
            .finish()
    }
}

impl TargetConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if config.publish_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                message: "`publish_timeout_secs` must be at least 1".to_string(),
            });
        }
        Ok(config)
    }

    pub fn router_options(&self) -> RouterOptions {
        RouterOptions {
            validation: self.validation,
            publish_mode: self.publish_mode,
            limits: IngestLimits {
                max_line_bytes: self.max_line_bytes,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_full_config() {
        let file = write_config(
            r#"{
                "project_id": "xyz",
                "topic": "events",
                "disable_collection": true,
                "log_level": "debug",
                "validation": "advisory",
                "publish_mode": "raw",
                "publish_timeout_secs": 5,
                "max_line_bytes": 1024,
                "unrelated": {"ignored": true}
            }"#,
        );
        let config = TargetConfig::load(file.path()).unwrap();
        assert_eq!(config.project_id.as_deref(), Some("xyz"));
        assert_eq!(config.topic.as_deref(), Some("events"));
        assert!(config.disable_collection);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.validation, ValidationMode::Advisory);
        assert_eq!(config.publish_mode, PublishMode::Raw);
        assert_eq!(config.publish_timeout_secs, 5);
        assert_eq!(config.router_options().limits.max_line_bytes, 1024);
    }

    #[test]
    fn empty_object_uses_defaults() {
        let file = write_config("{}");
        let config = TargetConfig::load(file.path()).unwrap();
        assert!(config.project_id.is_none());
        assert!(!config.disable_collection);
        assert_eq!(config.validation, ValidationMode::Strict);
        assert_eq!(config.publish_mode, PublishMode::Envelope);
        assert_eq!(config.publish_timeout_secs, DEFAULT_PUBLISH_TIMEOUT_SECS);
        assert_eq!(config.max_line_bytes, DEFAULT_MAX_LINE_BYTES);
    }

    #[test]
    fn legacy_project_key_is_accepted() {
        let file = write_config(r#"{"google_project_id": "legacy"}"#);
        let config = TargetConfig::load(file.path()).unwrap();
        assert_eq!(config.project_id.as_deref(), Some("legacy"));
    }

    #[test]
    fn zero_publish_timeout_is_rejected() {
        let file = write_config(r#"{"project_id": "xyz", "publish_timeout_secs": 0}"#);
        let err = TargetConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("publish_timeout_secs"));
    }

    #[test]
    fn missing_and_invalid_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            TargetConfig::load(&missing),
            Err(ConfigError::Read { .. })
        ));

        let file = write_config("{not json");
        assert!(matches!(
            TargetConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
