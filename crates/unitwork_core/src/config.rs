//! Core configuration values.
//!
//! # Responsibility
//! - Describe backend selection and logging options as plain data.
//! - Validate values at startup, before any session is opened.
//!
//! Loading these values from files or environment is left to the host.

use crate::error::{RepoError, RepoResult};
use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Selects a backend from the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Registry id, e.g. `sqlite`, `sqlite_memory`, `memory`.
    pub backend: String,
    /// Database file for file-backed backends.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl BackendConfig {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Registry id with surrounding whitespace removed.
    pub fn backend_id(&self) -> &str {
        self.backend.trim()
    }

    /// Returns the configured path or a configuration error.
    pub fn require_path(&self) -> RepoResult<&PathBuf> {
        self.path.as_ref().ok_or_else(|| {
            RepoError::Configuration(format!(
                "backend `{}` requires `path`",
                self.backend_id()
            ))
        })
    }
}

/// Top-level options a host hands to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub log_level: Option<String>,
    /// Absolute directory for rolling log files; logging stays off when unset.
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl CoreConfig {
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            backend,
            log_level: None,
            log_dir: None,
        }
    }

    /// Effective log level, falling back to the build-mode default.
    pub fn effective_log_level(&self) -> &str {
        self.log_level
            .as_deref()
            .map(str::trim)
            .filter(|level| !level.is_empty())
            .unwrap_or(default_log_level())
    }

    /// Checks values that do not depend on the registry.
    pub fn validate(&self) -> RepoResult<()> {
        if self.backend.backend_id().is_empty() {
            return Err(RepoError::Configuration(
                "backend id cannot be empty".to_string(),
            ));
        }
        if let Some(dir) = &self.log_dir {
            if dir.trim().is_empty() {
                return Err(RepoError::Configuration(
                    "log_dir cannot be empty when set".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BackendConfig, CoreConfig};
    use crate::error::RepoError;

    #[test]
    fn deserializes_with_optional_fields_missing() {
        let config: CoreConfig =
            serde_json::from_str(r#"{"backend": {"backend": "memory"}}"#).unwrap();
        assert_eq!(config.backend, BackendConfig::new("memory"));
        assert!(config.log_dir.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_blank_backend_id() {
        let config = CoreConfig::new(BackendConfig::new("   "));
        assert!(matches!(
            config.validate(),
            Err(RepoError::Configuration(_))
        ));
    }

    #[test]
    fn require_path_reports_backend_id() {
        let err = BackendConfig::new(" sqlite ").require_path().unwrap_err();
        assert!(err.to_string().contains("`sqlite` requires `path`"));
    }

    #[test]
    fn blank_log_level_falls_back_to_default() {
        let mut config = CoreConfig::new(BackendConfig::new("memory"));
        config.log_level = Some("  ".to_string());
        assert_eq!(
            config.effective_log_level(),
            crate::logging::default_log_level()
        );
    }
}
