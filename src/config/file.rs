//! Configuration file loading.
//!
//! This module handles loading chorus configuration from TOML files
//! at the project-local and user config locations.

use crate::config::types::ChorusConfig;
use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Default configuration file name for project-local config.
const LOCAL_CONFIG_NAME: &str = "chorus.toml";

/// Configuration file name within the user config directory.
const USER_CONFIG_NAME: &str = "config.toml";

/// Application name for config directory lookup.
const APP_NAME: &str = "chorus";

/// Loads configuration from the default search paths.
///
/// Search order:
/// 1. `./chorus.toml` (project-local)
/// 2. `<config_dir>/chorus/config.toml` (user config)
///
/// Returns the default configuration if no config file is found.
///
/// # Errors
///
/// Returns an error if a config file exists but cannot be read, parsed or validated.
pub fn load() -> Result<ChorusConfig, ConfigError> {
    for path in search_paths() {
        if path.exists() {
            tracing::debug!(path = %path.display(), "Loading configuration");
            return from_path(&path);
        }
    }

    Ok(ChorusConfig::default())
}

/// Loads configuration from a specific file path.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - The file contains invalid TOML
/// - A value is out of range
pub fn from_path(path: &Path) -> Result<ChorusConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
    from_str(&contents)
}

/// Parses and validates configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid, doesn't match the schema, or
/// holds an invalid value.
///
/// # Example
///
/// ```rust
/// use chorus::config::from_str;
///
/// let config = from_str(r#"
/// default_provider = "grok"
///
/// [providers.grok]
/// timeout_secs = 45
/// "#).unwrap();
///
/// assert_eq!(config.effective_default(), Some("grok"));
/// ```
pub fn from_str(toml_str: &str) -> Result<ChorusConfig, ConfigError> {
    let config: ChorusConfig = toml::from_str(toml_str).map_err(ConfigError::parse)?;
    config.validate()?;
    Ok(config)
}

/// Returns the paths that would be searched for configuration files.
#[must_use]
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_NAME)];

    if let Some(dir) = config_dir() {
        paths.push(dir.join(USER_CONFIG_NAME));
    }

    paths
}

/// Returns the chorus directory inside the user config directory.
///
/// This is `~/.config/chorus` on most Linux systems.
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderSettings;
    use crate::credentials::StorageTier;
    use crate::error::ConfigErrorKind;
    use crate::logging::LogLevel;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn from_str_parses_full_file() {
        let toml = r#"
default_provider = "openai"
credential_storage = "session"

[logging]
level = "info"
ansi = false

[providers.openai]
base_url = "https://proxy.example.com"
timeout_secs = 60
default_model = "gpt-4o-mini"
models = ["gpt-4o", "gpt-4o-mini"]
api_key_env = "WORK_OPENAI_KEY"
        "#;

        let config = from_str(toml).unwrap();

        assert_eq!(config.default_provider.as_deref(), Some("openai"));
        assert_eq!(config.credential_storage, StorageTier::Session);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(!config.logging.ansi);
        assert_eq!(
            config.providers.get("openai"),
            Some(
                &ProviderSettings::new()
                    .with_base_url("https://proxy.example.com")
                    .with_timeout_secs(60)
                    .with_default_model("gpt-4o-mini")
                    .with_models(["gpt-4o", "gpt-4o-mini"])
                    .with_api_key_env("WORK_OPENAI_KEY")
            )
        );
    }

    #[test]
    fn from_str_empty_is_default() {
        assert_eq!(from_str("").unwrap(), ChorusConfig::default());
    }

    #[test]
    fn from_str_error_on_invalid_toml() {
        let error = from_str("this is not valid toml [[[").unwrap_err();
        assert!(matches!(error.kind, ConfigErrorKind::Parse { .. }));
    }

    #[test]
    fn from_str_error_on_unknown_tier() {
        let error = from_str("credential_storage = \"cloud\"").unwrap_err();
        assert!(matches!(error.kind, ConfigErrorKind::Parse { .. }));
    }

    #[test]
    fn from_str_validates_values() {
        let toml = r#"
[providers.anthropic]
base_url = "mailto:someone@example.com"
        "#;
        let error = from_str(toml).unwrap_err();
        assert!(matches!(error.kind, ConfigErrorKind::InvalidValue { .. }));
    }

    #[test]
    fn from_path_reads_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
            [providers.google]
            default_model = "gemini-2.0-flash"
        "#
        )
        .unwrap();

        let config = from_path(&config_path).unwrap();
        let google = config.provider_config("google").unwrap();
        assert_eq!(google.default_model, "gemini-2.0-flash");
    }

    #[test]
    fn from_path_error_on_missing_file() {
        let error = from_path(Path::new("/nonexistent/path/config.toml")).unwrap_err();
        assert!(matches!(error.kind, ConfigErrorKind::Read { .. }));
    }

    #[test]
    fn search_paths_starts_with_local_file() {
        let paths = search_paths();
        assert_eq!(paths[0], PathBuf::from(LOCAL_CONFIG_NAME));
    }

    #[test]
    fn config_dir_ends_with_app_name() {
        if let Some(dir) = config_dir() {
            assert!(dir.ends_with(APP_NAME));
        }
    }
}
