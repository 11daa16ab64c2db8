//! Credential persistence tiers.
//!
//! A credential store mirrors its in-memory map to exactly one tier:
//! a TOML file readable only by the owner, memory shared for the lifetime
//! of the process, or nowhere at all.

use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// File name of the persistent credential file inside the config directory.
pub const CREDENTIALS_FILE_NAME: &str = "credentials.toml";

/// Where credentials are kept between uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageTier {
    /// A TOML file in the user configuration directory
    #[default]
    Persistent,
    /// Memory shared by every store in this process
    Session,
    /// Nothing is kept beyond the store itself
    None,
}

impl StorageTier {
    /// Returns the lowercase name used in configuration files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Persistent => "persistent",
            Self::Session => "session",
            Self::None => "none",
        }
    }
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "persistent" => Ok(Self::Persistent),
            "session" => Ok(Self::Session),
            "none" => Ok(Self::None),
            other => Err(format!(
                "unknown storage tier '{other}', expected persistent, session or none"
            )),
        }
    }
}

/// Process-lifetime credential memory.
///
/// Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct SessionMemory {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl SessionMemory {
    /// Creates a memory that is not shared with the rest of the process.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memory shared by the whole process.
    #[must_use]
    pub fn process() -> Self {
        static PROCESS: OnceLock<SessionMemory> = OnceLock::new();
        PROCESS.get_or_init(Self::new).clone()
    }

    fn load(&self) -> HashMap<String, String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, credentials: &HashMap<String, String>) {
        *self.entries.lock().unwrap_or_else(PoisonError::into_inner) = credentials.clone();
    }

    fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    credentials: BTreeMap<String, String>,
}

/// Reads the persistent credential file; a missing file is empty.
fn read_file(path: &Path) -> Result<HashMap<String, String>, StorageError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(StorageError::io(path, e)),
    };

    let file: CredentialFile =
        toml::from_str(&contents).map_err(|e| StorageError::corrupt(path, e))?;
    Ok(file.credentials.into_iter().collect())
}

/// Writes the persistent credential file with owner-only permissions.
fn write_file(path: &Path, credentials: &HashMap<String, String>) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    let file = CredentialFile {
        credentials: credentials
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    };
    let contents = toml::to_string(&file).map_err(|e| StorageError::io(path, e))?;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut handle = options.open(path).map_err(|e| StorageError::io(path, e))?;
    handle
        .write_all(contents.as_bytes())
        .map_err(|e| StorageError::io(path, e))?;

    // `mode` only applies on creation; tighten files that already existed.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| StorageError::io(path, e))?;
    }

    Ok(())
}

fn remove_file(path: &Path) -> Result<(), StorageError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

/// The concrete locations behind each tier.
#[derive(Debug, Clone)]
pub struct StorageLocations {
    /// Path of the persistent credential file, if the platform has one
    pub credentials_file: Option<PathBuf>,
    /// Memory backing the session tier
    pub session: SessionMemory,
}

impl StorageLocations {
    /// Locations used by the application: the user config directory and
    /// the process-wide session memory.
    #[must_use]
    pub fn user() -> Self {
        Self {
            credentials_file: default_credentials_path(),
            session: SessionMemory::process(),
        }
    }

    /// Locations rooted at an explicit file with private session memory.
    #[must_use]
    pub fn at(credentials_file: impl Into<PathBuf>) -> Self {
        Self {
            credentials_file: Some(credentials_file.into()),
            session: SessionMemory::new(),
        }
    }

    fn file(&self) -> Result<&Path, StorageError> {
        self.credentials_file
            .as_deref()
            .ok_or_else(StorageError::no_config_dir)
    }

    /// Loads everything the tier holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistent file cannot be read or parsed.
    pub fn load(&self, tier: StorageTier) -> Result<HashMap<String, String>, StorageError> {
        match tier {
            StorageTier::Persistent => read_file(self.file()?),
            StorageTier::Session => Ok(self.session.load()),
            StorageTier::None => Ok(HashMap::new()),
        }
    }

    /// Replaces the tier's contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistent file cannot be written.
    pub fn save(
        &self,
        tier: StorageTier,
        credentials: &HashMap<String, String>,
    ) -> Result<(), StorageError> {
        match tier {
            StorageTier::Persistent => write_file(self.file()?, credentials),
            StorageTier::Session => {
                self.session.save(credentials);
                Ok(())
            }
            StorageTier::None => Ok(()),
        }
    }

    /// Removes everything the tier holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the persistent file cannot be removed.
    pub fn clear(&self, tier: StorageTier) -> Result<(), StorageError> {
        match tier {
            StorageTier::Persistent => remove_file(self.file()?),
            StorageTier::Session => {
                self.session.clear();
                Ok(())
            }
            StorageTier::None => Ok(()),
        }
    }
}

/// Returns `<config_dir>/chorus/credentials.toml`, if the platform has a config dir.
#[must_use]
pub fn default_credentials_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chorus").join(CREDENTIALS_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageErrorKind;
    use tempfile::TempDir;

    fn sample() -> HashMap<String, String> {
        HashMap::from([
            ("openai".to_string(), "sk-1".to_string()),
            ("google".to_string(), "g-2".to_string()),
        ])
    }

    #[test]
    fn tier_parses_and_displays() {
        assert_eq!("Session".parse::<StorageTier>().unwrap(), StorageTier::Session);
        assert_eq!(StorageTier::None.to_string(), "none");
        assert!("disk".parse::<StorageTier>().is_err());
    }

    #[test]
    fn file_round_trip() {
        let dir = TempDir::new().unwrap();
        let locations = StorageLocations::at(dir.path().join("nested").join("creds.toml"));

        locations.save(StorageTier::Persistent, &sample()).unwrap();
        assert_eq!(locations.load(StorageTier::Persistent).unwrap(), sample());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("creds.toml");
        std::fs::write(&path, "").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        StorageLocations::at(&path)
            .save(StorageTier::Persistent, &sample())
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let locations = StorageLocations::at(dir.path().join("absent.toml"));
        assert!(locations.load(StorageTier::Persistent).unwrap().is_empty());
        locations.clear(StorageTier::Persistent).unwrap();
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("creds.toml");
        std::fs::write(&path, "credentials = [[[").unwrap();

        let error = StorageLocations::at(&path)
            .load(StorageTier::Persistent)
            .unwrap_err();
        assert!(matches!(error.kind, StorageErrorKind::Corrupt { .. }));
    }

    #[test]
    fn session_memory_is_shared_between_clones() {
        let memory = SessionMemory::new();
        let locations = StorageLocations {
            credentials_file: None,
            session: memory.clone(),
        };
        locations.save(StorageTier::Session, &sample()).unwrap();
        assert_eq!(memory.load(), sample());

        locations.clear(StorageTier::Session).unwrap();
        assert!(memory.load().is_empty());
    }

    #[test]
    fn persistent_without_config_dir_fails() {
        let locations = StorageLocations {
            credentials_file: None,
            session: SessionMemory::new(),
        };
        let error = locations.load(StorageTier::Persistent).unwrap_err();
        assert_eq!(error.kind, StorageErrorKind::NoConfigDir);
    }

    #[test]
    fn none_tier_keeps_nothing() {
        let locations = StorageLocations::at("/nonexistent/never-written.toml");
        locations.save(StorageTier::None, &sample()).unwrap();
        assert!(locations.load(StorageTier::None).unwrap().is_empty());
    }
}
