//! In-memory credential map mirrored to a storage tier.

use crate::credentials::storage::{SessionMemory, StorageLocations, StorageTier};
use crate::error::StorageError;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug)]
struct StoreState {
    credentials: HashMap<String, String>,
    tier: StorageTier,
}

/// Provider credentials keyed by provider id.
///
/// Every mutation is written through to the current tier before it becomes
/// visible, so a failed write leaves the store unchanged.
///
/// # Example
///
/// ```rust
/// use chorus::credentials::{CredentialStore, StorageTier};
///
/// let store = CredentialStore::in_memory();
/// store.set("openai", "sk-example").unwrap();
/// assert!(store.has("openai"));
/// assert_eq!(store.tier(), StorageTier::None);
/// ```
#[derive(Debug)]
pub struct CredentialStore {
    state: RwLock<StoreState>,
    locations: StorageLocations,
}

impl CredentialStore {
    /// Opens a store at the user's locations, loading what `tier` holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the tier cannot be read.
    pub fn open(tier: StorageTier) -> Result<Self, StorageError> {
        Self::with_locations(tier, StorageLocations::user())
    }

    /// Opens a store at explicit locations, loading what `tier` holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the tier cannot be read.
    pub fn with_locations(
        tier: StorageTier,
        locations: StorageLocations,
    ) -> Result<Self, StorageError> {
        let credentials = locations.load(tier)?;
        tracing::debug!(tier = %tier, loaded = credentials.len(), "Credential store opened");
        Ok(Self {
            state: RwLock::new(StoreState { credentials, tier }),
            locations,
        })
    }

    /// Creates an empty store that persists nothing.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(StoreState {
                credentials: HashMap::new(),
                tier: StorageTier::None,
            }),
            locations: StorageLocations {
                credentials_file: None,
                session: SessionMemory::new(),
            },
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a credential. A blank credential removes the entry instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the tier cannot be written.
    pub fn set(&self, provider_id: &str, credential: &str) -> Result<(), StorageError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return self.remove(provider_id).map(|_| ());
        }

        let mut state = self.write();
        let mut updated = state.credentials.clone();
        updated.insert(provider_id.to_string(), credential.to_string());
        self.locations.save(state.tier, &updated)?;
        state.credentials = updated;

        tracing::info!(provider = %provider_id, tier = %state.tier, "Credential stored");
        Ok(())
    }

    /// Returns the credential for a provider.
    #[must_use]
    pub fn get(&self, provider_id: &str) -> Option<String> {
        self.read().credentials.get(provider_id).cloned()
    }

    /// Returns true if a credential is stored for the provider.
    #[must_use]
    pub fn has(&self, provider_id: &str) -> bool {
        self.read().credentials.contains_key(provider_id)
    }

    /// Removes a provider's credential, returning whether one was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the tier cannot be written.
    pub fn remove(&self, provider_id: &str) -> Result<bool, StorageError> {
        let mut state = self.write();
        if !state.credentials.contains_key(provider_id) {
            return Ok(false);
        }

        let mut updated = state.credentials.clone();
        updated.remove(provider_id);
        self.locations.save(state.tier, &updated)?;
        state.credentials = updated;

        tracing::info!(provider = %provider_id, tier = %state.tier, "Credential removed");
        Ok(true)
    }

    /// Removes every credential from the store and its tier.
    ///
    /// # Errors
    ///
    /// Returns an error if the tier cannot be cleared.
    pub fn clear(&self) -> Result<(), StorageError> {
        let mut state = self.write();
        self.locations.clear(state.tier)?;
        state.credentials.clear();
        Ok(())
    }

    /// Returns the provider ids that have a credential, sorted.
    #[must_use]
    pub fn providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().credentials.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the current storage tier.
    #[must_use]
    pub fn tier(&self) -> StorageTier {
        self.read().tier
    }

    /// Moves every held credential to a new tier and clears the old one.
    ///
    /// # Errors
    ///
    /// Returns an error if the new tier cannot be written or the old one
    /// cannot be cleared. On either failure the store stays on its old tier
    /// and the copy in the new tier is removed.
    pub fn set_tier(&self, tier: StorageTier) -> Result<(), StorageError> {
        let mut state = self.write();
        if state.tier == tier {
            return Ok(());
        }

        self.locations.save(tier, &state.credentials)?;
        if let Err(error) = self.locations.clear(state.tier) {
            if let Err(undo) = self.locations.clear(tier) {
                tracing::warn!(tier = %tier, error = %undo, "Could not undo credential copy");
            }
            return Err(error);
        }
        let previous = std::mem::replace(&mut state.tier, tier);

        tracing::info!(
            from = %previous,
            to = %tier,
            moved = state.credentials.len(),
            "Credential tier changed"
        );
        Ok(())
    }
}
