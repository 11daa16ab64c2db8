//! Provider credential management.
//!
//! [`CredentialStore`] holds one API key per provider and mirrors it to a
//! [`StorageTier`]; [`CredentialValidator`] checks a key against its
//! provider without ever failing the caller.

mod storage;
mod store;
mod validator;

pub use storage::{
    default_credentials_path, SessionMemory, StorageLocations, StorageTier, CREDENTIALS_FILE_NAME,
};
pub use store::CredentialStore;
pub use validator::CredentialValidator;
