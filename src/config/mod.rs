//! Configuration management for chorus.
//!
//! Configuration is optional: without a file every provider uses its public
//! vendor endpoint and credentials are stored persistently.
//!
//! # Configuration File Format
//!
//! Configuration is stored in TOML format. The search order is:
//! 1. `./chorus.toml` (project-local)
//! 2. `~/.config/chorus/config.toml` (user config)
//!
//! # Example Configuration
//!
//! ```toml
//! default_provider = "openai"
//! credential_storage = "persistent"   # persistent | session | none
//!
//! [logging]
//! level = "info"
//!
//! [providers.openai]
//! base_url = "https://api.openai.com"
//! timeout_secs = 60
//! default_model = "gpt-4o-mini"
//! models = ["gpt-4o", "gpt-4o-mini"]
//! api_key_env = "OPENAI_API_KEY"
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use chorus::config;
//!
//! // Load from default search paths
//! let config = config::load()?;
//!
//! // Load from a specific path
//! let config = config::from_path(Path::new("/etc/chorus/config.toml"))?;
//! ```

mod file;
mod types;

pub use file::{config_dir, from_path, from_str, load, search_paths};
pub use types::{default_api_key_env, ChorusConfig, ProviderSettings, ProvidersConfig};
