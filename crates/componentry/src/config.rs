//! # Configuration
//!
//! Store configuration is managed by [`confique`], which layers environment
//! variables over an optional TOML file over the compiled defaults.
//!
//! ## Available Settings
//!
//! | Key | Env | Default | Description |
//! |-----|-----|---------|-------------|
//! | `trace` | `COMPONENTRY_TRACE` | `false` | Start tracing operations as soon as the store is created |
//! | `collection_prefix` | `COMPONENTRY_COLLECTION_PREFIX` | `""` | Prepended to each storable's collection name |
//! | `silent_migrations` | `COMPONENTRY_SILENT_MIGRATIONS` | `false` | Ask backends not to log index changes |

use std::path::Path;

use confique::Config;
use serde::{Deserialize, Serialize};

use crate::error::{ComponentryError, Result};

/// Configuration for a `Store`, optionally stored in a TOML file.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Record every store operation in the in-memory trace.
    #[config(env = "COMPONENTRY_TRACE", default = false)]
    pub trace: bool,

    /// Prefix for collection names (e.g. "test_" gives "test_Movie").
    #[config(env = "COMPONENTRY_COLLECTION_PREFIX", default = "")]
    pub collection_prefix: String,

    #[config(env = "COMPONENTRY_SILENT_MIGRATIONS", default = false)]
    pub silent_migrations: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            trace: false,
            collection_prefix: String::new(),
            silent_migrations: false,
        }
    }
}

impl StoreConfig {
    /// Load from the environment, then the file at `path` if given, then defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::builder().env();
        if let Some(path) = path {
            builder = builder.file(path);
        }
        builder
            .load()
            .map_err(|err| ComponentryError::Config(err.to_string()))
    }

    pub fn collection_name(&self, component_name: &str) -> String {
        format!("{}{}", self.collection_prefix, component_name)
    }
}
