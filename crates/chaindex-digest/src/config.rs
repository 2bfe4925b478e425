use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DigestError, DigestResult};

/// Default maximum number of write models sent in one bulk write.
pub const DEFAULT_BULK_WRITE_LIMIT: usize = 500;

/// Configuration for block digesting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Maximum number of documents per bulk-write round trip.
    pub bulk_write_limit: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            bulk_write_limit: DEFAULT_BULK_WRITE_LIMIT,
        }
    }
}

impl DigestConfig {
    pub fn with_bulk_write_limit(limit: usize) -> Self {
        Self {
            bulk_write_limit: limit,
        }
    }

    /// Reject values the digester cannot run with.
    pub fn validate(&self) -> DigestResult<()> {
        if self.bulk_write_limit == 0 {
            return Err(DigestError::Config(
                "bulk_write_limit must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> DigestResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| DigestError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> DigestResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DigestError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> DigestResult<String> {
        toml::to_string(self).map_err(|e| DigestError::Config(e.to_string()))
    }
}
