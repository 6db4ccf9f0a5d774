//! Match configuration, loadable from TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use super::board::{DEFAULT_BOARD_SIZE, WIN_LENGTH};
use super::error::ConfigError;
use super::rules::{RuleKind, RuleSet};

/// Largest board we are willing to allocate per match.
pub const MAX_BOARD_SIZE: usize = 64;

/// Default number of extra attempts when a generated match id collides.
pub const DEFAULT_ID_RETRY_LIMIT: u32 = 10;

/// Default width of generated match ids, in random bits.
pub const DEFAULT_ID_BITS: u32 = 32;

/// Settings shared by every match a registry creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Side length of the square board.
    pub board_size: usize,

    /// Retries after the first attempt when a generated id is taken.
    pub id_retry_limit: u32,

    /// Generated ids are `id_bits` random bits rendered in decimal.
    pub id_bits: u32,

    /// Legality rules installed, in order, in every new match.
    pub rules: Vec<RuleKind>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            board_size: DEFAULT_BOARD_SIZE,
            id_retry_limit: DEFAULT_ID_RETRY_LIMIT,
            id_bits: DEFAULT_ID_BITS,
            rules: Vec::new(),
        }
    }
}

impl GameConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board_size < WIN_LENGTH {
            return Err(ConfigError::Validation(format!(
                "board_size must be >= {}",
                WIN_LENGTH
            )));
        }
        if self.board_size > MAX_BOARD_SIZE {
            return Err(ConfigError::Validation(format!(
                "board_size must be <= {}",
                MAX_BOARD_SIZE
            )));
        }
        if self.id_bits == 0 || self.id_bits > 64 {
            return Err(ConfigError::Validation(
                "id_bits must be in 1..=64".into(),
            ));
        }
        Ok(())
    }

    /// Fresh rule set for a new match.
    pub fn rule_set(&self) -> RuleSet {
        RuleSet::from_kinds(&self.rules)
    }

    /// Total id generation attempts before giving up.
    pub fn id_attempts(&self) -> u32 {
        self.id_retry_limit.saturating_add(1)
    }
}
