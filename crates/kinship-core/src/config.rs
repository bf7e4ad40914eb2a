use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{KinshipError, Result};

/// Top-level configuration for the Kinship application.
///
/// Loaded from `~/.kinship/config.toml` by default. Every section is
/// optional in the file and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KinshipConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub family: FamilyConfig,
    #[serde(default)]
    pub invites: InviteConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl KinshipConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: KinshipConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Reject values that would make downstream components misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.invites.ttl_days == 0 {
            return Err(KinshipError::Config("invites.ttl_days must be > 0".into()));
        }
        if self.render.generation_spacing <= 0.0 || self.render.sibling_spacing <= 0.0 {
            return Err(KinshipError::Config("render spacing must be positive".into()));
        }
        if self.render.page_width <= 2.0 * self.render.margin
            || self.render.page_height <= 2.0 * self.render.margin
        {
            return Err(KinshipError::Config("render margins exceed the page size".into()));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory holding the SQLite database and exports.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.kinship/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Family graph rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyConfig {
    /// Earliest accepted birth year.
    pub min_birth_year: i32,
    /// Name given to trees created implicitly by a user's first member.
    pub default_tree_name: String,
}

impl Default for FamilyConfig {
    fn default() -> Self {
        Self {
            min_birth_year: 1900,
            default_tree_name: "My family".to_string(),
        }
    }
}

/// Invite token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InviteConfig {
    /// Days an invite stays redeemable.
    pub ttl_days: u32,
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self { ttl_days: 7 }
    }
}

/// Hierarchical layout and PDF page settings (PDF points).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Vertical distance between generation bands.
    pub generation_spacing: f64,
    /// Horizontal distance between neighbouring nodes in a band.
    pub sibling_spacing: f64,
    pub page_width: f64,
    pub page_height: f64,
    pub margin: f64,
    pub font_size: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        // A4 portrait.
        Self {
            generation_spacing: 110.0,
            sibling_spacing: 130.0,
            page_width: 595.0,
            page_height: 842.0,
            margin: 40.0,
            font_size: 9.0,
        }
    }
}

/// Dialogue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Minutes of inactivity after which a half-finished dialogue is dropped.
    pub session_timeout_minutes: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            session_timeout_minutes: 30,
        }
    }
}
