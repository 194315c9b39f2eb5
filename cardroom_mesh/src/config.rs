use crate::error::ConfigError;
use cardroom_core::{GameKind, TableConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 主机开桌所需的全部配置，例如:
///
/// ```json
/// { "game": { "game": "kang", "config": { "min_bet": 20 } } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    pub game: TableConfig,
}

impl SessionConfig {
    pub fn for_game(kind: GameKind) -> Self {
        SessionConfig { game: TableConfig::default_for(kind) }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
