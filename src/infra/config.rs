// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::errors::HaulbotError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub disk: DiskConfig,

    #[serde(default)]
    pub sheets: SheetsConfig,

    #[serde(default)]
    pub geocoder: GeocoderConfig,

    #[serde(default)]
    pub flow: FlowConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: String,
    /// Chat that receives escalation messages on pipeline failures.
    #[serde(default)]
    pub operator_chat_id: i64,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
}

fn default_poll_timeout() -> u64 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            operator_chat_id: 0,
            poll_timeout_seconds: default_poll_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_dir: String,
    pub database_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_dir: "database".into(),
            database_file: "users.db".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskConfig {
    pub token: String,
    /// Disk folder the photos land in, without slashes.
    pub folder: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeocoderConfig {
    pub api_key: String,
}

/// Which optional field the report flow collects between photo and confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionalField {
    /// Vehicle plate, pattern-validated and uppercased.
    Plate,
    /// Free-text comment, any non-empty text.
    Comment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default = "default_optional_field")]
    pub optional_field: OptionalField,
    /// Hours added to UTC when formatting the ledger timestamp.
    #[serde(default)]
    pub time_offset_hours: i64,
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_seconds: u64,
}

fn default_optional_field() -> OptionalField {
    OptionalField::Plate
}

fn default_stage_timeout() -> u64 {
    60
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            optional_field: default_optional_field(),
            time_offset_hours: 0,
            stage_timeout_seconds: default_stage_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "crate::engine::catalog::default_zones")]
    pub zones: Vec<String>,
    #[serde(default = "crate::engine::catalog::default_reasons")]
    pub reasons: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            zones: crate::engine::catalog::default_zones(),
            reasons: crate::engine::catalog::default_reasons(),
        }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self, HaulbotError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| HaulbotError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the bot cannot start with.
    pub fn validate(&self) -> Result<(), HaulbotError> {
        if self.telegram.token.is_empty() {
            return Err(HaulbotError::Config("telegram.token is not set".into()));
        }
        if self.telegram.operator_chat_id == 0 {
            return Err(HaulbotError::Config(
                "telegram.operator_chat_id is not set".into(),
            ));
        }
        if self.catalog.zones.is_empty() {
            return Err(HaulbotError::Config("catalog.zones is empty".into()));
        }
        if self.catalog.reasons.is_empty() {
            return Err(HaulbotError::Config("catalog.reasons is empty".into()));
        }
        Ok(())
    }
}
