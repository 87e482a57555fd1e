// src/infra/errors.rs — Error types for haulbot

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HaulbotError {
    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("Blob storage error: {0}")]
    BlobStorage(String),

    #[error("Geocoder returned status {status}")]
    GeocoderStatus { status: u16 },

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Stage timed out after {0:?}")]
    StageTimeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
