// src/integrations/types.rs — Adapter traits for external effects
//
// One trait per pipeline side effect so tests can inject mocks and the
// pipeline stays ignorant of concrete services.

use async_trait::async_trait;

use crate::infra::errors::HaulbotError;
use crate::pipeline::report::ResolvedAddress;

/// Fetches raw photo bytes for an opaque transport file reference.
#[async_trait]
pub trait PhotoSource: Send + Sync {
    async fn fetch(&self, file_ref: &str) -> Result<Vec<u8>, HaulbotError>;
}

/// Uploads a photo under the given filename.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<(), HaulbotError>;
}

/// Resolves coordinates to a structured address.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse(&self, latitude: f64, longitude: f64)
        -> Result<ResolvedAddress, HaulbotError>;
}

/// Appends one row to the shared tabular ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn append_row(&self, cells: Vec<serde_json::Value>) -> Result<(), HaulbotError>;
}

/// Best-effort operator escalation channel. Implementations log delivery
/// failures; callers never see them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str);
}
