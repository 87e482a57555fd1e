// src/pipeline/report.rs — Report and pipeline outcome types

use std::fmt;

/// The optional final answer of the report flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    /// Vehicle plate, uppercase-normalized at validation time.
    Plate(String),
    /// Free-text comment.
    Comment(String),
}

impl ExtraField {
    pub fn value(&self) -> &str {
        match self {
            Self::Plate(v) | Self::Comment(v) => v,
        }
    }

    /// Label used in the confirmation summary.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Plate(_) => "Госномер",
            Self::Comment(_) => "Комментарий",
        }
    }
}

/// A fully collected report, handed from the conversation engine to the
/// submission pipeline. Immutable once built; the session it came from is
/// destroyed at hand-off.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub user_id: i64,
    pub username: Option<String>,
    pub zone: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Full reason text, already resolved from the short code.
    pub reason: String,
    /// Opaque transport reference to the photo (Telegram file id).
    pub photo_ref: String,
    pub extra: ExtraField,
}

/// Submitter profile fetched from the user directory (stage 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub full_name: String,
    pub phone_number: String,
    pub username: String,
}

/// Reverse-geocoded address (stage 3). Absent fields carry the explicit
/// "<field> не найдено" placeholder instead of being empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub formatted: String,
    pub city: String,
    pub county: String,
    pub district: String,
    pub suburb: String,
    pub street: String,
    pub house_number: String,
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ProfileLookup,
    AssetUpload,
    ReverseGeocode,
    LedgerAppend,
    LocalPersist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ProfileLookup => "поиске пользователя",
            Stage::AssetUpload => "загрузке фото",
            Stage::ReverseGeocode => "получении адреса",
            Stage::LedgerAppend => "загрузке информации",
            Stage::LocalPersist => "сохранении в БД",
        };
        f.write_str(name)
    }
}

/// Outcome of one pipeline run. Exists only for the duration of the run;
/// failures are escalated, not persisted.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// All five stages completed; carries the local row id.
    Submitted { row_id: i64 },
    Failed(StageFailure),
}

/// Captured context of the first failing stage.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: crate::infra::errors::HaulbotError,
    /// Snapshot of the report at the point of failure, for manual recovery.
    pub report: Report,
    /// The fully assembled row when the failure hit the ledger append or the
    /// local insert. Carries the profile, stored photo filename, and resolved
    /// address so the operator can re-append the row by hand.
    pub row: Option<crate::storage::store::ReportRow>,
}
