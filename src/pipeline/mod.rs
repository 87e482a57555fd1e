// src/pipeline/mod.rs — Submission pipeline: five ordered stages
//
// Runs once per confirmed report, off the event-handling path. The first
// failing stage aborts the rest of the run; its context is escalated to
// the operator channel and the report counts as not submitted. Earlier
// side effects (an uploaded photo, an appended ledger row) are not rolled
// back; the escalation message is the recovery mechanism.

pub mod report;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::infra::errors::HaulbotError;
use crate::integrations::types::{BlobStorage, Geocoder, Ledger, Notifier, PhotoSource};
use crate::pipeline::report::{PipelineOutcome, Profile, Report, Stage, StageFailure};
use crate::storage::store::{ReportRow, Store};

pub struct SubmissionPipeline {
    store: Arc<Store>,
    photos: Arc<dyn PhotoSource>,
    blob: Arc<dyn BlobStorage>,
    geocoder: Arc<dyn Geocoder>,
    ledger: Arc<dyn Ledger>,
    notifier: Arc<dyn Notifier>,
    stage_timeout: Duration,
    /// Hours added to UTC in the ledger's human-readable timestamp.
    time_offset_hours: i64,
}

impl SubmissionPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        photos: Arc<dyn PhotoSource>,
        blob: Arc<dyn BlobStorage>,
        geocoder: Arc<dyn Geocoder>,
        ledger: Arc<dyn Ledger>,
        notifier: Arc<dyn Notifier>,
        stage_timeout: Duration,
        time_offset_hours: i64,
    ) -> Self {
        Self {
            store,
            photos,
            blob,
            geocoder,
            ledger,
            notifier,
            stage_timeout,
            time_offset_hours,
        }
    }

    /// Run all stages for one report. Escalates on failure and returns the
    /// outcome; never panics, never retries.
    pub async fn submit(&self, report: Report) -> PipelineOutcome {
        match self.run_stages(&report).await {
            Ok(row_id) => {
                tracing::info!(user_id = report.user_id, row_id, "report submitted");
                PipelineOutcome::Submitted { row_id }
            }
            Err((stage, error, row)) => {
                tracing::error!(user_id = report.user_id, ?stage, %error, "pipeline stage failed");
                let failure = StageFailure {
                    stage,
                    error,
                    report,
                    row,
                };
                self.escalate(&failure).await;
                PipelineOutcome::Failed(failure)
            }
        }
    }

    async fn run_stages(
        &self,
        report: &Report,
    ) -> Result<i64, (Stage, HaulbotError, Option<ReportRow>)> {
        // 1. Profile lookup (local, no timeout needed)
        let profile = self
            .lookup_profile(report.user_id)
            .map_err(|e| (Stage::ProfileLookup, e, None))?;

        // 2. Photo download + blob upload
        let photo_name = self
            .bounded(self.upload_photo(report))
            .await
            .map_err(|e| (Stage::AssetUpload, e, None))?;

        // 3. Reverse geocoding
        let address = self
            .bounded(self.geocoder.reverse(report.latitude, report.longitude))
            .await
            .map_err(|e| (Stage::ReverseGeocode, e, None))?;

        // Everything the last two stages need, assembled once. Failures from
        // here on carry this row so the operator can replay it by hand.
        let row = ReportRow {
            full_name: profile.full_name,
            phone_number: profile.phone_number,
            username: profile.username,
            user_id: report.user_id,
            zone: report.zone.clone(),
            latitude: report.latitude,
            longitude: report.longitude,
            reason: report.reason.clone(),
            plate_or_comment: report.extra.value().to_string(),
            photo_name,
            full_address: address.formatted,
            city: address.city,
            county: address.county,
            district: address.district,
            suburb: address.suburb,
            street: address.street,
            house_number: address.house_number,
        };

        // 4. Ledger append
        let cells = ledger_cells(&self.ledger_timestamp(), &row);
        self.bounded(self.ledger.append_row(cells))
            .await
            .map_err(|e| (Stage::LedgerAppend, e, Some(row.clone())))?;

        // 5. Local persistence (stamps its own UNIX timestamp)
        self.store
            .insert_driver_report(&row)
            .map_err(|e| (Stage::LocalPersist, e, Some(row)))
    }

    fn lookup_profile(&self, user_id: i64) -> Result<Profile, HaulbotError> {
        self.store.get_user_by_id(user_id)?.ok_or_else(|| {
            HaulbotError::Other(anyhow::anyhow!("user {user_id} not in directory"))
        })
    }

    async fn upload_photo(&self, report: &Report) -> Result<String, HaulbotError> {
        let bytes = self.photos.fetch(&report.photo_ref).await?;
        let filename = upload_filename(Utc::now());
        self.blob.upload(bytes, &filename).await?;
        Ok(filename)
    }

    /// Bound a stage with the configured timeout; expiry is an ordinary
    /// stage failure, never a hang.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, HaulbotError>>,
    ) -> Result<T, HaulbotError> {
        match tokio::time::timeout(self.stage_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(HaulbotError::StageTimeout(self.stage_timeout)),
        }
    }

    fn ledger_timestamp(&self) -> String {
        (Utc::now() + chrono::Duration::hours(self.time_offset_hours))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    async fn escalate(&self, failure: &StageFailure) {
        let text = match &failure.row {
            Some(row) => format!(
                "Произошла ошибка {} при {}. Данные: {:?}",
                failure.error, failure.stage, row
            ),
            None => format!(
                "Произошла ошибка {} при {}. Заявка: {:?}",
                failure.error, failure.stage, failure.report
            ),
        };
        self.notifier.notify(&text).await;
    }
}

/// Collision-resistant, time-derived upload filename: the UNIX timestamp
/// with sub-second digits and no separators.
pub fn upload_filename(now: chrono::DateTime<Utc>) -> String {
    format!("{}{:06}.jpg", now.timestamp(), now.timestamp_subsec_micros())
}

/// The flat ledger row, in column order: timestamp, profile, report
/// fields, photo filename, address fields.
pub fn ledger_cells(timestamp: &str, row: &ReportRow) -> Vec<serde_json::Value> {
    vec![
        serde_json::json!(timestamp),
        serde_json::json!(row.full_name),
        serde_json::json!(row.phone_number),
        serde_json::json!(row.username),
        serde_json::json!(row.user_id),
        serde_json::json!(row.zone),
        serde_json::json!(row.latitude),
        serde_json::json!(row.longitude),
        serde_json::json!(row.reason),
        serde_json::json!(row.plate_or_comment),
        serde_json::json!(row.photo_name),
        serde_json::json!(row.full_address),
        serde_json::json!(row.city),
        serde_json::json!(row.county),
        serde_json::json!(row.district),
        serde_json::json!(row.suburb),
        serde_json::json!(row.street),
        serde_json::json!(row.house_number),
    ]
}
