// src/main.rs — haulbot entry point

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use haulbot::engine::catalog::Catalog;
use haulbot::engine::ConversationEngine;
use haulbot::infra::config::Config;
use haulbot::infra::logger;
use haulbot::integrations::disk::YandexDiskStorage;
use haulbot::integrations::geocode::GeoapifyGeocoder;
use haulbot::integrations::sheets::GoogleSheetsLedger;
use haulbot::integrations::telegram::{OperatorNotifier, TelegramApi};
use haulbot::integrations::types::Notifier;
use haulbot::pipeline::SubmissionPipeline;
use haulbot::storage::schema;
use haulbot::storage::store::Store;

#[derive(Parser)]
#[command(name = "haulbot", version, about = "Missed-pickup report bot")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    // Respects RUST_LOG
    logger::init_logging("info");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load_from(&cli.config)?;

    let store = Arc::new(init_store(&config)?);

    let api = Arc::new(TelegramApi::new(config.telegram.token.clone()));
    let notifier: Arc<dyn Notifier> = Arc::new(OperatorNotifier::new(
        api.clone(),
        config.telegram.operator_chat_id,
    ));

    let pipeline = Arc::new(SubmissionPipeline::new(
        store.clone(),
        api.clone(),
        Arc::new(YandexDiskStorage::new(
            config.disk.token.clone(),
            config.disk.folder.clone(),
        )),
        Arc::new(GeoapifyGeocoder::new(config.geocoder.api_key.clone())),
        Arc::new(GoogleSheetsLedger::new(
            config.sheets.spreadsheet_id.clone(),
            config.sheets.access_token.clone(),
        )),
        notifier.clone(),
        Duration::from_secs(config.flow.stage_timeout_seconds),
        config.flow.time_offset_hours,
    ));

    let engine = Arc::new(ConversationEngine::new(
        store,
        Catalog::new(config.catalog.zones.clone(), config.catalog.reasons.clone()),
        config.flow.optional_field,
    ));

    tracing::info!("haulbot started, polling for updates");
    poll_loop(&config, api, engine, pipeline, notifier).await
}

/// Open the SQLite database and run migrations. The directory is created
/// on first start.
fn init_store(config: &Config) -> anyhow::Result<Store> {
    let dir = PathBuf::from(&config.storage.database_dir);
    std::fs::create_dir_all(&dir)?;
    let db_path = dir.join(&config.storage.database_file);

    let conn = rusqlite::Connection::open(&db_path)?;
    schema::run_migrations(&conn)?;
    tracing::info!("database ready at {}", db_path.display());
    Ok(Store::new(conn))
}

/// Long-poll loop: each update is handled on its own task so a slow
/// pipeline run for one user never delays message handling for others.
async fn poll_loop(
    config: &Config,
    api: Arc<TelegramApi>,
    engine: Arc<ConversationEngine>,
    pipeline: Arc<SubmissionPipeline>,
    notifier: Arc<dyn Notifier>,
) -> anyhow::Result<()> {
    let mut offset: i64 = 0;

    loop {
        let updates = match api
            .get_updates(offset, config.telegram.poll_timeout_seconds)
            .await
        {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates failed, retrying");
                tokio::time::sleep(Duration::from_secs(3)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some((incoming, callback_id)) = update.into_incoming() else {
                continue;
            };

            let api = api.clone();
            let engine = engine.clone();
            let pipeline = pipeline.clone();
            let notifier = notifier.clone();

            tokio::spawn(async move {
                if let Some(ref id) = callback_id {
                    api.answer_callback(id).await;
                }

                let chat_id = incoming.chat_id;
                let user_id = incoming.user_id;

                let turn = match engine.handle(incoming).await {
                    Ok(turn) => turn,
                    // A handler error must not kill the task loop: log it
                    // and surface a generic failure to the operator.
                    Err(e) => {
                        tracing::error!(user_id, error = %e, "event handler failed");
                        notifier
                            .notify(&format!(
                                "Произошла ошибка {e} при обработке события пользователя {user_id}."
                            ))
                            .await;
                        return;
                    }
                };

                for reply in &turn.replies {
                    if let Err(e) = api.send_reply(chat_id, reply).await {
                        tracing::error!(chat_id, error = %e, "reply delivery failed");
                    }
                }

                for escalation in &turn.escalations {
                    notifier.notify(escalation).await;
                }

                // The user already got the acknowledgment; the pipeline
                // runs detached and reports failures to the operator only.
                if let Some(report) = turn.submission {
                    tokio::spawn(async move {
                        pipeline.submit(report).await;
                    });
                }
            });
        }
    }
}
