// src/engine/mod.rs — Conversation engine: state × event dispatch

pub mod catalog;
pub mod event;
pub mod session;
pub mod ui;
pub mod validate;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::engine::catalog::Catalog;
use crate::engine::event::{CallbackPayload, EventKind, Incoming, Keyboard, Reply};
use crate::engine::session::{Session, SessionState, SessionStore};
use crate::infra::config::OptionalField;
use crate::infra::errors::HaulbotError;
use crate::pipeline::report::{ExtraField, Report};
use crate::storage::store::Store;

/// Everything one event produced: replies for the originating chat, an
/// optional report hand-off, and operator escalation texts.
#[derive(Debug, Default)]
pub struct Turn {
    pub replies: Vec<Reply>,
    pub submission: Option<Report>,
    pub escalations: Vec<String>,
}

impl Turn {
    fn reply(reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            ..Self::default()
        }
    }

    /// An event the engine deliberately ignores (stray callbacks, photos
    /// outside a flow).
    fn silent() -> Self {
        Self::default()
    }
}

pub struct ConversationEngine {
    store: Arc<Store>,
    sessions: SessionStore,
    catalog: Catalog,
    optional_field: OptionalField,
    /// Per-user locks serializing whole turns; entries are created lazily.
    user_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ConversationEngine {
    pub fn new(store: Arc<Store>, catalog: Catalog, optional_field: OptionalField) -> Self {
        Self {
            store,
            sessions: SessionStore::new(),
            catalog,
            optional_field,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Process one incoming event. Turns for the same user run strictly one
    /// at a time; distinct users proceed independently.
    pub async fn handle(&self, event: Incoming) -> Result<Turn, HaulbotError> {
        let user_id = event.user_id;
        let lock = {
            let mut locks = self.user_locks.lock().await;
            locks.entry(user_id).or_default().clone()
        };
        let result = {
            let _guard = lock.lock().await;
            self.dispatch(event)
        };
        drop(lock);
        self.evict_lock(user_id).await;
        result
    }

    fn dispatch(&self, event: Incoming) -> Result<Turn, HaulbotError> {
        // Cancel wins over every flow-specific handler, in every state.
        if is_cancel(&event.kind) {
            return Ok(self.cancel(event.user_id));
        }

        match self.sessions.get(event.user_id) {
            Some(session) => self.dispatch_in_session(session, event),
            None => self.dispatch_entry(event),
        }
    }

    /// Drop the user's lock entry once their conversation is over and no
    /// other turn holds it, so the map stays bounded by active conversations.
    async fn evict_lock(&self, user_id: i64) {
        if self.sessions.get(user_id).is_some() {
            return;
        }
        let mut locks = self.user_locks.lock().await;
        if locks.get(&user_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&user_id);
        }
    }

    /// Number of per-user lock entries currently tracked.
    pub async fn tracked_locks(&self) -> usize {
        self.user_locks.lock().await.len()
    }

    fn cancel(&self, user_id: i64) -> Turn {
        let text = if self.sessions.clear(user_id).is_some() {
            ui::CANCELLED
        } else {
            ui::NOTHING_TO_CANCEL
        };
        Turn::reply(Reply::with_keyboard(text, ui::main_menu()))
    }

    // -- No active session: commands, menu callbacks, fallback --

    fn dispatch_entry(&self, event: Incoming) -> Result<Turn, HaulbotError> {
        match &event.kind {
            EventKind::Text(text) if text.trim() == "/start" => self.start_command(&event),
            EventKind::Text(text) if text.trim() == "/reg" => self.registration_entry(&event),
            EventKind::Text(text) if text.starts_with("ban ") => self.ban_command(&event, text),
            EventKind::Text(_) => Ok(Turn::reply(Reply::with_keyboard(
                ui::canned_answer(Utc::now().timestamp_millis() as u64),
                ui::main_menu(),
            ))),
            EventKind::Callback(CallbackPayload::Register) => self.registration_entry(&event),
            EventKind::Callback(CallbackPayload::StartReport) => self.report_entry(&event),
            // Stray callbacks from stale keyboards, photos and locations
            // outside a flow: nothing to do.
            _ => Ok(Turn::silent()),
        }
    }

    fn start_command(&self, event: &Incoming) -> Result<Turn, HaulbotError> {
        if self.store.is_registered(event.user_id)? {
            Ok(Turn::reply(Reply::with_keyboard(
                ui::WELCOME_REGISTERED,
                ui::main_menu(),
            )))
        } else {
            Ok(Turn::reply(Reply::with_keyboard(
                ui::NEW_USER,
                ui::register_keyboard(),
            )))
        }
    }

    fn ban_command(&self, event: &Incoming, text: &str) -> Result<Turn, HaulbotError> {
        if !self.store.is_admin(event.user_id)? {
            return Ok(Turn::reply(Reply::text(ui::UNKNOWN_COMMAND)));
        }
        let Some(banned_id) = text
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse::<i64>().ok())
        else {
            return Ok(Turn::reply(Reply::text(ui::UNKNOWN_COMMAND)));
        };
        let result = self.store.ban_user(banned_id)?;
        tracing::info!(admin = event.user_id, banned = banned_id, result, "ban command");
        Ok(Turn::reply(Reply::text(format!(
            "user {banned_id} ban result {result}"
        ))))
    }

    fn registration_entry(&self, event: &Incoming) -> Result<Turn, HaulbotError> {
        if self.store.is_banned(event.user_id)? {
            return Ok(Turn::reply(Reply::text(ui::BANNED)));
        }
        if self.store.is_registered(event.user_id)? {
            return Ok(Turn::reply(Reply::with_keyboard(
                ui::ALREADY_REGISTERED,
                ui::main_menu(),
            )));
        }
        self.sessions.put(Session::new(
            event.user_id,
            event.chat_id,
            event.username.clone(),
            SessionState::RegAwaitingFullName,
        ));
        Ok(Turn::reply(Reply::with_keyboard(
            format!("{}{}", ui::START_PROCESS, ui::ASK_FULL_NAME),
            ui::cancel_keyboard(),
        )))
    }

    fn report_entry(&self, event: &Incoming) -> Result<Turn, HaulbotError> {
        if !self.store.is_registered(event.user_id)? {
            return Ok(Turn::reply(Reply::with_keyboard(
                ui::NEW_USER,
                ui::register_keyboard(),
            )));
        }
        self.sessions.put(Session::new(
            event.user_id,
            event.chat_id,
            event.username.clone(),
            SessionState::ReportAwaitingZone,
        ));
        Ok(Turn::reply(Reply::with_keyboard(
            ui::ASK_ZONE,
            ui::zone_keyboard(self.catalog.zones()),
        )))
    }

    // -- Active session: one arm per state --

    fn dispatch_in_session(
        &self,
        session: Session,
        event: Incoming,
    ) -> Result<Turn, HaulbotError> {
        match session.state {
            SessionState::RegAwaitingFullName => Ok(self.reg_full_name(session, &event)),
            SessionState::RegAwaitingPhone => Ok(self.reg_phone(session, &event)),
            SessionState::RegAwaitingConfirmation => self.reg_confirm(session, &event),
            SessionState::ReportAwaitingZone => Ok(self.report_zone(session, &event)),
            SessionState::ReportAwaitingLocation => Ok(self.report_location(session, &event)),
            SessionState::ReportAwaitingReason => Ok(self.report_reason(session, &event)),
            SessionState::ReportAwaitingPhoto => Ok(self.report_photo(session, &event)),
            SessionState::ReportAwaitingExtra => Ok(self.report_extra(session, &event)),
            SessionState::ReportAwaitingConfirmation => Ok(self.report_confirm(session, &event)),
        }
    }

    fn reg_full_name(&self, mut session: Session, event: &Incoming) -> Turn {
        if let EventKind::Text(text) = &event.kind {
            if validate::validate_full_name(text) {
                session.fields.full_name = Some(text.clone());
                session.state = SessionState::RegAwaitingPhone;
                self.sessions.put(session);
                return Turn::reply(Reply::with_keyboard(ui::ASK_PHONE, ui::cancel_keyboard()));
            }
        }
        Turn::reply(Reply::with_keyboard(ui::BAD_FULL_NAME, ui::cancel_keyboard()))
    }

    fn reg_phone(&self, mut session: Session, event: &Incoming) -> Turn {
        if let EventKind::Text(text) = &event.kind {
            if validate::validate_phone(text) {
                // Stored verbatim, exactly as entered.
                session.fields.phone_number = Some(text.clone());
                session.state = SessionState::RegAwaitingConfirmation;
                let summary = ui::registration_summary(
                    session.fields.full_name.as_deref().unwrap_or_default(),
                    text,
                );
                self.sessions.put(session);
                return Turn::reply(Reply::with_keyboard(
                    summary,
                    ui::registration_confirm_keyboard(),
                ));
            }
        }
        Turn::reply(Reply::with_keyboard(ui::BAD_PHONE, ui::cancel_keyboard()))
    }

    fn reg_confirm(&self, session: Session, event: &Incoming) -> Result<Turn, HaulbotError> {
        if !matches!(event.kind, EventKind::Callback(CallbackPayload::Confirm)) {
            let summary = ui::registration_summary(
                session.fields.full_name.as_deref().unwrap_or_default(),
                session.fields.phone_number.as_deref().unwrap_or_default(),
            );
            return Ok(Turn::reply(Reply::with_keyboard(
                summary,
                ui::registration_confirm_keyboard(),
            )));
        }

        let full_name = session.fields.full_name.clone().unwrap_or_default();
        let phone_number = session.fields.phone_number.clone().unwrap_or_default();
        let username = event.username.clone().or_else(|| session.username.clone());
        self.sessions.clear(session.user_id);

        let mut turn = Turn::reply(Reply::with_keyboard(ui::REGISTERED_OK, ui::main_menu()));

        // The user already saw success; a failed write goes to the operator.
        if let Err(e) = self.store.register_user(
            session.user_id,
            &full_name,
            &phone_number,
            username.as_deref(),
        ) {
            tracing::error!(user_id = session.user_id, error = %e, "registration write failed");
            turn.escalations.push(format!(
                "Произошла ошибка при регистрации пользователя {}, {}, {}, {}",
                session.user_id,
                full_name,
                phone_number,
                username.unwrap_or_default(),
            ));
        }
        Ok(turn)
    }

    fn report_zone(&self, mut session: Session, event: &Incoming) -> Turn {
        if let EventKind::Callback(CallbackPayload::Zone(zone)) = &event.kind {
            if self.catalog.is_known_zone(zone) {
                session.fields.zone = Some(zone.clone());
                session.state = SessionState::ReportAwaitingLocation;
                self.sessions.put(session);
                return Turn::reply(Reply::with_keyboard(
                    ui::ASK_LOCATION,
                    ui::location_keyboard(),
                ));
            }
        }
        Turn::reply(Reply::with_keyboard(
            ui::ASK_ZONE,
            ui::zone_keyboard(self.catalog.zones()),
        ))
    }

    fn report_location(&self, mut session: Session, event: &Incoming) -> Turn {
        if let EventKind::Location {
            latitude,
            longitude,
        } = event.kind
        {
            session.fields.latitude = Some(latitude);
            session.fields.longitude = Some(longitude);
            session.state = SessionState::ReportAwaitingReason;
            self.sessions.put(session);
            return Turn {
                replies: vec![
                    Reply::with_keyboard(ui::MOVING_ON, Keyboard::Remove),
                    Reply::with_keyboard(ui::ASK_REASON, ui::reason_keyboard(&self.catalog, 0)),
                ],
                ..Turn::default()
            };
        }
        Turn::reply(Reply::with_keyboard(
            ui::ASK_LOCATION,
            ui::location_keyboard(),
        ))
    }

    fn report_reason(&self, mut session: Session, event: &Incoming) -> Turn {
        match &event.kind {
            // Pure pagination: re-render the requested page, no transition.
            EventKind::Callback(CallbackPayload::Page(page)) => Turn::reply(
                Reply::with_keyboard(ui::ASK_REASON, ui::reason_keyboard(&self.catalog, *page)),
            ),
            EventKind::Callback(CallbackPayload::Reason(code)) => {
                match self.catalog.resolve_reason(code) {
                    Some(reason) => {
                        session.fields.reason = Some(reason.to_string());
                        session.state = SessionState::ReportAwaitingPhoto;
                        self.sessions.put(session);
                        Turn::reply(Reply::with_keyboard(ui::ASK_PHOTO, ui::cancel_keyboard()))
                    }
                    None => Turn::reply(Reply::with_keyboard(
                        ui::ASK_REASON,
                        ui::reason_keyboard(&self.catalog, 0),
                    )),
                }
            }
            _ => Turn::reply(Reply::with_keyboard(
                ui::ASK_REASON,
                ui::reason_keyboard(&self.catalog, 0),
            )),
        }
    }

    fn report_photo(&self, mut session: Session, event: &Incoming) -> Turn {
        if let EventKind::Photo { file_ref } = &event.kind {
            session.fields.photo_ref = Some(file_ref.clone());
            session.state = SessionState::ReportAwaitingExtra;
            self.sessions.put(session);
            let prompt = match self.optional_field {
                OptionalField::Plate => ui::ASK_PLATE,
                OptionalField::Comment => ui::ASK_COMMENT,
            };
            return Turn::reply(Reply::with_keyboard(prompt, ui::cancel_keyboard()));
        }
        Turn::reply(Reply::with_keyboard(ui::ASK_PHOTO, ui::cancel_keyboard()))
    }

    fn report_extra(&self, mut session: Session, event: &Incoming) -> Turn {
        let EventKind::Text(text) = &event.kind else {
            let prompt = match self.optional_field {
                OptionalField::Plate => ui::ASK_PLATE,
                OptionalField::Comment => ui::ASK_COMMENT,
            };
            return Turn::reply(Reply::with_keyboard(prompt, ui::cancel_keyboard()));
        };

        match self.optional_field {
            OptionalField::Plate => {
                if !validate::validate_plate(text) {
                    return Turn::reply(Reply::with_keyboard(
                        ui::BAD_PLATE,
                        ui::cancel_keyboard(),
                    ));
                }
                session.fields.plate_number = Some(validate::normalize_plate(text));
            }
            OptionalField::Comment => {
                if text.trim().is_empty() {
                    return Turn::reply(Reply::with_keyboard(
                        ui::BAD_COMMENT,
                        ui::cancel_keyboard(),
                    ));
                }
                session.fields.comment = Some(text.trim().to_string());
            }
        }

        session.state = SessionState::ReportAwaitingConfirmation;
        let summary = self.summary_reply(&session);
        self.sessions.put(session);
        Turn::reply(summary)
    }

    fn report_confirm(&self, session: Session, event: &Incoming) -> Turn {
        if !matches!(event.kind, EventKind::Callback(CallbackPayload::Confirm)) {
            return Turn::reply(self.summary_reply(&session));
        }

        let report = match self.build_report(&session) {
            Some(report) => report,
            // A session in this state always has all fields; if not, drop it
            // and start over rather than submit a partial report.
            None => {
                tracing::error!(user_id = session.user_id, "confirmation with missing fields");
                self.sessions.clear(session.user_id);
                return Turn::reply(Reply::with_keyboard(ui::CANCELLED, ui::main_menu()));
            }
        };

        self.sessions.clear(session.user_id);
        Turn {
            replies: vec![Reply::text(ui::REPORT_ACCEPTED)],
            submission: Some(report),
            escalations: Vec::new(),
        }
    }

    /// Confirmation echo: the photo with the collected fields as caption.
    fn summary_reply(&self, session: &Session) -> Reply {
        let fields = &session.fields;
        let (label, value) = match self.optional_field {
            OptionalField::Plate => ("Госномер", fields.plate_number.as_deref()),
            OptionalField::Comment => ("Комментарий", fields.comment.as_deref()),
        };
        let caption = ui::report_summary(
            fields.zone.as_deref().unwrap_or_default(),
            fields.latitude.unwrap_or_default(),
            fields.longitude.unwrap_or_default(),
            fields.reason.as_deref().unwrap_or_default(),
            label,
            value.unwrap_or_default(),
        );
        Reply::Photo {
            file_ref: fields.photo_ref.clone().unwrap_or_default(),
            caption,
            keyboard: Some(ui::report_confirm_keyboard()),
        }
    }

    fn build_report(&self, session: &Session) -> Option<Report> {
        let fields = &session.fields;
        let extra = match self.optional_field {
            OptionalField::Plate => ExtraField::Plate(fields.plate_number.clone()?),
            OptionalField::Comment => ExtraField::Comment(fields.comment.clone()?),
        };
        Some(Report {
            user_id: session.user_id,
            username: session.username.clone(),
            zone: fields.zone.clone()?,
            latitude: fields.latitude?,
            longitude: fields.longitude?,
            reason: fields.reason.clone()?,
            photo_ref: fields.photo_ref.clone()?,
            extra,
        })
    }
}

fn is_cancel(kind: &EventKind) -> bool {
    match kind {
        EventKind::Callback(CallbackPayload::Cancel) => true,
        EventKind::Text(text) => text.trim() == "/cancel",
        _ => false,
    }
}
