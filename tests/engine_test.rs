// tests/engine_test.rs — Integration tests: conversation flows

use std::sync::Arc;

use haulbot::engine::catalog::{default_reasons, default_zones, Catalog};
use haulbot::engine::event::{CallbackPayload, EventKind, Incoming, Keyboard, Reply};
use haulbot::engine::session::SessionState;
use haulbot::engine::{ConversationEngine, Turn};
use haulbot::infra::config::OptionalField;
use haulbot::pipeline::report::ExtraField;
use haulbot::storage::schema;
use haulbot::storage::store::Store;

use pretty_assertions::assert_eq;
use rusqlite::{Connection, OpenFlags};

/// In-memory store with schema applied.
fn test_store() -> Arc<Store> {
    let conn = Connection::open_in_memory().unwrap();
    schema::run_migrations(&conn).unwrap();
    Arc::new(Store::new(conn))
}

fn test_engine(store: Arc<Store>, optional_field: OptionalField) -> ConversationEngine {
    ConversationEngine::new(
        store,
        Catalog::new(default_zones(), default_reasons()),
        optional_field,
    )
}

// ---------- Event constructors ----------

fn text(user_id: i64, s: &str) -> Incoming {
    Incoming {
        user_id,
        chat_id: user_id,
        username: Some("driver".into()),
        kind: EventKind::Text(s.to_string()),
    }
}

fn callback(user_id: i64, payload: CallbackPayload) -> Incoming {
    Incoming {
        user_id,
        chat_id: user_id,
        username: Some("driver".into()),
        kind: EventKind::Callback(payload),
    }
}

fn location(user_id: i64, latitude: f64, longitude: f64) -> Incoming {
    Incoming {
        user_id,
        chat_id: user_id,
        username: Some("driver".into()),
        kind: EventKind::Location {
            latitude,
            longitude,
        },
    }
}

fn photo(user_id: i64, file_ref: &str) -> Incoming {
    Incoming {
        user_id,
        chat_id: user_id,
        username: Some("driver".into()),
        kind: EventKind::Photo {
            file_ref: file_ref.to_string(),
        },
    }
}

fn first_text(turn: &Turn) -> &str {
    match turn.replies.first().expect("turn has no replies") {
        Reply::Message { text, .. } => text,
        Reply::Photo { caption, .. } => caption,
    }
}

/// Walk a registered user up to the plate prompt.
async fn advance_to_extra(engine: &ConversationEngine, user_id: i64) {
    engine
        .handle(callback(user_id, CallbackPayload::StartReport))
        .await
        .unwrap();
    engine
        .handle(callback(
            user_id,
            CallbackPayload::Zone("Левобережная".into()),
        ))
        .await
        .unwrap();
    engine.handle(location(user_id, 56.01, 92.87)).await.unwrap();
    engine
        .handle(callback(user_id, CallbackPayload::Reason("2.".into())))
        .await
        .unwrap();
    engine.handle(photo(user_id, "file-abc")).await.unwrap();
}

// ---------- Entry and registration ----------

#[tokio::test]
async fn test_start_offers_registration_to_new_user() {
    let engine = test_engine(test_store(), OptionalField::Plate);

    let turn = engine.handle(text(1, "/start")).await.unwrap();

    assert_eq!(first_text(&turn), haulbot::engine::ui::NEW_USER);
    let Reply::Message {
        keyboard: Some(Keyboard::Inline(rows)),
        ..
    } = &turn.replies[0]
    else {
        panic!("expected inline keyboard");
    };
    assert_eq!(rows[0][0].payload, CallbackPayload::Register);
}

#[tokio::test]
async fn test_start_greets_registered_user() {
    let store = test_store();
    store
        .register_user(1, "Иванов Иван Иванович", "89231234567", Some("driver"))
        .unwrap();
    let engine = test_engine(store, OptionalField::Plate);

    let turn = engine.handle(text(1, "/start")).await.unwrap();
    assert_eq!(first_text(&turn), haulbot::engine::ui::WELCOME_REGISTERED);
}

#[tokio::test]
async fn test_full_registration_flow() {
    let store = test_store();
    let engine = test_engine(store.clone(), OptionalField::Plate);

    let turn = engine
        .handle(callback(1, CallbackPayload::Register))
        .await
        .unwrap();
    assert!(first_text(&turn).contains(haulbot::engine::ui::ASK_FULL_NAME));

    let turn = engine
        .handle(text(1, "Иванов Иван Иванович"))
        .await
        .unwrap();
    assert_eq!(first_text(&turn), haulbot::engine::ui::ASK_PHONE);

    let turn = engine.handle(text(1, "89231234567")).await.unwrap();
    assert!(first_text(&turn).contains("Иванов Иван Иванович"));
    assert!(first_text(&turn).contains("89231234567"));

    let turn = engine
        .handle(callback(1, CallbackPayload::Confirm))
        .await
        .unwrap();
    assert_eq!(first_text(&turn), haulbot::engine::ui::REGISTERED_OK);
    assert!(turn.escalations.is_empty());

    assert!(store.is_registered(1).unwrap());
    assert!(engine.sessions().get(1).is_none());

    let profile = store.get_user_by_id(1).unwrap().unwrap();
    assert_eq!(profile.full_name, "Иванов Иван Иванович");
    assert_eq!(profile.phone_number, "89231234567");
    assert_eq!(profile.username, "driver");
}

#[tokio::test]
async fn test_short_full_name_is_rejected_without_transition() {
    let engine = test_engine(test_store(), OptionalField::Plate);
    engine
        .handle(callback(1, CallbackPayload::Register))
        .await
        .unwrap();

    let turn = engine.handle(text(1, "Иван")).await.unwrap();

    assert_eq!(first_text(&turn), haulbot::engine::ui::BAD_FULL_NAME);
    let session = engine.sessions().get(1).unwrap();
    assert_eq!(session.state, SessionState::RegAwaitingFullName);
    assert_eq!(session.fields.full_name, None);
}

#[tokio::test]
async fn test_bad_phone_is_rejected_without_transition() {
    let engine = test_engine(test_store(), OptionalField::Plate);
    engine
        .handle(callback(1, CallbackPayload::Register))
        .await
        .unwrap();
    engine
        .handle(text(1, "Иванов Иван Иванович"))
        .await
        .unwrap();

    let turn = engine.handle(text(1, "12345")).await.unwrap();

    assert_eq!(first_text(&turn), haulbot::engine::ui::BAD_PHONE);
    let session = engine.sessions().get(1).unwrap();
    assert_eq!(session.state, SessionState::RegAwaitingPhone);
    assert_eq!(session.fields.phone_number, None);
}

#[tokio::test]
async fn test_failed_registration_write_escalates() {
    // A read-only connection lets the whole flow run but makes the final
    // insert fail. The user still gets the success reply; the operator
    // gets the escalation with the lost profile data.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.db");
    {
        let conn = Connection::open(&path).unwrap();
        schema::run_migrations(&conn).unwrap();
    }
    let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY).unwrap();
    let store = Arc::new(Store::new(conn));
    let engine = test_engine(store.clone(), OptionalField::Plate);

    engine
        .handle(callback(1, CallbackPayload::Register))
        .await
        .unwrap();
    engine
        .handle(text(1, "Иванов Иван Иванович"))
        .await
        .unwrap();
    engine.handle(text(1, "89231234567")).await.unwrap();
    let turn = engine
        .handle(callback(1, CallbackPayload::Confirm))
        .await
        .unwrap();

    assert_eq!(first_text(&turn), haulbot::engine::ui::REGISTERED_OK);
    assert_eq!(turn.escalations.len(), 1);
    assert!(turn.escalations[0].contains("Иванов Иван Иванович"));
    assert!(turn.escalations[0].contains("89231234567"));
    assert!(engine.sessions().get(1).is_none());
    assert!(!store.is_registered(1).unwrap());
}

#[tokio::test]
async fn test_registration_refused_for_banned_user() {
    let store = test_store();
    store
        .register_user(1, "Иванов Иван Иванович", "89231234567", None)
        .unwrap();
    store.ban_user(1).unwrap();
    let engine = test_engine(store, OptionalField::Plate);

    let turn = engine
        .handle(callback(1, CallbackPayload::Register))
        .await
        .unwrap();

    assert_eq!(first_text(&turn), haulbot::engine::ui::BANNED);
    assert!(engine.sessions().get(1).is_none());
}

// ---------- Report flow ----------

#[tokio::test]
async fn test_full_report_flow_produces_submission() {
    let store = test_store();
    store
        .register_user(1, "Иванов Иван Иванович", "89231234567", Some("driver"))
        .unwrap();
    let engine = test_engine(store, OptionalField::Plate);

    let turn = engine
        .handle(callback(1, CallbackPayload::StartReport))
        .await
        .unwrap();
    assert_eq!(first_text(&turn), haulbot::engine::ui::ASK_ZONE);

    let turn = engine
        .handle(callback(1, CallbackPayload::Zone("Левобережная".into())))
        .await
        .unwrap();
    assert_eq!(first_text(&turn), haulbot::engine::ui::ASK_LOCATION);

    let turn = engine.handle(location(1, 56.01, 92.87)).await.unwrap();
    assert_eq!(turn.replies.len(), 2);
    assert_eq!(first_text(&turn), haulbot::engine::ui::MOVING_ON);

    let turn = engine
        .handle(callback(1, CallbackPayload::Reason("2.".into())))
        .await
        .unwrap();
    assert_eq!(first_text(&turn), haulbot::engine::ui::ASK_PHOTO);

    let turn = engine.handle(photo(1, "file-abc")).await.unwrap();
    assert_eq!(first_text(&turn), haulbot::engine::ui::ASK_PLATE);

    // Lowercase plate input is accepted and normalized.
    let turn = engine.handle(text(1, "е777кх124")).await.unwrap();
    let Reply::Photo {
        file_ref, caption, ..
    } = &turn.replies[0]
    else {
        panic!("expected photo summary");
    };
    assert_eq!(file_ref, "file-abc");
    assert!(caption.contains("Е777КХ124"));

    let turn = engine
        .handle(callback(1, CallbackPayload::Confirm))
        .await
        .unwrap();
    assert_eq!(first_text(&turn), haulbot::engine::ui::REPORT_ACCEPTED);

    let report = turn.submission.expect("confirmed report is handed off");
    assert_eq!(report.user_id, 1);
    assert_eq!(report.zone, "Левобережная");
    assert_eq!(report.reason, "2. Боковая загрузка(задняя загрузка)");
    assert_eq!(report.photo_ref, "file-abc");
    assert_eq!(report.extra, ExtraField::Plate("Е777КХ124".into()));
    assert!(engine.sessions().get(1).is_none());
}

#[tokio::test]
async fn test_report_requires_registration() {
    let engine = test_engine(test_store(), OptionalField::Plate);

    let turn = engine
        .handle(callback(1, CallbackPayload::StartReport))
        .await
        .unwrap();

    assert_eq!(first_text(&turn), haulbot::engine::ui::NEW_USER);
    assert!(engine.sessions().get(1).is_none());
}

#[tokio::test]
async fn test_unknown_zone_reprompts() {
    let store = test_store();
    store
        .register_user(1, "Иванов Иван Иванович", "89231234567", None)
        .unwrap();
    let engine = test_engine(store, OptionalField::Plate);
    engine
        .handle(callback(1, CallbackPayload::StartReport))
        .await
        .unwrap();

    let turn = engine
        .handle(callback(1, CallbackPayload::Zone("Луна".into())))
        .await
        .unwrap();

    assert_eq!(first_text(&turn), haulbot::engine::ui::ASK_ZONE);
    let session = engine.sessions().get(1).unwrap();
    assert_eq!(session.state, SessionState::ReportAwaitingZone);
}

#[tokio::test]
async fn test_reason_pagination_keeps_state() {
    let store = test_store();
    store
        .register_user(1, "Иванов Иван Иванович", "89231234567", None)
        .unwrap();
    let engine = test_engine(store, OptionalField::Plate);
    engine
        .handle(callback(1, CallbackPayload::StartReport))
        .await
        .unwrap();
    engine
        .handle(callback(1, CallbackPayload::Zone("Левобережная".into())))
        .await
        .unwrap();
    engine.handle(location(1, 56.01, 92.87)).await.unwrap();

    let turn = engine
        .handle(callback(1, CallbackPayload::Page(1)))
        .await
        .unwrap();

    assert_eq!(first_text(&turn), haulbot::engine::ui::ASK_REASON);
    let session = engine.sessions().get(1).unwrap();
    assert_eq!(session.state, SessionState::ReportAwaitingReason);
    assert_eq!(session.fields.reason, None);
}

#[tokio::test]
async fn test_bad_plate_reprompts() {
    let store = test_store();
    store
        .register_user(1, "Иванов Иван Иванович", "89231234567", None)
        .unwrap();
    let engine = test_engine(store, OptionalField::Plate);
    advance_to_extra(&engine, 1).await;

    // Latin lookalikes are rejected.
    let turn = engine.handle(text(1, "E777KX124")).await.unwrap();

    assert_eq!(first_text(&turn), haulbot::engine::ui::BAD_PLATE);
    let session = engine.sessions().get(1).unwrap();
    assert_eq!(session.state, SessionState::ReportAwaitingExtra);
}

#[tokio::test]
async fn test_comment_mode_rejects_empty_text() {
    let store = test_store();
    store
        .register_user(1, "Иванов Иван Иванович", "89231234567", None)
        .unwrap();
    let engine = test_engine(store, OptionalField::Comment);
    advance_to_extra(&engine, 1).await;

    let turn = engine.handle(text(1, "   ")).await.unwrap();
    assert_eq!(first_text(&turn), haulbot::engine::ui::BAD_COMMENT);

    engine.handle(text(1, "бак перевернут")).await.unwrap();
    let turn = engine
        .handle(callback(1, CallbackPayload::Confirm))
        .await
        .unwrap();

    let report = turn.submission.unwrap();
    assert_eq!(report.extra, ExtraField::Comment("бак перевернут".into()));
}

#[tokio::test]
async fn test_mismatched_confirmation_resends_summary() {
    let store = test_store();
    store
        .register_user(1, "Иванов Иван Иванович", "89231234567", None)
        .unwrap();
    let engine = test_engine(store, OptionalField::Plate);
    advance_to_extra(&engine, 1).await;
    engine.handle(text(1, "Е777КХ124")).await.unwrap();

    let turn = engine.handle(text(1, "да, все верно")).await.unwrap();

    assert!(matches!(turn.replies[0], Reply::Photo { .. }));
    assert!(turn.submission.is_none());
    let session = engine.sessions().get(1).unwrap();
    assert_eq!(session.state, SessionState::ReportAwaitingConfirmation);
}

// ---------- Cancel ----------

#[tokio::test]
async fn test_cancel_aborts_any_state() {
    let store = test_store();
    store
        .register_user(1, "Иванов Иван Иванович", "89231234567", None)
        .unwrap();
    let engine = test_engine(store, OptionalField::Plate);
    advance_to_extra(&engine, 1).await;

    let turn = engine
        .handle(callback(1, CallbackPayload::Cancel))
        .await
        .unwrap();

    assert_eq!(first_text(&turn), haulbot::engine::ui::CANCELLED);
    assert!(engine.sessions().get(1).is_none());
}

#[tokio::test]
async fn test_cancel_without_session() {
    let engine = test_engine(test_store(), OptionalField::Plate);

    let turn = engine.handle(text(1, "/cancel")).await.unwrap();
    assert_eq!(first_text(&turn), haulbot::engine::ui::NOTHING_TO_CANCEL);
}

// ---------- Isolation and admin ----------

#[tokio::test]
async fn test_sessions_are_isolated_per_user() {
    let store = test_store();
    store
        .register_user(2, "Петров Петр Петрович", "89001112233", None)
        .unwrap();
    let engine = test_engine(store, OptionalField::Plate);

    engine
        .handle(callback(1, CallbackPayload::Register))
        .await
        .unwrap();
    engine
        .handle(callback(2, CallbackPayload::StartReport))
        .await
        .unwrap();

    assert_eq!(
        engine.sessions().get(1).unwrap().state,
        SessionState::RegAwaitingFullName
    );
    assert_eq!(
        engine.sessions().get(2).unwrap().state,
        SessionState::ReportAwaitingZone
    );

    // User 1's cancel leaves user 2's flow untouched.
    engine
        .handle(callback(1, CallbackPayload::Cancel))
        .await
        .unwrap();
    assert!(engine.sessions().get(1).is_none());
    assert!(engine.sessions().get(2).is_some());
}

#[tokio::test]
async fn test_user_locks_evicted_when_conversation_ends() {
    let engine = test_engine(test_store(), OptionalField::Plate);

    // A stateless turn leaves no lock entry behind.
    engine.handle(text(1, "/start")).await.unwrap();
    assert_eq!(engine.tracked_locks().await, 0);

    // An open session keeps its entry; ending it drops the entry.
    engine
        .handle(callback(2, CallbackPayload::Register))
        .await
        .unwrap();
    assert_eq!(engine.tracked_locks().await, 1);

    engine
        .handle(callback(2, CallbackPayload::Cancel))
        .await
        .unwrap();
    assert_eq!(engine.tracked_locks().await, 0);
}

#[tokio::test]
async fn test_ban_command_requires_admin() {
    let store = test_store();
    store
        .register_user(7, "Иванов Иван Иванович", "89231234567", None)
        .unwrap();
    let engine = test_engine(store.clone(), OptionalField::Plate);

    let turn = engine.handle(text(1, "ban 7")).await.unwrap();
    assert_eq!(first_text(&turn), haulbot::engine::ui::UNKNOWN_COMMAND);
    assert!(store.is_registered(7).unwrap());

    store.add_admin(1).unwrap();
    let turn = engine.handle(text(1, "ban 7")).await.unwrap();
    assert_eq!(first_text(&turn), "user 7 ban result true");
    assert!(!store.is_registered(7).unwrap());
    assert!(store.is_banned(7).unwrap());
}

#[tokio::test]
async fn test_free_text_gets_canned_answer_and_menu() {
    let engine = test_engine(test_store(), OptionalField::Plate);

    let turn = engine.handle(text(1, "когда вывоз?")).await.unwrap();

    assert!(haulbot::engine::ui::CANNED_ANSWERS.contains(&first_text(&turn)));
    let Reply::Message {
        keyboard: Some(Keyboard::Inline(rows)),
        ..
    } = &turn.replies[0]
    else {
        panic!("expected inline menu");
    };
    assert_eq!(rows[0][0].payload, CallbackPayload::StartReport);
}

#[tokio::test]
async fn test_stray_photo_outside_flow_is_ignored() {
    let engine = test_engine(test_store(), OptionalField::Plate);

    let turn = engine.handle(photo(1, "file-abc")).await.unwrap();
    assert!(turn.replies.is_empty());
    assert!(turn.submission.is_none());
}
