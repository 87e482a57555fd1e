// src/integrations/telegram.rs — Telegram Bot API client (long polling)
//
// Uses the Telegram Bot API (https://core.telegram.org/bots/api).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::engine::event::{CallbackPayload, EventKind, Incoming, Keyboard, Reply};
use crate::infra::errors::HaulbotError;
use crate::integrations::types::{Notifier, PhotoSource};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

pub struct TelegramApi {
    client: Client,
    token: String,
}

impl TelegramApi {
    pub fn new(token: String) -> Self {
        Self {
            client: Client::new(),
            token,
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{TELEGRAM_API_BASE}/bot{}/{method}", self.token)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{TELEGRAM_API_BASE}/file/bot{}/{file_path}", self.token)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, HaulbotError> {
        let resp: TelegramResponse<T> = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if !resp.ok {
            return Err(HaulbotError::Telegram(format!(
                "{method} failed: {}",
                resp.description.unwrap_or_else(|| "unknown".into())
            )));
        }
        resp.result
            .ok_or_else(|| HaulbotError::Telegram(format!("{method}: empty result")))
    }

    /// Long-poll for updates past `offset`. Blocks server-side for up to
    /// `timeout_seconds`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_seconds: u64,
    ) -> Result<Vec<TgUpdate>, HaulbotError> {
        self.call(
            "getUpdates",
            serde_json::json!({
                "offset": offset,
                "timeout": timeout_seconds,
                "allowed_updates": ["message", "callback_query"],
            }),
        )
        .await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), HaulbotError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = reply_markup(kb);
        }
        let _: TgMessageId = self.call("sendMessage", body).await?;
        Ok(())
    }

    pub async fn send_photo(
        &self,
        chat_id: i64,
        file_ref: &str,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), HaulbotError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "photo": file_ref,
            "caption": caption,
        });
        if let Some(kb) = keyboard {
            body["reply_markup"] = reply_markup(kb);
        }
        let _: TgMessageId = self.call("sendPhoto", body).await?;
        Ok(())
    }

    /// Deliver one engine reply to a chat.
    pub async fn send_reply(&self, chat_id: i64, reply: &Reply) -> Result<(), HaulbotError> {
        match reply {
            Reply::Message { text, keyboard } => {
                self.send_message(chat_id, text, keyboard.as_ref()).await
            }
            Reply::Photo {
                file_ref,
                caption,
                keyboard,
            } => {
                self.send_photo(chat_id, file_ref, caption, keyboard.as_ref())
                    .await
            }
        }
    }

    /// Acknowledge a callback so the client stops its spinner. Best effort.
    pub async fn answer_callback(&self, callback_id: &str) {
        let body = serde_json::json!({ "callback_query_id": callback_id });
        if let Err(e) = self.call::<bool>("answerCallbackQuery", body).await {
            tracing::debug!(error = %e, "answerCallbackQuery failed");
        }
    }
}

#[async_trait]
impl PhotoSource for TelegramApi {
    async fn fetch(&self, file_ref: &str) -> Result<Vec<u8>, HaulbotError> {
        let file: TgFile = self
            .call("getFile", serde_json::json!({ "file_id": file_ref }))
            .await?;
        let file_path = file
            .file_path
            .ok_or_else(|| HaulbotError::Telegram("getFile: no file_path".into()))?;

        let resp = self.client.get(self.file_url(&file_path)).send().await?;
        if !resp.status().is_success() {
            return Err(HaulbotError::Telegram(format!(
                "file download returned {}",
                resp.status()
            )));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

/// Escalation channel: plain messages to the operator chat.
pub struct OperatorNotifier {
    api: std::sync::Arc<TelegramApi>,
    chat_id: i64,
}

impl OperatorNotifier {
    pub fn new(api: std::sync::Arc<TelegramApi>, chat_id: i64) -> Self {
        Self { api, chat_id }
    }
}

#[async_trait]
impl Notifier for OperatorNotifier {
    async fn notify(&self, text: &str) {
        if let Err(e) = self.api.send_message(self.chat_id, text, None).await {
            tracing::error!(error = %e, "operator escalation delivery failed");
        }
    }
}

// -- Telegram API response types --

#[derive(Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct TgMessageId {
    #[allow(dead_code)]
    message_id: i64,
}

#[derive(Deserialize)]
struct TgFile {
    file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TgUpdate {
    pub update_id: i64,
    message: Option<TgMessage>,
    callback_query: Option<TgCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    chat: TgChat,
    from: Option<TgUser>,
    text: Option<String>,
    location: Option<TgLocation>,
    photo: Option<Vec<TgPhotoSize>>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgLocation {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct TgPhotoSize {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct TgCallbackQuery {
    id: String,
    from: TgUser,
    message: Option<TgCallbackMessage>,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgCallbackMessage {
    chat: TgChat,
}

impl TgUpdate {
    /// Convert a raw update into an engine event. Returns the event plus the
    /// callback id to acknowledge, if any. Updates the engine has no use for
    /// (edited messages, stickers, unknown callbacks) map to None.
    pub fn into_incoming(self) -> Option<(Incoming, Option<String>)> {
        if let Some(msg) = self.message {
            let from = msg.from?;
            let kind = if let Some(location) = msg.location {
                EventKind::Location {
                    latitude: location.latitude,
                    longitude: location.longitude,
                }
            } else if let Some(photo) = msg.photo {
                // Telegram sends several sizes; the last is the largest.
                EventKind::Photo {
                    file_ref: photo.last()?.file_id.clone(),
                }
            } else if let Some(text) = msg.text {
                EventKind::Text(text)
            } else {
                return None;
            };
            return Some((
                Incoming {
                    user_id: from.id,
                    chat_id: msg.chat.id,
                    username: from.username,
                    kind,
                },
                None,
            ));
        }

        if let Some(cb) = self.callback_query {
            let payload = CallbackPayload::parse(cb.data.as_deref()?)?;
            // Fall back to a direct chat with the user if the original
            // message is gone.
            let chat_id = cb.message.map(|m| m.chat.id).unwrap_or(cb.from.id);
            return Some((
                Incoming {
                    user_id: cb.from.id,
                    chat_id,
                    username: cb.from.username,
                    kind: EventKind::Callback(payload),
                },
                Some(cb.id),
            ));
        }

        None
    }
}

/// Serialize an engine keyboard into Telegram reply markup.
fn reply_markup(keyboard: &Keyboard) -> serde_json::Value {
    match keyboard {
        Keyboard::Inline(rows) => serde_json::json!({
            "inline_keyboard": rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| {
                            serde_json::json!({
                                "text": b.text,
                                "callback_data": b.payload.wire(),
                            })
                        })
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>(),
        }),
        Keyboard::RequestLocation { label } => serde_json::json!({
            "keyboard": [[{ "text": label, "request_location": true }]],
            "resize_keyboard": true,
            "one_time_keyboard": true,
        }),
        Keyboard::Remove => serde_json::json!({ "remove_keyboard": true }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_update_to_incoming() {
        let update: TgUpdate = serde_json::from_value(serde_json::json!({
            "update_id": 7,
            "message": {
                "chat": { "id": 42 },
                "from": { "id": 1, "username": "driver" },
                "text": "/start"
            }
        }))
        .unwrap();

        let (incoming, cb) = update.into_incoming().unwrap();
        assert!(cb.is_none());
        assert_eq!(incoming.user_id, 1);
        assert_eq!(incoming.chat_id, 42);
        assert_eq!(incoming.username.as_deref(), Some("driver"));
        assert_eq!(incoming.kind, EventKind::Text("/start".into()));
    }

    #[test]
    fn test_photo_update_takes_largest_size() {
        let update: TgUpdate = serde_json::from_value(serde_json::json!({
            "update_id": 8,
            "message": {
                "chat": { "id": 42 },
                "from": { "id": 1 },
                "photo": [
                    { "file_id": "small" },
                    { "file_id": "big" }
                ]
            }
        }))
        .unwrap();

        let (incoming, _) = update.into_incoming().unwrap();
        assert_eq!(
            incoming.kind,
            EventKind::Photo {
                file_ref: "big".into()
            }
        );
    }

    #[test]
    fn test_callback_update_parses_payload() {
        let update: TgUpdate = serde_json::from_value(serde_json::json!({
            "update_id": 9,
            "callback_query": {
                "id": "cb-1",
                "from": { "id": 5, "username": "driver" },
                "message": { "chat": { "id": 42 } },
                "data": "zone:Левобережная"
            }
        }))
        .unwrap();

        let (incoming, cb) = update.into_incoming().unwrap();
        assert_eq!(cb.as_deref(), Some("cb-1"));
        assert_eq!(
            incoming.kind,
            EventKind::Callback(CallbackPayload::Zone("Левобережная".into()))
        );
    }

    #[test]
    fn test_unknown_callback_data_is_dropped() {
        let update: TgUpdate = serde_json::from_value(serde_json::json!({
            "update_id": 10,
            "callback_query": {
                "id": "cb-2",
                "from": { "id": 5 },
                "data": "mystery:payload"
            }
        }))
        .unwrap();
        assert!(update.into_incoming().is_none());
    }

    #[test]
    fn test_reply_markup_shapes() {
        let markup = reply_markup(&crate::engine::ui::cancel_keyboard());
        assert_eq!(
            markup["inline_keyboard"][0][0]["callback_data"],
            serde_json::json!("cancel")
        );

        let markup = reply_markup(&Keyboard::Remove);
        assert_eq!(markup["remove_keyboard"], serde_json::json!(true));

        let markup = reply_markup(&Keyboard::RequestLocation {
            label: "loc".into(),
        });
        assert_eq!(
            markup["keyboard"][0][0]["request_location"],
            serde_json::json!(true)
        );
    }
}
