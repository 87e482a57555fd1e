// src/engine/event.rs — Incoming events and structured callback payloads

/// One platform event addressed to the engine.
#[derive(Debug, Clone)]
pub struct Incoming {
    pub user_id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
    pub kind: EventKind,
}

/// Tagged union of everything the transport can deliver.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Text(String),
    Location { latitude: f64, longitude: f64 },
    Photo { file_ref: String },
    Callback(CallbackPayload),
}

/// Structured callback payload. On the wire these are short colon-delimited
/// strings ("zone:Левобережная", "page:2"); the engine only ever sees the
/// parsed variant.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackPayload {
    Register,
    StartReport,
    Confirm,
    Cancel,
    Zone(String),
    Reason(String),
    Page(usize),
}

impl CallbackPayload {
    /// Parse the wire form. Unknown payloads return None and are ignored.
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "register" => return Some(Self::Register),
            "driver_report" => return Some(Self::StartReport),
            "confirm" => return Some(Self::Confirm),
            "cancel" => return Some(Self::Cancel),
            _ => {}
        }
        let (tag, value) = data.split_once(':')?;
        match tag {
            "zone" => Some(Self::Zone(value.to_string())),
            "reason" => Some(Self::Reason(value.to_string())),
            "page" => value.parse().ok().map(Self::Page),
            _ => None,
        }
    }

    /// Encode back to the wire form used in keyboard buttons.
    pub fn wire(&self) -> String {
        match self {
            Self::Register => "register".into(),
            Self::StartReport => "driver_report".into(),
            Self::Confirm => "confirm".into(),
            Self::Cancel => "cancel".into(),
            Self::Zone(zone) => format!("zone:{zone}"),
            Self::Reason(code) => format!("reason:{code}"),
            Self::Page(page) => format!("page:{page}"),
        }
    }
}

/// A keyboard attached to an outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub enum Keyboard {
    Inline(Vec<Vec<InlineButton>>),
    /// One reply-keyboard button that asks the client for a location fix.
    RequestLocation { label: String },
    /// Remove the reply keyboard from the client.
    Remove,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineButton {
    pub text: String,
    pub payload: CallbackPayload,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, payload: CallbackPayload) -> Self {
        Self {
            text: text.into(),
            payload,
        }
    }
}

/// One outgoing reply, addressed to the chat the event came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Message {
        text: String,
        keyboard: Option<Keyboard>,
    },
    Photo {
        file_ref: String,
        caption: String,
        keyboard: Option<Keyboard>,
    },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Message {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self::Message {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}
