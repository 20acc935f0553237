//! The relayed wire message.
//!
//! ```json
//! { "player": "p1", "move": "e2e4", "chat": "" }
//! ```
//!
//! Every field is optional on input. Keys match case-insensitively, a
//! repeated key overwrites the earlier one, `null` leaves a field as it
//! was, unknown keys are ignored, and anything after the first JSON value
//! in a frame is ignored. On output all three keys are always present. A
//! message is never modified after decoding: the broadcaster encodes it
//! once and every recipient gets the same bytes.

use std::fmt;

use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::ReceiveError;

/// One player move and/or chat line.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Player identifier.
    pub player: String,
    /// Free-form move description. Never validated.
    #[serde(rename = "move")]
    pub move_text: String,
    /// Chat text.
    pub chat: String,
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MessageVisitor)
    }
}

struct MessageVisitor;

impl<'de> Visitor<'de> for MessageVisitor {
    type Value = Message;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Message, A::Error> {
        let mut msg = Message::default();
        while let Some(key) = map.next_key::<String>()? {
            let slot = if key.eq_ignore_ascii_case("player") {
                &mut msg.player
            } else if key.eq_ignore_ascii_case("move") {
                &mut msg.move_text
            } else if key.eq_ignore_ascii_case("chat") {
                &mut msg.chat
            } else {
                let _ = map.next_value::<IgnoredAny>()?;
                continue;
            };
            if let Some(value) = map.next_value::<Option<String>>()? {
                *slot = value;
            }
        }
        Ok(msg)
    }
}

impl Message {
    /// A move announcement from `player`.
    pub fn player_move(player: impl Into<String>, move_text: impl Into<String>) -> Self {
        Self {
            player: player.into(),
            move_text: move_text.into(),
            chat: String::new(),
        }
    }

    /// A chat line with no player or move attached.
    pub fn chat(text: impl Into<String>) -> Self {
        Self {
            chat: text.into(),
            ..Self::default()
        }
    }

    /// Decode an inbound payload.
    ///
    /// The payload must start with a JSON object; arrays, scalars and a
    /// top-level `null` are rejected. Whatever follows the object is not
    /// read.
    pub fn from_json(text: &str) -> Result<Self, ReceiveError> {
        let mut de = serde_json::Deserializer::from_str(text);
        Ok(Self::deserialize(&mut de)?)
    }

    /// Encode for delivery.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
