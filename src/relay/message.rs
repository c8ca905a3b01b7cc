//! Message types crossing the relay boundary.

use teloxide::types::{Update, UpdateKind};

/// One unit of student input, extracted from a Telegram update.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub message_id: Option<i64>,
    pub chat_id: i64,
    pub sender: String,
    pub text: String,
}

/// How an outbound send renders its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFormat {
    /// Telegram Markdown parse mode.
    Rich,
    /// No parse mode; text is delivered verbatim.
    Plain,
}

/// The single reply produced for an [`IncomingMessage`].
#[derive(Debug, Clone)]
pub struct OutboundReply {
    pub chat_id: i64,
    pub reply_to: Option<i64>,
    pub text: String,
    pub format: ReplyFormat,
}

impl IncomingMessage {
    /// Extract the student's message from a webhook update.
    ///
    /// Returns `None` for anything the relay does not answer: non-message
    /// updates (edits, member changes), messages without text (photos,
    /// stickers) and empty text.
    pub fn from_update(update: &Update) -> Option<Self> {
        let msg = match &update.kind {
            UpdateKind::Message(msg) => msg,
            _ => return None,
        };

        let text = msg.text()?;
        if text.is_empty() {
            return None;
        }

        let user = msg.from.as_ref();
        let sender = user
            .and_then(|u| u.username.as_deref())
            .unwrap_or_else(|| user.map(|u| u.first_name.as_str()).unwrap_or("unknown"))
            .to_string();

        Some(Self {
            message_id: Some(msg.id.0 as i64),
            chat_id: msg.chat.id.0,
            sender,
            text: text.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update_from(value: serde_json::Value) -> Update {
        // Deserialize through the same byte/string serde path the production
        // webhook handler uses (`serde_json::from_slice`); `from_value` can't
        // drive teloxide's flattened/untagged `Message` deserialization.
        serde_json::from_str(&value.to_string()).expect("fixture should deserialize")
    }

    fn text_update(text: &str) -> serde_json::Value {
        json!({
            "update_id": 10000,
            "message": {
                "message_id": 1365,
                "date": 1712345678,
                "chat": {
                    "id": 1111111,
                    "type": "private",
                    "first_name": "Thandi",
                    "username": "thandi"
                },
                "from": {
                    "id": 1111111,
                    "is_bot": false,
                    "first_name": "Thandi",
                    "username": "thandi"
                },
                "text": text
            }
        })
    }

    #[test]
    fn test_text_message_is_extracted() {
        let update = update_from(text_update("Explain photosynthesis"));
        let msg = IncomingMessage::from_update(&update).expect("text message should map");
        assert_eq!(msg.message_id, Some(1365));
        assert_eq!(msg.chat_id, 1111111);
        assert_eq!(msg.sender, "thandi");
        assert_eq!(msg.text, "Explain photosynthesis");
    }

    #[test]
    fn test_sender_falls_back_to_first_name() {
        let mut value = text_update("hi");
        value["message"]["from"]
            .as_object_mut()
            .unwrap()
            .remove("username");
        let update = update_from(value);
        let msg = IncomingMessage::from_update(&update).unwrap();
        assert_eq!(msg.sender, "Thandi");
    }

    #[test]
    fn test_empty_text_is_skipped() {
        let update = update_from(text_update(""));
        assert!(IncomingMessage::from_update(&update).is_none());
    }

    #[test]
    fn test_non_text_message_is_skipped() {
        let update = update_from(json!({
            "update_id": 10001,
            "message": {
                "message_id": 1366,
                "date": 1712345679,
                "chat": {"id": 1111111, "type": "private", "first_name": "Thandi"},
                "from": {"id": 1111111, "is_bot": false, "first_name": "Thandi"},
                "photo": [{
                    "file_id": "AgACAgQAAx0CQ",
                    "file_unique_id": "AQADBA",
                    "width": 90,
                    "height": 51,
                    "file_size": 1101
                }]
            }
        }));
        assert!(IncomingMessage::from_update(&update).is_none());
    }

    #[test]
    fn test_edited_message_is_skipped() {
        let update = update_from(json!({
            "update_id": 10002,
            "edited_message": {
                "message_id": 1365,
                "date": 1712345678,
                "edit_date": 1712345680,
                "chat": {"id": 1111111, "type": "private", "first_name": "Thandi"},
                "from": {"id": 1111111, "is_bot": false, "first_name": "Thandi"},
                "text": "edited"
            }
        }));
        assert!(IncomingMessage::from_update(&update).is_none());
    }
}
