//! Telegram client using teloxide.

use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode, ReplyParameters};
use tracing::warn;

use crate::relay::engine::ChatClient;
use crate::relay::message::ReplyFormat;

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

impl ChatClient for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        format: ReplyFormat,
        reply_to: Option<i64>,
    ) -> Result<i64, String> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);

        if format == ReplyFormat::Rich {
            request = request.parse_mode(ParseMode::Markdown);
        }

        if let Some(msg_id) = reply_to {
            let reply_params = ReplyParameters::new(MessageId(msg_id as i32));
            request = request.reply_parameters(reply_params);
        }

        request.await.map(|msg| msg.id.0 as i64).map_err(|e| {
            let msg = format!("Failed to send: {e}");
            warn!("{}", msg);
            msg
        })
    }
}
