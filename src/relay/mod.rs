//! Message relay - maps one inbound student message to one reply.

pub mod engine;
pub mod gemini;
pub mod message;
pub mod telegram;

pub use engine::{ChatClient, GenerationClient, GenerationOutcome, RelayEngine, RetryPolicy};
pub use gemini::GeminiClient;
pub use message::{IncomingMessage, OutboundReply, ReplyFormat};
pub use telegram::TelegramClient;
