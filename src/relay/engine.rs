//! Relay engine - turns one inbound student message into exactly one reply.
//!
//! Failure classification is a closed type ([`GenerationOutcome`]) so the
//! retry policy never inspects error strings: quota exhaustion and safety
//! blocks are terminal, everything else is retried up to a small bound with
//! exponential backoff, and every path ends in a send attempt.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::relay::message::{IncomingMessage, OutboundReply, ReplyFormat};

/// Fixed tutor persona prepended to every generation request.
pub const PERSONA_INSTRUCTION: &str = "\
You are the 'Ejubukweni High EGCSE Study Buddy'. You are an expert tutor for \
Eswatini Biology (6884) and Physical Science (6888) syllabi for Form 4 and 5.\n\
\n\
When a student asks for a topic, follow this structure:\n\
1. BRIEF NOTES: Provide clear, point-form notes on the topic.\n\
2. EXAM STYLE QUIZ: Ask the student if they want questions from P1, P2, or P4.\n\
\n\
STRICT EXAM FORMATS:\n\
- P1: Short, 1-mark recall or multiple-choice questions.\n\
- P2: Structured questions with parts (a) and (b). Include science calculations.\n\
- P4: Alternative to Practical. Describe an experiment (like food tests or \
density measurements) and ask about variables, observations, or safety \
precautions.\n\
\n\
FORMATTING:\n\
- Mark headers and key terms in *bold*.\n\
- Use the bullet character \u{2022} for point-form notes.\n\
- Never use LaTeX or backslash math: write exponents as x^2 and fractions \
as 1/2 in plain text.\n\
\n\
TONE: Use SI units, be encouraging, and use local Eswatini examples where \
possible.";

/// Sent for /start and /help.
const WELCOME_REPLY: &str = "Sawubona! I am the Ejubukweni High AI Study Buddy. \u{1F4DA}\n\n\
I'm ready for Biology, Physical Science, or Math.\n\
What topic are we revising today?";

/// Sent when the generation service is out of quota.
const QUOTA_REPLY: &str = "I've answered all the questions my brain allows for now. \
Please try again after my quota resets!";

/// Sent when the safety filter returned no answer.
const REPHRASE_REPLY: &str = "I couldn't put together an answer for that one. \
Could you rephrase your question?";

/// Sent when every generation attempt failed.
const APOLOGY_REPLY: &str = "I'm having a quick brain-break. Please try again in a moment!";

/// Classified result of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Non-empty generated text.
    Success(String),
    /// The service refused for quota/rate reasons. Terminal: retrying would
    /// only worsen the exhaustion.
    QuotaExceeded,
    /// The call succeeded but the safety filter withheld the content. Terminal.
    SafetyBlocked,
    /// Transport or service failure worth retrying.
    Transient(String),
}

/// Seam to the generative-language service.
#[allow(async_fn_in_trait)]
pub trait GenerationClient {
    async fn generate(&self, prompt: &str) -> GenerationOutcome;
}

/// Seam to the chat platform's send primitive.
#[allow(async_fn_in_trait)]
pub trait ChatClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        format: ReplyFormat,
        reply_to: Option<i64>,
    ) -> Result<i64, String>;
}

/// Bounds on the generation retry loop.
///
/// Backoff doubles per attempt from `backoff_base` up to `backoff_cap`; the
/// defaults keep the cumulative delay within the webhook response window.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    fn backoff(&self, attempt: u32) -> Duration {
        let doubled = self
            .backoff_base
            .saturating_mul(1u32 << (attempt - 1).min(16));
        doubled.min(self.backoff_cap)
    }
}

/// The message relay.
pub struct RelayEngine<G, C> {
    gemini: G,
    chat: C,
    policy: RetryPolicy,
}

/// Combine the persona instruction with the student's question.
fn build_prompt(text: &str) -> String {
    format!("{PERSONA_INSTRUCTION}\n\nStudent: {text}")
}

/// True for the commands answered with the fixed welcome message.
fn is_welcome_command(text: &str) -> bool {
    let Some(first) = text.split_whitespace().next() else {
        return false;
    };
    // Commands in groups arrive as /start@BotName
    matches!(first.split('@').next(), Some("/start") | Some("/help"))
}

impl<G: GenerationClient, C: ChatClient> RelayEngine<G, C> {
    pub fn new(gemini: G, chat: C, policy: RetryPolicy) -> Self {
        Self {
            gemini,
            chat,
            policy,
        }
    }

    /// Handle one message to completion. Never propagates a failure: every
    /// path ends in a send attempt, and send failures are logged and
    /// swallowed after the one plain-text fallback.
    pub async fn handle_message(&self, msg: IncomingMessage) {
        let reply = self.reply_for(&msg).await;
        self.send_reply(&reply).await;
    }

    /// Map one incoming message to its single reply.
    async fn reply_for(&self, msg: &IncomingMessage) -> OutboundReply {
        let preview: String = msg.text.chars().take(100).collect();
        info!("Message from {} ({}): \"{preview}\"", msg.sender, msg.chat_id);

        let (text, format) = if is_welcome_command(&msg.text) {
            (WELCOME_REPLY.to_string(), ReplyFormat::Plain)
        } else {
            self.generate_with_retry(&build_prompt(&msg.text)).await
        };

        OutboundReply {
            chat_id: msg.chat_id,
            reply_to: msg.message_id,
            text,
            format,
        }
    }

    /// Run the bounded retry loop and pick the reply text.
    ///
    /// Successful generations are rendered rich; the canned degraded-mode
    /// replies carry no markup and go out plain.
    async fn generate_with_retry(&self, prompt: &str) -> (String, ReplyFormat) {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.gemini.generate(prompt).await {
                GenerationOutcome::Success(text) => return (text, ReplyFormat::Rich),
                GenerationOutcome::QuotaExceeded => {
                    warn!("Generation quota exhausted, sending the quota notice");
                    return (QUOTA_REPLY.to_string(), ReplyFormat::Plain);
                }
                GenerationOutcome::SafetyBlocked => {
                    warn!("Generation blocked by the safety filter, asking to rephrase");
                    return (REPHRASE_REPLY.to_string(), ReplyFormat::Plain);
                }
                GenerationOutcome::Transient(cause) => {
                    warn!("Generation attempt {attempt} failed: {cause}");
                    if attempt >= self.policy.max_attempts {
                        return (APOLOGY_REPLY.to_string(), ReplyFormat::Plain);
                    }
                    tokio::time::sleep(self.policy.backoff(attempt)).await;
                }
            }
        }
    }

    /// Send the reply; a rejected rich send is retried once as plain text.
    async fn send_reply(&self, reply: &OutboundReply) {
        match self
            .chat
            .send_message(reply.chat_id, &reply.text, reply.format, reply.reply_to)
            .await
        {
            Ok(message_id) => debug!("Sent reply {message_id} to chat {}", reply.chat_id),
            Err(e) if reply.format == ReplyFormat::Rich => {
                warn!("Rich send rejected, retrying as plain text: {e}");
                if let Err(e) = self
                    .chat
                    .send_message(reply.chat_id, &reply.text, ReplyFormat::Plain, reply.reply_to)
                    .await
                {
                    error!("Plain fallback send failed, giving up: {e}");
                }
            }
            Err(e) => error!("Send failed: {e}"),
        }
    }
}
