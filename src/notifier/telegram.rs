// =============================================================================
// Telegram Bot API notifier
// =============================================================================
//
// SECURITY: the bot token is part of the request URL and is never logged or
// serialized.  Errors are reported without the URL.
// =============================================================================

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::NotificationError;
use crate::notifier::{MessageFormat, Notifier};

const API_BASE: &str = "https://api.telegram.org";

/// Telegram rejects longer messages.
const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

#[derive(Clone)]
pub struct TelegramNotifier {
    token: String,
    chat_id: String,
    base_url: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build reqwest client");

        debug!("TelegramNotifier initialised");

        Self {
            token: token.into(),
            chat_id: chat_id.into(),
            base_url: API_BASE.to_string(),
            client,
        }
    }

    /// POST sendMessage.  Returns the error instead of logging it.
    pub async fn try_send(&self, text: &str, format: MessageFormat) -> Result<(), NotificationError> {
        let text = truncate_message(text, MAX_MESSAGE_CHARS, format);
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: match format {
                MessageFormat::Html => Some("HTML"),
                MessageFormat::Plain => None,
            },
            disable_web_page_preview: true,
        };
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.without_url()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str, format: MessageFormat) {
        match self.try_send(text, format).await {
            Ok(()) => debug!(chars = text.chars().count(), "telegram message sent"),
            Err(e) => warn!(error = %e, "telegram delivery failed — message dropped"),
        }
    }
}

/// Cut `text` to at most `max` characters, preferring the last line break.
/// An HTML message without one is cut before any tag or entity left open.
fn truncate_message(text: &str, max: usize, format: MessageFormat) -> &str {
    let prefix = truncate_chars(text, max);
    if prefix.len() == text.len() {
        return text;
    }
    if let Some(nl) = prefix.rfind('\n') {
        return &prefix[..nl];
    }
    match format {
        MessageFormat::Plain => prefix,
        MessageFormat::Html => {
            let mut end = prefix.len();
            for (open, close) in [('<', '>'), ('&', ';')] {
                if let Some(at) = prefix[..end].rfind(open) {
                    if !prefix[at..end].contains(close) {
                        end = at;
                    }
                }
            }
            &prefix[..end]
        }
    }
}

/// Longest prefix of `text` holding at most `max` characters.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
