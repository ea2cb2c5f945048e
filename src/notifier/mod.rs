// =============================================================================
// Notifier — outbound message sink
// =============================================================================
//
// Delivery is fire-and-forget.  Implementations swallow their own transport
// errors (logging them) so a dead chat never stalls the poll loop.
// =============================================================================

pub mod telegram;

use async_trait::async_trait;

pub use telegram::TelegramNotifier;

/// How the notifier should interpret message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Plain,
    /// Telegram HTML subset; dynamic text must go through [`escape_html`].
    Html,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str, format: MessageFormat);
}

/// Escape the characters Telegram's HTML parser treats specially.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
