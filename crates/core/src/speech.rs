//! Speech hook used by the driver to attach audio to transcript messages.

use async_trait::async_trait;

/// Produces playable audio for a message and returns the URL it is served from.
#[async_trait]
pub trait SpeechRenderer: Send + Sync {
    /// `None` means no audio is available; the message is shown without it.
    async fn render(&self, text: &str, voice: &str) -> Option<String>;
}

/// Removes markdown characters that read badly aloud.
pub fn speakable_text(content: &str) -> String {
    content.replace(['#', '*', '-'], "")
}

/// Voices alternate by message position: `speaker1`, `speaker2`, `speaker1`, ...
pub fn voice_for(prior_messages: usize) -> String {
    format!("speaker{}", (prior_messages % 2) + 1)
}
