//! Per-message routing and the outermost fault boundary.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::pipeline::dispatcher::MSG_UNKNOWN;
use crate::pipeline::{ConversionPipeline, ConversionRequest, Terminal};
use crate::telegram::types::Message;
use crate::telegram::Messenger;

pub const GREETING: &str = "Hi! Send me a video of up to a minute and I will turn it into a round video note.";
pub const HINT: &str = "Please send a video. I will turn it into a round video note.";

/// What to do with an incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/start` or `/help`.
    Greeting,
    Convert(ConversionRequest),
    /// Any other text in a private chat.
    Hint,
    /// Bots, service messages and group chatter.
    Ignore,
}

/// Strip an optional `@botname` suffix and arguments from a command.
fn command_name(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    let command = first.strip_prefix('/')?;
    Some(command.split('@').next().unwrap_or(command))
}

pub fn route(message: &Message) -> Route {
    if message.from.as_ref().is_some_and(|u| u.is_bot) {
        return Route::Ignore;
    }

    if let Some(ref video) = message.video {
        return Route::Convert(ConversionRequest::new(
            message.chat.id,
            message.message_id,
            video.file_id.clone(),
            video.duration,
        ));
    }

    // Service messages (joins, pins, ...) carry no text.
    let Some(text) = message.text.as_deref() else {
        return Route::Ignore;
    };

    match command_name(text) {
        Some("start") | Some("help") => Route::Greeting,
        // Group chatter is not addressed to us.
        _ if message.chat.is_private() => Route::Hint,
        _ => Route::Ignore,
    }
}

/// Handles single messages; shared by all concurrently running tasks.
pub struct Handler {
    pipeline: Arc<ConversionPipeline>,
    messenger: Arc<dyn Messenger>,
}

impl Handler {
    pub fn new(pipeline: Arc<ConversionPipeline>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            pipeline,
            messenger,
        }
    }

    /// Handle one message. Never panics and never returns an error: every
    /// fault is logged and, where possible, answered with a generic reply.
    pub async fn handle_message(&self, message: Message) -> Option<Terminal> {
        let chat = message.chat.id;
        match route(&message) {
            Route::Ignore => None,
            Route::Greeting => {
                self.reply(&message, GREETING).await;
                None
            }
            Route::Hint => {
                self.reply(&message, HINT).await;
                None
            }
            Route::Convert(request) => {
                let run = self.pipeline.run(&request, self.messenger.as_ref());
                match AssertUnwindSafe(run).catch_unwind().await {
                    Ok(terminal) => Some(terminal),
                    Err(panic) => {
                        let detail = panic
                            .downcast_ref::<&str>()
                            .map(|s| s.to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic".to_string());
                        tracing::error!(chat = %chat, "request {} panicked: {detail}", request.id);
                        self.reply(&message, MSG_UNKNOWN).await;
                        Some(Terminal::Failed)
                    }
                }
            }
        }
    }

    async fn reply(&self, message: &Message, text: &str) {
        if let Err(e) = self
            .messenger
            .send_text(message.chat.id, Some(message.message_id), text)
            .await
        {
            tracing::warn!(chat = %message.chat.id, "failed to send reply: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::types::{Chat, User, Video};
    use circlecast_core::{ChatId, MessageId};

    fn message(text: Option<&str>, video: Option<u32>) -> Message {
        Message {
            message_id: MessageId(3),
            chat: Chat::private(ChatId(77)),
            from: Some(User {
                id: 77,
                is_bot: false,
                first_name: "Ann".into(),
                username: None,
            }),
            text: text.map(str::to_string),
            video: video.map(|duration| Video {
                file_id: "file-1".into(),
                width: 1280,
                height: 720,
                duration,
                mime_type: Some("video/mp4".into()),
                file_size: Some(1024),
            }),
        }
    }

    #[test]
    fn start_and_help_greet() {
        assert_eq!(route(&message(Some("/start"), None)), Route::Greeting);
        assert_eq!(route(&message(Some("/help"), None)), Route::Greeting);
        assert_eq!(route(&message(Some("/start@circlecast_bot"), None)), Route::Greeting);
        assert_eq!(route(&message(Some("/start payload"), None)), Route::Greeting);
    }

    #[test]
    fn other_text_gets_hint() {
        assert_eq!(route(&message(Some("hello"), None)), Route::Hint);
        assert_eq!(route(&message(Some("/unknown"), None)), Route::Hint);
    }

    #[test]
    fn service_messages_are_ignored() {
        assert_eq!(route(&message(None, None)), Route::Ignore);
    }

    #[test]
    fn group_chatter_is_ignored() {
        let mut msg = message(Some("lol nice"), None);
        msg.chat.kind = "supergroup".into();
        assert_eq!(route(&msg), Route::Ignore);

        // Commands and videos still work in groups.
        msg.text = Some("/help@circlecast_bot".into());
        assert_eq!(route(&msg), Route::Greeting);
        let mut video = message(None, Some(20));
        video.chat.kind = "group".into();
        assert!(matches!(route(&video), Route::Convert(_)));
    }

    #[test]
    fn video_becomes_request() {
        match route(&message(Some("caption is ignored"), Some(45))) {
            Route::Convert(req) => {
                assert_eq!(req.chat, ChatId(77));
                assert_eq!(req.message, MessageId(3));
                assert_eq!(req.file_id, "file-1");
                assert_eq!(req.duration_secs, 45);
            }
            other => panic!("expected conversion, got {other:?}"),
        }
    }

    #[test]
    fn bots_are_ignored() {
        let mut msg = message(Some("/start"), None);
        if let Some(ref mut user) = msg.from {
            user.is_bot = true;
        }
        assert_eq!(route(&msg), Route::Ignore);
    }

    #[test]
    fn command_name_parsing() {
        assert_eq!(command_name("/start"), Some("start"));
        assert_eq!(command_name("  /help@bot  x"), Some("help"));
        assert_eq!(command_name("start"), None);
        assert_eq!(command_name(""), None);
    }
}
