//! Messaging-platform access.
//!
//! The conversion pipeline talks to the platform only through [`Messenger`],
//! so tests can substitute a recording fake for the real [`TelegramClient`].

pub mod client;
pub mod types;

pub use client::TelegramClient;

use std::path::Path;

use async_trait::async_trait;
use circlecast_core::{ChatId, MessageId};

/// A finished clip ready to be sent as a video note.
#[derive(Debug, Clone, Copy)]
pub struct NoteUpload<'a> {
    pub path: &'a Path,
    /// Edge length of the square, in pixels.
    pub length: u32,
    pub duration_secs: u32,
}

/// The operations the pipeline needs from the messaging platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Download the file behind `file_id` into `dest`, returning bytes written.
    async fn download_file(&self, file_id: &str, dest: &Path) -> circlecast_core::Result<u64>;

    /// Send a plain-text message, optionally as a reply.
    async fn send_text(
        &self,
        chat: ChatId,
        reply_to: Option<MessageId>,
        text: &str,
    ) -> circlecast_core::Result<()>;

    /// Upload a video note, optionally as a reply.
    async fn send_video_note(
        &self,
        chat: ChatId,
        reply_to: Option<MessageId>,
        note: NoteUpload<'_>,
    ) -> circlecast_core::Result<()>;
}
