//! Shared test doubles for integration tests.
//!
//! [`FakeMessenger`] records every reply instead of talking to Telegram, and
//! [`FakeTranscoder`] stands in for ffmpeg. On unix, [`script`] writes small
//! shell programs that can be driven through the real `FfmpegTranscoder`.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use circlecast::pipeline::ConversionPipeline;
use circlecast::telegram::types::{Chat, Message, User, Video};
use circlecast::telegram::{Messenger, NoteUpload};
use circlecast_av::{InvocationResult, StagingStore, Transcoder};
use circlecast_core::config::ConversionConfig;
use circlecast_core::{ChatId, Error, MessageId};
use tempfile::TempDir;

/// A text reply captured by [`FakeMessenger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentText {
    pub chat: ChatId,
    pub reply_to: Option<MessageId>,
    pub text: String,
}

/// A video note captured by [`FakeMessenger`]. The size is read while the
/// artifact still exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNote {
    pub chat: ChatId,
    pub reply_to: Option<MessageId>,
    pub length: u32,
    pub duration_secs: u32,
    pub size_bytes: u64,
}

/// Records replies and serves a fixed source file.
pub struct FakeMessenger {
    /// Bytes written by `download_file`; `None` makes downloads fail.
    source: Option<Vec<u8>>,
    fail_uploads: bool,
    downloads: AtomicUsize,
    texts: Mutex<Vec<SentText>>,
    notes: Mutex<Vec<SentNote>>,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self {
            source: Some(vec![0u8; 4096]),
            fail_uploads: false,
            downloads: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
            notes: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_downloads() -> Self {
        Self {
            source: None,
            ..Self::new()
        }
    }

    pub fn failing_uploads() -> Self {
        Self {
            fail_uploads: true,
            ..Self::new()
        }
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> Vec<SentText> {
        self.texts.lock().unwrap().clone()
    }

    pub fn notes(&self) -> Vec<SentNote> {
        self.notes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn download_file(&self, file_id: &str, dest: &Path) -> circlecast_core::Result<u64> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        match self.source {
            Some(ref bytes) => {
                tokio::fs::write(dest, bytes).await?;
                Ok(bytes.len() as u64)
            }
            None => Err(Error::api("getFile", format!("400: file {file_id} not found"))),
        }
    }

    async fn send_text(
        &self,
        chat: ChatId,
        reply_to: Option<MessageId>,
        text: &str,
    ) -> circlecast_core::Result<()> {
        self.texts.lock().unwrap().push(SentText {
            chat,
            reply_to,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_video_note(
        &self,
        chat: ChatId,
        reply_to: Option<MessageId>,
        note: NoteUpload<'_>,
    ) -> circlecast_core::Result<()> {
        if self.fail_uploads {
            return Err(Error::Http("connection reset".into()));
        }
        let size_bytes = tokio::fs::metadata(note.path).await?.len();
        self.notes.lock().unwrap().push(SentNote {
            chat,
            reply_to,
            length: note.length,
            duration_secs: note.duration_secs,
            size_bytes,
        });
        Ok(())
    }
}

/// What [`FakeTranscoder`] does when invoked.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Write this many bytes to the output and succeed.
    Write(usize),
    /// Succeed without writing anything.
    Nothing,
    /// Exit with a tool error.
    Fail(i32, &'static str),
    Panic,
}

/// In-process stand-in for ffmpeg.
pub struct FakeTranscoder {
    behavior: Behavior,
    calls: AtomicUsize,
    /// Size of the staged input as seen during each invocation.
    inputs_seen: Mutex<Vec<u64>>,
    /// Output paths handed to each invocation.
    outputs_seen: Mutex<Vec<PathBuf>>,
}

impl FakeTranscoder {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            inputs_seen: Mutex::new(Vec::new()),
            outputs_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs_seen(&self) -> Vec<u64> {
        self.inputs_seen.lock().unwrap().clone()
    }

    pub fn outputs_seen(&self) -> Vec<PathBuf> {
        self.outputs_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn invoke(&self, input: &Path, output: &Path, _timeout: Duration) -> InvocationResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let input_size = tokio::fs::metadata(input).await.map(|m| m.len()).unwrap_or(0);
        self.inputs_seen.lock().unwrap().push(input_size);
        self.outputs_seen.lock().unwrap().push(output.to_path_buf());

        // Let concurrent invocations interleave.
        tokio::time::sleep(Duration::from_millis(20)).await;

        match self.behavior {
            Behavior::Write(n) => {
                tokio::fs::write(output, vec![7u8; n]).await.unwrap();
                InvocationResult::Ok
            }
            Behavior::Nothing => InvocationResult::Ok,
            Behavior::Fail(code, stderr) => InvocationResult::ToolError {
                code: Some(code),
                stderr: stderr.to_string(),
            },
            Behavior::Panic => panic!("transcoder blew up"),
        }
    }
}

/// Build a pipeline over a fresh staging directory.
pub fn pipeline(
    config: &ConversionConfig,
    transcoder: Arc<dyn Transcoder>,
) -> (TempDir, ConversionPipeline) {
    let dir = tempfile::tempdir().unwrap();
    let staging = StagingStore::new(dir.path().join("staging")).unwrap();
    (dir, ConversionPipeline::new(config, staging, transcoder))
}

/// Number of entries left in the pipeline's staging directory.
pub fn staged_files(pipeline: &ConversionPipeline) -> usize {
    std::fs::read_dir(pipeline.staging().root()).unwrap().count()
}

/// A message from a person in chat 1001.
pub fn text_message(id: i64, text: &str) -> Message {
    Message {
        message_id: MessageId(id),
        chat: Chat::private(ChatId(1001)),
        from: Some(User {
            id: 1001,
            is_bot: false,
            first_name: "Ann".into(),
            username: Some("ann".into()),
        }),
        text: Some(text.to_string()),
        video: None,
    }
}

/// A video message of `duration` seconds in chat 1001.
pub fn video_message(id: i64, duration: u32) -> Message {
    Message {
        text: None,
        video: Some(Video {
            file_id: format!("video-{id}"),
            width: 1920,
            height: 1080,
            duration,
            mime_type: Some("video/mp4".into()),
            file_size: Some(4096),
        }),
        ..text_message(id, "")
    }
}

/// Write an executable shell script into `dir`.
#[cfg(unix)]
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
