//! Result dispatch: judge the transcoder's product and answer the sender.

use std::path::Path;

use circlecast_av::{InvocationResult, StagedFile};

use super::{ConversionOutcome, ConversionRequest, FailureKind, Terminal};
use crate::telegram::{Messenger, NoteUpload};

/// Lines of tool diagnostics kept in the log.
const STDERR_TAIL_LINES: usize = 20;

pub const MSG_TOO_LONG: &str = "This video is too long. Video notes can be at most";
pub const MSG_PROCESSING_FAILED: &str =
    "Sorry, this video could not be processed. Please try another file.";
pub const MSG_TIMEOUT: &str =
    "Processing took too long and was stopped. Please try a shorter or smaller video.";
pub const MSG_EMPTY_RESULT: &str =
    "The conversion produced an empty video. Please try another file.";
pub const MSG_UNKNOWN: &str = "Something went wrong. Please try again later.";

/// User-facing text for a failure. Depends only on the failure category.
pub fn user_message(kind: &FailureKind) -> String {
    match kind {
        FailureKind::DurationExceeded { limit_secs, .. } => {
            format!("{MSG_TOO_LONG} {limit_secs} seconds.")
        }
        FailureKind::ToolError { .. } => MSG_PROCESSING_FAILED.to_string(),
        FailureKind::Timeout(_) => MSG_TIMEOUT.to_string(),
        FailureKind::EmptyArtifact => MSG_EMPTY_RESULT.to_string(),
        FailureKind::LaunchError(_) | FailureKind::Unknown(_) => MSG_UNKNOWN.to_string(),
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

fn log_failure(kind: &FailureKind) {
    match kind {
        FailureKind::DurationExceeded {
            duration_secs,
            limit_secs,
        } => tracing::info!("rejected: duration {duration_secs}s exceeds {limit_secs}s"),
        FailureKind::ToolError { code, stderr } => tracing::warn!(
            "transcoder failed (exit code {:?}):\n{}",
            code,
            tail_lines(stderr, STDERR_TAIL_LINES)
        ),
        FailureKind::Timeout(after) => {
            tracing::warn!("transcoder timed out after {after:?}; process killed")
        }
        FailureKind::EmptyArtifact => {
            tracing::warn!("transcoder exited successfully but produced an empty file")
        }
        FailureKind::LaunchError(detail) => {
            tracing::error!("transcoder could not be started: {detail}")
        }
        FailureKind::Unknown(detail) => tracing::error!("request failed: {detail}"),
    }
}

/// Turns invocation results into outcomes and outcomes into replies.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    note_size: u32,
}

impl Dispatcher {
    pub fn new(note_size: u32) -> Self {
        Self { note_size }
    }

    /// Decide the outcome of one invocation.
    ///
    /// A zero exit alone is not success: the artifact must exist and be
    /// non-empty.
    pub async fn inspect(&self, result: InvocationResult, output: &StagedFile) -> ConversionOutcome {
        match result {
            InvocationResult::Ok => match output.size().await {
                Some(size) if size > 0 => ConversionOutcome::Success {
                    artifact: output.path().to_path_buf(),
                    size_bytes: size,
                },
                _ => ConversionOutcome::Failure(FailureKind::EmptyArtifact),
            },
            InvocationResult::ToolError { code, stderr } => {
                ConversionOutcome::Failure(FailureKind::ToolError { code, stderr })
            }
            InvocationResult::Timeout(after) => {
                ConversionOutcome::Failure(FailureKind::Timeout(after))
            }
            InvocationResult::LaunchError(detail) => {
                ConversionOutcome::Failure(FailureKind::LaunchError(detail))
            }
        }
    }

    /// Send the outcome to the requester.
    ///
    /// # Errors
    ///
    /// Returns the messenger's error if uploading a successful artifact fails;
    /// failure replies are best-effort and never error.
    pub async fn deliver(
        &self,
        request: &ConversionRequest,
        outcome: ConversionOutcome,
        messenger: &dyn Messenger,
    ) -> circlecast_core::Result<Terminal> {
        match outcome {
            ConversionOutcome::Success {
                artifact,
                size_bytes,
            } => {
                self.send_note(request, &artifact, messenger).await?;
                tracing::info!("delivered video note ({size_bytes} bytes)");
                Ok(Terminal::Delivered)
            }
            ConversionOutcome::Failure(kind) => Ok(self.report(request, &kind, messenger).await),
        }
    }

    async fn send_note(
        &self,
        request: &ConversionRequest,
        artifact: &Path,
        messenger: &dyn Messenger,
    ) -> circlecast_core::Result<()> {
        let note = NoteUpload {
            path: artifact,
            length: self.note_size,
            duration_secs: request.duration_secs,
        };
        messenger
            .send_video_note(request.chat, Some(request.message), note)
            .await
    }

    /// Log a failure and tell the requester about it.
    pub async fn report(
        &self,
        request: &ConversionRequest,
        kind: &FailureKind,
        messenger: &dyn Messenger,
    ) -> Terminal {
        log_failure(kind);
        let text = user_message(kind);
        if let Err(e) = messenger
            .send_text(request.chat, Some(request.message), &text)
            .await
        {
            tracing::warn!("failed to send error reply: {e}");
        }
        kind.terminal()
    }
}
