//! The per-request conversion pipeline.
//!
//! One [`ConversionRequest`] moves through
//! `Received -> Validated -> Staged -> Invoked -> {Delivered, Rejected, Failed}`.
//! Every terminal state releases the request's staged files before
//! [`ConversionPipeline::run`] returns, and nothing is retried.

pub mod dispatcher;
pub mod validator;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use circlecast_av::{Role, StagingStore, Transcoder};
use circlecast_core::config::ConversionConfig;
use circlecast_core::{ChatId, MessageId, RequestId};
use tracing::Instrument;

use crate::telegram::Messenger;
pub use dispatcher::Dispatcher;
pub use validator::{DurationLimit, Verdict};

/// One inbound video to convert. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub id: RequestId,
    pub chat: ChatId,
    pub message: MessageId,
    /// Platform reference used to download the source.
    pub file_id: String,
    /// Duration reported by the platform, in seconds.
    pub duration_secs: u32,
}

impl ConversionRequest {
    pub fn new(
        chat: ChatId,
        message: MessageId,
        file_id: impl Into<String>,
        duration_secs: u32,
    ) -> Self {
        Self {
            id: RequestId::new(),
            chat,
            message,
            file_id: file_id.into(),
            duration_secs,
        }
    }
}

/// Why a request did not produce a video note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    DurationExceeded { duration_secs: u32, limit_secs: u32 },
    ToolError { code: Option<i32>, stderr: String },
    Timeout(Duration),
    EmptyArtifact,
    LaunchError(String),
    Unknown(String),
}

impl FailureKind {
    /// Which terminal state this failure ends in.
    pub fn terminal(&self) -> Terminal {
        match self {
            FailureKind::DurationExceeded { .. } => Terminal::Rejected,
            _ => Terminal::Failed,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::DurationExceeded {
                duration_secs,
                limit_secs,
            } => write!(f, "duration {duration_secs}s exceeds limit of {limit_secs}s"),
            FailureKind::ToolError { code: Some(code), .. } => {
                write!(f, "transcoder exited with code {code}")
            }
            FailureKind::ToolError { code: None, .. } => {
                write!(f, "transcoder was terminated by a signal")
            }
            FailureKind::Timeout(after) => write!(f, "transcoder timed out after {after:?}"),
            FailureKind::EmptyArtifact => write!(f, "transcoder produced an empty file"),
            FailureKind::LaunchError(detail) => {
                write!(f, "transcoder could not be started: {detail}")
            }
            FailureKind::Unknown(detail) => write!(f, "unexpected error: {detail}"),
        }
    }
}

/// Result of inspecting a transcoder run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Success { artifact: PathBuf, size_bytes: u64 },
    Failure(FailureKind),
}

/// Where a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Delivered,
    Rejected,
    Failed,
}

/// Validates, stages, transcodes and dispatches single requests.
///
/// Holds no per-request state; one instance serves all concurrent requests.
pub struct ConversionPipeline {
    limit: DurationLimit,
    staging: StagingStore,
    transcoder: Arc<dyn Transcoder>,
    timeout: Duration,
    dispatcher: Dispatcher,
}

impl ConversionPipeline {
    pub fn new(
        config: &ConversionConfig,
        staging: StagingStore,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            limit: DurationLimit::new(config.max_duration_secs),
            staging,
            transcoder,
            timeout: config.timeout(),
            dispatcher: Dispatcher::new(config.size),
        }
    }

    pub fn staging(&self) -> &StagingStore {
        &self.staging
    }

    /// Handle one request end to end and answer the sender.
    ///
    /// Any error along the way becomes [`FailureKind::Unknown`]; staged files
    /// are gone by the time this returns.
    pub async fn run(&self, request: &ConversionRequest, messenger: &dyn Messenger) -> Terminal {
        let span = tracing::info_span!(
            "request",
            request_id = %request.id.short(),
            chat_id = %request.chat
        );

        async move {
            tracing::debug!(state = "received", duration = request.duration_secs);

            let terminal = match self.limit.check(request.duration_secs) {
                Verdict::Reject(kind) => self.dispatcher.report(request, &kind, messenger).await,
                Verdict::Accept => {
                    tracing::debug!(state = "validated");
                    match self.convert(request, messenger).await {
                        Ok(terminal) => terminal,
                        Err(e) => {
                            let kind = FailureKind::Unknown(e.to_string());
                            self.dispatcher.report(request, &kind, messenger).await
                        }
                    }
                }
            };
            tracing::info!(state = ?terminal, "request finished");
            terminal
        }
        .instrument(span)
        .await
    }

    async fn convert(
        &self,
        request: &ConversionRequest,
        messenger: &dyn Messenger,
    ) -> circlecast_core::Result<Terminal> {
        // Both files are released on drop if anything below returns early.
        let mut input = self.staging.acquire(Role::Input)?;
        let mut output = self.staging.acquire(Role::Output)?;
        tracing::debug!(state = "staged");

        let downloaded = messenger.download_file(&request.file_id, input.path()).await?;
        tracing::debug!("source downloaded ({downloaded} bytes)");

        let result = self
            .transcoder
            .invoke(input.path(), output.path(), self.timeout)
            .await;
        tracing::debug!(state = "invoked", result = ?result.is_ok());
        input.release();

        let outcome = self.dispatcher.inspect(result, &output).await;
        let terminal = self.dispatcher.deliver(request, outcome, messenger).await;
        output.release();
        terminal
    }
}
