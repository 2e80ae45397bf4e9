//! # circlecast-av
//!
//! External tool handling for the circlecast conversion pipeline.
//!
//! This crate provides:
//!
//! - **Command execution** ([`ToolCommand`]) -- async builder running an
//!   external process under a hard wall-clock bound, killing it on expiry.
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache the ffmpeg path.
//! - **Staging** ([`StagingStore`], [`StagedFile`]) -- uniquely named
//!   temporary files that are released on every exit path.
//! - **Transcoding** ([`Transcoder`], [`FfmpegTranscoder`]) -- the fixed
//!   video-note conversion and its [`InvocationResult`].

pub mod command;
pub mod staging;
pub mod tools;
pub mod transcode;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutcome, ToolOutput};
pub use staging::{Role, StagedFile, StagingStore};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use transcode::{FfmpegTranscoder, InvocationResult, TranscodeSettings, Transcoder};
