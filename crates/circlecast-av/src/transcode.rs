//! The video-note transcode: any video in, a silent square clip out.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use circlecast_core::config::ConversionConfig;

use crate::command::{ToolCommand, ToolOutcome};
use crate::tools::ToolRegistry;

/// How one transcoder run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationResult {
    /// Exit code 0. Says nothing about the output's contents.
    Ok,
    /// Non-zero exit; carries the tool's diagnostic output.
    ToolError { code: Option<i32>, stderr: String },
    /// The wall-clock bound fired and the process was killed.
    Timeout(Duration),
    /// The process could not be started or waited on.
    LaunchError(String),
}

impl InvocationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, InvocationResult::Ok)
    }
}

/// Encoding parameters for the square output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeSettings {
    pub size: u32,
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self::from(&ConversionConfig::default())
    }
}

impl From<&ConversionConfig> for TranscodeSettings {
    fn from(c: &ConversionConfig) -> Self {
        Self {
            size: c.size,
            video_codec: c.video_codec.clone(),
            preset: c.preset.clone(),
            crf: c.crf,
        }
    }
}

impl TranscodeSettings {
    /// Cover the square preserving aspect ratio, then center-crop to it.
    pub fn video_filter(&self) -> String {
        let s = self.size;
        format!("scale={s}:{s}:force_original_aspect_ratio=increase,crop={s}:{s}")
    }

    /// Full argument list for `input -> output`.
    pub fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".into(),
            "-i".into(),
            input.to_string_lossy().to_string(),
            "-vf".into(),
            self.video_filter(),
            "-c:v".into(),
            self.video_codec.clone(),
            "-preset".into(),
            self.preset.clone(),
            "-crf".into(),
            self.crf.to_string(),
            "-an".into(),
            output.to_string_lossy().to_string(),
        ]
    }
}

/// Something that turns a staged input into a staged output.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `input` into `output`, never taking longer than `timeout`.
    async fn invoke(&self, input: &Path, output: &Path, timeout: Duration) -> InvocationResult;
}

/// [`Transcoder`] backed by the ffmpeg command-line tool.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
    settings: TranscodeSettings,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>, settings: TranscodeSettings) -> Self {
        Self {
            program: program.into(),
            settings,
        }
    }

    /// Use the ffmpeg found by the registry.
    pub fn from_registry(
        tools: &ToolRegistry,
        settings: TranscodeSettings,
    ) -> circlecast_core::Result<Self> {
        let ffmpeg = tools.require("ffmpeg")?;
        Ok(Self::new(ffmpeg.path.clone(), settings))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn settings(&self) -> &TranscodeSettings {
        &self.settings
    }

    fn command(&self, input: &Path, output: &Path, timeout: Duration) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.program.clone());
        cmd.args(self.settings.args(input, output));
        cmd.timeout(timeout);
        cmd
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn invoke(&self, input: &Path, output: &Path, timeout: Duration) -> InvocationResult {
        tracing::info!(
            "transcode {:?} -> {:?} ({}x{}, {}, timeout {:?})",
            input,
            output,
            self.settings.size,
            self.settings.size,
            self.settings.video_codec,
            timeout
        );

        match self.command(input, output, timeout).run().await {
            Ok(ToolOutcome::Exited(out)) if out.status.success() => InvocationResult::Ok,
            Ok(ToolOutcome::Exited(out)) => InvocationResult::ToolError {
                code: out.status.code(),
                stderr: out.stderr,
            },
            Ok(ToolOutcome::TimedOut(after)) => InvocationResult::Timeout(after),
            Err(e) => InvocationResult::LaunchError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_video_note_shape() {
        let s = TranscodeSettings::default();
        assert_eq!(s.size, 720);
        assert_eq!(s.video_codec, "libx264");
        assert_eq!(s.preset, "fast");
        assert_eq!(s.crf, 23);
        assert_eq!(
            s.video_filter(),
            "scale=720:720:force_original_aspect_ratio=increase,crop=720:720"
        );
    }

    #[test]
    fn args_follow_fixed_contract() {
        let s = TranscodeSettings::default();
        let args = s.args(Path::new("/tmp/in.mp4"), Path::new("/tmp/out.mp4"));
        assert_eq!(
            args,
            vec![
                "-y",
                "-i",
                "/tmp/in.mp4",
                "-vf",
                "scale=720:720:force_original_aspect_ratio=increase,crop=720:720",
                "-c:v",
                "libx264",
                "-preset",
                "fast",
                "-crf",
                "23",
                "-an",
                "/tmp/out.mp4",
            ]
        );
    }

    #[test]
    fn settings_follow_config() {
        let config = ConversionConfig {
            size: 384,
            crf: 28,
            preset: "veryfast".into(),
            ..ConversionConfig::default()
        };
        let s = TranscodeSettings::from(&config);
        assert_eq!(
            s.video_filter(),
            "scale=384:384:force_original_aspect_ratio=increase,crop=384:384"
        );
        let args = s.args(Path::new("a"), Path::new("b"));
        assert!(args.windows(2).any(|w| w == ["-crf", "28"]));
        assert!(args.windows(2).any(|w| w == ["-preset", "veryfast"]));
    }

    #[test]
    fn command_carries_timeout_and_args() {
        let t = FfmpegTranscoder::new("/usr/bin/ffmpeg", TranscodeSettings::default());
        let cmd = t.command(Path::new("in"), Path::new("out"), Duration::from_secs(30));
        assert_eq!(cmd.get_args().first().map(String::as_str), Some("-y"));
        assert_eq!(cmd.get_args().last().map(String::as_str), Some("out"));
    }

    #[test]
    fn from_registry_requires_ffmpeg() {
        let err = FfmpegTranscoder::from_registry(
            &ToolRegistry::default(),
            TranscodeSettings::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("ffmpeg"));

        let tools = ToolRegistry::default().with_tool("ffmpeg", "/opt/ffmpeg/bin/ffmpeg");
        let t = FfmpegTranscoder::from_registry(&tools, TranscodeSettings::default()).unwrap();
        assert_eq!(t.program(), Path::new("/opt/ffmpeg/bin/ffmpeg"));
    }

    #[tokio::test]
    async fn missing_binary_is_launch_error() {
        let t = FfmpegTranscoder::new("/nonexistent/ffmpeg-xyz", TranscodeSettings::default());
        let result = t
            .invoke(Path::new("in.mp4"), Path::new("out.mp4"), Duration::from_secs(5))
            .await;
        assert!(matches!(result, InvocationResult::LaunchError(ref m) if m.contains("spawn")));
    }

    #[tokio::test]
    async fn nonzero_exit_is_tool_error() {
        // `false` ignores its arguments and exits 1.
        let t = FfmpegTranscoder::new("false", TranscodeSettings::default());
        let result = t
            .invoke(Path::new("in.mp4"), Path::new("out.mp4"), Duration::from_secs(5))
            .await;
        assert!(matches!(result, InvocationResult::ToolError { code: Some(1), .. }));
    }

    #[tokio::test]
    async fn zero_exit_is_ok() {
        let t = FfmpegTranscoder::new("true", TranscodeSettings::default());
        let result = t
            .invoke(Path::new("in.mp4"), Path::new("out.mp4"), Duration::from_secs(5))
            .await;
        assert!(result.is_ok());
    }
}
