//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries all
//! sub-configs for the bot loop, the conversion shape, staging and external
//! tools. Every section defaults sensibly so an empty file is valid.
//!
//! The bot token is deliberately not part of this struct: it is a secret read
//! from the environment once at startup (see [`BotToken`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::Error;

/// Upper bound for the long-poll wait. The HTTP call for `getUpdates` is
/// bounded by the poll wait plus a fixed slack, not by `request_timeout_secs`.
pub const MAX_POLL_TIMEOUT_SECS: u64 = 600;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bot: BotConfig,
    pub conversion: ConversionConfig,
    pub staging: StagingConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string and reject values that would
    /// make the pipeline unusable.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str)
            .map_err(|e| Error::Config(format!("config parse error: {e}")))?;
        config.check()?;
        Ok(config)
    }

    /// Hard validation: values the pipeline cannot run with.
    pub fn check(&self) -> Result<()> {
        let c = &self.conversion;
        if c.timeout_secs == 0 {
            return Err(Error::Config("conversion.timeout_secs must be > 0".into()));
        }
        if c.size == 0 || c.size % 2 != 0 {
            return Err(Error::Config(format!(
                "conversion.size must be a positive even number, got {}",
                c.size
            )));
        }
        if c.crf > 51 {
            return Err(Error::Config(format!(
                "conversion.crf must be in 0..=51, got {}",
                c.crf
            )));
        }
        if c.video_codec.trim().is_empty() {
            return Err(Error::Config("conversion.video_codec is empty".into()));
        }
        if self.bot.poll_timeout_secs > MAX_POLL_TIMEOUT_SECS {
            return Err(Error::Config(format!(
                "bot.poll_timeout_secs must be at most {MAX_POLL_TIMEOUT_SECS}, got {}",
                self.bot.poll_timeout_secs
            )));
        }
        if self.bot.api_url.trim().is_empty() {
            return Err(Error::Config("bot.api_url is empty".into()));
        }
        Ok(())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.conversion.max_duration_secs == 0 {
            warnings.push("conversion.max_duration_secs is 0; every video will be rejected".into());
        }

        // Video notes are capped at one minute by the platform.
        if self.conversion.max_duration_secs > 60 {
            warnings.push(format!(
                "conversion.max_duration_secs is {}; video notes longer than 60s may be refused",
                self.conversion.max_duration_secs
            ));
        }

        if self.conversion.size > 640 && self.conversion.size != 720 {
            warnings.push(format!(
                "conversion.size {} is unusual for video notes (typical: 384, 640, 720)",
                self.conversion.size
            ));
        }

        let presets = [
            "ultrafast", "superfast", "veryfast", "faster", "fast", "medium", "slow",
            "slower", "veryslow",
        ];
        if !presets.contains(&self.conversion.preset.as_str()) {
            warnings.push(format!(
                "conversion.preset '{}' is not a recognized x264 preset (valid: {})",
                self.conversion.preset,
                presets.join(", ")
            ));
        }

        if self.bot.shutdown_grace_secs < self.conversion.timeout_secs {
            warnings.push(
                "bot.shutdown_grace_secs is shorter than conversion.timeout_secs; \
                 in-flight conversions may be cut off on shutdown"
                    .into(),
            );
        }

        if let Some(ref p) = self.tools.ffmpeg_path {
            if !p.exists() {
                warnings.push(format!(
                    "tools.ffmpeg_path {} does not exist; falling back to PATH",
                    p.display()
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Long-polling and HTTP settings for the messaging platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Base URL of the Bot API, without trailing slash.
    pub api_url: String,
    /// Long-poll duration passed to `getUpdates`.
    pub poll_timeout_secs: u64,
    /// Pause after a failed `getUpdates` call.
    pub poll_backoff_secs: u64,
    /// Upper bound for a single non-polling API call (uploads included).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight conversions.
    pub shutdown_grace_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.telegram.org".into(),
            poll_timeout_secs: 30,
            poll_backoff_secs: 5,
            request_timeout_secs: 60,
            shutdown_grace_secs: 40,
        }
    }
}

impl BotConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn poll_backoff(&self) -> Duration {
        Duration::from_secs(self.poll_backoff_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// The single conversion shape: square, silent, time-boxed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Videos longer than this are rejected before download.
    pub max_duration_secs: u32,
    /// Wall-clock bound for one ffmpeg run.
    pub timeout_secs: u64,
    /// Edge length of the square output, in pixels.
    pub size: u32,
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 60,
            timeout_secs: 30,
            size: 720,
            video_codec: "libx264".into(),
            preset: "fast".into(),
            crf: 23,
        }
    }
}

impl ConversionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where staged input/output files live.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Defaults to `<system temp>/circlecast` when unset.
    pub dir: Option<PathBuf>,
}

impl StagingConfig {
    /// Resolve the staging directory, applying the default.
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("circlecast"))
    }
}

/// Custom paths to external tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// Bot authentication token.
///
/// `Debug` and `Display` only ever show a masked prefix.
#[derive(Clone, PartialEq, Eq)]
pub struct BotToken(String);

impl BotToken {
    /// Wrap a raw token, rejecting empty or whitespace-only values.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into().trim().to_string();
        if raw.is_empty() {
            return Err(Error::Config("bot token is empty".into()));
        }
        Ok(Self(raw))
    }

    /// The raw token, for building API URLs only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First ten characters followed by an ellipsis.
    pub fn masked(&self) -> String {
        let prefix: String = self.0.chars().take(10).collect();
        format!("{prefix}...")
    }
}

impl fmt::Debug for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BotToken").field(&self.masked()).finish()
    }
}

impl fmt::Display for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}
