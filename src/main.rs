mod cli;

use circlecast::{
    bot::Bot,
    config,
    pipeline::{ConversionOutcome, ConversionPipeline, Dispatcher},
    telegram::TelegramClient,
};
use circlecast_av::{FfmpegTranscoder, Role, StagingStore, ToolRegistry, TranscodeSettings, Transcoder};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Staged files older than this belong to no live request: conversions are
/// bounded by minutes, and the staging directory may be shared with
/// concurrent `convert` runs.
const STALE_STAGED_AGE: Duration = Duration::from_secs(60 * 60);

async fn start_bot(config_path: Option<&Path>) -> Result<()> {
    // Load config
    let config = config::load_config_or_default(config_path)?;

    // The token is the one hard requirement; fail before touching anything else.
    let token = config::load_token()?;

    tracing::info!("Starting circlecast");
    tracing::info!("Bot token loaded ({})", token.masked());

    let tools = ToolRegistry::discover(&config.tools);
    let transcoder = FfmpegTranscoder::from_registry(
        &tools,
        TranscodeSettings::from(&config.conversion),
    )?;
    tracing::info!("Using ffmpeg at {}", transcoder.program().display());

    let staging = StagingStore::new(config.staging.resolved_dir())
        .context("Failed to create staging directory")?;
    let stale = staging.sweep(STALE_STAGED_AGE);
    if stale > 0 {
        tracing::info!("Removed {} stale staged file(s) from an earlier run", stale);
    }
    tracing::info!("Staging files in {}", staging.root().display());

    let pipeline = ConversionPipeline::new(&config.conversion, staging, Arc::new(transcoder));
    let client = TelegramClient::new(&config.bot, token);
    let bot = Bot::new(&config.bot, client, pipeline);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            signal.cancel();
        }
    });

    bot.run(shutdown).await?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "circlecast=trace,circlecast_av=trace,circlecast_core=debug".to_string()
        } else {
            "circlecast=debug,circlecast_av=debug,circlecast_core=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_bot(cli.config.as_deref()))
        }
        Commands::Convert { input, output } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_file(&input, output, cli.config.as_deref()))
        }
        Commands::CheckTools => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_tools(cli.config.as_deref()))
        }
        Commands::Validate { path } => {
            let path = path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("circlecast {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn convert_file(
    input: &Path,
    output: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    // Verify input file exists
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }
    let output = output.unwrap_or_else(|| input.with_extension("note.mp4"));

    let tools = ToolRegistry::discover(&config.tools);
    let transcoder = FfmpegTranscoder::from_registry(
        &tools,
        TranscodeSettings::from(&config.conversion),
    )?;
    let staging = StagingStore::new(config.staging.resolved_dir())
        .context("Failed to create staging directory")?;

    let mut staged = staging.acquire(Role::Output)?;
    let result = transcoder
        .invoke(input, staged.path(), config.conversion.timeout())
        .await;

    let outcome = Dispatcher::new(config.conversion.size)
        .inspect(result, &staged)
        .await;

    let copied = match outcome {
        ConversionOutcome::Success {
            artifact,
            size_bytes,
        } => tokio::fs::copy(&artifact, &output)
            .await
            .with_context(|| format!("Failed to write {:?}", output))
            .map(|_| size_bytes),
        ConversionOutcome::Failure(kind) => {
            if let circlecast::pipeline::FailureKind::ToolError { ref stderr, .. } = kind {
                eprintln!("{}", stderr.trim());
            }
            Err(anyhow::anyhow!("Conversion failed: {kind}"))
        }
    };
    staged.release();

    let size_bytes = copied?;
    println!("Wrote {} ({} bytes)", output.display(), size_bytes);
    Ok(())
}

async fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all().await;
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to enable conversions.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  API URL: {}", config.bot.api_url);
            println!(
                "  Max duration: {}s, timeout: {}s",
                config.conversion.max_duration_secs, config.conversion.timeout_secs
            );
            println!(
                "  Output: {0}x{0} {1} (preset {2}, crf {3})",
                config.conversion.size,
                config.conversion.video_codec,
                config.conversion.preset,
                config.conversion.crf
            );
            println!("  Staging dir: {}", config.staging.resolved_dir().display());

            let warnings = config.validate();
            if !warnings.is_empty() {
                println!("\nWarnings:");
                for w in warnings {
                    println!("  - {}", w);
                }
            }
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  API URL: {}", config.bot.api_url);
            println!(
                "  Max duration: {}s, timeout: {}s",
                config.conversion.max_duration_secs, config.conversion.timeout_secs
            );
        }
    }

    Ok(())
}
