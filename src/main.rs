// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use bisub::app_config::{Config, LogLevel};
use bisub::collaborators::ffmpeg::FfmpegMuxer;
use bisub::collaborators::llm::LlmTranslator;
use bisub::collaborators::whisper::WhisperApiTranscriber;
use bisub::collaborators::ytdlp::YtDlpAcquirer;
use bisub::collaborators::Collaborators;
use bisub::jobs::record::{ArtifactKind, JobInputs, JobPhase, SourceRef, TrimWindow};
use bisub::jobs::events::JobEvent;
use bisub::orchestrator::Orchestrator;

/// CLI wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one subtitle job end-to-end (default command)
    Run(RunArgs),

    /// Generate shell completions for bisub
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Remote media URL, or a local file path with --upload
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Treat SOURCE as a local file instead of a remote URL
    #[arg(short, long)]
    upload: bool,

    /// Trim window in seconds, as START-END (e.g. 30-90)
    #[arg(long)]
    trim: Option<String>,

    /// Source language code (e.g. 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g. 'zh-TW', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Burn the subtitles into the video after completion
    #[arg(short, long)]
    burn: bool,

    /// Directory to copy the produced artifacts into
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// bisub - Bilingual Subtitle Pipeline
///
/// Turns a single media source into bilingual subtitles (and optionally a
/// muxed video): download, transcribe, translate, merge, burn.
#[derive(Parser, Debug)]
#[command(name = "bisub")]
#[command(version = "0.1.0")]
#[command(about = "Bilingual subtitle generation pipeline")]
#[command(long_about = "bisub downloads a media source, transcribes it, translates the \
transcript and produces bilingual SRT/ASS subtitles, optionally burning them into the video.

EXAMPLES:
    bisub https://www.youtube.com/watch?v=abc123     # Subtitle a remote video
    bisub -u movie.mp4                               # Subtitle a local file
    bisub --trim 30-90 https://...                   # Only process 0:30-1:30
    bisub -b https://...                             # Also burn the subtitles in
    bisub -s en -t fr https://...                    # Override the language pair
    bisub completions bash > bisub.bash              # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Remote media URL, or a local file path with --upload
    #[arg(value_name = "SOURCE")]
    source: Option<String>,

    /// Treat SOURCE as a local file instead of a remote URL
    #[arg(short, long)]
    upload: bool,

    /// Trim window in seconds, as START-END (e.g. 30-90)
    #[arg(long)]
    trim: Option<String>,

    /// Source language code (e.g. 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g. 'zh-TW', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Burn the subtitles into the video after completion
    #[arg(short, long)]
    burn: bool,

    /// Directory to copy the produced artifacts into
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let color = Self::color_for_level(record.level());
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "{}{} {}\x1B[0m", color, now, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default; the level is
    // updated after the config is loaded
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "bisub", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Run(args)) => run_job(args).await,
        None => {
            // Default behavior - use top-level args for backwards compatibility
            let source = cli
                .source
                .ok_or_else(|| anyhow!("SOURCE is required when no subcommand is specified"))?;

            let run_args = RunArgs {
                source,
                upload: cli.upload,
                trim: cli.trim,
                source_language: cli.source_language,
                target_language: cli.target_language,
                burn: cli.burn,
                output_dir: cli.output_dir,
                config_path: cli.config_path,
                log_level: cli.log_level,
            };
            run_job(run_args).await
        }
    }
}

fn load_config(args: &RunArgs) -> Result<Config> {
    let config_path = std::path::Path::new(&args.config_path);
    let mut config = if config_path.exists() {
        Config::from_file(config_path)?
    } else {
        warn!(
            "Config file not found at '{}', creating default config.",
            args.config_path
        );
        let config = Config::default();
        config.save_to_file(config_path)?;
        config
    };

    if let Some(source_lang) = &args.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &args.target_language {
        config.target_language = target_lang.clone();
    }
    if let Some(log_level) = &args.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate().context("Configuration validation failed")?;

    log::set_max_level(match config.log_level {
        LogLevel::Error => LevelFilter::Error,
        LogLevel::Warn => LevelFilter::Warn,
        LogLevel::Info => LevelFilter::Info,
        LogLevel::Debug => LevelFilter::Debug,
        LogLevel::Trace => LevelFilter::Trace,
    });

    Ok(config)
}

fn parse_trim(spec: &str) -> Result<TrimWindow> {
    let (start, end) = spec
        .split_once('-')
        .ok_or_else(|| anyhow!("Trim window must be START-END in seconds: {}", spec))?;
    let start: f64 = start.trim().parse().context("Failed to parse trim start")?;
    let end: f64 = end.trim().parse().context("Failed to parse trim end")?;

    Ok(TrimWindow {
        start_ms: (start * 1000.0) as u64,
        end_ms: (end * 1000.0) as u64,
    })
}

async fn run_job(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;

    let collaborators = Collaborators {
        acquirer: Arc::new(YtDlpAcquirer::new(config.acquisition.clone())),
        transcriber: Arc::new(WhisperApiTranscriber::new(config.transcription.clone())),
        translator: Arc::new(LlmTranslator::new(config.translation.clone())),
        muxer: Arc::new(FfmpegMuxer::new(config.acquisition.clone())),
    };
    let orchestrator = Orchestrator::new(config.clone(), collaborators);
    orchestrator.start_sweeper();

    let source = if args.upload {
        SourceRef::UploadedFile {
            path: PathBuf::from(&args.source),
        }
    } else {
        SourceRef::RemoteUrl {
            url: args.source.clone(),
        }
    };
    let trim = args.trim.as_deref().map(parse_trim).transpose()?;
    let inputs = JobInputs {
        source,
        trim,
        source_lang: config.source_language.clone(),
        target_lang: config.target_language.clone(),
    };

    let status = orchestrator.create_job(inputs)?;
    let job_id = status.job_id.clone();
    info!("Job {} created", job_id);

    let progress_bar = ProgressBar::new(100);
    let template_result = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(template_result.progress_chars("█▓▒░"));

    let mut stream = orchestrator.subscribe(&job_id)?;
    while let Some(event) = stream.next().await {
        match event {
            JobEvent::Progress {
                progress,
                current_step,
                ..
            } => {
                progress_bar.set_position(progress as u64);
                progress_bar.set_message(current_step.unwrap_or_default());
            }
            JobEvent::DownloadComplete { progress, .. } => {
                progress_bar.set_position(progress as u64);
                progress_bar.set_message("resuming");
                // No interactive preview on the command line; continue
                orchestrator.resume(&job_id)?;
            }
            JobEvent::Complete { status, .. } => {
                progress_bar.set_position(100);
                if status == JobPhase::Completed && args.burn {
                    // The stream closed on the terminal event; attach a new
                    // consumer before the burn starts publishing
                    let burn_stream = orchestrator.subscribe(&job_id)?;
                    orchestrator.request_burn(&job_id, None)?;
                    stream = burn_stream;
                    progress_bar.set_message("burn");
                } else {
                    break;
                }
            }
            JobEvent::Error {
                code,
                message,
                detail,
            } => {
                progress_bar.abandon();
                return Err(anyhow!(
                    "Job failed: {} - {}{}",
                    code,
                    message,
                    detail.map(|d| format!(" ({})", d)).unwrap_or_default()
                ));
            }
            JobEvent::Ping => {}
        }
    }
    progress_bar.finish_and_clear();

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create directory: {}", args.output_dir.display()))?;

    let mut kinds = vec![ArtifactKind::Srt, ArtifactKind::Ass];
    if args.burn {
        kinds.push(ArtifactKind::Video);
    }
    for kind in kinds {
        let path = orchestrator.artifact_path(&job_id, kind)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("out");
        let destination = args.output_dir.join(format!("bisub.{}", extension));
        std::fs::copy(&path, &destination)
            .with_context(|| format!("Failed to copy artifact to {}", destination.display()))?;
        info!("Success: {}", destination.display());
    }

    orchestrator.shutdown();
    Ok(())
}
