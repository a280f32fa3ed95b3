// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, warn};
use std::io::Write;
use std::path::PathBuf;

use srtnotes::app_config::{self, Config};
use srtnotes::app_controller::Controller;
use srtnotes::pipeline::RunOutcome;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate show notes from subtitle files (default command)
    #[command(alias = "process")]
    Run(RunArgs),

    /// Check that the configured service accepts requests
    Check(ServiceArgs),

    /// Generate shell completions for srtnotes
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options shared by every command that talks to the service
#[derive(Args, Debug, Clone)]
struct ServiceArgs {
    /// Configuration file path
    #[arg(short, long = "config", default_value = "conf.json")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// API key for the text service
    #[arg(long, env = "SRTNOTES_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long)]
    base_url: Option<String>,

    /// Model name to use for titles and proofreading
    #[arg(short, long)]
    model: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Input subtitle file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    #[command(flatten)]
    service: ServiceArgs,

    /// Minimum number of characters per segment
    #[arg(short, long)]
    target_length: Option<usize>,

    /// Skip title generation
    #[arg(long)]
    no_titles: bool,

    /// Skip proofreading
    #[arg(long)]
    no_proofread: bool,

    /// Directory the show notes are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Attempts per rate-limited request, 0 retries forever
    #[arg(long)]
    max_retries: Option<u32>,

    /// Print the generated show notes to stdout
    #[arg(short, long)]
    print: bool,
}

/// srtnotes - show notes from subtitle files
///
/// Merges subtitle cues into readable segments, then titles and proofreads
/// every segment with an OpenAI-compatible text service.
#[derive(Parser, Debug)]
#[command(name = "srtnotes")]
#[command(version)]
#[command(about = "Turn SRT subtitles into titled show notes")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "srtnotes merges SRT subtitle cues into segments, titles and proofreads them with an OpenAI-compatible API, and writes timestamped show notes.

EXAMPLES:
    srtnotes episode.srt                        # Process using default config
    srtnotes --no-proofread episode.srt         # Titles only
    srtnotes -t 800 -o notes/ episode.srt       # Longer segments, custom output directory
    srtnotes --print --no-titles episode.srt    # Print the document to stdout
    srtnotes --log-level debug /podcasts/       # Process a whole directory with debug logging
    srtnotes check                              # Verify the API key and endpoint
    srtnotes completions bash > srtnotes.bash   # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically. The API key may also come from SRTNOTES_API_KEY.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The filter is lowered again once the config is known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "srtnotes", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Check(args)) => {
            let config = load_config(&args)?;
            Controller::with_config(config)?.check_connection().await?;
            Ok(())
        }
        Some(Commands::Run(args)) => run_process(args).await,
        None => run_process(cli.run).await,
    }
}

/// Load the config file and apply service overrides from the command line
fn load_config(args: &ServiceArgs) -> Result<Config> {
    if let Some(level) = &args.log_level {
        log::set_max_level(app_config::LogLevel::from(level.clone()).to_level_filter());
    }

    let mut config = Config::load_or_create(&args.config_path)?;

    if let Some(api_key) = &args.api_key {
        config.api.api_key = api_key.clone();
    }
    if let Some(base_url) = &args.base_url {
        config.api.base_url = base_url.clone();
    }
    if let Some(model) = &args.model {
        config.api.model = model.clone();
    }

    match &args.log_level {
        Some(level) => config.log_level = level.clone().into(),
        None => log::set_max_level(config.log_level.to_level_filter()),
    }

    Ok(config)
}

fn apply_run_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(target_length) = args.target_length {
        config.processing.target_length = target_length;
    }
    if args.no_titles {
        config.processing.enable_titles = false;
    }
    if args.no_proofread {
        config.processing.enable_proofread = false;
    }
    if let Some(output_dir) = &args.output_dir {
        config.output_directory = output_dir.clone();
    }
    if let Some(max_retries) = args.max_retries {
        config.retry.max_attempts = (max_retries > 0).then_some(max_retries);
    }
}

async fn run_process(args: RunArgs) -> Result<()> {
    let input_path = args
        .input_path
        .clone()
        .ok_or_else(|| anyhow!("INPUT_PATH is required when no subcommand is specified"))?;

    let mut config = load_config(&args.service)?;
    apply_run_overrides(&mut config, &args);

    let controller = Controller::with_config(config)?.with_print(args.print);

    if input_path.is_file() {
        match controller.run(input_path).await? {
            RunOutcome::Completed { .. } => Ok(()),
            RunOutcome::Cancelled => {
                warn!("Cancelled, no show notes were written");
                Ok(())
            }
            RunOutcome::Failed { message } => Err(anyhow!(message)),
        }
    } else if input_path.is_dir() {
        let summary = controller.run_folder(input_path).await?;
        if summary.failed > 0 {
            return Err(anyhow!("{} file(s) failed", summary.failed));
        }
        Ok(())
    } else {
        Err(anyhow!("Input path does not exist: {:?}", input_path))
    }
}
