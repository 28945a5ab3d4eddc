use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use taboo_game::{
    load_credentials, load_definitions, resolve_font, Collaborators, DetectorConfig,
    DetectorProcess, Recorder, ResultPresenter, Session, SessionConfig, StabilityClient,
    DEFAULT_GENERATION_TIMEOUT, RESULT_FILE_NAME,
};
use tracing::info;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
struct Args {
    /// Path to the detector config JSON file
    #[arg(short, long)]
    detector: PathBuf,

    /// How many rounds to play
    #[arg(short = 'n', long, default_value_t = 1)]
    rounds: usize,

    /// RNG seed for picking targets
    #[arg(long)]
    seed: Option<u64>,

    /// TOML file mapping each answer to its taboo words
    #[arg(long, default_value = "targets.toml")]
    definitions: PathBuf,

    /// File with the image generator's API key
    #[arg(long, default_value = "key.txt")]
    credentials: PathBuf,

    /// Where generated images and the result image are written
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Seed passed on to the image generator
    #[arg(long)]
    generation_seed: Option<u32>,

    /// Timeout for one image generation request, in seconds
    #[arg(long, default_value_t = DEFAULT_GENERATION_TIMEOUT.as_secs())]
    generation_timeout: u64,

    /// TrueType font for the verdict text
    #[arg(long)]
    font: Option<PathBuf>,

    /// Don't open the result image in the system viewer
    #[arg(long, default_value_t = false)]
    no_show: bool,

    /// Record each round as a JSON file into this directory
    #[arg(short, long)]
    record_rounds_to_directory: Option<PathBuf>,

    /// A log level among "off", "error", "warn", "info", "debug", "trace"
    #[arg(short, long, default_value = "info")]
    log_level: LevelFilter,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    initialize_logging(args.log_level);

    // Get a random seed
    let seed = args.seed.unwrap_or_else(rand::random);
    info!(seed);
    let rng = StdRng::seed_from_u64(seed);

    let table = load_definitions(&args.definitions)?;
    let credentials = load_credentials(&args.credentials)?;
    let detector_config = DetectorConfig::load(&args.detector)?;
    let recorder = args
        .record_rounds_to_directory
        .map(Recorder::new)
        .transpose()?;
    std::fs::create_dir_all(&args.output_dir)?;

    let generator = StabilityClient::new(
        &credentials,
        Duration::from_secs(args.generation_timeout),
    )?
    .with_seed(args.generation_seed);
    let detector = DetectorProcess::spawn(&detector_config)?;
    let presenter = ResultPresenter::new(
        resolve_font(args.font.as_deref()),
        args.output_dir.join(RESULT_FILE_NAME),
        !args.no_show,
    );

    let collaborators = Collaborators {
        input: Box::new(std::io::stdin().lock()),
        output: Box::new(std::io::stdout()),
        generator: Box::new(generator),
        detector: Box::new(detector),
        presenter: Box::new(presenter),
    };
    let config = SessionConfig {
        rng,
        rounds: args.rounds,
        output_dir: args.output_dir,
        recorder,
    };

    let mut session = Session::new(config, table, collaborators);
    session.run()?;

    Ok(())
}

fn initialize_logging(level: LevelFilter) {
    let format = tracing_subscriber::fmt::format()
        .with_target(false)
        .compact();

    let filter = Targets::new().with_default(level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(format)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}
