//! droptrack CLI — droplet trajectory extraction and decay fitting.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use droptrack::{
    AnalysisConfig, Analyzer, DecayParameters, GradientScheme, ThresholdPolarity, TimestampMode,
    TracingObserver,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "droptrack")]
#[command(about = "Track a falling droplet in a video and fit an exponential-decay model")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a video (or image sequence) and write the result table.
    Analyze(CliAnalyzeArgs),

    /// Refit the decay model to the Time/Distance columns of an existing table.
    Fit(CliFitArgs),

    /// Print the effective default configuration as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    /// Path to the input video.
    #[arg(long, required_unless_present = "frames_dir", conflicts_with = "frames_dir")]
    video: Option<PathBuf>,

    /// Directory of still frames (sorted by file name) instead of a video.
    #[arg(long, requires = "fps")]
    frames_dir: Option<PathBuf>,

    /// Frame rate of the image sequence.
    #[arg(long)]
    fps: Option<f64>,

    /// Path to write the result table (CSV).
    #[arg(long)]
    out: PathBuf,

    /// Optional path to write a run summary (JSON).
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// JSON configuration file; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Luminance cutoff (0-255).
    #[arg(long)]
    threshold: Option<u8>,

    /// Which side of the cutoff is the droplet.
    #[arg(long, value_enum)]
    polarity: Option<PolarityArg>,

    /// How sample timestamps are derived.
    #[arg(long, value_enum)]
    timestamps: Option<TimestampArg>,

    /// Interior stencil for velocity/acceleration.
    #[arg(long, value_enum)]
    gradient: Option<GradientArg>,

    /// Decay fit: maximum solver iterations.
    #[arg(long)]
    max_iters: Option<usize>,

    /// Decay fit: starting point as `a,b,c`.
    #[arg(long, value_parser = parse_params)]
    initial_guess: Option<DecayParameters>,
}

#[derive(Debug, Clone, Args)]
struct CliFitArgs {
    /// Table previously written by `droptrack analyze`.
    #[arg(long)]
    csv: PathBuf,

    /// Maximum solver iterations.
    #[arg(long, default_value = "200")]
    max_iters: usize,

    /// Starting point as `a,b,c`.
    #[arg(long, value_parser = parse_params)]
    initial_guess: Option<DecayParameters>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolarityArg {
    Dark,
    Bright,
}

impl PolarityArg {
    fn to_core(self) -> ThresholdPolarity {
        match self {
            Self::Dark => ThresholdPolarity::DarkForeground,
            Self::Bright => ThresholdPolarity::BrightForeground,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TimestampArg {
    DetectionOrdinal,
    FrameIndex,
}

impl TimestampArg {
    fn to_core(self) -> TimestampMode {
        match self {
            Self::DetectionOrdinal => TimestampMode::DetectionOrdinal,
            Self::FrameIndex => TimestampMode::FrameIndex,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GradientArg {
    Central,
    SecondOrder,
}

impl GradientArg {
    fn to_core(self) -> GradientScheme {
        match self {
            Self::Central => GradientScheme::Central,
            Self::SecondOrder => GradientScheme::SecondOrder,
        }
    }
}

fn parse_params(s: &str) -> Result<DecayParameters, String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid number in '{}': {}", s, e))?;
    match values.as_slice() {
        [a, b, c] => Ok(DecayParameters::new(*a, *b, *c)),
        _ => Err(format!("expected three values a,b,c, got '{}'", s)),
    }
}

impl CliAnalyzeArgs {
    fn to_config(&self) -> CliResult<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json_file(path)?,
            None => AnalysisConfig::default(),
        };

        if let Some(t) = self.threshold {
            config.locator.threshold = t;
        }
        if let Some(p) = self.polarity {
            config.locator.polarity = p.to_core();
        }
        if let Some(t) = self.timestamps {
            config.trajectory.timestamps = t.to_core();
        }
        if let Some(g) = self.gradient {
            config.kinematics.scheme = g.to_core();
        }
        if let Some(n) = self.max_iters {
            config.fit.max_iters = n;
        }
        if let Some(p) = self.initial_guess {
            config.fit.initial_guess = Some(p);
        }
        Ok(config)
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => run_analyze(&args),
        Commands::Fit(args) => run_fit(&args),
        Commands::DefaultConfig => run_default_config(),
    }
}

// ── analyze ────────────────────────────────────────────────────────────

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    let config = args.to_config()?;
    let analyzer = Analyzer::with_config(config);
    let mut observer = TracingObserver;

    let report = match (&args.video, &args.frames_dir) {
        (Some(video), _) => analyzer.run_video_with_observer(video, &args.out, &mut observer)?,
        (None, Some(dir)) => {
            let fps = args.fps.ok_or("--fps is required with --frames-dir")?;
            analyzer.run_image_sequence(dir, fps, &args.out, &mut observer)?
        }
        (None, None) => return Err("either --video or --frames-dir is required".into()),
    };

    println!(
        "{} of {} frames with droplet -> {}",
        report.frames_detected,
        report.frames_total,
        report.output.display()
    );
    println!(
        "position(t) = {:.4} * exp(-{:.4} * t) + {:.4}   (rmse {:.3} px)",
        report.params.a, report.params.b, report.params.c, report.rmse
    );

    if let Some(path) = &args.summary_json {
        droptrack::output::write_json(path, &report)?;
        tracing::info!("Summary written to {}", path.display());
    }

    Ok(())
}

// ── fit ────────────────────────────────────────────────────────────────

fn run_fit(args: &CliFitArgs) -> CliResult<()> {
    let rows = droptrack::output::read_table(&args.csv)?;
    let times: Vec<f64> = rows.iter().map(|r| r.time).collect();
    let distances: Vec<f64> = rows.iter().map(|r| r.distance).collect();

    let config = droptrack::FitConfig {
        max_iters: args.max_iters,
        initial_guess: args.initial_guess,
        ..Default::default()
    };
    let fit = droptrack::fit_decay(&times, &distances, &config)?;

    println!("samples:    {}", rows.len());
    println!("a:          {:.6}", fit.params.a);
    println!("b:          {:.6}", fit.params.b);
    println!("c:          {:.6}", fit.params.c);
    println!("rmse:       {:.4} px", fit.rmse);

    Ok(())
}

// ── default-config ─────────────────────────────────────────────────────

fn run_default_config() -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(&AnalysisConfig::default())?);
    Ok(())
}
