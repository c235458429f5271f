//! pemrot CLI — XY de-rotation and borehole geometry on JSON survey documents.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use pemrot::io::describe_parse_failures;
use pemrot::{
    DenseCurve, DerotationConfig, DerotationEngine, LengthUnit, RotationMethod, SegmentBuilder,
    Survey, SurveyDocument,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "pemrot")]
#[command(about = "De-rotate borehole EM XY readings and build borehole geometry")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rotate the XY readings of a survey document.
    Derotate(CliDerotateArgs),

    /// Print the roll-angle candidates of every station.
    Angles {
        /// Path to the survey document (JSON).
        #[arg(long)]
        survey: PathBuf,

        /// Print a continuous angle profile for this method instead.
        #[arg(long, value_enum)]
        profile: Option<MethodArg>,
    },

    /// Project the borehole trace of a survey document.
    Project {
        /// Path to the survey document (JSON).
        #[arg(long)]
        survey: PathBuf,

        /// Resample the segment table to this many points first.
        #[arg(long)]
        num_segments: Option<usize>,

        /// Path to write the trace (JSON).
        #[arg(long)]
        out: PathBuf,
    },

    /// Collapse a dense depth/azimuth/dip file into a segment table.
    Segments {
        /// Path to the DAD text file.
        #[arg(long)]
        dad: PathBuf,

        /// Length unit of the depths.
        #[arg(long, value_enum, default_value_t = UnitArg::Metres)]
        units: UnitArg,

        /// Optional config file (JSON) with segment thresholds.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to write the segment table (JSON).
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct CliDerotateArgs {
    /// Path to the survey document (JSON).
    #[arg(long)]
    survey: PathBuf,

    /// Angle source.
    #[arg(long, value_enum)]
    method: MethodArg,

    /// Sensor offset angle in degrees, added to the selected angle.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    soa: f64,

    /// Optional config file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fail instead of skipping PP candidates when geometry is incomplete.
    #[arg(long)]
    require_pp: bool,

    /// Path to write the rotated survey document (JSON).
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    Acc,
    Mag,
    PpRaw,
    PpCleaned,
    Soa,
    Unrotate,
}

impl MethodArg {
    fn to_core(self) -> RotationMethod {
        match self {
            Self::Acc => RotationMethod::Acc,
            Self::Mag => RotationMethod::Mag,
            Self::PpRaw => RotationMethod::PpRaw,
            Self::PpCleaned => RotationMethod::PpCleaned,
            Self::Soa => RotationMethod::Soa,
            Self::Unrotate => RotationMethod::Unrotate,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum UnitArg {
    Metres,
    Feet,
}

impl UnitArg {
    fn to_core(self) -> LengthUnit {
        match self {
            Self::Metres => LengthUnit::Metres,
            Self::Feet => LengthUnit::Feet,
        }
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
        Commands::Derotate(args) => run_derotate(&args),
        Commands::Angles { survey, profile } => run_angles(&survey, profile),
        Commands::Project {
            survey,
            num_segments,
            out,
        } => run_project(&survey, num_segments, &out),
        Commands::Segments {
            dad,
            units,
            config,
            out,
        } => run_segments(&dad, units, config.as_deref(), &out),
    }
}

fn load_config(path: Option<&Path>) -> CliResult<DerotationConfig> {
    match path {
        Some(p) => {
            tracing::info!("Loading config: {}", p.display());
            Ok(DerotationConfig::from_json_file(p)?)
        }
        None => Ok(DerotationConfig::default()),
    }
}

fn load_survey(path: &Path) -> CliResult<SurveyDocument> {
    tracing::info!("Loading survey: {}", path.display());
    SurveyDocument::from_json_file(path).map_err(|e| -> CliError {
        format!("Failed to load survey {}: {}", path.display(), e).into()
    })
}

fn report_parse_failures(survey: &Survey) {
    if let Some(msg) = describe_parse_failures(&survey.parse_failures) {
        tracing::warn!("{}", msg);
    }
}

// ── derotate ───────────────────────────────────────────────────────────

fn run_derotate(args: &CliDerotateArgs) -> CliResult<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.require_pp {
        config.require_pp = true;
    }

    let (mut survey, geometry) = load_survey(&args.survey)?.into_survey();
    report_parse_failures(&survey);

    let mut engine = DerotationEngine::new(config, geometry);
    let method = args.method.to_core();
    let result = engine.rotate(&mut survey, method, args.soa)?;

    tracing::info!(
        "{}: {} groups rotated, {} skipped, {} with unequal stacking",
        method.description(),
        result.rotated,
        result.skipped.len(),
        result.unequal_stacking
    );
    if let Some(prepared) = engine.prepared() {
        for g in &prepared.ineligible {
            tracing::debug!("Station {} tool {}: {:?}", g.station, g.tool_id, g.reason);
        }
    }

    let doc = SurveyDocument::from_survey(&survey, engine.geometry());
    doc.write_json_file(&args.out)?;
    tracing::info!("Survey written to {}", args.out.display());
    Ok(())
}

// ── angles ─────────────────────────────────────────────────────────────

fn fmt_angle(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |a| format!("{:.2}", a))
}

fn run_angles(path: &Path, profile: Option<MethodArg>) -> CliResult<()> {
    let (mut survey, geometry) = load_survey(path)?.into_survey();
    report_parse_failures(&survey);

    let mut engine = DerotationEngine::new(DerotationConfig::default(), geometry);
    let prepared = engine.prepare(&mut survey)?;

    if let Some(method) = profile {
        let method = method.to_core();
        println!("{} angle profile", method.description());
        for s in prepared.angle_profile(&survey, method)? {
            println!("  {:>10} {:>6} {:>10.2}", s.station, s.tool_id, s.angle);
        }
        return Ok(());
    }

    println!(
        "  {:>10} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "station", "tool", "acc", "mag", "pp", "cleaned", "used"
    );
    for g in &prepared.groups {
        let tool = survey.tool(g.tool)?;
        println!(
            "  {:>10} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10}",
            g.station,
            g.tool_id,
            fmt_angle(tool.acc_roll_angle),
            fmt_angle(tool.mag_roll_angle),
            fmt_angle(tool.measured_pp_roll_angle),
            fmt_angle(tool.cleaned_pp_roll_angle),
            fmt_angle(tool.angle_used),
        );
    }
    if !prepared.ineligible.is_empty() {
        println!("  {} groups not eligible for de-rotation", prepared.ineligible.len());
    }
    Ok(())
}

// ── project ────────────────────────────────────────────────────────────

fn run_project(path: &Path, num_segments: Option<usize>, out: &Path) -> CliResult<()> {
    let doc = load_survey(path)?;
    let geometry = doc.geometry();
    let trace = pemrot::geometry::project(geometry.collar.as_ref(), &geometry.segments, num_segments)?;

    match &trace {
        Some(t) => tracing::info!("Projected {} trace points", t.len()),
        None => tracing::warn!("Survey has no collar or segments; writing an empty trace"),
    }
    let json = serde_json::to_string_pretty(&trace)?;
    std::fs::write(out, &json)?;
    tracing::info!("Trace written to {}", out.display());
    Ok(())
}

// ── segments ───────────────────────────────────────────────────────────

fn run_segments(dad: &Path, units: UnitArg, config: Option<&Path>, out: &Path) -> CliResult<()> {
    let config = load_config(config)?;
    tracing::info!("Loading DAD curve: {}", dad.display());
    let text = std::fs::read_to_string(dad).map_err(|e| -> CliError {
        format!("Failed to read {}: {}", dad.display(), e).into()
    })?;
    let curve = DenseCurve::from_dad_str(&text)?;

    let table = SegmentBuilder::new(config.segments).from_curve(&curve, units.to_core())?;
    tracing::info!(
        "Collapsed {} curve points into {} segments",
        curve.len(),
        table.len()
    );

    let json = serde_json::to_string_pretty(&table)?;
    std::fs::write(out, &json)?;
    tracing::info!("Segments written to {}", out.display());
    Ok(())
}
