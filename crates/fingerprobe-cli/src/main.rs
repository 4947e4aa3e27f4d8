//! fingerprobe CLI: batch measurements over SEM image sets and AFM profiles.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use fingerprobe::{
    analyze_profile_sets, names_from_glob, numbered_names, rim_table, write_run_parameters,
    Batch, CalibrationSource, ImageSet, LineColor, MeasureConfig, MeasurementTable, SampleTag,
    ScaleBarConfig,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "fingerprobe")]
#[command(about = "Measure finger dewetting patterns in SEM micrographs and AFM profiles")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Finger propagation direction of every image.
    Direction(CliDirectionArgs),

    /// Propagation distance from the initial edge to each finger tip.
    Distance(CliDistanceArgs),

    /// Wire widths, finger widths and finger periods along a drawn line.
    Widths(CliWidthsArgs),

    /// Propagation distance from the first line crossing, projected by alpha and beta.
    ProjectedDistance(CliProjectedArgs),

    /// Pixel size of every image.
    CheckCalibration(CliImageArgs),

    /// Rim heights and side slopes from exported AFM profiles.
    Afm(CliAfmArgs),

    /// Mean, standard deviation and count of the columns of a result table.
    Summary {
        /// Table written by one of the measurement commands (JSON).
        #[arg(long)]
        table: PathBuf,

        /// Only summarize these columns.
        #[arg(long)]
        column: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LineColorArg {
    #[value(alias = "red")]
    R,
    #[value(alias = "black")]
    K,
}

impl LineColorArg {
    fn to_core(self) -> LineColor {
        match self {
            Self::R => LineColor::Red,
            Self::K => LineColor::Black,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct CliImageArgs {
    /// Directory holding the images.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Base name of numbered images, e.g. `33deg_` for `33deg_029.tif`.
    #[arg(long, requires = "numbers", conflicts_with = "glob")]
    base: Option<String>,

    /// Image numbers (comma separated).
    #[arg(long, value_delimiter = ',')]
    numbers: Vec<u32>,

    /// Glob pattern selecting images instead of base + numbers, e.g. `20deg_0??.tif`.
    #[arg(long)]
    glob: Option<String>,

    /// Numbers of images to drop from the glob matches (needs --base-exclude).
    #[arg(long, value_delimiter = ',', requires = "base_exclude")]
    exclude: Vec<u32>,

    /// Base name (inside --dir) used to build the excluded names.
    #[arg(long)]
    base_exclude: Option<String>,

    /// Zero padding of image numbers (overrides the config).
    #[arg(long)]
    zeropad: Option<usize>,

    /// Measurement configuration (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// First row of the data bar (overrides the config).
    #[arg(long)]
    data_bar_top: Option<u32>,

    /// Color of the drawn reference lines (overrides the config).
    #[arg(long, value_enum)]
    line_color: Option<LineColorArg>,

    /// Fixed pixel size in micrometres.
    #[arg(long, conflicts_with_all = ["scale_bar_um", "scale_bar_labels", "data_bar_texts"])]
    pixel_size_um: Option<f64>,

    /// Value of the scale bar label in micrometres; the bar is measured per image.
    #[arg(long, conflicts_with_all = ["scale_bar_labels", "data_bar_texts"])]
    scale_bar_um: Option<f64>,

    /// JSON object mapping image name to its OCR'd scale-bar label.
    #[arg(long, conflicts_with = "data_bar_texts")]
    scale_bar_labels: Option<PathBuf>,

    /// JSON object mapping image name to its OCR'd data-bar text.
    #[arg(long)]
    data_bar_texts: Option<PathBuf>,

    /// Sample tag `thickness_nm,edge_deg,anneal_h,label` used to name outputs.
    #[arg(long, default_value = "120,33,6,2_p1")]
    tag: String,

    /// Output directory; tables go to `<out>/<table name>/`.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliAngleArgs {
    /// Lower bound of accepted finger orientations (deg, exclusive).
    #[arg(long)]
    ori_lower: Option<f64>,

    /// Upper bound of accepted finger orientations (deg, exclusive).
    #[arg(long)]
    ori_upper: Option<f64>,

    /// Hough vote threshold for finger edges.
    #[arg(long)]
    finger_votes: Option<u32>,

    /// Hough vote threshold for drawn reference lines.
    #[arg(long)]
    line_votes: Option<u32>,
}

#[derive(Debug, Clone, Args)]
struct CliDirectionArgs {
    #[command(flatten)]
    images: CliImageArgs,
    #[command(flatten)]
    angles: CliAngleArgs,
}

#[derive(Debug, Clone, Args)]
struct CliDistanceArgs {
    #[command(flatten)]
    images: CliImageArgs,

    /// Suffix of the image with the initial-edge line.
    #[arg(long, default_value = "_line_1")]
    suffix_1: String,

    /// Suffix of the image with the line through the finger tips.
    #[arg(long, default_value = "_line_2")]
    suffix_2: String,
}

#[derive(Debug, Clone, Args)]
struct CliWidthsArgs {
    #[command(flatten)]
    images: CliImageArgs,
    #[command(flatten)]
    angles: CliAngleArgs,

    /// Suffix of the image with the line across the wire array.
    #[arg(long, default_value = "_line1")]
    suffix: String,
}

#[derive(Debug, Clone, Args)]
struct CliProjectedArgs {
    #[command(flatten)]
    images: CliImageArgs,
    #[command(flatten)]
    angles: CliAngleArgs,

    #[arg(long, default_value = "new_line_1")]
    suffix_1: String,

    #[arg(long, default_value = "new_line_2")]
    suffix_2: String,

    /// Measure from the bottom-most crossing instead of the top-most.
    #[arg(long)]
    reverse: bool,
}

#[derive(Debug, Clone, Args)]
struct CliAfmArgs {
    /// Directory holding `flat_k_stat.txt`, `corner_k.txt`, `root{1,2}_k.txt`, `side{1,2}_k.txt`.
    #[arg(long)]
    dir: PathBuf,

    /// Number of profile sets (k = 1..=count).
    #[arg(long)]
    count: usize,

    /// Output directory for the rim table.
    #[arg(long)]
    out: Option<PathBuf>,

    /// File stem of the rim table.
    #[arg(long, default_value = "rim")]
    stem: String,
}

impl CliImageArgs {
    fn load_config(&self) -> CliResult<MeasureConfig> {
        let mut config = match &self.config {
            Some(path) => MeasureConfig::from_json_file(path)?,
            None => MeasureConfig::default(),
        };
        if let Some(v) = self.zeropad {
            config.zeropad = v;
        }
        if let Some(v) = self.data_bar_top {
            config.data_bar_top = v;
        }
        if let Some(c) = self.line_color {
            config.line_color = c.to_core();
        }
        if let Some(px) = self.pixel_size_um {
            config.calibration = CalibrationSource::Fixed { pixel_size_um: px };
        }
        let bar = match &config.calibration {
            CalibrationSource::ScaleBar { bar, .. }
            | CalibrationSource::ScaleBarLabelTable { bar, .. } => *bar,
            _ => ScaleBarConfig::default(),
        };
        if let Some(label_um) = self.scale_bar_um {
            config.calibration = CalibrationSource::ScaleBar { label_um, bar };
        }
        if let Some(path) = &self.scale_bar_labels {
            config.calibration = CalibrationSource::ScaleBarLabelTable {
                path: path.clone(),
                bar,
            };
        }
        if let Some(path) = &self.data_bar_texts {
            config.calibration = CalibrationSource::DataBarTable { path: path.clone() };
        }
        Ok(config)
    }

    fn image_set(&self, zeropad: usize) -> CliResult<ImageSet> {
        if let Some(pattern) = &self.glob {
            let exclude = match &self.base_exclude {
                Some(base) => {
                    let base = self.dir.join(base).to_string_lossy().into_owned();
                    numbered_names(&base, &self.exclude, zeropad)
                }
                None => Vec::new(),
            };
            let pattern = self.dir.join(pattern).to_string_lossy().into_owned();
            // Glob matches already carry the directory.
            return Ok(ImageSet::new(PathBuf::new(), names_from_glob(&pattern, &exclude)?));
        }
        match &self.base {
            Some(base) => Ok(ImageSet::numbered(&self.dir, base, &self.numbers, zeropad)),
            None => Err("either --base with --numbers or --glob is required".into()),
        }
    }

    fn tag(&self) -> CliResult<SampleTag> {
        Ok(self.tag.parse()?)
    }

    fn batch(&self, config: MeasureConfig) -> CliResult<Batch> {
        let images = self.image_set(config.zeropad)?;
        tracing::info!("{} images in {}", images.names.len(), images.dir.display());
        Ok(Batch::new(images, config)?)
    }
}

impl CliAngleArgs {
    fn apply(&self, config: &mut MeasureConfig) {
        if let Some(v) = self.ori_lower {
            config.window.lower = v;
        }
        if let Some(v) = self.ori_upper {
            config.window.upper = v;
        }
        if let Some(v) = self.finger_votes {
            config.finger_lines.vote_threshold = v;
        }
        if let Some(v) = self.line_votes {
            config.reference_lines.vote_threshold = v;
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
        Commands::Direction(args) => run_direction(&args),
        Commands::Distance(args) => run_distance(&args),
        Commands::Widths(args) => run_widths(&args),
        Commands::ProjectedDistance(args) => run_projected_distance(&args),
        Commands::CheckCalibration(args) => run_check_calibration(&args),
        Commands::Afm(args) => run_afm(&args),
        Commands::Summary { table, column } => run_summary(&table, &column),
    }
}

// ── output ────────────────────────────────────────────────────────────

/// Write each table to `<out>/<table name>/<stem>.json` with a parameter
/// sidecar, or print them as JSON when no output directory is given.
fn emit(
    out: Option<&Path>,
    stem: &str,
    tables: &[&MeasurementTable],
    params: &serde_json::Value,
) -> CliResult<()> {
    let Some(out) = out else {
        for table in tables {
            println!("{}", serde_json::to_string_pretty(table)?);
        }
        return Ok(());
    };
    for table in tables {
        if table.is_empty() {
            tracing::warn!("{}: no rows, writing an empty table", table.name);
        }
        let dir = out.join(&table.name);
        table.write_json(&dir, stem)?;
        write_run_parameters(&dir, stem, params)?;
    }
    Ok(())
}

fn print_summary(table: &MeasurementTable) {
    println!("{} ({} rows, {} images)", table.name, table.rows.len(), table.images().len());
    for (idx, col) in table.columns.iter().enumerate() {
        print_column(table, idx, col);
    }
}

fn print_column(table: &MeasurementTable, idx: usize, col: &str) {
    match table.summary(idx) {
        Some(s) => match s.std {
            Some(std) => println!("  {:<32} {:>12.4} ± {:<10.4} n={}", col, s.mean, std, s.count),
            None => println!("  {:<32} {:>12.4}   n={}", col, s.mean, s.count),
        },
        None => println!("  {:<32} no values", col),
    }
}

fn run_params(
    args: &CliImageArgs,
    config: &MeasureConfig,
    batch: &Batch,
    extra: serde_json::Value,
) -> CliResult<serde_json::Value> {
    Ok(serde_json::json!({
        "tag": args.tag()?,
        "images": batch.images(),
        "config": config,
        "run": extra,
    }))
}

// ── direction ─────────────────────────────────────────────────────────

fn run_direction(args: &CliDirectionArgs) -> CliResult<()> {
    let mut config = args.images.load_config()?;
    args.angles.apply(&mut config);
    let batch = args.images.batch(config.clone())?;

    let table = batch.propagation_direction()?;
    print_summary(&table);

    let stem = args.images.tag()?.output_stem();
    let params = run_params(&args.images, &config, &batch, serde_json::json!({}))?;
    emit(args.images.out.as_deref(), &stem, &[&table], &params)
}

// ── distance ──────────────────────────────────────────────────────────

fn run_distance(args: &CliDistanceArgs) -> CliResult<()> {
    let config = args.images.load_config()?;
    let batch = args.images.batch(config.clone())?;

    let table = batch.propagation_distance(&args.suffix_1, &args.suffix_2)?;
    print_summary(&table);

    let stem = args.images.tag()?.output_stem();
    let params = run_params(
        &args.images,
        &config,
        &batch,
        serde_json::json!({ "suffix_1": args.suffix_1, "suffix_2": args.suffix_2 }),
    )?;
    emit(args.images.out.as_deref(), &stem, &[&table], &params)
}

// ── widths ────────────────────────────────────────────────────────────

fn run_widths(args: &CliWidthsArgs) -> CliResult<()> {
    let mut config = args.images.load_config()?;
    args.angles.apply(&mut config);
    let batch = args.images.batch(config.clone())?;

    let tables = batch.widths_and_periods(&args.suffix)?;
    for table in [&tables.wire_width, &tables.finger_width, &tables.finger_period] {
        print_summary(table);
    }

    let stem = format!("{}{}", args.images.tag()?.output_stem(), args.suffix);
    let params = run_params(
        &args.images,
        &config,
        &batch,
        serde_json::json!({ "suffix": args.suffix }),
    )?;
    emit(
        args.images.out.as_deref(),
        &stem,
        &[
            &tables.wire_width,
            &tables.finger_width,
            &tables.finger_period,
            &tables.angles,
        ],
        &params,
    )
}

// ── projected-distance ────────────────────────────────────────────────

fn run_projected_distance(args: &CliProjectedArgs) -> CliResult<()> {
    let mut config = args.images.load_config()?;
    args.angles.apply(&mut config);
    let batch = args.images.batch(config.clone())?;

    let table = batch.projected_propagation_distance(&args.suffix_1, &args.suffix_2, args.reverse)?;
    print_summary(&table);

    let stem = args.images.tag()?.output_stem();
    let params = run_params(
        &args.images,
        &config,
        &batch,
        serde_json::json!({
            "suffix_1": args.suffix_1,
            "suffix_2": args.suffix_2,
            "reverse": args.reverse,
        }),
    )?;
    emit(args.images.out.as_deref(), &stem, &[&table], &params)
}

// ── check-calibration ─────────────────────────────────────────────────

fn run_check_calibration(args: &CliImageArgs) -> CliResult<()> {
    let config = args.load_config()?;
    let batch = args.batch(config.clone())?;

    let table = batch.check_calibration()?;
    for row in &table.rows {
        let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.5}", v));
        println!(
            "{:<40} pixel size {} µm  label {}  bar {} px",
            row.image,
            fmt(row.values[0]),
            fmt(row.values[1]),
            fmt(row.values[2]),
        );
    }

    let stem = args.tag()?.output_stem();
    let params = run_params(args, &config, &batch, serde_json::json!({}))?;
    emit(args.out.as_deref(), &stem, &[&table], &params)
}

// ── afm ───────────────────────────────────────────────────────────────

fn run_afm(args: &CliAfmArgs) -> CliResult<()> {
    tracing::info!("AFM profiles in {}", args.dir.display());
    let summaries = analyze_profile_sets(&args.dir, args.count)?;
    let table = rim_table(&summaries);
    print_summary(&table);

    let params = serde_json::json!({ "dir": args.dir, "count": args.count });
    emit(args.out.as_deref(), &args.stem, &[&table], &params)
}

// ── summary ───────────────────────────────────────────────────────────

fn run_summary(path: &Path, columns: &[String]) -> CliResult<()> {
    let table = MeasurementTable::from_json_file(path)?;
    if columns.is_empty() {
        print_summary(&table);
        return Ok(());
    }
    println!("{} ({} rows, {} images)", table.name, table.rows.len(), table.images().len());
    for col in columns {
        let idx = table
            .column_index(col)
            .ok_or_else(|| format!("{}: no column '{}'", table.name, col))?;
        print_column(&table, idx, col);
    }
    Ok(())
}
