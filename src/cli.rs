//! Command-line front end.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};

use crate::config::{clamp_sample_rate, AppConfig};
use crate::data::convert::{default_output_path, Converter};
use crate::data::loader::{SourceFormat, TabularReader};
use crate::data::model::{ChannelGroup, ColumnAssignment, GroupData, ReadOutcome};
use crate::engine::{Engine, EngineStartup};
use crate::state::{render, PlotKind, Session};

#[derive(Parser)]
#[command(name = "sensor-import")]
#[command(about = "Import sensor recordings and map columns to channel groups", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show size and table shapes of a source file
    Info {
        file: PathBuf,
    },

    /// Print the first rows of a source file
    Preview {
        file: PathBuf,
        /// Rows to show (default from config)
        #[arg(short, long)]
        rows: Option<usize>,
    },

    /// Convert a source file into a grouped numeric container
    Convert {
        input: PathBuf,
        /// Output file (default: <dir>/<name>_converted.mat)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        mapping: MappingArgs,
        /// Plot a channel of the result after converting
        #[arg(long, value_enum)]
        plot: Option<PlotArg>,
        #[command(flatten)]
        channel: ChannelArgs,
    },

    /// Plot one channel of a converted container
    Plot {
        file: PathBuf,
        #[arg(short, long, value_enum, default_value_t = PlotArg::Time)]
        kind: PlotArg,
        #[command(flatten)]
        channel: ChannelArgs,
    },
}

/// Zero-based column indices for each group.
#[derive(clap::Args)]
struct MappingArgs {
    /// YAML/JSON file with `acceleration`, `gyroscope`, `noise` index lists
    #[arg(short, long)]
    mapping: Option<PathBuf>,
    /// Acceleration columns (up to 3), e.g. 0,1,2
    #[arg(long, value_delimiter = ',')]
    acceleration: Option<Vec<usize>>,
    /// Gyroscope columns (up to 3), e.g. 3,4,5
    #[arg(long, value_delimiter = ',')]
    gyroscope: Option<Vec<usize>>,
    /// Noise column
    #[arg(long)]
    noise: Option<usize>,
}

#[derive(clap::Args)]
struct ChannelArgs {
    /// Group to plot
    #[arg(long, default_value = "acceleration")]
    group: ChannelGroup,
    /// 1-based channel within the group
    #[arg(long, default_value_t = 1)]
    channel: usize,
    /// Sample rate in Hz (default from config)
    #[arg(long)]
    sample_rate: Option<f64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PlotArg {
    Time,
    Spectrum,
}

impl From<PlotArg> for PlotKind {
    fn from(arg: PlotArg) -> Self {
        match arg {
            PlotArg::Time => PlotKind::TimeSeries,
            PlotArg::Spectrum => PlotKind::Spectrum,
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match &cli.config {
        Some(path) => match AppConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                AppConfig::default()
            }
        },
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Info { file } => cmd_info(&file, &config),
        Commands::Preview { file, rows } => cmd_preview(&file, rows, &config),
        Commands::Convert {
            input,
            output,
            mapping,
            plot,
            channel,
        } => cmd_convert(&input, output, &mapping, plot, &channel, &config),
        Commands::Plot {
            file,
            kind,
            channel,
        } => cmd_plot(&file, kind, &channel, &config),
    }
}

/// Start the engine and block until it is ready.
fn start_engine(config: &AppConfig) -> Result<Arc<dyn Engine>> {
    let start = Instant::now();
    let timeout = Duration::from_secs(config.engine.startup_timeout_secs);
    eprintln!("Starting numeric engine ({})...", config.engine.command);
    let engine: Arc<dyn Engine> = EngineStartup::spawn(config.engine.clone())?
        .wait(timeout)
        .context("numeric engine did not start")?;
    info!("engine ready after {:.1?}", start.elapsed());
    Ok(engine)
}

/// A reader with an engine only when the file needs one.
fn reader_for(path: &Path, config: &AppConfig) -> Result<TabularReader> {
    let engine = if SourceFormat::from_path(path)?.needs_engine() {
        Some(start_engine(config)?)
    } else {
        None
    };
    Ok(TabularReader::new(engine))
}

fn cmd_info(file: &Path, config: &AppConfig) -> Result<()> {
    let info = reader_for(file, config)?.file_info(file)?;
    print!("{info}");
    Ok(())
}

fn cmd_preview(file: &Path, rows: Option<usize>, config: &AppConfig) -> Result<()> {
    let rows = rows.unwrap_or(config.import.preview_rows);
    let outcome = reader_for(file, config)?.read(file)?;
    if let ReadOutcome::Many(tables) = &outcome {
        println!("{} tables; showing the first", tables.len());
    }
    let Some(table) = outcome.first() else {
        bail!("{} contains no numeric table", file.display());
    };

    let (total_rows, cols) = table.shape();
    println!("{total_rows} rows x {cols} columns");
    let header: Vec<String> = (1..=cols).map(|c| format!("{:>12}", format!("col {c}"))).collect();
    println!("{}", header.join(" "));
    for row in table.head(rows).iter_rows() {
        let cells: Vec<String> = row.iter().map(|v| format!("{v:>12.6}")).collect();
        println!("{}", cells.join(" "));
    }
    Ok(())
}

fn build_assignment(args: &MappingArgs) -> Result<ColumnAssignment> {
    let mut assignment = match &args.mapping {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading mapping file {}", path.display()))?;
            serde_yaml::from_str::<ColumnAssignment>(&text)
                .with_context(|| format!("parsing mapping file {}", path.display()))?
        }
        None => ColumnAssignment::default(),
    };
    if let Some(cols) = &args.acceleration {
        assignment.acceleration = cols.clone();
    }
    if let Some(cols) = &args.gyroscope {
        assignment.gyroscope = cols.clone();
    }
    if let Some(col) = args.noise {
        assignment.noise = vec![col];
    }
    Ok(assignment)
}

fn cmd_convert(
    input: &Path,
    output: Option<PathBuf>,
    mapping: &MappingArgs,
    plot: Option<PlotArg>,
    channel: &ChannelArgs,
    config: &AppConfig,
) -> Result<()> {
    let start = Instant::now();
    let assignment = build_assignment(mapping)?;
    let output = output.unwrap_or_else(|| default_output_path(input));

    let engine = start_engine(config)?;
    let converter = Converter::new(Some(engine.clone()));
    let result = converter
        .convert(input, &output, Some(&assignment))
        .with_context(|| format!("converting {}", input.display()))?;

    println!("Converted {} -> {}", input.display(), output.display());
    println!("Mapping: {}", result.assignment);
    for (group, data) in result.record.iter() {
        let (rows, cols) = data.shape();
        println!("  {group:<12} {rows} x {cols}");
    }
    if result.dropped_tables > 0 {
        println!(
            "Note: {} further table(s) in the source were not converted",
            result.dropped_tables
        );
    }
    println!("Done in {:.2?}", start.elapsed());

    if let Some(kind) = plot {
        let mut session = Session::new(config.plot.clone());
        session.set_result(result);
        session.select_channel(channel.group, channel.channel);
        if let Some(rate) = channel.sample_rate {
            session.set_sample_rate(rate);
        }
        session.plot(engine.as_ref(), kind.into())?;
        hold_plots()?;
        session.close_plots(engine.as_ref())?;
    }
    Ok(())
}

fn cmd_plot(file: &Path, kind: PlotArg, channel: &ChannelArgs, config: &AppConfig) -> Result<()> {
    let engine = start_engine(config)?;
    let converter = Converter::new(Some(engine.clone()));
    let record = converter.read_grouped(file)?;

    let Some(data) = record.get(channel.group) else {
        bail!("{} has no {} group", file.display(), channel.group);
    };
    let values = match data {
        GroupData::Vector(values) if channel.channel == 1 => values.clone(),
        GroupData::Matrix(table) if channel.channel >= 1 => table
            .column(channel.channel - 1)
            .with_context(|| format!("{} has {} channels", channel.group, table.cols()))?,
        _ => bail!("{} has no channel {}", channel.group, channel.channel),
    };

    let sample_rate = clamp_sample_rate(channel.sample_rate.unwrap_or(config.plot.sample_rate));
    render(engine.as_ref(), kind.into(), &values, sample_rate, &config.plot)?;
    hold_plots()?;
    engine.close_all_rendered_views()?;
    Ok(())
}

/// Keep the engine (and its plot windows) alive until the user presses Enter.
fn hold_plots() -> Result<()> {
    eprintln!("Press Enter to close the plots...");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(())
}
