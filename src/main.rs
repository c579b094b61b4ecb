//! `scorch`
//!
//! Command line front end: populates a [`PrintJob`] from flags and an
//! optional preset file, then runs the encode-and-deliver pipeline on the
//! rasterizer's two output files.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use scorch::{JobError, PrintJob, RasterMode};

/// Raster mode names accepted on the command line.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ModeArg {
    /// 1-bit screened engraving.
    Mono,
    /// Grey levels map to power.
    Grey,
    /// Colour separation passes.
    Colour,
    /// No engraving.
    None,
}

impl From<ModeArg> for RasterMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Mono => RasterMode::Mono,
            ModeArg::Grey => RasterMode::Grey,
            ModeArg::Colour => RasterMode::Colour,
            ModeArg::None => RasterMode::None,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "scorch", about = "Print driver for Epilog laser engravers")]
struct Args {
    /// Device bitmap produced by the rasterizer.
    bitmap: PathBuf,

    /// Vector instruction file produced by the rasterizer.
    vectors: PathBuf,

    /// Hostname or IP address of the engraver.
    #[arg(short = 'p', long = "printer")]
    printer: Option<String>,

    /// Print queue to select on the engraver.
    #[arg(long)]
    queue: Option<String>,

    /// Job name to display; defaults to the bitmap file name.
    #[arg(short = 'n', long = "job")]
    job: Option<String>,

    /// Submitting user; defaults to $USER.
    #[arg(long)]
    user: Option<String>,

    /// Preset file (JSON job configuration) used as the base settings.
    #[arg(short = 'P', long)]
    preset: Option<PathBuf>,

    /// Enable auto focus.
    #[arg(short = 'a', long)]
    autofocus: bool,

    /// Resolution of the raster artwork in dpi.
    #[arg(short = 'd', long)]
    dpi: Option<i32>,

    /// Raster power, 0-100.
    #[arg(short = 'R', long)]
    raster_power: Option<i32>,

    /// Raster speed, 1-100.
    #[arg(short = 'r', long)]
    raster_speed: Option<i32>,

    /// Mode for rasterization.
    #[arg(short = 'm', long)]
    mode: Option<ModeArg>,

    /// Photograph screen size in pixels, 0 for threshold.
    #[arg(short = 's', long)]
    screen_size: Option<i32>,

    /// Vector power, 0-100.
    #[arg(short = 'V', long)]
    vector_power: Option<i32>,

    /// Vector speed, 1-100.
    #[arg(short = 'v', long)]
    vector_speed: Option<i32>,

    /// Vector frequency, 10-5000 Hz.
    #[arg(short = 'f', long)]
    frequency: Option<i32>,

    /// Copies to tile along the X axis.
    #[arg(long)]
    x_repeat: Option<i32>,

    /// Copies to tile along the Y axis.
    #[arg(long)]
    y_repeat: Option<i32>,

    /// X re-centering offset in points.
    #[arg(long)]
    x_center: Option<i32>,

    /// Y re-centering offset in points.
    #[arg(long)]
    y_center: Option<i32>,

    /// Mirror the page along the X axis (for reverse cuts).
    #[arg(long)]
    flip: bool,

    /// Keep the instruction stream's cut order instead of optimizing
    /// pen-up travel.
    #[arg(long)]
    no_optimize: bool,

    /// Write the framed job to a file instead of sending it.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("scorch: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), JobError> {
    let job = configure(&args)?;

    if let Some(output) = &args.output {
        let mut bitmap = open(&args.bitmap)?;
        let vectors = open(&args.vectors)?;
        let data = scorch::build_job(&job, &mut bitmap, vectors)?;
        std::fs::write(output, data).map_err(|source| JobError::File {
            path: output.clone(),
            source,
        })?;
        return Ok(());
    }

    scorch::print_files(&job, &args.bitmap, &args.vectors)
}

/// Layers command line flags over the preset (or default) configuration.
fn configure(args: &Args) -> Result<PrintJob, JobError> {
    let mut job = match &args.preset {
        Some(path) => load_preset(path)?,
        None => PrintJob::default(),
    };

    if let Some(printer) = &args.printer {
        job.host = printer.clone();
    }
    if let Some(queue) = &args.queue {
        job.queue = queue.clone();
    }
    if let Some(name) = &args.job {
        job.name = name.clone();
    } else if args.preset.is_none() {
        if let Some(stem) = args.bitmap.file_stem().and_then(|stem| stem.to_str()) {
            job.name = stem.to_owned();
        }
    }
    if let Some(user) = &args.user {
        job.user = user.clone();
    } else if let Ok(user) = std::env::var("USER") {
        job.user = user;
    }
    if args.autofocus {
        job.auto_focus = true;
    }
    if args.flip {
        job.flip_x = true;
    }
    if args.no_optimize {
        job.vector.optimize = false;
    }
    if let Some(dpi) = args.dpi {
        job.resolution = dpi;
    }
    if let Some(mode) = args.mode {
        job.raster.mode = mode.into();
    }
    if let Some(power) = args.raster_power {
        job.raster.power = power;
    }
    if let Some(speed) = args.raster_speed {
        job.raster.speed = speed;
    }
    if let Some(screen) = args.screen_size {
        job.raster.screen_size = screen;
    }
    if let Some(power) = args.vector_power {
        job.vector.power = power;
    }
    if let Some(speed) = args.vector_speed {
        job.vector.speed = speed;
    }
    if let Some(frequency) = args.frequency {
        job.vector.frequency = frequency;
    }
    if let Some(repeat) = args.x_repeat {
        job.x_repeat = repeat;
    }
    if let Some(repeat) = args.y_repeat {
        job.y_repeat = repeat;
    }
    if let Some(center) = args.x_center {
        job.x_center = center;
    }
    if let Some(center) = args.y_center {
        job.y_center = center;
    }

    Ok(job)
}

/// Reads a JSON-serialised job configuration.
fn load_preset(path: &PathBuf) -> Result<PrintJob, JobError> {
    let file = open(path)?;
    serde_json::from_reader(file).map_err(|source| JobError::Preset {
        path: path.clone(),
        source,
    })
}

/// Opens a file, attaching the path to any failure.
fn open(path: &PathBuf) -> Result<File, JobError> {
    File::open(path).map_err(|source| JobError::File {
        path: path.clone(),
        source,
    })
}
