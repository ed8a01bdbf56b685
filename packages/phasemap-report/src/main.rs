use anyhow::{Context, Result};
use clap::Parser;
use console::Term;
use phasemap_core::{text, PhaseMap, RawMeasurement, SurfaceStatistics};
use rayon::prelude::*;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

/// Command-line arguments for the phasemap-report tool.
#[derive(Parser, Debug, Clone)]
#[command(
    version,
    about,
    long_about = "Applies a normalization chain to phase-map measurements and reports surface quality statistics."
)]
struct Args {
    /// A pre-parsed measurement JSON file, or a directory of them.
    #[arg(long)]
    input: PathBuf,

    /// Directory to save processed measurements and statistics.
    #[arg(long)]
    output: PathBuf,

    /// Lateral unit for physical coordinate axes (um or mm).
    #[arg(long, default_value = "um")]
    scale: String,

    /// Crop each map to the bounding box of its finite samples.
    #[arg(long)]
    crop: bool,

    /// Remove piston and tip/tilt before computing statistics.
    #[arg(long)]
    detrend: bool,

    /// Band-reject cutoffs as LOW,HIGH spatial wavelengths in axis units.
    #[arg(long)]
    bandreject: Option<String>,

    /// Sentinel written for invalid samples in output grids.
    #[arg(long, default_value_t = phasemap_core::ingest::DEFAULT_NODATA)]
    nodata: f64,

    /// Number of parallel jobs to run. Defaults to 0 (Rayon chooses).
    #[arg(long, default_value_t = 0)]
    jobs: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let line = "-".repeat(72);
    let dline = "=".repeat(72);

    println!(
        "\n{}\n{}\nTool for normalizing phase-map measurements and reporting quality metrics.\nPart of the {} toolkit.\n{}\n",
        format!(
            "{} {}",
            text::highlight("Phase-Map Report"),
            env!("CARGO_PKG_VERSION")
        ),
        line,
        text::highlight("phasemap-tools"),
        dline
    );

    let cutoffs = parse_bandreject(args.bandreject.as_deref())?;

    println!("{} Configuration:", text::bold("Processing"));
    println!("  {:<20} {}", "Input:", args.input.display());
    println!("  {:<20} {}", "Output Directory:", args.output.display());
    println!("  {:<20} {}", "Scale:", args.scale);
    println!("  {:<20} {}", "Crop:", args.crop);
    println!("  {:<20} {}", "Detrend:", args.detrend);
    if let Some((low, high)) = cutoffs {
        println!("  {:<20} {} .. {}", "Band-Reject:", low, high);
    }
    println!(
        "  {:<20} {}",
        "Parallel Jobs:",
        if args.jobs == 0 {
            "all available cores".to_string()
        } else {
            args.jobs.to_string()
        }
    );
    println!("{}\n", dline);

    if args.jobs > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.jobs)
            .build_global()?;
    }

    let measurement_paths = collect_measurement_paths(&args.input)?;
    let n_files = measurement_paths.len();
    if n_files == 0 {
        println!("{} No measurement files found to process.", text::warning("!"));
        return Ok(());
    }

    let output_dir = prepare_output_dir(args.output.clone())?;

    let progress_counter = Arc::new(Mutex::new(0usize));
    let results: Arc<Mutex<Vec<(String, SurfaceStatistics)>>> = Arc::new(Mutex::new(Vec::new()));

    print!("Processing measurements...");
    io::stdout().flush().ok();

    let args_arc = Arc::new(args);
    measurement_paths.par_iter().for_each(|path| {
        match process_measurement(path, &output_dir, &args_arc, cutoffs) {
            Ok(statistics) => {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                results.lock().unwrap().push((name, statistics));
            }
            Err(e) => {
                eprintln!(
                    "\n{} Failed to process {}: {:#}",
                    text::error("Error"),
                    path.display(),
                    e
                );
            }
        }

        let mut count = progress_counter.lock().unwrap();
        *count += 1;
        let term = Term::stdout();
        let _ = term.clear_line();
        print!(
            "\rProcessing measurements... {:.0}%",
            (*count as f32 / n_files as f32) * 100.0
        );
        let _ = io::stdout().flush();
    });

    let term = Term::stdout();
    let _ = term.clear_line();

    let mut results = Arc::try_unwrap(results)
        .expect("worker threads have finished")
        .into_inner()
        .unwrap();
    results.sort_by(|a, b| a.0.cmp(&b.0));

    if results.len() < n_files {
        println!(
            "\r{} {} of {} measurements processed; {} failed (see errors above).",
            text::cross_icon(),
            results.len(),
            n_files,
            n_files - results.len()
        );
    } else {
        println!("\r{} All {} measurements processed.", text::check_icon(), n_files);
    }
    println!("{}", line);
    println!(
        "{:<24} {:>12} {:>12} {:>12} {:>10}",
        text::bold("Measurement"),
        text::bold("PV"),
        text::bold("RMS"),
        text::bold("Ra"),
        text::bold("Dropout")
    );
    for (name, s) in &results {
        println!(
            "{:<24} {:>12.4} {:>12.4} {:>12.4} {:>9.2}%",
            name, s.pv, s.rms, s.ra, s.dropout_percentage
        );
    }
    println!("{}", line);
    println!("{}", text::success("Reporting completed."));
    println!();

    Ok(())
}

/// Parses the LOW,HIGH band-reject argument.
fn parse_bandreject(arg: Option<&str>) -> Result<Option<(f64, f64)>> {
    match arg {
        Some(s) => {
            let parts: Vec<&str> = s.split(',').collect();
            if parts.len() != 2 {
                anyhow::bail!("Band-reject cutoffs must be two comma-separated wavelengths.");
            }
            let low = parts[0]
                .trim()
                .parse::<f64>()
                .context("Failed to parse low band-reject cutoff.")?;
            let high = parts[1]
                .trim()
                .parse::<f64>()
                .context("Failed to parse high band-reject cutoff.")?;
            Ok(Some((low, high)))
        }
        None => Ok(None),
    }
}

/// Finds measurement JSON files under the input path.
fn collect_measurement_paths(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    let paths = WalkDir::new(input)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("json"))
                    .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    Ok(paths)
}

/// Creates the output directory, suffixing an index rather than reusing an
/// existing one.
fn prepare_output_dir(path: PathBuf) -> Result<PathBuf> {
    if !path.exists() {
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create directory: {:?}", path))?;
        return Ok(path);
    }

    let base = path
        .file_name()
        .context("Output path has no directory name")?
        .to_string_lossy()
        .into_owned();
    for index in 1.. {
        let candidate = path.with_file_name(format!("{}.{}", base, index));
        if !candidate.exists() {
            fs::create_dir_all(&candidate)
                .with_context(|| format!("Failed to create directory: {:?}", candidate))?;
            println!(
                "{}: Output directory {:?} already exists. Using {:?} instead.\n",
                text::warning("Warning"),
                path,
                candidate
            );
            return Ok(candidate);
        }
    }
    unreachable!()
}

/// Loads one measurement, applies the configured normalization chain, and
/// writes the processed measurement plus its statistics.
fn process_measurement(
    path: &Path,
    output_dir: &Path,
    args: &Args,
    cutoffs: Option<(f64, f64)>,
) -> Result<SurfaceStatistics> {
    let raw_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read measurement file: {:?}", path))?;
    let raw: RawMeasurement = serde_json::from_str(&raw_str)
        .with_context(|| format!("Failed to parse measurement: {:?}", path))?;

    let mut map = PhaseMap::from_measurement(&raw, &args.scale)?;
    if args.crop {
        map.crop()?;
    }
    if args.detrend {
        map.remove_piston_tiptilt()?;
    }
    if let Some((low, high)) = cutoffs {
        map.bandreject(low, high)?;
    }

    let statistics = map.statistics();

    let stem = path
        .file_stem()
        .context("Measurement file has no name")?
        .to_string_lossy();

    let processed = map.to_measurement(args.nodata)?;
    let processed_path = output_dir.join(format!("{}_processed.json", stem));
    fs::write(&processed_path, serde_json::to_string_pretty(&processed)?)
        .with_context(|| format!("Failed to write {:?}", processed_path))?;

    let stats_path = output_dir.join(format!("{}_statistics.json", stem));
    fs::write(&stats_path, serde_json::to_string_pretty(&statistics)?)
        .with_context(|| format!("Failed to write {:?}", stats_path))?;

    Ok(statistics)
}
