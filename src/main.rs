use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};

use gcquant::io::agilent::{DataMsReader, FidReader};
use gcquant::io::discovery::{discover_runs, is_run_directory, RunDirectory};
use gcquant::io::report::{
    parse_report_path, FidRow, KeyedTables, LibraryRow, PeakRow, ReportTables, SchemaRegistry,
    TableKind,
};
use gcquant::io::standards::StandardsTable;
use gcquant::matching::{MatchParameters, MatchRecord, MatchedTable, RetentionTimeMatcher};
use gcquant::quant::{
    quantify, CalibrationCurve, ConcentrationRecord, ConcentrationTable, InsufficientStandards,
};

#[derive(Parser)]
#[command(name = "gcquant")]
#[command(
    author,
    version,
    about = "Decode and quantify Agilent ChemStation GC/MS runs",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the total ion chromatogram of a DATA.MS file as CSV
    Trace {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write the scan by mass channel intensities of a DATA.MS file as CSV
    Spectra {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write the signal of an FID1A.ch file as CSV
    Fid {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Summarize the tables of a RESULTS.CSV report, or write one of them
    Report {
        input: PathBuf,
        /// The table to write: tic, lib or fid
        #[arg(short, long)]
        table: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Match library hits to peak areas across runs and quantify them
    Quantify {
        /// Run folders, or folders holding run folders
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// The table of known concentrations in each standard run
        #[arg(short, long)]
        standards: Option<PathBuf>,

        /// Which integration table supplies the areas
        #[arg(short, long, value_enum, default_value_t = AreaTable::Tic)]
        areas: AreaTable,

        /// The largest accepted retention time difference, in minutes
        #[arg(short = 't', long, default_value_t = gcquant::matching::DEFAULT_THRESHOLD)]
        threshold: f64,

        /// Leave out the matched peak number and retention time difference
        #[arg(long)]
        no_metrics: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,

        /// The directory the result tables are written to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AreaTable {
    Tic,
    Fid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

/// A row that can be written to a CSV table
trait CsvRecord {
    fn header() -> Vec<&'static str>;

    fn fields(&self) -> Vec<String>;
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl CsvRecord for PeakRow {
    fn header() -> Vec<&'static str> {
        vec![
            "peak", "rt", "first", "max", "last", "peak_type", "height", "area", "pct_max",
            "pct_total",
        ]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.peak.to_string(),
            self.rt.to_string(),
            self.first.to_string(),
            self.max.to_string(),
            self.last.to_string(),
            self.peak_type.clone(),
            self.height.to_string(),
            self.area.to_string(),
            self.pct_max.to_string(),
            self.pct_total.to_string(),
        ]
    }
}

impl CsvRecord for LibraryRow {
    fn header() -> Vec<&'static str> {
        vec!["peak", "rt", "area_pct", "library_id", "reference", "cas", "quality"]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.peak.to_string(),
            self.rt.to_string(),
            self.area_pct.to_string(),
            self.library_id.clone(),
            self.reference.to_string(),
            self.cas.clone(),
            self.quality.to_string(),
        ]
    }
}

impl CsvRecord for FidRow {
    fn header() -> Vec<&'static str> {
        vec![
            "peak", "rt", "start", "end", "peak_type", "height", "area", "pct_max", "pct_total",
        ]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.peak.to_string(),
            self.rt.to_string(),
            self.start.to_string(),
            self.end.to_string(),
            self.peak_type.clone(),
            self.height.to_string(),
            self.area.to_string(),
            self.pct_max.to_string(),
            self.pct_total.to_string(),
        ]
    }
}

impl CsvRecord for MatchRecord {
    fn header() -> Vec<&'static str> {
        vec![
            "key", "peak", "rt", "library_id", "cas", "quality", "area", "area_peak", "area_rt",
            "delta_rt",
        ]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.key.clone(),
            self.library.peak.to_string(),
            self.rt().to_string(),
            self.library_id().to_string(),
            self.library.cas.clone(),
            self.library.quality.to_string(),
            opt(self.area),
            opt(self.metrics.map(|m| m.area_peak)),
            opt(self.metrics.map(|m| m.area_rt)),
            opt(self.metrics.map(|m| m.delta_rt)),
        ]
    }
}

impl CsvRecord for CalibrationCurve {
    fn header() -> Vec<&'static str> {
        vec![
            "library_id", "response_factor", "intercept", "r_value", "p_value", "stderr",
            "intercept_stderr", "points", "min_area", "max_area",
        ]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.library_id.clone(),
            self.slope.to_string(),
            self.intercept.to_string(),
            self.r_value.to_string(),
            self.p_value.to_string(),
            self.stderr.to_string(),
            self.intercept_stderr.to_string(),
            self.points.to_string(),
            self.min_area.to_string(),
            self.max_area.to_string(),
        ]
    }
}

impl CsvRecord for InsufficientStandards {
    fn header() -> Vec<&'static str> {
        vec!["library_id", "points", "distinct_areas"]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.library_id.clone(),
            self.points.to_string(),
            self.distinct_areas.to_string(),
        ]
    }
}

impl CsvRecord for ConcentrationRecord {
    fn header() -> Vec<&'static str> {
        vec![
            "key", "rt", "library_id", "area", "response_factor", "intercept", "concentration",
            "concentration_share", "area_share", "within_calibrated_range",
        ]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.key().to_string(),
            self.record.rt().to_string(),
            self.library_id().to_string(),
            opt(self.area()),
            opt(self.response_factor),
            opt(self.intercept),
            opt(self.concentration),
            opt(self.concentration_share),
            opt(self.area_share),
            opt(self.within_calibrated_range),
        ]
    }
}

fn open_output(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    match path {
        Some(path) => Ok(Box::new(io::BufWriter::new(fs::File::create(path)?))),
        None => Ok(Box::new(io::BufWriter::new(io::stdout().lock()))),
    }
}

fn write_records<'a, T: CsvRecord + 'a, W: Write>(
    sink: W,
    rows: impl IntoIterator<Item = &'a T>,
) -> io::Result<()> {
    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record(T::header())?;
    for row in rows {
        writer.write_record(row.fields())?;
    }
    writer.flush()
}

fn write_table<'a, T: CsvRecord + 'a>(
    path: &Path,
    rows: impl IntoIterator<Item = &'a T>,
) -> io::Result<()> {
    info!("Writing {}", path.display());
    write_records(io::BufWriter::new(fs::File::create(path)?), rows)
}

fn write_trace(input: &Path, output: Option<&Path>) -> io::Result<()> {
    let mut reader = DataMsReader::open_path(input)?;
    info!(
        "{}: {:?} instrument, {} scans",
        input.display(),
        reader.header().instrument,
        reader.len()
    );
    let trace = reader.read_trace()?;
    let mut writer = csv::Writer::from_writer(open_output(output)?);
    writer.write_record(["time", "intensity"])?;
    for point in trace.iter() {
        writer.write_record([point.time.to_string(), point.intensity.to_string()])?;
    }
    writer.flush()
}

fn write_spectra(input: &Path, output: Option<&Path>) -> io::Result<()> {
    let mut reader = DataMsReader::open_path(input)?;
    let spectra = reader.read_spectra()?;
    info!(
        "{}: {} scans over {} mass channels, {} stored intensities",
        input.display(),
        spectra.n_rows(),
        spectra.n_columns(),
        spectra.nnz()
    );
    let dense = spectra.to_dense();
    let mut writer = csv::Writer::from_writer(open_output(output)?);
    let mut header = vec!["time".to_string()];
    header.extend(dense.masses.iter().map(|m| m.to_string()));
    writer.write_record(&header)?;
    for (time, row) in dense.times.iter().zip(dense.rows.iter()) {
        let mut record = vec![time.to_string()];
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()
}

fn write_fid(input: &Path, output: Option<&Path>) -> io::Result<()> {
    let mut reader = FidReader::open_path(input)?;
    let (start, end) = reader.time_range();
    info!(
        "{}: {} samples from {start} to {end} minutes",
        input.display(),
        reader.len()
    );
    let fid = reader.read_trace()?;
    let mut writer = csv::Writer::from_writer(open_output(output)?);
    writer.write_record(["time", "signal"])?;
    for point in fid.signal.iter() {
        writer.write_record([point.time.to_string(), point.intensity.to_string()])?;
    }
    writer.flush()
}

fn write_report(input: &Path, table: Option<&str>, output: Option<&Path>) -> io::Result<()> {
    let tables = parse_report_path(input, &SchemaRegistry::default())?;
    let Some(name) = table else {
        let mut out = open_output(output)?;
        writeln!(out, "{}: {} meta lines", input.display(), tables.meta.len())?;
        for table in tables.iter() {
            writeln!(
                out,
                "{}\t{} rows\t{} blocks\t{}",
                table.name(),
                table.len(),
                table.blocks,
                table.columns.join(",")
            )?;
        }
        return out.flush();
    };
    let kind = TableKind::from_name(name).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Unknown table {name:?}, expected tic, lib or fid"),
        )
    })?;
    let out = open_output(output)?;
    match kind {
        TableKind::PeakIntegration => write_records(out, tables.rows::<PeakRow>()),
        TableKind::LibraryMatch => write_records(out, tables.rows::<LibraryRow>()),
        TableKind::FidIntegration => write_records(out, tables.rows::<FidRow>()),
    }
}

/// Expand the inputs into run folders. An input that is not itself a run
/// folder is searched for run folders one level down.
fn collect_runs(inputs: &[PathBuf]) -> io::Result<Vec<RunDirectory>> {
    let mut runs = Vec::new();
    for input in inputs {
        if is_run_directory(input) {
            runs.push(RunDirectory::open(input)?);
        } else {
            let found = discover_runs(input)?;
            if found.is_empty() {
                warn!("No run folders found in {}", input.display());
            }
            runs.extend(found);
        }
    }
    Ok(runs)
}

fn read_reports(runs: &[RunDirectory]) -> io::Result<Vec<(String, ReportTables)>> {
    let registry = SchemaRegistry::default();
    let mut reports = Vec::with_capacity(runs.len());
    for run in runs {
        let Some(path) = run.results.as_deref() else {
            warn!("Run {} has no RESULTS.CSV, skipping it", run.key);
            continue;
        };
        let tables = parse_report_path(path, &registry)?;
        info!("Run {}: read {} report tables", run.key, tables.len());
        reports.push((run.key.clone(), tables));
    }
    Ok(reports)
}

#[cfg(feature = "serde")]
fn write_json(
    output_dir: &Path,
    matched: &MatchedTable,
    quantification: Option<&gcquant::Quantification>,
) -> io::Result<()> {
    #[derive(serde::Serialize)]
    struct Output<'a> {
        matched: &'a MatchedTable,
        quantification: Option<&'a gcquant::Quantification>,
    }

    let path = output_dir.join("quantification.json");
    info!("Writing {}", path.display());
    let mut handle = io::BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer_pretty(
        &mut handle,
        &Output {
            matched,
            quantification,
        },
    )?;
    handle.flush()
}

#[cfg(not(feature = "serde"))]
fn write_json(
    _output_dir: &Path,
    _matched: &MatchedTable,
    _quantification: Option<&gcquant::Quantification>,
) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "JSON output requires the serde feature",
    ))
}

fn write_concentrations(path: &Path, table: &ConcentrationTable) -> io::Result<()> {
    write_table(path, table.iter())
}

fn run_quantify(
    inputs: &[PathBuf],
    standards: Option<&Path>,
    areas: AreaTable,
    threshold: f64,
    no_metrics: bool,
    format: OutputFormat,
    output_dir: &Path,
) -> io::Result<()> {
    let standards = standards.map(StandardsTable::open_path).transpose()?;
    let runs = collect_runs(inputs)?;
    info!("Found {} runs", runs.len());
    let reports = read_reports(&runs)?;
    let keyed: KeyedTables = reports.iter().map(|(k, t)| (k.as_str(), t)).collect();

    let matcher = RetentionTimeMatcher::new(
        MatchParameters::default()
            .with_threshold(threshold)
            .with_metrics(!no_metrics),
    );
    let matched = match areas {
        AreaTable::Tic => matcher.match_tables(&keyed.library, &keyed.peaks),
        AreaTable::Fid => matcher.match_tables(&keyed.library, &keyed.fid),
    };
    info!(
        "Matched {} of {} library hits over {} runs",
        matched.iter().filter(|r| r.is_matched()).count(),
        matched.len(),
        matched.n_groups()
    );

    let quantification = standards.as_ref().map(|s| quantify(&matched, s));
    if quantification.is_none() {
        info!("No standards table given, only writing the matched table");
    }

    fs::create_dir_all(output_dir)?;
    match format {
        OutputFormat::Json => write_json(output_dir, &matched, quantification.as_ref()),
        OutputFormat::Csv => {
            write_table(&output_dir.join("matched.csv"), matched.iter())?;
            if let Some(q) = quantification {
                write_table(&output_dir.join("curves.csv"), q.curves.values())?;
                write_table(&output_dir.join("insufficient.csv"), q.insufficient.iter())?;
                write_concentrations(&output_dir.join("concentrations.csv"), &q.all)?;
                write_concentrations(
                    &output_dir.join("concentrations_standards.csv"),
                    &q.standards,
                )?;
                write_concentrations(
                    &output_dir.join("concentrations_experimental.csv"),
                    &q.experimental,
                )?;
            }
            Ok(())
        }
    }
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Trace { input, output } => write_trace(&input, output.as_deref()),
        Commands::Spectra { input, output } => write_spectra(&input, output.as_deref()),
        Commands::Fid { input, output } => write_fid(&input, output.as_deref()),
        Commands::Report {
            input,
            table,
            output,
        } => write_report(&input, table.as_deref(), output.as_deref()),
        Commands::Quantify {
            inputs,
            standards,
            areas,
            threshold,
            no_metrics,
            format,
            output_dir,
        } => run_quantify(
            &inputs,
            standards.as_deref(),
            areas,
            threshold,
            no_metrics,
            format,
            &output_dir,
        ),
    }
}
