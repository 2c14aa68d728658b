//! CLI binary for docprep.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PreprocessConfig`, runs each file and prints the results.

use anyhow::{Context, Result};
use clap::Parser;
use docprep::{
    render_xml, DocumentPreprocessor, FormatTable, PreprocessConfig, PreprocessOutput,
    PreprocessProgressCallback, UnitOutcome,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── Summary styling ──────────────────────────────────────────────────────────

/// SGR-wrapped text for the stderr summary lines.
fn styled(sgr: u8, s: &str) -> String {
    format!("\x1b[{sgr}m{s}\x1b[0m")
}

fn green(s: &str) -> String {
    styled(32, s)
}

fn red(s: &str) -> String {
    styled(31, s)
}

fn dim(s: &str) -> String {
    styled(2, s)
}

fn bold(s: &str) -> String {
    styled(1, s)
}

/// Width a per-unit failure may take on the progress line.
const ERROR_WIDTH: usize = 80;

/// `s` cut to `width` characters, the last one replaced by an ellipsis.
fn ellipsize(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    s.chars()
        .take(width.saturating_sub(1))
        .chain(std::iter::once('…'))
        .collect()
}

// ── Progress bar ─────────────────────────────────────────────────────────────

/// One bar over all input files; the message tracks pages inside the
/// current file.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new(files: usize) -> Arc<Self> {
        let bar = ProgressBar::new(files as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos:>3}/{len} files  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preprocessing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PreprocessProgressCallback for CliProgressCallback {
    fn on_document_start(&self, filename: &str, total_units: usize) {
        self.bar.set_message(format!("{filename} (0/{total_units})"));
    }

    fn on_unit(&self, unit: usize, total_units: usize, outcome: UnitOutcome<'_>) {
        match outcome {
            UnitOutcome::Extracted { .. } => {
                self.bar.set_message(format!("unit {unit}/{total_units}"));
            }
            UnitOutcome::Failed { error } => self.bar.println(format!(
                "  {} unit {:>3}/{:<3}  {}",
                red("✗"),
                unit,
                total_units,
                red(&ellipsize(error, ERROR_WIDTH))
            )),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Cleaned text on stdout
  docprep invoice.pdf

  # Only pages 4 to 5 of a scanned PDF, as JSON
  docprep --pages 4-5 --json scan.pdf > scan.json

  # XML envelope for prompt construction
  docprep --xml receipt.jpg

  # Several files at once, German OCR, short sheet previews
  docprep --lang deu --preview-rows 20 q3.xlsx letter.png

  # Supported formats and size limits
  docprep --list-formats

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to libpdfium (file or directory); default: system search path
  RUST_LOG          Override the log filter (e.g. docprep=debug)
  DOCPREP_*         Fallback for most flags (DOCPREP_DPI, DOCPREP_LANG, ...)

SETUP:
  PDF pages need the pdfium shared library; OCR needs the tesseract
  executable on PATH (apt install tesseract-ocr / brew install tesseract).
"#;

/// Preprocess PDFs, spreadsheets and images into clean text and metadata.
#[derive(Parser, Debug)]
#[command(
    name = "docprep",
    version,
    about = "Preprocess PDFs, spreadsheets and images into clean text and metadata",
    long_about = "Extract clean text, document metadata and a structured intermediate record \
from PDF, Excel/CSV and image files. PDF pages without a text layer are rendered, enhanced \
and OCR'd with tesseract.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input files.
    #[arg(required_unless_present = "list_formats")]
    files: Vec<PathBuf>,

    /// Page window for PDFs: START-END, START-, -END or a single page.
    #[arg(long, env = "DOCPREP_PAGES")]
    pages: Option<String>,

    /// Output the full result (text, metadata, intermediate) as JSON.
    #[arg(long, env = "DOCPREP_JSON", conflicts_with = "xml")]
    json: bool,

    /// Output the XML rendering used for prompt construction.
    #[arg(long, env = "DOCPREP_XML")]
    xml: bool,

    /// Rasterisation / OCR resolution (72–600).
    #[arg(long, env = "DOCPREP_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Tesseract language code(s), e.g. eng or eng+deu.
    #[arg(long, env = "DOCPREP_LANG", default_value = "eng")]
    lang: String,

    /// Use the baseline enhancement pipeline only.
    #[arg(long, env = "DOCPREP_NO_VISION")]
    no_vision: bool,

    /// Skip table recovery on PDF text pages.
    #[arg(long, env = "DOCPREP_NO_TABLES")]
    no_tables: bool,

    /// Truncate sheet dumps to this many rows (head and tail).
    #[arg(long, env = "DOCPREP_PREVIEW_ROWS")]
    preview_rows: Option<usize>,

    /// Print the supported formats and exit.
    #[arg(long)]
    list_formats: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCPREP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, env = "DOCPREP_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCPREP_NO_PROGRESS")]
    no_progress: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && cli.files.len() > 1;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.list_formats {
        print_formats(&FormatTable::default());
        return Ok(());
    }

    let (page_start, page_end) = match cli.pages.as_deref() {
        Some(s) => parse_pages(s)?,
        None => (None, None),
    };

    let progress = show_progress.then(|| CliProgressCallback::new(cli.files.len()));
    let config = build_config(
        &cli,
        progress.clone().map(|p| p as Arc<dyn PreprocessProgressCallback>),
    )?;
    let preprocessor = DocumentPreprocessor::new(config);

    // ── Run each file ────────────────────────────────────────────────────
    let mut failures = 0usize;
    let mut json_results = Vec::new();
    let multiple = cli.files.len() > 1;

    for path in &cli.files {
        let name = path.display().to_string();
        let result = preprocessor
            .preprocess_path(path, page_start, page_end)
            .with_context(|| format!("Failed to preprocess {name}"));
        if let Some(ref p) = progress {
            p.bar.inc(1);
        }

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                failures += 1;
                let line = format!("{} {:#}", red("✘"), e);
                match progress {
                    Some(ref p) => p.bar.println(line),
                    None => eprintln!("{line}"),
                }
                continue;
            }
        };

        if !cli.quiet {
            let summary = summarise(&name, &output, &preprocessor);
            match progress {
                Some(ref p) => p.bar.println(summary),
                None => eprintln!("{summary}"),
            }
        }

        if cli.json {
            json_results.push(to_json(&name, output, &preprocessor));
        } else if cli.xml {
            let xml = render_xml(&output.text, &output.metadata, &output.intermediate)
                .context("Failed to render XML")?;
            write_stdout(&xml)?;
        } else {
            if multiple {
                write_stdout(&format!("==> {name} <=="))?;
            }
            write_stdout(&output.text)?;
        }
    }

    if let Some(ref p) = progress {
        p.bar.finish_and_clear();
    }

    if cli.json {
        let value = if multiple {
            serde_json::Value::Array(json_results)
        } else {
            json_results.pop().unwrap_or(serde_json::Value::Null)
        };
        let json = serde_json::to_string_pretty(&value).context("Failed to serialise output")?;
        write_stdout(&json)?;
    }

    if failures > 0 {
        anyhow::bail!("{} of {} file(s) failed", failures, cli.files.len());
    }
    Ok(())
}

/// Map CLI args to `PreprocessConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<Arc<dyn PreprocessProgressCallback>>,
) -> Result<PreprocessConfig> {
    let mut builder = PreprocessConfig::builder()
        .render_dpi(cli.dpi)
        .ocr_language(cli.lang.clone())
        .vision(!cli.no_vision)
        .extract_tables(!cli.no_tables)
        .max_rows_preview(cli.preview_rows);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` into an optional start and end.
fn parse_pages(s: &str) -> Result<(Option<usize>, Option<usize>)> {
    let s = s.trim();
    let parse = |p: &str, what: &str| -> Result<Option<usize>> {
        let p = p.trim();
        if p.is_empty() {
            return Ok(None);
        }
        let n: usize = p
            .parse()
            .with_context(|| format!("Invalid {what} page: '{p}'"))?;
        if n < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", n);
        }
        Ok(Some(n))
    };

    match s.split_once('-') {
        Some((start, end)) => {
            let (start, end) = (parse(start, "start")?, parse(end, "end")?);
            if let (Some(a), Some(b)) = (start, end) {
                if a > b {
                    anyhow::bail!("Invalid page range '{}-{}': start must be <= end", a, b);
                }
            }
            Ok((start, end))
        }
        None => {
            let page = parse(s, "")?;
            Ok((page, page))
        }
    }
}

fn summarise(name: &str, output: &PreprocessOutput, preprocessor: &DocumentPreprocessor) -> String {
    let meta = &output.metadata;
    let label = meta.quality_label(&preprocessor.config().quality);
    let pages = match (meta.pages_processed_start, meta.pages_processed_end) {
        (Some(s), Some(e)) if (s, e) != (1, meta.page_count) => {
            format!("{} (pages {}-{})", meta.page_count, s, e)
        }
        _ => meta.page_count.to_string(),
    };
    format!(
        "{} {}  {}  units {}  quality {:.2} ({})\n   {}",
        green("✔"),
        bold(name),
        meta.document_type,
        pages,
        meta.estimated_quality,
        label,
        dim(&meta.preprocessing_applied.join(", ")),
    )
}

fn to_json(name: &str, output: PreprocessOutput, preprocessor: &DocumentPreprocessor) -> serde_json::Value {
    let label = output.metadata.quality_label(&preprocessor.config().quality);
    serde_json::json!({
        "file": name,
        "text": output.text,
        "metadata": output.metadata,
        "quality_label": label,
        "intermediate": output.intermediate,
    })
}

fn print_formats(table: &FormatTable) {
    println!("{:<8} {:<32} {:>8}", "TYPE", "EXTENSIONS", "MAX SIZE");
    for policy in table.iter() {
        println!(
            "{:<8} {:<32} {:>5} MB",
            policy.document_type.as_str(),
            policy.extensions.join(" "),
            policy.max_size_mb
        );
    }
}

/// Write `s` to stdout, ensuring a trailing newline.
fn write_stdout(s: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(s.as_bytes())
        .context("Failed to write to stdout")?;
    if !s.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}
