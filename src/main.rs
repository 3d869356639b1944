use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rusty_wiz::data::export::write_csv;
use rusty_wiz::data::loader::{peek_lines, peek_parquet};
use rusty_wiz::settings::SETTINGS_FILE;
use rusty_wiz::{default_namespaces, ingest, Gallery, IngestOptions, Settings, Template, ORIGINAL};

#[derive(Parser)]
#[command(name = "rusty-wiz", about = "Transform numeric series and replay saved templates")]
struct Cli {
    /// Settings file (created with defaults if missing)
    #[arg(long, global = true, default_value = SETTINGS_FILE)]
    settings: PathBuf,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the first lines of a source and what would be loaded from it
    Inspect {
        /// Data file (.txt/.csv/..., .json or .parquet)
        path: PathBuf,

        /// Number of raw lines to show
        #[arg(long, default_value_t = 10)]
        lines: usize,

        #[command(flatten)]
        columns: ColumnArgs,
    },

    /// Replay a template against a data file and export every series
    Apply {
        /// Data file the template is replayed on (bound as ORIGINAL)
        path: PathBuf,

        /// Template file (.wizt)
        #[arg(long)]
        template: PathBuf,

        /// Directory receiving one CSV per resulting series
        #[arg(long, default_value = "out")]
        out: PathBuf,

        #[command(flatten)]
        columns: ColumnArgs,
    },
}

#[derive(Args)]
struct ColumnArgs {
    /// Zero-based x column
    #[arg(long, default_value_t = 0)]
    x_col: usize,

    /// Zero-based y column
    #[arg(long, default_value_t = 1)]
    y_col: usize,

    /// First line holds column headers
    #[arg(long)]
    header: bool,

    /// Keep NaN and infinite samples
    #[arg(long)]
    no_clean: bool,

    /// Read the whole file at once instead of in chunks
    #[arg(long)]
    no_chunk: bool,
}

impl ColumnArgs {
    fn options(&self, settings: &Settings) -> IngestOptions {
        let mut options = settings.ingest_options(self.x_col, self.y_col, self.header);
        if self.no_clean {
            options.clean = false;
        }
        if self.no_chunk {
            options.chunk_size = None;
        }
        options
    }
}

fn init_logging(verbose: bool) {
    let env = env_logger::Env::default().default_filter_or(if verbose { "debug" } else { "info" });
    env_logger::Builder::from_env(env).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load_or_create(&cli.settings)?;

    match &cli.command {
        Commands::Inspect {
            path,
            lines,
            columns,
        } => cmd_inspect(&settings, path, *lines, columns),
        Commands::Apply {
            path,
            template,
            out,
            columns,
        } => cmd_apply(&settings, path, template, out, columns),
    }
}

fn is_binary(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("parquet" | "pq")
    )
}

fn cmd_inspect(settings: &Settings, path: &Path, lines: usize, columns: &ColumnArgs) -> Result<()> {
    if is_binary(path) {
        println!("{}", peek_parquet(path, lines)?);
    } else {
        for (i, line) in peek_lines(path, lines)?.iter().enumerate() {
            println!("Line {i:>3}: {:<40}  {:?}", line.text, line.tokens);
        }
    }
    println!();

    let dataset = ingest(path, &columns.options(settings))
        .with_context(|| format!("loading {}", path.display()))?;
    println!("{dataset}");
    if !dataset.is_sorted() {
        println!("warning: x is not sorted; slicing by value will pick wrong bounds");
    }
    let preview = dataset.preview(settings.max_preview_points);
    if preview.len() < dataset.len() {
        println!("preview limited to {} points", preview.len());
    }
    Ok(())
}

fn cmd_apply(
    settings: &Settings,
    path: &Path,
    template_path: &Path,
    out: &Path,
    columns: &ColumnArgs,
) -> Result<()> {
    let template = Template::load(template_path)?;
    let original = ingest(path, &columns.options(settings))
        .with_context(|| format!("loading {}", path.display()))?;

    if let Some((index, name)) = template.first_unbound([ORIGINAL]) {
        bail!(
            "step {} of '{}' reads '{name}', which is never bound",
            index + 1,
            template.name()
        );
    }

    let bound = template
        .bind(default_namespaces(), [(ORIGINAL, original)])?
        .with_strict(settings.strict_replay);

    let mut gallery = Gallery::default();
    gallery.apply_template(&bound, |done, total| {
        log::info!("[{done}/{total}] steps replayed");
    })?;

    std::fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    for entry in gallery.entries() {
        let file = out.join(format!("{}.csv", file_stem(&entry.name)));
        write_csv(&entry.dataset, &file)?;
        println!("{} → {}", entry.dataset, file.display());
    }
    Ok(())
}

/// File-system friendly version of a step name.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "series".to_string()
    } else {
        stem
    }
}
