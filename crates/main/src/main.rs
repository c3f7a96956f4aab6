use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::info;
use ostecnico_report::{ImageFile, Normalizer, ReportComposer, ReportConfig, ServiceOrderReport};

/// Renders service-order reports and prepares photos for upload.
///
/// Reports use the Roboto family from `assets/fonts` next to the binary or the
/// crate, or from the directory named by `OSTECNICO_FONTS_DIR`. Without those
/// files the built-in Helvetica faces are used.
#[derive(Parser)]
#[command(author, version, about = "Service-order report tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an order exported as JSON into `OS_<number>_<customer>.pdf`.
    Render {
        /// Order JSON file.
        order: PathBuf,

        /// Report configuration (company name, brand colour, logo).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory the PDF is written to.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Add an outline entry for every report section.
        #[arg(long)]
        bookmarks: bool,
    },

    /// Compress photos into the upload size window.
    Compress {
        /// Image files to compress.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory the compressed files are written to, keeping their names.
        #[arg(long)]
        out_dir: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render {
            order,
            config,
            out_dir,
            bookmarks,
        } => render(&order, config.as_deref(), &out_dir, bookmarks).map_err(|err| {
            eprintln!("Erro ao gerar PDF: {err}");
            err
        }),
        Commands::Compress { files, out_dir } => compress(&files, &out_dir),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn render(
    order: &Path,
    config: Option<&Path>,
    out_dir: &Path,
    bookmarks: bool,
) -> Result<(), Box<dyn Error>> {
    let config = match config {
        Some(path) => ReportConfig::from_path(path)?,
        None => ReportConfig::default(),
    };
    let order = ServiceOrderReport::from_json_slice(&fs::read(order)?)?;
    let composer = ReportComposer::new(config);

    let path = if bookmarks {
        render_with_bookmarks(&composer, &order, out_dir)?
    } else {
        composer.generate(&order, out_dir)?
    };
    println!("{}", path.display());
    Ok(())
}

#[cfg(feature = "bookmarks")]
fn render_with_bookmarks(
    composer: &ReportComposer,
    order: &ServiceOrderReport,
    out_dir: &Path,
) -> Result<PathBuf, Box<dyn Error>> {
    let report = composer.render_with_bookmarks(order)?;
    Ok(ostecnico_report::composer::save_report(&report, out_dir)?)
}

#[cfg(not(feature = "bookmarks"))]
fn render_with_bookmarks(
    _composer: &ReportComposer,
    _order: &ServiceOrderReport,
    _out_dir: &Path,
) -> Result<PathBuf, Box<dyn Error>> {
    Err("rebuild with the `bookmarks` feature to add section bookmarks".into())
}

fn compress(files: &[PathBuf], out_dir: &Path) -> Result<(), Box<dyn Error>> {
    let inputs = files
        .iter()
        .map(ImageFile::from_path)
        .collect::<Result<Vec<_>, _>>()?;

    fs::create_dir_all(out_dir)?;
    let normalizer: Normalizer = Normalizer::default();
    for file in normalizer.normalize_batch(&inputs) {
        let path = out_dir.join(&file.name);
        fs::write(&path, &file.bytes)?;
        info!("Wrote {} ({} bytes)", path.display(), file.len());
    }
    Ok(())
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
