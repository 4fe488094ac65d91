//! fb2scan - FictionBook metadata scanner

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use fb2scan::archive::{self, ArchiveEntry, ScanOptions};
use fb2scan::io::{ByteSource, FileSource};
use fb2scan::util::MediaFormat;
use fb2scan::{DocumentSummary, Fb2Book, ParseOptions};

#[derive(Parser)]
#[command(name = "fb2scan")]
#[command(version, about = "FictionBook metadata scanner", long_about = None)]
#[command(after_help = "EXAMPLES:
    fb2scan book.fb2                  Show book metadata
    fb2scan --json book.fb2           Print metadata as JSON
    fb2scan --cover cover book.fb2    Save the cover as cover.<ext>
    fb2scan --json library.zip        One JSON line per archived book")]
struct Cli {
    /// Input file (FB2, FB2.ZIP, or a ZIP archive of FB2 files)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Print metadata as JSON
    #[arg(short, long)]
    json: bool,

    /// Write the cover image to this path (extension added if missing)
    #[arg(short, long, value_name = "PATH")]
    cover: Option<PathBuf>,

    /// Only scan the first N bytes for metadata (0 reads the whole file)
    #[arg(long, value_name = "N")]
    header_bytes: Option<u64>,

    /// Leave the body sample out of the output
    #[arg(long)]
    no_body: bool,

    /// Suppress output messages
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let source: Arc<dyn ByteSource> =
        Arc::new(FileSource::open(&cli.input).map_err(|e| e.to_string())?);

    let mut options = ParseOptions::default();
    if let Some(limit) = cli.header_bytes {
        options = options.with_header_limit(limit);
    }

    if archive::is_zip(source.as_ref()) {
        if is_single_book_zip(&cli.input) {
            let book = archive::open_fb2_zip(source, options).map_err(|e| e.to_string())?;
            return show_book(cli, &book);
        }
        return scan_library(cli, source, options);
    }

    let book = Fb2Book::from_source_with_options(source, options).map_err(|e| e.to_string())?;
    show_book(cli, &book)
}

fn is_single_book_zip(path: &Path) -> bool {
    path.to_string_lossy().to_ascii_lowercase().ends_with(".fb2.zip")
}

fn show_book(cli: &Cli, book: &Fb2Book) -> Result<(), String> {
    let summary = prepare(cli, book.summary().clone());
    if cli.json {
        let json = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
        println!("{json}");
    } else {
        println!("File: {}", cli.input.display());
        print_summary(&summary);
    }

    if let Some(path) = &cli.cover {
        match book.extract_cover_with_type() {
            Some(cover) => {
                let format = cover
                    .media_type
                    .as_deref()
                    .map_or(MediaFormat::Binary, MediaFormat::from_mime_type);
                let path = with_default_extension(path, format.extension());
                std::fs::write(&path, &cover.data).map_err(|e| e.to_string())?;
                if !cli.quiet {
                    eprintln!("Cover: {} ({} bytes)", path.display(), cover.data.len());
                }
            }
            None => {
                if !cli.quiet {
                    eprintln!("Cover: none");
                }
            }
        }
    }

    Ok(())
}

fn scan_library(cli: &Cli, source: Arc<dyn ByteSource>, options: ParseOptions) -> Result<(), String> {
    let scan_options = ScanOptions {
        parse: options,
        extract_covers: false,
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut failures = 0usize;

    let scanned = archive::scan_archive_with(source, &scan_options, |entry: ArchiveEntry| {
        let line = match entry.result {
            Ok(book) => {
                let summary = prepare(cli, book.summary);
                if cli.json {
                    serde_json::json!({ "entry": entry.name, "size": entry.size, "book": summary })
                        .to_string()
                } else {
                    format!(
                        "{}: {} / {}",
                        entry.name,
                        summary.title.as_deref().unwrap_or("(untitled)"),
                        join_authors(&summary)
                    )
                }
            }
            Err(e) => {
                failures += 1;
                if cli.json {
                    serde_json::json!({ "entry": entry.name, "error": e.to_string() }).to_string()
                } else {
                    format!("{}: error: {e}", entry.name)
                }
            }
        };
        // Stdout closing early (e.g. piped into `head`) is not worth failing over.
        let _ = writeln!(out, "{line}");
    })
    .map_err(|e| e.to_string())?;

    if !cli.quiet {
        eprintln!("Scanned {scanned} books, {failures} failed");
    }
    Ok(())
}

fn prepare(cli: &Cli, mut summary: DocumentSummary) -> DocumentSummary {
    if cli.no_body {
        summary.body_sample.clear();
    }
    summary
}

fn join_authors(summary: &DocumentSummary) -> String {
    summary
        .authors
        .iter()
        .map(|a| a.full_name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_summary(summary: &DocumentSummary) {
    if let Some(title) = &summary.title {
        println!("Title: {title}");
    }
    if !summary.authors.is_empty() {
        println!("Authors: {}", join_authors(summary));
    }
    if !summary.tags.is_empty() {
        println!("Genres: {}", summary.tags.join(", "));
    }
    if let Some(series) = &summary.series {
        println!("Series: {} #{}", series.title, series.index);
    }
    if let Some(language) = &summary.language {
        println!("Language: {language}");
    }
    if let Some(date) = &summary.date {
        println!("Date: {date}");
    }
    if let Some(desc) = &summary.description {
        println!("Description: {}", truncate_chars(desc.trim(), 200));
    }
    if !summary.body_sample.is_empty() {
        println!("Body: {}", truncate_chars(&summary.body_sample, 200));
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn with_default_extension(path: &Path, extension: &str) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(extension)
    }
}
