//! `ignis-export`: reads one or more binary-wire-format log files and
//! re-renders them as JSON or line-text, or validates them structurally
//! without printing records.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use ignis::encoder::{binary_read_header, decode_record, Encoder, JsonEncoder, TextEncoder};
use ignis::record::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
enum RenderFormat {
    #[default]
    Json,
    Text,
}

#[derive(Parser, Debug)]
#[command(name = "ignis-export", about = "Export or validate ignis binary log files")]
struct Args {
    /// Input binary log file, or a directory when `-r` is given.
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Output file; defaults to stdout.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Treat `input` as a directory and recurse through its files.
    #[arg(short = 'r', long)]
    recursive: bool,

    /// Pretty-print JSON output (one compact record per line otherwise).
    #[arg(short = 'p', long)]
    pretty: bool,

    /// Print progress to stderr.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Only emit records at or above this level.
    #[arg(long = "level")]
    level: Option<String>,

    /// Validate structurally; do not export records. Exits 1 if any
    /// record fails to decode.
    #[arg(long)]
    validate: bool,

    /// Render format for exported records.
    #[arg(long, value_enum, default_value_t = RenderFormat::Json)]
    format: RenderFormat,
}

fn collect_inputs(root: &Path, recursive: bool) -> Result<Vec<PathBuf>, String> {
    if !recursive {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).map_err(|e| format!("reading {}: {e}", dir.display()))? {
            let entry = entry.map_err(|e| e.to_string())?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn validate_file(path: &Path) -> Result<(u64, u64), String> {
    let bytes = fs::read(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    let mut cursor = binary_read_header(&bytes).map_err(|e| format!("{}: bad header: {e}", path.display()))?;

    let mut count = 0u64;
    let mut errors = 0u64;
    while !cursor.is_empty() {
        match decode_record(cursor) {
            Ok((_, consumed)) => {
                cursor = &cursor[consumed..];
                count += 1;
            }
            Err(e) => {
                errors += 1;
                eprintln!("{}: record {count}: {e}", path.display());
                break;
            }
        }
    }
    Ok((count, errors))
}

fn export_file(
    path: &Path,
    encoder: &dyn Encoder,
    min_level: Option<Level>,
    verbose: bool,
    rendered: &mut Vec<u8>,
) -> Result<(u64, u64), String> {
    let bytes = fs::read(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    let mut cursor = binary_read_header(&bytes).map_err(|e| format!("{}: bad header: {e}", path.display()))?;

    let mut exported = 0u64;
    let mut scanned = 0u64;
    while !cursor.is_empty() {
        let (record, consumed) =
            decode_record(cursor).map_err(|e| format!("{}: record {scanned}: {e}", path.display()))?;
        cursor = &cursor[consumed..];
        scanned += 1;

        if let Some(min_level) = min_level {
            if record.level < min_level {
                continue;
            }
        }

        encoder
            .encode(&record, rendered)
            .map_err(|e| format!("{}: encoding record {scanned}: {e}", path.display()))?;
        exported += 1;
        if verbose && exported % 10_000 == 0 {
            eprintln!("{}: {exported} records exported", path.display());
        }
    }
    Ok((exported, scanned))
}

fn run(args: Args) -> Result<(), String> {
    let inputs = collect_inputs(&args.input, args.recursive)?;
    let min_level = match &args.level {
        Some(v) => Some(Level::parse(v).ok_or_else(|| format!("unknown level {v}"))?),
        None => None,
    };

    if args.validate {
        let mut total_count = 0u64;
        let mut total_errors = 0u64;
        for path in &inputs {
            let (count, errors) = validate_file(path)?;
            total_count += count;
            total_errors += errors;
        }
        println!("{total_count} record(s) validated across {} file(s), {total_errors} error(s)", inputs.len());
        return if total_errors > 0 { Err("validation failed".to_string()) } else { Ok(()) };
    }

    let encoder: Box<dyn Encoder> = match args.format {
        RenderFormat::Json => Box::new(JsonEncoder),
        RenderFormat::Text => Box::new(TextEncoder),
    };

    let mut rendered = Vec::new();
    let mut total_exported = 0u64;
    let mut total_scanned = 0u64;
    for path in &inputs {
        let (exported, scanned) = export_file(path, encoder.as_ref(), min_level, args.verbose, &mut rendered)?;
        total_exported += exported;
        total_scanned += scanned;
    }

    if args.pretty && args.format == RenderFormat::Json {
        rendered = pretty_print_json_lines(&rendered);
    }

    match &args.output {
        Some(path) => fs::write(path, &rendered).map_err(|e| format!("writing {}: {e}", path.display()))?,
        None => std::io::stdout().write_all(&rendered).map_err(|e| e.to_string())?,
    }

    if args.verbose {
        eprintln!("{total_exported} of {total_scanned} record(s) exported from {} file(s)", inputs.len());
    }
    Ok(())
}

fn pretty_print_json_lines(rendered: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(rendered);
    let mut out = Vec::new();
    for line in text.lines() {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
            if let Ok(pretty) = serde_json::to_string_pretty(&value) {
                out.extend_from_slice(pretty.as_bytes());
                out.push(b'\n');
                continue;
            }
        }
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
    }
    out
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("ignis-export: {message}");
            ExitCode::FAILURE
        }
    }
}
