use clap::{Parser, Subcommand};
use h5io::api::{DEFAULT_LEVEL, DEFAULT_TITLE};
use h5io::json::{describe, from_json};
use h5io::{CodecId, Overwrite, ReadOptions, SlashDecode, SlashPolicy, WriteOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "h5io", about = "Inspect and write h5io containers")]
struct Cli {
    /// Log at debug level (overrides H5IO_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the top level of a stored value
    Ls {
        input: PathBuf,
        #[arg(short, long, default_value = DEFAULT_TITLE)]
        title: String,
    },
    /// Print whether a title is present
    Has {
        input: PathBuf,
        #[arg(short, long, default_value = DEFAULT_TITLE)]
        title: String,
    },
    /// Read a value and print it as JSON
    Dump {
        input: PathBuf,
        #[arg(short, long, default_value = DEFAULT_TITLE)]
        title: String,
        /// ignore | replace
        #[arg(long, default_value = "ignore")]
        slash: SlashDecode,
    },
    /// Store a JSON document
    Put {
        output: PathBuf,
        /// JSON text, or @path to read it from a file
        document: String,
        #[arg(short, long, default_value = DEFAULT_TITLE)]
        title: String,
        /// false | true | update
        #[arg(long, default_value = "false")]
        overwrite: Overwrite,
        /// Compression level 0-9 (0 stores verbatim)
        #[arg(short, long, default_value_t = DEFAULT_LEVEL)]
        level: u8,
        /// Codec: zstd (default), lz4, none
        #[arg(short, long, default_value = "zstd")]
        codec: CodecId,
        /// error | replace
        #[arg(long, default_value = "error")]
        slash: SlashPolicy,
        /// Store dicts and lists of plain values as one JSON dataset
        #[arg(long)]
        json: bool,
    },
    /// Compare the values stored in two containers
    Diff {
        a: PathBuf,
        b: PathBuf,
        #[arg(short, long, default_value = DEFAULT_TITLE)]
        title: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("H5IO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {

        // ── Ls ───────────────────────────────────────────────────────────────
        Commands::Ls { input, title } => {
            h5io::print_file_contents(&input, &title)?;
        }

        // ── Has ──────────────────────────────────────────────────────────────
        Commands::Has { input, title } => {
            println!("{}", h5io::has(&input, &title)?);
        }

        // ── Dump ─────────────────────────────────────────────────────────────
        Commands::Dump { input, title, slash } => {
            let opts = ReadOptions { title, slash, ..ReadOptions::default() };
            let value = h5io::read(&input, &opts)?;
            println!("{}", serde_json::to_string_pretty(&describe(&value))?);
        }

        // ── Put ──────────────────────────────────────────────────────────────
        Commands::Put { output, document, title, overwrite, level, codec, slash, json } => {
            let text = match document.strip_prefix('@') {
                Some(path) => std::fs::read_to_string(path)?,
                None => document,
            };
            let value = from_json(serde_json::from_str(&text)?, SlashDecode::Ignore);
            let opts = WriteOptions {
                overwrite,
                compression: level,
                codec,
                title,
                slash,
                use_json: json,
                ..WriteOptions::default()
            };
            h5io::write(&output, &value, &opts)?;
            println!("Wrote {} to {}", value.kind(), output.display());
        }

        // ── Diff ─────────────────────────────────────────────────────────────
        Commands::Diff { a, b, title } => {
            let opts = ReadOptions { title, ..ReadOptions::default() };
            let lines = h5io::object_diff(&h5io::read(&a, &opts)?, &h5io::read(&b, &opts)?);
            if lines.is_empty() {
                println!("no differences");
            }
            for line in &lines {
                println!("{line}");
            }
        }
    }
    Ok(())
}
