use clap::{Parser, Subcommand};
use imgfit::compressor::{self, CompressOptions};
use imgfit::imaging::RustBackend;
use imgfit::{batch, output};
use std::path::PathBuf;

/// Shared flags for commands that rewrite files.
#[derive(clap::Args, Clone)]
struct ReplaceArgs {
    /// Stage passes in a scratch file and replace the original only on
    /// success (the default mode rewrites the original on every pass)
    #[arg(long)]
    atomic: bool,
}

#[derive(Parser)]
#[command(name = "imgfit")]
#[command(about = "Recompress photos in place to fit a size budget")]
#[command(long_about = "\
Recompress photos in place to fit a size budget

Oversized JPEG/PNG files are re-encoded as JPEG at decreasing quality
(100, 80, 60, 40) until they fit the budget or the quality ladder is
exhausted. The EXIF orientation tag survives; all other metadata is
discarded by re-encoding. Files already within budget are left
byte-identical.

Files are accepted when their path contains .jpeg, .jpg, or .png
(case-sensitive). Output is always JPEG, whatever the input format.

By default the file is rewritten on every pass, so a search that never
fits leaves the smallest attempt on disk. Pass --atomic to stage passes
in a scratch file and only replace the original on success.")]
#[command(version)]
struct Cli {
    /// Size budget per file, in kilobytes
    #[arg(long, default_value_t = compressor::DEFAULT_TARGET_KB, global = true)]
    target_kb: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress the given files in place
    Compress {
        files: Vec<PathBuf>,
        #[command(flatten)]
        replace: ReplaceArgs,
    },
    /// Walk a directory and compress every supported image under it
    Sweep {
        dir: PathBuf,
        #[command(flatten)]
        replace: ReplaceArgs,
        /// Write a JSON report of per-file results
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// List files over the budget without modifying anything
    Check { dir: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let backend = RustBackend::new();

    match cli.command {
        Command::Compress { files, replace } => {
            let options = CompressOptions {
                target_kb: cli.target_kb,
                atomic_replace: replace.atomic,
                ..CompressOptions::default()
            };
            for file in files {
                println!("{}", file.display());
                let (tx, rx) = std::sync::mpsc::channel();
                let printer = std::thread::spawn(move || {
                    for event in rx {
                        println!("{}", output::format_compress_event(&event));
                    }
                });
                let result =
                    compressor::compress_with_options(&backend, &file, &options, Some(tx));
                printer.join().unwrap();
                println!("{}", output::format_outcome(&result?));
            }
        }
        Command::Sweep {
            dir,
            replace,
            report,
        } => {
            let options = CompressOptions {
                target_kb: cli.target_kb,
                atomic_replace: replace.atomic,
                ..CompressOptions::default()
            };
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    println!("{}", output::format_sweep_event(&event));
                }
            });
            let result = batch::sweep(&backend, &dir, &options, Some(tx));
            printer.join().unwrap();
            let result = result?;
            println!("{}", output::format_sweep_summary(&result));
            if let Some(report_path) = report {
                let json = serde_json::to_string_pretty(&result)?;
                std::fs::write(&report_path, json)?;
                println!("Report: {}", report_path.display());
            }
        }
        Command::Check { dir } => {
            let report = batch::check(&backend, &dir, cli.target_kb)?;
            output::print_check_report(&report);
        }
    }

    Ok(())
}
