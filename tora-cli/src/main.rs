use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tora_core::{compile, compile_file};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

mod error;
mod executor;
mod repl;

const SOURCE_EXTENSION: &str = "tora";
const OUTPUT_EXTENSION: &str = "py";

/// コマンドライン引数を定義するための構造体
#[derive(Parser, Debug)]
#[command(name = "tora", version, about = "Compile and run Tora programs", long_about = None)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "TORA_PYTHON",
        default_value = "python3",
        value_name = "PATH",
        help = "Python 3 interpreter used to run generated code"
    )]
    python: String,

    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "Log more (-v info, -vv debug, -vvv trace)"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a source file and run it with Python
    Run { file: PathBuf },

    /// Compile every .tora file under a directory (or a single file) to .py
    Build {
        path: PathBuf,

        #[arg(short, long, value_name = "DIR", help = "Write outputs here instead of next to the sources")]
        out_dir: Option<PathBuf>,
    },

    /// Print the generated Python for one program
    Emit {
        #[arg(short, long, help = "Source file (defaults to stdin)")]
        input: Option<PathBuf>,

        #[arg(short, long, help = "Output file (defaults to stdout)")]
        output: Option<PathBuf>,
    },

    /// Check a source file for errors without running it
    Check { file: PathBuf },

    /// Start the interactive shell (the default)
    Repl,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    execute(cli)
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn execute(cli: Cli) -> Result<()> {
    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Run { file } => {
            let code = compile_file(&file)
                .with_context(|| format!("failed to compile {}", file.display()))?;
            executor::run_script(&cli.python, &code)
                .with_context(|| format!("failed to run {}", file.display()))?;
        }
        Commands::Build { path, out_dir } => {
            let built = build(&path, out_dir.as_deref())?;
            println!("Built {built} file(s)");
        }
        Commands::Emit { input, output } => {
            let source = read_source(input.as_deref())?;
            let code = compile(&source).context("failed to compile input")?;
            match output {
                Some(path) => write_output(&path, &code)?,
                None => {
                    let mut stdout = io::stdout().lock();
                    writeln!(stdout, "{code}")?;
                }
            }
        }
        Commands::Check { file } => {
            compile_file(&file).with_context(|| format!("failed to compile {}", file.display()))?;
            println!("{}: ok", file.display());
        }
        Commands::Repl => repl::run_repl(&cli.python)?,
    }
    Ok(())
}

fn read_source(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

/// Compile every source under `root`, mirroring its layout into `out_dir`.
fn build(root: &Path, out_dir: Option<&Path>) -> Result<usize> {
    let mut built = 0;
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        let source = entry.path();
        if !entry.file_type().is_file()
            || source.extension().and_then(|ext| ext.to_str()) != Some(SOURCE_EXTENSION)
        {
            debug!(path = %source.display(), "skipping");
            continue;
        }

        let code = compile_file(source)
            .with_context(|| format!("failed to compile {}", source.display()))?;
        let target = output_path(root, source, out_dir).with_extension(OUTPUT_EXTENSION);
        write_output(&target, &code)?;
        info!(source = %source.display(), target = %target.display(), "built");
        built += 1;
    }
    Ok(built)
}

fn output_path(root: &Path, source: &Path, out_dir: Option<&Path>) -> PathBuf {
    let Some(out_dir) = out_dir else {
        return source.to_path_buf();
    };
    match source.strip_prefix(root) {
        Ok(relative) if !relative.as_os_str().is_empty() => out_dir.join(relative),
        // `root` was the file itself.
        _ => out_dir.join(source.file_name().unwrap_or(source.as_os_str())),
    }
}

fn write_output(path: &Path, code: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, code)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}
