//! Command line front end for the Iodine interpreter.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use iodine::bytecode::Module;
use iodine::config::Config;
use iodine::error::IodineError;

/// Exit status for scripts that failed to compile or run.
const EXIT_FAILURE: i32 = 70;
/// Exit status for bad invocations.
const EXIT_USAGE: i32 = 64;

#[derive(Parser)]
#[command(name = "iodine", version, about = "Run Iodine scripts")]
struct Cli {
    /// Script to run
    file: Option<PathBuf>,

    /// Run the given source text instead of a file
    #[arg(short = 'e', long = "eval", conflicts_with = "file")]
    eval: Option<String>,

    /// Print the bytecode of every compiled module
    #[arg(long)]
    disassemble: bool,

    /// Skip the optimizer passes
    #[arg(long)]
    no_optimize: bool,

    /// Compile only, reporting errors without running anything
    #[arg(long)]
    check: bool,

    /// Extra directories searched by `use`
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    include: Vec<PathBuf>,

    /// Maximum call depth before a stack overflow is raised
    #[arg(long, env = "IODINE_MAX_DEPTH")]
    max_depth: Option<usize>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("IODINE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    config.optimize = !cli.no_optimize;
    config.disassemble = cli.disassemble;
    for dir in cli.include.iter().rev() {
        config = config.with_search_path(dir);
    }
    if let Some(depth) = cli.max_depth {
        config.max_call_depth = depth;
    }

    let result = match (&cli.file, &cli.eval) {
        (_, Some(source)) if cli.check => iodine::compile_with(source, "main", &config)
            .map(|module| show_bytecode(&module, &config)),
        (_, Some(source)) => iodine::run_with(source, &config).map(|_| ()),
        (Some(path), None) if cli.check => {
            iodine::compile_file(path, &config).map(|module| show_bytecode(&module, &config))
        }
        (Some(path), None) => iodine::run_file(path, &config).map(|_| ()),
        (None, None) => {
            eprintln!("{}: no script given (try --help)", "error".red().bold());
            process::exit(EXIT_USAGE);
        }
    };

    if let Err(err) = result {
        report(&err);
        process::exit(EXIT_FAILURE);
    }
}

/// `--check` prints nothing unless `--disassemble` asked for the bytecode.
fn show_bytecode(module: &Module, config: &Config) {
    if config.disassemble {
        print!("{}", iodine::bytecode::disassemble_module(module));
    }
}

fn report(err: &IodineError) {
    match err {
        IodineError::Compilation(log) => {
            for line in log.to_string().lines() {
                eprintln!("{}: {}", "error".red().bold(), line);
            }
        }
        other => eprintln!("{}: {}", "error".red().bold(), other),
    }
}
