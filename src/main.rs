use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use rayon::prelude::*;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use typelint::config::LintOptions;
use typelint::diagnostic::Report;
use typelint::engine::ImportCheckFactory;
use typelint::error::Error;
use typelint::lint::Linter;
use typelint::report::{self, Summary};
use typelint::vfs::OsVfs;
use typelint::walker;

#[derive(Parser)]
#[command(name = "typelint", version, about = "Type-aware lint pass for TypeScript projects")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check files and directories against their enclosing tsconfig.json
    Check {
        /// Files or directories to check
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output machine-readable JSON
        #[arg(long)]
        json: bool,

        /// Extra global library directory searched after project-local ones
        #[arg(long = "global-path", value_name = "DIR")]
        global_paths: Vec<PathBuf>,

        /// Directory holding the default library declarations (lib.d.ts etc.)
        #[arg(long, value_name = "DIR")]
        lib_dir: Option<PathBuf>,

        /// Drop diagnostics with this code
        #[arg(long = "ignore-code", value_name = "CODE")]
        ignore_codes: Vec<u32>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn usage_error(e: &Error) -> ExitCode {
    eprintln!("error: {e}");
    if let Some(hint) = e.hint() {
        eprintln!("hint: {hint}");
    }
    ExitCode::from(2)
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            paths,
            json,
            global_paths,
            lib_dir,
            ignore_codes,
        } => {
            let start = Instant::now();
            let files = match walker::discover_lint_targets(&paths) {
                Ok(files) => files,
                Err(e) => return usage_error(&e),
            };

            let options = LintOptions {
                global_paths,
                tool_dir: std::env::current_exe()
                    .ok()
                    .and_then(|exe| exe.parent().map(Path::to_path_buf)),
                lib_dir,
                ignore_codes,
            }
            .with_node_path(std::env::var_os("NODE_PATH").as_deref());

            let linter = Linter::new(
                Arc::new(OsVfs),
                Box::new(ImportCheckFactory::default()),
                options,
            );
            let reports: Vec<Report> = files
                .par_iter()
                .flat_map_iter(|file| linter.lint_file(file))
                .collect();
            let summary = Summary::new(files.len(), &reports);
            debug!(
                files = files.len(),
                sessions = linter.registry().len(),
                elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
                "check finished"
            );

            if json {
                match report::render_json(&reports, summary) {
                    Ok(out) => println!("{out}"),
                    Err(e) => {
                        eprintln!("error: cannot serialize reports: {e}");
                        return ExitCode::from(2);
                    }
                }
            } else {
                let root = std::env::current_dir().unwrap_or_default();
                print!("{}", report::render_human(&reports, summary, &root));
            }

            if summary.errors > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}
