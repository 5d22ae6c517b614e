use clap::{Parser, Subcommand};
use easypap_sweep::config::{Overrides, SweepConfig};
use easypap_sweep::error::{Result, SweepError};
use easypap_sweep::executor::{self, ExecOptions, ProcessRunner};
use easypap_sweep::logging::init_logging;
use easypap_sweep::plan;
use easypap_sweep::Preset;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Args, Debug)]
struct SourceArgs {
    /// Built-in sweep to use.
    #[arg(long, value_enum, default_value_t = Preset::RotationOpt)]
    preset: Preset,

    /// JSON sweep file; overrides --preset.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl SourceArgs {
    fn resolve(&self) -> Result<SweepConfig> {
        SweepConfig::resolve(self.preset, self.config.as_deref())
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the benchmark once per combination of environment x command-line options.
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Benchmark executable (default: the sweep's, usually ./run).
        #[arg(long, value_name = "PATH")]
        binary: Option<String>,

        /// Repeat the whole grid N times.
        #[arg(long)]
        nbrun: Option<u32>,

        /// Launch the benchmark from this directory.
        #[arg(long, value_name = "DIR")]
        workdir: Option<PathBuf>,

        /// Do not pass `-n`; let EasyPAP open its display window.
        #[arg(long, default_value_t = false)]
        display: bool,

        /// Abort at the first run that exits unsuccessfully.
        #[arg(long, default_value_t = false)]
        fail_fast: bool,

        /// Print the runs without launching anything.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// List the shell-equivalent command of every run.
    Plan {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print the resolved sweep description as JSON (usable as a --config file).
    Show {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Parser, Debug)]
#[command(name = "easypap-sweep")]
#[command(about = "Parameter sweep driver for EasyPAP kernels (JSON report output)")]
struct Args {
    /// Where to write the JSON output. If omitted, prints to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Debug-level logging unless RUST_LOG is set.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

fn emit(out: Option<&PathBuf>, text: &str) -> Result<()> {
    match out {
        Some(path) => fs::write(path, text).map_err(|e| SweepError::io(path, e)),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match &args.cmd {
        Command::Run {
            source,
            binary,
            nbrun,
            workdir,
            display,
            fail_fast,
            dry_run,
        } => {
            let mut cfg = source.resolve()?;
            cfg.apply(&Overrides {
                binary: binary.clone(),
                nbrun: *nbrun,
                workdir: workdir.clone(),
                display: *display,
            });

            let opts = ExecOptions {
                fail_fast: *fail_fast,
                dry_run: *dry_run,
                ..ExecOptions::from_config(&cfg)
            };
            let report = executor::run_sweep(&mut ProcessRunner, &cfg, &opts)?;

            let json = serde_json::to_string_pretty(&report)?;
            emit(args.out.as_ref(), &json)?;
            if let Some(out) = &args.out {
                info!("report written to {}", out.display());
            }
        }
        Command::Plan { source } => {
            let cfg = source.resolve()?;
            let runs = plan::expand(&cfg.env, &cfg.cli, cfg.nbrun, cfg.no_display)?;
            let mut text = String::new();
            for run in &runs {
                text.push_str(&run.command_line(&cfg.binary));
                text.push('\n');
            }
            text.push_str(&format!("# {} runs ({})", runs.len(), cfg.name));
            emit(args.out.as_ref(), &text)?;
        }
        Command::Show { source } => {
            let cfg = source.resolve()?;
            let json = serde_json::to_string_pretty(&cfg)?;
            emit(args.out.as_ref(), &json)?;
        }
    }

    Ok(())
}
