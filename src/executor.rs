//! Sequential execution of a sweep.
//!
//! Each run is a child process of the benchmark binary, awaited before the next
//! one starts. The child inherits stdout/stderr; its results go wherever its own
//! options send them (EasyPAP appends to the `-of` CSV file).

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::SweepConfig;
use crate::error::{Result, SweepError};
use crate::options::OptionSet;
use crate::plan::{self, RunDescriptor};
use crate::schema::{RunMeta, RunRecord, RunStatus, Summary, SweepReport};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug)]
pub struct ExecOptions {
    /// Pass EasyPAP's `-n` to every run, ahead of the other options.
    pub no_display: bool,
    pub workdir: Option<PathBuf>,
    /// Stop at the first run that exits unsuccessfully.
    pub fail_fast: bool,
    /// Log and record the runs without spawning anything.
    pub dry_run: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            no_display: true,
            workdir: None,
            fail_fast: false,
            dry_run: false,
        }
    }
}

impl ExecOptions {
    pub fn from_config(cfg: &SweepConfig) -> Self {
        Self {
            no_display: cfg.no_display,
            workdir: cfg.workdir.clone(),
            ..Self::default()
        }
    }
}

/// Launches one run and reports its exit code (`None` when killed by a signal).
pub trait Runner {
    fn run(
        &mut self,
        binary: &str,
        workdir: Option<&Path>,
        run: &RunDescriptor,
    ) -> io::Result<Option<i32>>;
}

/// Spawns the benchmark as a real child process.
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl Runner for ProcessRunner {
    fn run(
        &mut self,
        binary: &str,
        workdir: Option<&Path>,
        run: &RunDescriptor,
    ) -> io::Result<Option<i32>> {
        let program = resolve_program(binary, workdir);
        let mut cmd = Command::new(&program);
        cmd.args(&run.args);
        cmd.envs(run.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }
        let status = cmd.status()?;
        Ok(status.code())
    }
}

/// A relative path with a separator (`./run`) is taken relative to the working
/// directory of the run; bare names go through `PATH`.
fn resolve_program(binary: &str, workdir: Option<&Path>) -> PathBuf {
    let path = Path::new(binary);
    match workdir {
        Some(dir) if path.is_relative() && path.components().count() > 1 => dir.join(path),
        _ => path.to_path_buf(),
    }
}

/// Run `binary` once per combination of `env` x `cli`, `nbrun` times over.
pub fn execute(
    binary: &str,
    env: &OptionSet,
    cli: &OptionSet,
    nbrun: u32,
    opts: &ExecOptions,
) -> Result<Vec<RunRecord>> {
    execute_with(&mut ProcessRunner, binary, env, cli, nbrun, opts)
}

pub fn execute_with<R: Runner>(
    runner: &mut R,
    binary: &str,
    env: &OptionSet,
    cli: &OptionSet,
    nbrun: u32,
    opts: &ExecOptions,
) -> Result<Vec<RunRecord>> {
    if binary.trim().is_empty() {
        return Err(SweepError::invalid("binary path is empty"));
    }
    let runs = plan::expand(env, cli, nbrun, opts.no_display)?;
    let total = runs.len();
    info!(total, nbrun, binary, dry_run = opts.dry_run, "starting sweep");

    let mut records = Vec::with_capacity(total);
    for run in &runs {
        let command = run.command_line(binary);
        let position = run.seq + 1;
        info!(position, total, "{command}");

        if opts.dry_run {
            records.push(record(run, command, RunStatus::Skipped, None, 0));
            continue;
        }

        let start = Instant::now();
        let outcome = runner.run(binary, opts.workdir.as_deref(), run);
        let wall_ns = start.elapsed().as_nanos();

        let code = match outcome {
            Ok(code) => code,
            Err(source) => {
                warn!(seq = run.seq, error = %source, "could not spawn benchmark");
                return Err(SweepError::Spawn {
                    binary: binary.to_string(),
                    source,
                });
            }
        };

        if code == Some(0) {
            let wall_ms = wall_ns as f64 / 1e6;
            debug!(seq = run.seq, wall_ms, "run ok");
            records.push(record(run, command, RunStatus::Ok, code, wall_ns));
        } else {
            warn!(seq = run.seq, exit_code = ?code, "run failed: {command}");
            records.push(record(run, command, RunStatus::Failed, code, wall_ns));
            if opts.fail_fast {
                return Err(SweepError::RunFailed { seq: run.seq, code });
            }
        }
    }

    let summary = Summary::from_records(&records);
    info!(
        ok = summary.ok,
        failed = summary.failed,
        skipped = summary.skipped,
        "sweep finished"
    );
    Ok(records)
}

fn record(
    run: &RunDescriptor,
    command: String,
    status: RunStatus,
    exit_code: Option<i32>,
    wall_ns: u128,
) -> RunRecord {
    RunRecord {
        seq: run.seq,
        repetition: run.repetition,
        command,
        env: run.env.clone(),
        args: run.args.clone(),
        status,
        exit_code,
        wall_ns,
    }
}

/// Execute a whole sweep description and wrap the records in a report.
pub fn run_sweep<R: Runner>(
    runner: &mut R,
    cfg: &SweepConfig,
    opts: &ExecOptions,
) -> Result<SweepReport> {
    cfg.validate()?;
    let plan_hash = cfg.plan_hash()?;
    let runs = execute_with(runner, &cfg.binary, &cfg.env, &cfg.cli, cfg.nbrun, opts)?;

    Ok(SweepReport {
        run: RunMeta {
            schema_version: SCHEMA_VERSION,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            sweep: cfg.name.clone(),
            plan_hash,
            binary: cfg.binary.clone(),
            nbrun: cfg.nbrun,
            dry_run: opts.dry_run,
            timestamp_utc: Utc::now().to_rfc3339(),
            git_sha: git_sha_short(),
        },
        summary: Summary::from_records(&runs),
        runs,
    })
}

/// Commit the benchmark tree was built from, when CI exports it.
fn git_sha_short() -> Option<String> {
    ["GIT_SHA", "GITHUB_SHA"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|sha| !sha.is_empty()))
        .map(|sha| sha.chars().take(12).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every call and fails the runs listed in `fail`.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<(String, Vec<(String, String)>, Vec<String>)>,
        fail: Vec<usize>,
    }

    impl Runner for Recorder {
        fn run(
            &mut self,
            binary: &str,
            _workdir: Option<&Path>,
            run: &RunDescriptor,
        ) -> io::Result<Option<i32>> {
            self.calls
                .push((binary.to_string(), run.env.clone(), run.args.clone()));
            Ok(Some(if self.fail.contains(&run.seq) { 1 } else { 0 }))
        }
    }

    struct Missing;

    impl Runner for Missing {
        fn run(&mut self, _: &str, _: Option<&Path>, _: &RunDescriptor) -> io::Result<Option<i32>> {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }
    }

    #[test]
    fn preset_runs_84_times_with_run_binary() {
        let cfg = SweepConfig::rotation_opt();
        let mut rec = Recorder::default();
        let report = run_sweep(&mut rec, &cfg, &ExecOptions::from_config(&cfg)).unwrap();

        assert_eq!(rec.calls.len(), 84);
        assert!(rec.calls.iter().all(|(b, _, _)| b == "./run"));
        assert_eq!(report.summary.ok, 84);
        assert_eq!(report.run.nbrun, 1);
        assert_eq!(report.run.sweep, "rotation-opt");
        chrono::DateTime::parse_from_rfc3339(&report.run.timestamp_utc).unwrap();
    }

    #[test]
    fn first_run_uses_first_value_of_every_option() {
        let cfg = SweepConfig::rotation_opt();
        let mut rec = Recorder::default();
        execute_with(
            &mut rec,
            &cfg.binary,
            &cfg.env,
            &cfg.cli,
            cfg.nbrun,
            &ExecOptions::default(),
        )
        .unwrap();

        let (_, env, args) = &rec.calls[0];
        assert_eq!(
            env,
            &vec![
                ("OMP_NUM_THREADS".to_string(), "1".to_string()),
                ("OMP_SCHEDULE".to_string(), "static".to_string()),
            ]
        );
        assert_eq!(
            args,
            &vec![
                "-n",
                "--kernel",
                "rotation90",
                "--iterations",
                "100",
                "--variant",
                "omp_tiled",
                "--tile-size",
                "16",
                "--size",
                "512",
                "-of",
                "rotation_opt.csv",
            ]
        );

        // Size varies fastest, thread count slowest.
        assert_eq!(rec.calls[1].2[10], "2048");
        assert_eq!(rec.calls[12].1[0].1, "2");
        assert_eq!(rec.calls[83].1[0].1, "12");
        assert_eq!(rec.calls[83].2[6], "omp_tiled_opt");
    }

    #[test]
    fn failures_are_recorded_and_sweep_continues() {
        let env = OptionSet::new().with_ints("OMP_NUM_THREADS=", &[1, 2, 4]);
        let mut rec = Recorder {
            fail: vec![1],
            ..Default::default()
        };
        let records =
            execute_with(&mut rec, "./run", &env, &OptionSet::new(), 1, &ExecOptions::default())
                .unwrap();

        assert_eq!(rec.calls.len(), 3);
        assert_eq!(records[1].status, RunStatus::Failed);
        assert_eq!(records[1].exit_code, Some(1));
        assert_eq!(records[2].status, RunStatus::Ok);
    }

    #[test]
    fn fail_fast_stops_at_first_failure() {
        let env = OptionSet::new().with_ints("OMP_NUM_THREADS=", &[1, 2, 4]);
        let mut rec = Recorder {
            fail: vec![1],
            ..Default::default()
        };
        let opts = ExecOptions {
            fail_fast: true,
            ..Default::default()
        };
        let err = execute_with(&mut rec, "./run", &env, &OptionSet::new(), 1, &opts).unwrap_err();

        assert!(matches!(err, SweepError::RunFailed { seq: 1, code: Some(1) }));
        assert_eq!(rec.calls.len(), 2);
    }

    #[test]
    fn spawn_error_aborts() {
        let cli = OptionSet::new().with_ints("--size ", &[1, 2]);
        let opts = ExecOptions::default();
        let err = execute_with(&mut Missing, "./run", &OptionSet::new(), &cli, 1, &opts).unwrap_err();
        assert!(matches!(err, SweepError::Spawn { .. }));
    }

    #[test]
    fn dry_run_spawns_nothing() {
        let cfg = SweepConfig::rotation_opt();
        let mut rec = Recorder::default();
        let opts = ExecOptions {
            dry_run: true,
            ..ExecOptions::from_config(&cfg)
        };
        let report = run_sweep(&mut rec, &cfg, &opts).unwrap();

        assert!(rec.calls.is_empty());
        assert_eq!(report.summary.skipped, 84);
        assert!(report.runs.iter().all(|r| r.status == RunStatus::Skipped));
        assert!(report.runs[0]
            .command
            .starts_with("OMP_NUM_THREADS=1 OMP_SCHEDULE=static ./run -n --kernel rotation90"));
    }

    #[test]
    fn nbrun_repeats_the_grid() {
        let cli = OptionSet::new().with_ints("--size ", &[512, 1024]);
        let mut rec = Recorder::default();
        let records =
            execute_with(&mut rec, "./run", &OptionSet::new(), &cli, 3, &ExecOptions::default())
                .unwrap();
        assert_eq!(records.len(), 6);
        assert_eq!(
            records.iter().map(|r| r.repetition).collect::<Vec<_>>(),
            vec![0, 0, 1, 1, 2, 2]
        );
    }

    #[test]
    fn relative_binary_resolves_against_workdir() {
        let dir = Path::new("/opt/easypap");
        assert_eq!(resolve_program("./run", Some(dir)), dir.join("./run"));
        assert_eq!(resolve_program("bin/run", Some(dir)), dir.join("bin/run"));
        assert_eq!(resolve_program("run", Some(dir)), PathBuf::from("run"));
        assert_eq!(resolve_program("/usr/bin/run", Some(dir)), PathBuf::from("/usr/bin/run"));
        assert_eq!(resolve_program("./run", None), PathBuf::from("./run"));
    }
}
