//! Sweep descriptions: built-in presets and JSON sweep files.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SweepError};
use crate::options::OptionSet;
use crate::plan;
use crate::Preset;

/// Command-line adjustments to a sweep description. Unset fields leave it alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub binary: Option<String>,
    pub nbrun: Option<u32>,
    pub workdir: Option<PathBuf>,
    /// Let EasyPAP open its window (drop `-n`).
    pub display: bool,
}

/// Default path of the EasyPAP launcher, relative to the working directory.
pub const DEFAULT_BINARY: &str = "./run";

/// Everything needed to drive one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub name: String,

    #[serde(default = "default_binary")]
    pub binary: String,

    /// Repetitions of the whole grid.
    #[serde(default = "default_nbrun")]
    pub nbrun: u32,

    /// Pass EasyPAP's `-n` (no display) to every run.
    #[serde(default = "default_no_display")]
    pub no_display: bool,

    /// Directory the binary is launched from. Defaults to the current directory.
    #[serde(default)]
    pub workdir: Option<PathBuf>,

    /// OpenMP internal control variables, e.g. `"OMP_NUM_THREADS="`.
    #[serde(default)]
    pub env: OptionSet,

    /// Benchmark command-line options, e.g. `"--kernel "`.
    #[serde(default)]
    pub cli: OptionSet,
}

fn default_binary() -> String {
    DEFAULT_BINARY.to_string()
}

const fn default_nbrun() -> u32 {
    1
}

const fn default_no_display() -> bool {
    true
}

impl SweepConfig {
    /// rotation90 `omp_tiled` vs `omp_tiled_opt` across tile sizes, image sizes and
    /// thread counts; results land in `rotation_opt.csv`.
    pub fn rotation_opt() -> Self {
        let cli = OptionSet::new()
            .with_strs("--kernel ", &["rotation90"])
            .with_ints("--iterations ", &[100])
            .with_strs("--variant ", &["omp_tiled", "omp_tiled_opt"])
            .with_ints("--tile-size ", &[16, 32])
            .with_ints("--size ", &[512, 2048, 4096])
            .with_strs("-of ", &["rotation_opt.csv"]);

        // 1, then 2..=12 by 2.
        let threads: Vec<i64> = std::iter::once(1).chain((2..=12).step_by(2)).collect();
        let env = OptionSet::new()
            .with_ints("OMP_NUM_THREADS=", &threads)
            .with_strs("OMP_SCHEDULE=", &["static"]);

        Self {
            name: "rotation-opt".to_string(),
            binary: default_binary(),
            nbrun: 1,
            no_display: true,
            workdir: None,
            env,
            cli,
        }
    }

    /// The sweep file when one is given, else the built-in preset.
    pub fn resolve(preset: Preset, file: Option<&Path>) -> Result<Self> {
        match file {
            Some(path) => Self::load(path),
            None => Ok(preset.config()),
        }
    }

    /// Apply command-line overrides on top of the loaded description.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(b) = &overrides.binary {
            self.binary = b.clone();
        }
        if let Some(n) = overrides.nbrun {
            self.nbrun = n;
        }
        if let Some(dir) = &overrides.workdir {
            self.workdir = Some(dir.clone());
        }
        if overrides.display {
            self.no_display = false;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.binary.trim().is_empty() {
            return Err(SweepError::invalid("binary path is empty"));
        }
        plan::validate(&self.env, &self.cli, self.nbrun)
    }

    pub fn run_count(&self) -> Result<usize> {
        plan::run_count(&self.env, &self.cli, self.nbrun)
    }

    /// SHA-256 fingerprint of the canonical JSON form.
    pub fn plan_hash(&self) -> Result<String> {
        plan::stable_hash(self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| SweepError::io(path, e))?;
        let cfg: SweepConfig = serde_json::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| SweepError::io(path, e))
    }
}
