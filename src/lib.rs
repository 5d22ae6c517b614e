use clap::ValueEnum;

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod options;
pub mod plan;
pub mod schema;

pub use config::SweepConfig;
pub use error::{Result, SweepError};
pub use executor::{execute, ExecOptions};
pub use options::{OptionSet, OptionValue};

/// Built-in sweep to run when no sweep file is given.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum Preset {
    /// rotation90: omp_tiled vs omp_tiled_opt over tile size, image size and 1..12 threads.
    #[default]
    RotationOpt,
}

impl Preset {
    pub fn config(&self) -> SweepConfig {
        match self {
            Preset::RotationOpt => SweepConfig::rotation_opt(),
        }
    }
}
