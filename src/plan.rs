//! Expansion of a sweep into concrete run descriptors.
//!
//! Enumeration order: repetition outermost, then the environment product,
//! then the command-line product. Inside each product the last label varies
//! fastest.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::error::{Result, SweepError};
use crate::options::{OptionSet, OptionValue};

/// EasyPAP flag that disables the display window.
pub const NO_DISPLAY_FLAG: &str = "-n";

/// One invocation of the benchmark binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDescriptor {
    /// Position in the sweep, starting at 0.
    pub seq: usize,
    /// Repetition index in `[0, nbrun)`.
    pub repetition: u32,
    pub env: Vec<(String, String)>,
    pub args: Vec<String>,
}

impl RunDescriptor {
    /// Shell-equivalent rendering, e.g. `OMP_NUM_THREADS=4 ./run -n --size 512`.
    pub fn command_line(&self, binary: &str) -> String {
        let mut parts: Vec<String> = self
            .env
            .iter()
            .map(|(k, v)| format!("{k}={}", shell_quote(v)))
            .collect();
        parts.push(shell_quote(binary));
        parts.extend(self.args.iter().map(|a| shell_quote(a)));
        parts.join(" ")
    }
}

fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Render a command-line label/value pair into argv tokens.
///
/// A label ending in whitespace is a separate token (`"--size "` -> `--size`, `512`);
/// otherwise label and value are glued (`"--size="` -> `--size=512`).
pub fn render_cli(label: &str, value: &OptionValue) -> Vec<String> {
    let trimmed = label.trim_end();
    if trimmed.len() != label.len() {
        vec![trimmed.trim_start().to_string(), value.to_string()]
    } else {
        vec![format!("{}{value}", label.trim_start())]
    }
}

/// Render an environment label (`"OMP_NUM_THREADS="`) and value into a variable pair.
pub fn render_env(label: &str, value: &OptionValue) -> Result<(String, String)> {
    let name = env_name(label)?;
    Ok((name.to_string(), value.to_string()))
}

fn env_name(label: &str) -> Result<&str> {
    let name = label
        .trim()
        .strip_suffix('=')
        .ok_or_else(|| {
            SweepError::invalid(format!("environment label {label:?} must end with '='"))
        })?
        .trim();
    if name.is_empty() || name.contains('=') || name.contains(char::is_whitespace) {
        return Err(SweepError::invalid(format!(
            "environment label {label:?} is not a valid variable name"
        )));
    }
    Ok(name)
}

/// Validate both option sets and the repetition count.
pub fn validate(env: &OptionSet, cli: &OptionSet, nbrun: u32) -> Result<()> {
    if nbrun == 0 {
        return Err(SweepError::invalid("nbrun must be at least 1"));
    }
    env.validate("env")?;
    cli.validate("cli")?;

    // Distinct labels may still name the same variable ("X=" vs "X =").
    let mut names = BTreeSet::new();
    for label in env.labels() {
        let name = env_name(label)?;
        if !names.insert(name) {
            return Err(SweepError::invalid(format!(
                "environment variable {name} is set by more than one label"
            )));
        }
    }

    run_count(env, cli, nbrun).map(|_| ())
}

/// Total number of runs implied by the sweep.
pub fn run_count(env: &OptionSet, cli: &OptionSet, nbrun: u32) -> Result<usize> {
    env.combination_count()
        .zip(cli.combination_count())
        .and_then(|(e, c)| e.checked_mul(c))
        .and_then(|n| n.checked_mul(nbrun as usize))
        .ok_or_else(|| SweepError::invalid("sweep too large"))
}

/// Expand the sweep into the ordered list of runs.
pub fn expand(
    env: &OptionSet,
    cli: &OptionSet,
    nbrun: u32,
    no_display: bool,
) -> Result<Vec<RunDescriptor>> {
    validate(env, cli, nbrun)?;
    let total = run_count(env, cli, nbrun)?;

    let env_rows: Vec<Vec<(String, String)>> = env
        .combinations()
        .map(|sel| {
            sel.into_iter()
                .map(|(label, value)| render_env(label, value))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<_>>()?;

    let arg_rows: Vec<Vec<String>> = cli
        .combinations()
        .map(|sel| {
            let mut args = Vec::new();
            if no_display {
                args.push(NO_DISPLAY_FLAG.to_string());
            }
            for (label, value) in sel {
                args.extend(render_cli(label, value));
            }
            args
        })
        .collect();

    let mut runs = Vec::with_capacity(total);
    for repetition in 0..nbrun {
        for env_row in &env_rows {
            for args in &arg_rows {
                runs.push(RunDescriptor {
                    seq: runs.len(),
                    repetition,
                    env: env_row.clone(),
                    args: args.clone(),
                });
            }
        }
    }
    Ok(runs)
}

/// Stable hexadecimal SHA-256 of a serializable sweep description.
pub fn stable_hash<T: Serialize>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    Ok(format!("{:x}", Sha256::digest(bytes)))
}
