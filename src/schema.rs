use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub tool_version: String,
    pub sweep: String,
    pub plan_hash: String,
    pub binary: String,
    pub nbrun: u32,
    pub dry_run: bool,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Ok,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub seq: usize,
    pub repetition: u32,
    pub command: String,
    pub env: Vec<(String, String)>,
    pub args: Vec<String>,

    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub wall_ns: u128,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub ok: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_records(records: &[RunRecord]) -> Self {
        let mut s = Summary {
            total: records.len(),
            ..Default::default()
        };
        for r in records {
            match r.status {
                RunStatus::Ok => s.ok += 1,
                RunStatus::Failed => s.failed += 1,
                RunStatus::Skipped => s.skipped += 1,
            }
        }
        s
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub run: RunMeta,
    pub summary: Summary,
    pub runs: Vec<RunRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(seq: usize, status: RunStatus) -> RunRecord {
        RunRecord {
            seq,
            repetition: 0,
            command: String::new(),
            env: Vec::new(),
            args: Vec::new(),
            status,
            exit_code: None,
            wall_ns: 0,
        }
    }

    #[test]
    fn summary_counts_by_status() {
        let records = vec![
            record(0, RunStatus::Ok),
            record(1, RunStatus::Failed),
            record(2, RunStatus::Ok),
            record(3, RunStatus::Skipped),
        ];
        let s = Summary::from_records(&records);
        assert_eq!(
            s,
            Summary {
                total: 4,
                ok: 2,
                failed: 1,
                skipped: 1
            }
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&RunStatus::Skipped).unwrap();
        assert_eq!(json, "\"skipped\"");
    }
}
