//! Protocol between the runner and the in-container harness.
//!
//! The runner writes `harness.json` next to the harness script. The harness
//! prints one JSON array on stdout: a record per test case in order, or a
//! single source-error record with the nil UUID.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::SandboxError;

/// Harness script, copied into every workspace.
pub const HARNESS_SCRIPT: &str = include_str!("../../../assets/harness.py");
pub const HARNESS_FILE: &str = "harness.py";
pub const HARNESS_CONFIG_FILE: &str = "harness.json";

/// Status code the harness uses for "source could not be loaded or compiled".
pub const SOURCE_ERROR_STATUS: u8 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HarnessTestCase {
    pub id: Uuid,
    pub input: String,
}

/// Contents of `harness.json`. Expected outputs are deliberately absent:
/// the submission shares the container with this file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HarnessConfig {
    pub time_limit_seconds: u64,
    pub compile_timeout_seconds: u64,
    /// Python source to syntax-check before running anything.
    pub syntax_check: Option<String>,
    pub compile: Option<Vec<String>>,
    pub run: Vec<String>,
    /// Uid for submitted code; ignored unless the harness runs as root.
    #[serde(default)]
    pub run_as_uid: Option<u32>,
    pub test_cases: Vec<HarnessTestCase>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HarnessRecord {
    pub test_case_id: Uuid,
    pub status: u8,
    #[serde(default)]
    pub actual_output: Option<String>,
    #[serde(default)]
    pub execution_time_ms: i64,
    #[serde(default)]
    pub memory_used_kb: i64,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub stack_trace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarnessReport {
    /// Source loading or compilation failed; no test ran.
    SourceError {
        message: String,
        stack_trace: Option<String>,
    },
    Tests(Vec<HarnessRecord>),
}

/// Parse the harness stdout. The JSON array is expected on the last non-empty line.
pub fn parse_report(stdout: &str) -> Result<HarnessReport, SandboxError> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| SandboxError::Harness("harness produced no output".into()))?;

    let records: Vec<HarnessRecord> = serde_json::from_str(line)
        .map_err(|e| SandboxError::Harness(format!("malformed harness output: {e}")))?;

    if let [record] = records.as_slice() {
        if record.test_case_id.is_nil() && record.status == SOURCE_ERROR_STATUS {
            return Ok(HarnessReport::SourceError {
                message: record
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "Source could not be loaded".to_string()),
                stack_trace: record.stack_trace.clone(),
            });
        }
    }

    Ok(HarnessReport::Tests(records))
}
