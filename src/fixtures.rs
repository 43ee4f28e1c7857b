//! Loader for the fixture-driven end-to-end suite under `tests/programs/`.
//!
//! Each case is a directory holding `program.ms`, a `case.yaml` spec and any
//! expected-output files the spec references.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseClass {
    /// The entry function runs to completion; assertions cover the returned
    /// value and optionally the log transcript.
    RuntimeSuccess,
    /// Execution aborts via the runtime error protocol; assertions cover the
    /// logged error text.
    RuntimeError,
    /// The pipeline fails before the entry call (lex/parse/import errors).
    CompileError,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExpectedOutcome {
    /// Debug rendering of the entry function's return value.
    pub return_value: Option<String>,
    /// File whose lines are compared against the full log transcript.
    pub log_file: Option<String>,
    /// Substring expected in the logged error text.
    pub error_contains: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaseSpec {
    pub class: CaseClass,
    #[serde(default = "default_entry")]
    pub entry: String,
    pub expected: ExpectedOutcome,
}

fn default_entry() -> String {
    "main".to_string()
}

#[derive(Debug, Clone)]
pub struct Case {
    pub name: String,
    pub dir: PathBuf,
    pub spec: CaseSpec,
}

impl Case {
    pub fn read_text(&self, relative_path: &str) -> Result<String> {
        fs::read_to_string(self.dir.join(relative_path))
            .with_context(|| format!("Reading {} fixture file {}", self.name, relative_path))
    }
}

pub fn load_cases(programs_dir: &Path) -> Result<Vec<Case>> {
    let mut cases = Vec::new();

    for entry in
        fs::read_dir(programs_dir).with_context(|| format!("Reading {}", programs_dir.display()))?
    {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }

        let case_path = path.join("case.yaml");
        if !case_path.exists() {
            continue;
        }

        ensure!(
            path.join("program.ms").exists(),
            "Missing program.ms for case {}",
            path.display()
        );

        let case_name = path
            .file_name()
            .and_then(|value| value.to_str())
            .map(str::to_string)
            .with_context(|| format!("Invalid case directory name {}", path.display()))?;
        let case_raw = fs::read_to_string(&case_path)
            .with_context(|| format!("Reading {}", case_path.display()))?;
        let spec: CaseSpec = serde_yaml::from_str(&case_raw)
            .with_context(|| format!("Parsing {}", case_path.display()))?;

        cases.push(Case {
            name: case_name,
            dir: path,
            spec,
        });
    }

    ensure!(
        !cases.is_empty(),
        "No test cases found in {}",
        programs_dir.display()
    );
    cases.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(cases)
}
