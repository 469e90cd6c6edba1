use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{CoverageError, GenerationError, SandboxError};

/// Where a unit-level failure happened.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureStage {
    Generation,
    SandboxSetup,
    Compile,
    Run,
    CoverageTool,
    CoverageParse,
    CoverageThreshold,
    Persist,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureStage::Generation => "generation",
            FailureStage::SandboxSetup => "sandbox-setup",
            FailureStage::Compile => "compile",
            FailureStage::Run => "run",
            FailureStage::CoverageTool => "coverage-tool",
            FailureStage::CoverageParse => "coverage-parse",
            FailureStage::CoverageThreshold => "coverage-threshold",
            FailureStage::Persist => "persist",
        };
        f.write_str(s)
    }
}

impl From<&GenerationError> for FailureStage {
    fn from(_: &GenerationError) -> Self {
        FailureStage::Generation
    }
}

impl From<&SandboxError> for FailureStage {
    fn from(e: &SandboxError) -> Self {
        match e {
            SandboxError::Setup { .. } => FailureStage::SandboxSetup,
            SandboxError::CompileFailed(_) => FailureStage::Compile,
            SandboxError::RunFailed(_) => FailureStage::Run,
            SandboxError::CoverageToolFailed(_) => FailureStage::CoverageTool,
        }
    }
}

impl From<&CoverageError> for FailureStage {
    fn from(e: &CoverageError) -> Self {
        match e {
            CoverageError::Unparseable(_) => FailureStage::CoverageParse,
            CoverageError::BelowThreshold { .. } => FailureStage::CoverageThreshold,
        }
    }
}

/// Per-unit lifecycle. `Persisted`, `Skipped` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum UnitState {
    Discovered,
    PairingChecked,
    Generating,
    Validated,
    Compiled,
    CoverageChecked,
    Persisted,
    Skipped { reason: String },
    Failed { stage: FailureStage, reason: String },
}

impl UnitState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UnitState::Persisted | UnitState::Skipped { .. } | UnitState::Failed { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            UnitState::Discovered => "discovered",
            UnitState::PairingChecked => "pairing-checked",
            UnitState::Generating => "generating",
            UnitState::Validated => "validated",
            UnitState::Compiled => "compiled",
            UnitState::CoverageChecked => "coverage-checked",
            UnitState::Persisted => "persisted",
            UnitState::Skipped { .. } => "skipped",
            UnitState::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    pub source: PathBuf,
    pub state: UnitState,
    /// Every state the unit passed through, in order, ending with `state`.
    pub trail: Vec<&'static str>,
    pub backend: Option<String>,
    pub coverage: Option<f64>,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<UnitOutcome>,
}

impl RunReport {
    pub fn persisted(&self) -> usize {
        self.count(|s| matches!(s, UnitState::Persisted))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, UnitState::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, UnitState::Failed { .. }))
    }

    fn count(&self, f: impl Fn(&UnitState) -> bool) -> usize {
        self.outcomes.iter().filter(|o| f(&o.state)).count()
    }
}
