//! orchestrator.rs
//!
//! Sequences prompt -> generation -> sandbox -> coverage -> persistence for
//! each unit. One unit failing never stops the others.

use std::path::PathBuf;

use chrono::Utc;
use uuid::Uuid;

use crate::config::{TestRequirements, COVERAGE_THRESHOLD};
use crate::discovery::{SourceUnit, UnitKind};
use crate::error::CoverageError;
use crate::llm::backend::GenerationBackend;
use crate::llm::client::GenerationClient;
use crate::llm::prompt::build_prompt;
use crate::state::{FailureStage, RunReport, UnitOutcome, UnitState};
use crate::testgen::coverage;
use crate::testgen::materialize::materialize_test;
use crate::testgen::sandbox::CandidateRunner;
use crate::testgen::validate::Validator;

pub struct Pipeline<B, R> {
    client: GenerationClient<B>,
    runner: R,
    requirements: TestRequirements,
    out_dir: PathBuf,
    threshold: f64,
}

/// Tracks one unit through its states.
struct Progress {
    outcome: UnitOutcome,
}

impl Progress {
    fn new(unit: &SourceUnit) -> Self {
        Self {
            outcome: UnitOutcome {
                source: unit.path.clone(),
                state: UnitState::Discovered,
                trail: vec![UnitState::Discovered.name()],
                backend: None,
                coverage: None,
                output: None,
            },
        }
    }

    fn advance(&mut self, next: UnitState) {
        tracing::debug!(
            "{}: {} -> {}",
            self.outcome.source.display(),
            self.outcome.state.name(),
            next.name()
        );
        self.outcome.trail.push(next.name());
        self.outcome.state = next;
    }

    fn fail(mut self, stage: FailureStage, reason: impl ToString) -> UnitOutcome {
        let reason = reason.to_string();
        tracing::error!(
            "{} failed at {}: {}",
            self.outcome.source.display(),
            stage,
            reason
        );
        self.advance(UnitState::Failed { stage, reason });
        self.outcome
    }

    fn skip(mut self, reason: String) -> UnitOutcome {
        tracing::warn!("Skipping {}: {}", self.outcome.source.display(), reason);
        self.advance(UnitState::Skipped { reason });
        self.outcome
    }
}

impl<B: GenerationBackend, R: CandidateRunner> Pipeline<B, R> {
    pub fn new(
        client: GenerationClient<B>,
        runner: R,
        requirements: TestRequirements,
        out_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            runner,
            requirements,
            out_dir: out_dir.into(),
            threshold: COVERAGE_THRESHOLD,
        }
    }

    /// Processes units strictly in the given order, one at a time.
    pub fn run(&self, units: &[SourceUnit]) -> RunReport {
        let started_at = Utc::now();
        let outcomes = units.iter().map(|u| self.process_unit(u)).collect();

        RunReport {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            outcomes,
        }
    }

    pub fn process_unit(&self, unit: &SourceUnit) -> UnitOutcome {
        println!("Generating unit tests for {}", unit.display_name());
        tracing::info!("Processing file: {}", unit.display_name());

        let mut progress = Progress::new(unit);

        /* ---------- pairing ---------- */
        if !unit.is_paired() {
            let missing = match unit.kind {
                UnitKind::Header => ".cpp",
                UnitKind::Implementation => ".h",
            };
            return progress.skip(format!("corresponding {missing} file not found"));
        }
        progress.advance(UnitState::PairingChecked);

        /* ---------- generation + validation ---------- */
        progress.advance(UnitState::Generating);
        let prompt = build_prompt(unit, &self.requirements);
        let validator = Validator::new(&self.requirements, &unit.header_name());

        let candidate = match self.client.generate(prompt, &validator) {
            Ok(c) => c,
            Err(e) => return progress.fail(FailureStage::from(&e), e),
        };
        progress.outcome.backend = Some(candidate.provenance.backend.clone());
        progress.advance(UnitState::Validated);

        /* ---------- compile + run + measure ---------- */
        let run = match self.runner.run(&candidate.normalized, unit) {
            Ok(run) => run,
            Err(e) => return progress.fail(FailureStage::from(&e), e),
        };
        progress.advance(UnitState::Compiled);

        /* ---------- coverage gate ---------- */
        let result = match coverage::check(&run.coverage_report(), self.threshold) {
            Ok(r) => r,
            Err(e) => {
                if let CoverageError::BelowThreshold { percent, .. } = e {
                    progress.outcome.coverage = Some(percent);
                }
                return progress.fail(FailureStage::from(&e), e);
            }
        };
        progress.outcome.coverage = Some(result.percent);
        progress.advance(UnitState::CoverageChecked);

        if run.run_exit_code() != Some(0) {
            tracing::warn!(
                "Tests did not pass for {}, skipping file write",
                unit.display_name()
            );
            return progress.fail(FailureStage::Run, "test run did not exit cleanly");
        }

        /* ---------- persist ---------- */
        let path = match materialize_test(&self.out_dir, unit, &candidate.normalized) {
            Ok(p) => p,
            Err(e) => return progress.fail(FailureStage::Persist, e),
        };

        println!(
            "Unit tests saved to {} (coverage: {:.2}%)",
            path.display(),
            result.percent
        );
        tracing::info!("Successfully saved unit tests to {}", path.display());

        progress.outcome.output = Some(path);
        progress.advance(UnitState::Persisted);
        progress.outcome
    }
}
