//! testgen/coverage.rs
//!
//! Parses gcov's textual summary and applies the line-coverage threshold.

use regex::Regex;
use serde::Serialize;

use crate::error::CoverageError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageResult {
    pub percent: f64,
    pub total_lines: u64,
}

/// Extracts the first `Lines executed:X% of N` line.
pub fn parse_report(report: &str) -> Result<(f64, u64), CoverageError> {
    let re = Regex::new(r"Lines executed:\s*([\d.]+)% of (\d+)").unwrap();

    let caps = re
        .captures(report)
        .ok_or_else(|| CoverageError::Unparseable(report.trim().to_string()))?;

    let percent = caps[1]
        .parse::<f64>()
        .map_err(|_| CoverageError::Unparseable(caps[0].to_string()))?;
    let total = caps[2]
        .parse::<u64>()
        .map_err(|_| CoverageError::Unparseable(caps[0].to_string()))?;

    Ok((percent, total))
}

/// `Ok` means the gate passed. Below the threshold is a quality rejection,
/// distinct from a report that could not be parsed at all. The threshold
/// itself passes.
pub fn check(report: &str, threshold: f64) -> Result<CoverageResult, CoverageError> {
    let (percent, total_lines) = parse_report(report)?;
    tracing::info!("Code coverage: {:.2}%", percent);

    if percent < threshold {
        return Err(CoverageError::BelowThreshold { percent, threshold });
    }

    Ok(CoverageResult {
        percent,
        total_lines,
    })
}
