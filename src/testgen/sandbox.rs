// Compiles and runs one candidate in a throwaway directory, then asks
// gcov for line coverage. No retries; a broken candidate stays broken.
//
// Subprocesses run without a timeout. A hung compiler or test binary
// blocks the batch.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Instant;

use tempfile::TempDir;

use crate::config::{TestRequirements, ToolchainConfig};
use crate::discovery::SourceUnit;
use crate::error::SandboxError;

const TEST_FILE: &str = "test.cpp";
const BINARY: &str = "run_tests";
const OUTPUT_LIMIT: usize = 10_000;

/// Captured result of one subprocess step.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u128,
    /// Set when the program could not be started at all.
    pub spawn_error: Option<String>,
}

impl StageOutput {
    fn from_output(command: String, out: Output, started: Instant) -> Self {
        Self {
            command,
            exit_code: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            duration_ms: started.elapsed().as_millis(),
            spawn_error: None,
        }
    }

    fn from_spawn_error(command: String, err: &io::Error, started: Instant) -> Self {
        Self {
            command,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: started.elapsed().as_millis(),
            spawn_error: Some(err.to_string()),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn status_label(&self) -> String {
        match (&self.spawn_error, self.exit_code) {
            (Some(err), _) => format!("could not start {}: {err}", self.command),
            (None, Some(code)) => format!("exit status {code}"),
            (None, None) => "terminated by signal".to_string(),
        }
    }

    /// stdout then stderr, each under a banner when non-empty.
    pub fn combined(&self) -> String {
        let mut out = String::new();

        if !self.stdout.trim().is_empty() {
            out.push_str("=== STDOUT ===\n");
            out.push_str(self.stdout.trim());
            out.push('\n');
        }

        if !self.stderr.trim().is_empty() {
            out.push_str("=== STDERR ===\n");
            out.push_str(self.stderr.trim());
        }

        truncate_output(&out)
    }
}

/// Captured output of a successful sandbox pass.
#[derive(Debug, Clone)]
pub struct SandboxRun {
    /// Where the pass ran. Removed before `run` returns; for logs and
    /// reports only.
    pub workdir: PathBuf,
    /// The compiled test binary inside `workdir`. Diagnostics only, it no
    /// longer exists on disk.
    pub binary: PathBuf,
    pub compile: StageOutput,
    pub run: StageOutput,
    pub coverage: StageOutput,
}

impl SandboxRun {
    pub fn run_exit_code(&self) -> Option<i32> {
        self.run.exit_code
    }

    /// Text handed to the coverage gate.
    pub fn coverage_report(&self) -> String {
        format!("{}{}", self.coverage.stdout, self.coverage.stderr)
    }
}

/// Compile + run + measure. `GccSandbox` shells out; tests substitute stubs.
pub trait CandidateRunner {
    fn run(&self, test_code: &str, unit: &SourceUnit) -> Result<SandboxRun, SandboxError>;
}

impl<T: CandidateRunner + ?Sized> CandidateRunner for &T {
    fn run(&self, test_code: &str, unit: &SourceUnit) -> Result<SandboxRun, SandboxError> {
        (**self).run(test_code, unit)
    }
}

pub struct GccSandbox {
    toolchain: ToolchainConfig,
    language_standard: String,
}

impl GccSandbox {
    pub fn new(toolchain: ToolchainConfig, req: &TestRequirements) -> Self {
        Self {
            toolchain,
            language_standard: req.language_standard.clone(),
        }
    }

    fn compile_command(&self, dir: &Path, sources: &[String]) -> Command {
        let tc = &self.toolchain;
        let mut cmd = Command::new(&tc.compiler);

        cmd.arg(format!("-std={}", self.language_standard));
        cmd.arg(format!("-I{}", tc.gtest_prefix.join("include").display()));
        for inc in &tc.include_dirs {
            cmd.arg(format!("-I{}", inc.display()));
        }
        cmd.arg(format!("-I{}", dir.display()));
        cmd.arg(format!("-L{}", tc.gtest_prefix.join("lib").display()));
        for lib in &tc.lib_dirs {
            cmd.arg(format!("-L{}", lib.display()));
        }
        cmd.args(["-fprofile-arcs", "-ftest-coverage"]);
        cmd.args(sources);
        // Libraries after the objects that reference them.
        cmd.args(["-lgtest", "-lgtest_main", "-pthread"]);
        cmd.arg("-o").arg(dir.join(BINARY));

        cmd.current_dir(dir)
            .env("GCOV_PREFIX", dir)
            .env("GCOV_PREFIX_STRIP", "0");
        cmd
    }
}

impl CandidateRunner for GccSandbox {
    fn run(&self, test_code: &str, unit: &SourceUnit) -> Result<SandboxRun, SandboxError> {
        let source = unit
            .implementation_path()
            .ok_or_else(|| SandboxError::Setup {
                context: format!("no implementation file for {}", unit.display_name()),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing .cpp"),
            })?;

        // Removed on drop, on every exit path.
        let dir = tempfile::Builder::new()
            .prefix("unit-test-generator-")
            .tempdir()
            .map_err(|source| setup("failed to create temp directory", source))?;

        let source_name = materialize_inputs(&dir, test_code, source, unit.header_path())?;
        let root = dir.path();

        /* ---------- compile ---------- */
        let cmd = self.compile_command(root, &[TEST_FILE.to_string(), source_name.clone()]);
        let compile = run_stage(cmd, SandboxError::CompileFailed)?;
        if !compile.success() || has_hard_error(&compile) {
            return Err(SandboxError::CompileFailed(compile));
        }
        tracing::info!("Tests compiled successfully");

        /* ---------- run ---------- */
        let binary = root.join(BINARY);
        let mut cmd = Command::new(&binary);
        cmd.current_dir(root);
        let run = run_stage(cmd, SandboxError::RunFailed)?;
        if !run.success() {
            return Err(SandboxError::RunFailed(run));
        }
        tracing::info!("Tests passed successfully");

        /* ---------- coverage ---------- */
        let mut cmd = Command::new(&self.toolchain.coverage_tool);
        cmd.arg("-r").arg(&source_name).current_dir(root);
        let coverage = run_stage(cmd, SandboxError::CoverageToolFailed)?;
        if !coverage.success() {
            return Err(SandboxError::CoverageToolFailed(coverage));
        }

        Ok(SandboxRun {
            workdir: root.to_path_buf(),
            binary,
            compile,
            run,
            coverage,
        })
    }
}

/* ============================================================
   Helpers
   ============================================================ */

/// Writes the test and copies the sources, keeping base names. Returns
/// the base name of the implementation file.
fn materialize_inputs(
    dir: &TempDir,
    test_code: &str,
    source: &Path,
    header: Option<&Path>,
) -> Result<String, SandboxError> {
    fs::write(dir.path().join(TEST_FILE), test_code)
        .map_err(|e| setup("failed to write test file", e))?;

    let source_name = copy_into(dir.path(), source)?;
    if let Some(h) = header.filter(|h| h.is_file()) {
        copy_into(dir.path(), h)?;
    }
    Ok(source_name)
}

fn copy_into(dir: &Path, file: &Path) -> Result<String, SandboxError> {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            setup(
                "source has no file name",
                std::io::Error::new(std::io::ErrorKind::InvalidInput, file.display().to_string()),
            )
        })?
        .to_string();

    fs::copy(file, dir.join(&name))
        .map_err(|e| setup(&format!("failed to copy {}", file.display()), e))?;
    Ok(name)
}

/// A program that cannot be started fails its own step, tagged by `fail`.
fn run_stage(
    mut cmd: Command,
    fail: fn(StageOutput) -> SandboxError,
) -> Result<StageOutput, SandboxError> {
    let label = format!("{cmd:?}");
    tracing::info!("Running: {}", label);

    let started = Instant::now();
    match cmd.output() {
        Ok(out) => Ok(StageOutput::from_output(label, out, started)),
        Err(e) => Err(fail(StageOutput::from_spawn_error(label, &e, started))),
    }
}

/// Keeps the last `OUTPUT_LIMIT` characters; compiler errors pile up at the end.
fn truncate_output(s: &str) -> String {
    let count = s.chars().count();
    if count <= OUTPUT_LIMIT {
        return s.to_string();
    }

    let tail: String = s.chars().skip(count - OUTPUT_LIMIT).collect();
    format!("...truncated...\n{tail}")
}

fn has_hard_error(out: &StageOutput) -> bool {
    out.stdout.contains("fatal error:") || out.stderr.contains("fatal error:")
}

fn setup(context: &str, source: std::io::Error) -> SandboxError {
    SandboxError::Setup {
        context: context.to_string(),
        source,
    }
}
