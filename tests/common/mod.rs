#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;

use unitgate::discovery::SourceUnit;
use unitgate::error::{BackendError, SandboxError};
use unitgate::llm::backend::{GenerationBackend, GenerationRequest};
use unitgate::testgen::sandbox::{CandidateRunner, SandboxRun, StageOutput};

/// Four CalculatorTest cases that satisfy every structural rule.
pub fn valid_tests(header: &str) -> String {
    format!(
        r#"#include <gtest/gtest.h>
#include <cmath>
#include <stdexcept>
#include "{header}"

TEST(CalculatorTest, Add_PositiveNumbers) {{
    Calculator calc;
    EXPECT_EQ(calc.add(2, 3), 5);
}}

TEST(CalculatorTest, Add_NegativeNumbers) {{
    Calculator calc;
    EXPECT_EQ(calc.add(-2, -3), -5);
}}

TEST(CalculatorTest, Subtract_PositiveNumbers) {{
    Calculator calc;
    EXPECT_EQ(calc.subtract(5, 3), 2);
}}

TEST(CalculatorTest, Subtract_NegativeNumbers) {{
    Calculator calc;
    EXPECT_EQ(calc.subtract(-5, -3), -2);
}}"#
    )
}

/// Header name the prompt asks the model to include.
pub fn header_in_prompt(prompt: &str) -> String {
    let start = prompt.find("#include \"").map(|i| i + "#include \"".len()).unwrap();
    let end = prompt[start..].find('"').unwrap();
    prompt[start..start + end].to_string()
}

type Reply = Box<dyn Fn(usize, &GenerationRequest) -> Result<String, BackendError>>;

/// Backend whose replies are computed from the call index and request.
pub struct ScriptedBackend {
    pub models: Result<Vec<String>, String>,
    reply: Reply,
    pub calls: RefCell<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    pub fn new(
        models: &[&str],
        reply: impl Fn(usize, &GenerationRequest) -> Result<String, BackendError> + 'static,
    ) -> Self {
        Self {
            models: Ok(models.iter().map(|m| m.to_string()).collect()),
            reply: Box::new(reply),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Always answers with valid tests for whatever header the prompt names.
    pub fn always_valid() -> Self {
        Self::new(&[], |_, req| Ok(valid_tests(&header_in_prompt(&req.prompt))))
    }

    pub fn call_models(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|r| r.model.clone()).collect()
    }
}

impl GenerationBackend for ScriptedBackend {
    fn list_models(&self) -> Result<Vec<String>, BackendError> {
        self.models.clone().map_err(BackendError::Remote)
    }

    fn generate(&self, req: &GenerationRequest) -> Result<String, BackendError> {
        let idx = self.calls.borrow().len();
        self.calls.borrow_mut().push(req.clone());
        (self.reply)(idx, req)
    }
}

pub fn stage(code: i32, stdout: &str) -> StageOutput {
    StageOutput {
        command: "stub".to_string(),
        exit_code: Some(code),
        stdout: stdout.to_string(),
        stderr: String::new(),
        duration_ms: 0,
        spawn_error: None,
    }
}

pub fn passing_run(percent: f64) -> SandboxRun {
    SandboxRun {
        workdir: PathBuf::from("/tmp/unit-test-generator-stub"),
        binary: PathBuf::from("/tmp/unit-test-generator-stub/run_tests"),
        compile: stage(0, ""),
        run: stage(0, "[  PASSED  ] 4 tests."),
        coverage: stage(
            0,
            &format!("File 'calc.cpp'\nLines executed:{percent:.2}% of 25\nCreating 'calc.cpp.gcov'\n"),
        ),
    }
}

pub enum Scripted {
    Coverage(f64),
    CompileError,
    RunError,
}

/// Runner keyed by the unit's file name; unknown names pass at 92%.
#[derive(Default)]
pub struct StubRunner {
    pub by_file: HashMap<String, Scripted>,
    pub seen: RefCell<Vec<String>>,
}

impl StubRunner {
    pub fn with(mut self, file: &str, s: Scripted) -> Self {
        self.by_file.insert(file.to_string(), s);
        self
    }
}

impl CandidateRunner for StubRunner {
    fn run(&self, _test_code: &str, unit: &SourceUnit) -> Result<SandboxRun, SandboxError> {
        let name = unit.path.file_name().unwrap().to_string_lossy().to_string();
        self.seen.borrow_mut().push(name.clone());

        match self.by_file.get(&name) {
            None => Ok(passing_run(92.0)),
            Some(Scripted::Coverage(p)) => Ok(passing_run(*p)),
            Some(Scripted::CompileError) => Err(SandboxError::CompileFailed(StageOutput {
                stderr: "test.cpp:7:5: error: 'Calculator' was not declared in this scope".into(),
                ..stage(1, "")
            })),
            Some(Scripted::RunError) => Err(SandboxError::RunFailed(stage(
                1,
                "[  FAILED  ] CalculatorTest.Add_NegativeNumbers",
            ))),
        }
    }
}
