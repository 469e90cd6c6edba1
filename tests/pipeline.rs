mod common;

use std::fs;
use std::path::Path;
use std::time::Duration;

use pretty_assertions::assert_eq;
use unitgate::config::{GenerationConfig, TestRequirements};
use unitgate::discovery::{read_codebase, SourceUnit};
use unitgate::llm::client::GenerationClient;
use unitgate::orchestrator::Pipeline;
use unitgate::state::{FailureStage, UnitState};

use common::{header_in_prompt, valid_tests, Scripted, ScriptedBackend, StubRunner};

const CALC_H: &str = "#pragma once\nclass Calculator {\npublic:\n    int add(int a, int b);\n    int subtract(int a, int b);\n};\n";
const CALC_CPP: &str = "#include \"calc.h\"\nint Calculator::add(int a, int b) { return a + b; }\nint Calculator::subtract(int a, int b) { return a - b; }\n";

fn write_pair(dir: &Path, stem: &str) {
    fs::write(dir.join(format!("{stem}.h")), CALC_H).unwrap();
    fs::write(
        dir.join(format!("{stem}.cpp")),
        CALC_CPP.replace("calc.h", &format!("{stem}.h")),
    )
    .unwrap();
}

fn unit(dir: &Path, file: &str) -> SourceUnit {
    let path = dir.join(file);
    let content = fs::read_to_string(&path).unwrap();
    SourceUnit::new(path, content, TestRequirements::default().symbols).unwrap()
}

fn client<'a>(backend: &'a ScriptedBackend, debug: &Path) -> GenerationClient<&'a ScriptedBackend> {
    GenerationClient::new(
        backend,
        GenerationConfig {
            backoff: Duration::ZERO,
            debug_dir: debug.to_path_buf(),
            ..GenerationConfig::default()
        },
    )
}

#[test]
fn compile_failure_does_not_block_other_units() {
    let codebase = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    for stem in ["alpha", "beta", "gamma"] {
        write_pair(codebase.path(), stem);
    }

    let units = vec![
        unit(codebase.path(), "alpha.cpp"),
        unit(codebase.path(), "beta.cpp"),
        unit(codebase.path(), "gamma.cpp"),
    ];

    let backend = ScriptedBackend::always_valid();
    let runner = StubRunner::default().with("beta.cpp", Scripted::CompileError);
    let pipeline = Pipeline::new(
        client(&backend, out.path()),
        &runner,
        TestRequirements::default(),
        out.path(),
    );

    let report = pipeline.run(&units);

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.outcomes[0].state, UnitState::Persisted);
    assert!(matches!(
        report.outcomes[1].state,
        UnitState::Failed {
            stage: FailureStage::Compile,
            ..
        }
    ));
    assert_eq!(report.outcomes[2].state, UnitState::Persisted);
    assert!(report.outcomes.iter().all(|o| o.state.is_terminal()));

    assert!(out.path().join("alpha_test.cpp").is_file());
    assert!(!out.path().join("beta_test.cpp").exists());
    assert!(out.path().join("gamma_test.cpp").is_file());
    assert_eq!(*runner.seen.borrow(), vec!["alpha.cpp", "beta.cpp", "gamma.cpp"]);
    assert_eq!((report.persisted(), report.failed(), report.skipped()), (2, 1, 0));
}

#[test]
fn unpaired_unit_is_skipped_without_generation() {
    let codebase = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    fs::write(codebase.path().join("orphan.cpp"), CALC_CPP).unwrap();

    let backend = ScriptedBackend::always_valid();
    let runner = StubRunner::default();
    let pipeline = Pipeline::new(
        client(&backend, out.path()),
        &runner,
        TestRequirements::default(),
        out.path(),
    );

    let outcome = pipeline.process_unit(&unit(codebase.path(), "orphan.cpp"));

    assert_eq!(
        outcome.state,
        UnitState::Skipped {
            reason: "corresponding .h file not found".into()
        }
    );
    assert_eq!(outcome.trail, vec!["discovered", "skipped"]);
    assert!(backend.calls.borrow().is_empty());
    assert!(runner.seen.borrow().is_empty());
}

#[test]
fn low_coverage_is_a_quality_rejection() {
    let codebase = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_pair(codebase.path(), "calc");

    let backend = ScriptedBackend::always_valid();
    let runner = StubRunner::default().with("calc.cpp", Scripted::Coverage(79.99));
    let pipeline = Pipeline::new(
        client(&backend, out.path()),
        &runner,
        TestRequirements::default(),
        out.path(),
    );

    let outcome = pipeline.process_unit(&unit(codebase.path(), "calc.cpp"));

    match &outcome.state {
        UnitState::Failed { stage, reason } => {
            assert_eq!(*stage, FailureStage::CoverageThreshold);
            assert!(reason.contains("79.99%"));
        }
        other => panic!("unexpected state {other:?}"),
    }
    assert_eq!(outcome.coverage, Some(79.99));
    assert!(!out.path().join("calc_test.cpp").exists());
}

#[test]
fn failing_tests_are_not_persisted() {
    let codebase = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_pair(codebase.path(), "calc");

    let backend = ScriptedBackend::always_valid();
    let runner = StubRunner::default().with("calc.cpp", Scripted::RunError);
    let pipeline = Pipeline::new(
        client(&backend, out.path()),
        &runner,
        TestRequirements::default(),
        out.path(),
    );

    let outcome = pipeline.process_unit(&unit(codebase.path(), "calc.cpp"));

    assert!(matches!(
        outcome.state,
        UnitState::Failed {
            stage: FailureStage::Run,
            ..
        }
    ));
    assert!(!out.path().join("calc_test.cpp").exists());
}

#[test]
fn exhausted_generation_fails_the_unit() {
    let codebase = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_pair(codebase.path(), "calc");

    let backend = ScriptedBackend::new(&["backup"], |_, _| Ok("no tests here".to_string()));
    let runner = StubRunner::default();
    let pipeline = Pipeline::new(
        client(&backend, out.path()),
        &runner,
        TestRequirements::default(),
        out.path(),
    );

    let outcome = pipeline.process_unit(&unit(codebase.path(), "calc.cpp"));

    assert!(matches!(
        outcome.state,
        UnitState::Failed {
            stage: FailureStage::Generation,
            ..
        }
    ));
    assert_eq!(backend.calls.borrow().len(), 6);
    assert!(runner.seen.borrow().is_empty());
}

#[test]
fn calc_pair_end_to_end_with_stubs() {
    let codebase = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_pair(codebase.path(), "calc");

    let units = read_codebase(codebase.path(), &TestRequirements::default().symbols).unwrap();
    assert_eq!(units.len(), 2);

    let backend = ScriptedBackend::new(&[], |_, req| {
        Ok(format!("```cpp\n{}\n```\n", valid_tests(&header_in_prompt(&req.prompt))))
    });
    let runner = StubRunner::default()
        .with("calc.cpp", Scripted::Coverage(92.0))
        .with("calc.h", Scripted::Coverage(92.0));
    let pipeline = Pipeline::new(
        client(&backend, out.path()),
        &runner,
        TestRequirements::default(),
        out.path().join("tests"),
    );

    let report = pipeline.run(&units);

    assert_eq!(report.persisted(), 2);
    assert_eq!(backend.calls.borrow().len(), 2);

    let written: Vec<_> = fs::read_dir(out.path().join("tests"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(written, vec!["calc_test.cpp"]);
    assert_eq!(
        fs::read_to_string(out.path().join("tests/calc_test.cpp")).unwrap(),
        valid_tests("calc.h")
    );

    let first = &report.outcomes[0];
    assert_eq!(first.coverage, Some(92.0));
    assert_eq!(first.backend.as_deref(), Some("qwen2.5-coder:7b"));
    assert_eq!(
        first.trail,
        vec![
            "discovered",
            "pairing-checked",
            "generating",
            "validated",
            "compiled",
            "coverage-checked",
            "persisted"
        ]
    );
}

#[test]
fn report_serializes_states() {
    let codebase = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    fs::write(codebase.path().join("orphan.h"), CALC_H).unwrap();

    let backend = ScriptedBackend::always_valid();
    let runner = StubRunner::default();
    let pipeline = Pipeline::new(
        client(&backend, out.path()),
        &runner,
        TestRequirements::default(),
        out.path(),
    );

    let report = pipeline.run(&[unit(codebase.path(), "orphan.h")]);
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["outcomes"][0]["state"]["state"], "skipped");
    assert_eq!(
        json["outcomes"][0]["state"]["reason"],
        "corresponding .cpp file not found"
    );
}
