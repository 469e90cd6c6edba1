use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;

use unitgate::{
    config::{self, BackendConfig, FileConfig},
    discovery,
    error::StartupError,
    llm::{backend::GenerationBackend, client::GenerationClient, ollama::OllamaBackend},
    logger,
    orchestrator::Pipeline,
    state::RunReport,
    testgen::sandbox::GccSandbox,
};

#[derive(Parser)]
#[command(
    name = "unitgate",
    version,
    about = "Generate GoogleTest unit tests for C++ sources with a local LLM, keeping only suites that compile, pass and reach 80% line coverage."
)]
struct Cli {
    #[arg(long, default_value = "./codebase", help = "Directory of paired .h/.cpp files")]
    codebase: PathBuf,

    #[arg(long, default_value = "./tests", help = "Where accepted *_test.cpp files are written")]
    out: PathBuf,

    #[arg(long, help = "Primary model (default qwen2.5-coder:7b)")]
    model: Option<String>,

    #[arg(long, help = "Directory for raw_response_* debug artifacts (default .)")]
    debug_dir: Option<PathBuf>,

    #[arg(long, help = "TOML config overriding generation/requirements/toolchain")]
    config: Option<PathBuf>,

    #[arg(long, help = "Write the run report as JSON to this file")]
    report: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    logger::init();
    let cli = Cli::parse();
    tracing::info!("Starting unit test generator");

    let report = run(cli)?;
    tracing::info!(
        "Unit test generation completed: {} persisted, {} skipped, {} failed",
        report.persisted(),
        report.skipped(),
        report.failed()
    );
    Ok(())
}

fn run(cli: Cli) -> Result<RunReport, StartupError> {
    /* ---------- configuration ---------- */
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let FileConfig {
        mut generation,
        requirements,
        toolchain,
    } = config::load_file_config(&config_path)?;

    if let Some(model) = cli.model {
        generation.primary_model = model;
    }
    if let Some(dir) = cli.debug_dir {
        generation.debug_dir = dir;
    }

    /* ---------- backend ---------- */
    let backend_cfg = BackendConfig::from_env()?;
    let backend = OllamaBackend::new(&backend_cfg, generation.attempt_timeout)
        .map_err(StartupError::BackendUnreachable)?;
    let models = backend
        .list_models()
        .map_err(StartupError::BackendUnreachable)?;
    tracing::info!("Ollama server running, available models: {:?}", models);

    /* ---------- inputs / outputs ---------- */
    let units = discovery::read_codebase(&cli.codebase, &requirements.symbols).map_err(
        |source| StartupError::Discovery {
            path: cli.codebase.clone(),
            source,
        },
    )?;

    fs::create_dir_all(&cli.out).map_err(|source| StartupError::OutputDir {
        path: cli.out.clone(),
        source,
    })?;
    tracing::info!("Tests directory ready: {}", cli.out.display());

    /* ---------- pipeline ---------- */
    let runner = GccSandbox::new(toolchain, &requirements);
    let client = GenerationClient::new(backend, generation);
    let pipeline = Pipeline::new(client, runner, requirements, cli.out);

    let report = pipeline.run(&units);

    if let Some(path) = cli.report {
        write_report(&path, &report)?;
    }

    Ok(report)
}

fn write_report(path: &Path, report: &RunReport) -> Result<(), StartupError> {
    let to_err = |source| StartupError::Report {
        path: path.to_path_buf(),
        source,
    };
    let text = serde_json::to_string_pretty(report)
        .map_err(|e| to_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    fs::write(path, text).map_err(to_err)
}
