//! Command-line runner for PER scripts
//!
//! Loads the parse artifact the grammar front end leaves next to a `.pers`
//! script, type-checks it, and runs tests or routines against the
//! configured device complement (loopback unless a bench config says
//! otherwise).

mod config;

use clap::Parser;
use config::RunnerConfig;
use per_engine::ast::ParseOutcome;
use per_engine::config::constants::script::{PARSE_ARTIFACT_SUFFIX, SCRIPT_EXTENSION};
use per_engine::devices::{Devices, StdinConsole};
use per_engine::interp::StdoutSink;
use per_engine::logging::{self, LogLevel};
use per_engine::pipeline::{analyze, PipelineError, Program, RunReport};
use per_engine::template::create_template_script;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("script {} does not carry the .{} extension", .0.display(), SCRIPT_EXTENSION)]
    BadExtension(PathBuf),

    #[error("no parse artifact at {}; run the script through the front end first", .0.display())]
    MissingArtifact(PathBuf),

    #[error("parse artifact is not readable: {0}")]
    BadArtifact(#[from] serde_json::Error),

    #[error("script has {0} static error(s)")]
    Rejected(usize),

    #[error("unknown device selector \"{0}\"")]
    UnknownDevice(String),

    #[error(transparent)]
    Device(#[from] per_engine::devices::DeviceError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Run PER hardware test sequences
#[derive(Debug, Parser)]
#[command(name = "per_runner", version, about)]
struct Cli {
    /// Script to run (must end in .pers)
    script: Option<PathBuf>,

    /// Type-check only; execute nothing
    #[arg(long)]
    validate: bool,

    /// Run only the named tests, in order
    #[arg(short = 'T', long = "run-tests", value_name = "NAME")]
    run_tests: Vec<String>,

    /// Run the named routines instead of tests
    #[arg(short = 'R', long = "run-routines", value_name = "NAME")]
    run_routines: Vec<String>,

    /// Write a skeleton script and exit
    #[arg(short = 'g', long = "generate-sample", value_name = "DEST")]
    generate_sample: Option<PathBuf>,

    /// Bench configuration (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Append log output to a file
    #[arg(short = 'l', long = "log", value_name = "FILE")]
    log: Option<PathBuf>,

    /// Write the run report as JSON
    #[arg(long = "report-json", value_name = "FILE")]
    report_json: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(all_passed) => {
            if all_passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool, RunnerError> {
    let config = match &cli.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };

    let verbose = cli.verbose || config.verbose.unwrap_or(false);
    let logger = logging::init_with_level(if verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });
    if let Some(path) = cli.log.as_deref().or(config.log_file.as_deref()) {
        logger.set_log_file(path)?;
    }

    if let Some(dest) = &cli.generate_sample {
        let written = create_template_script(dest)?;
        println!("template written to {}", written.display());
        return Ok(true);
    }

    let Some(script) = &cli.script else {
        eprintln!("error: a script path is required unless --generate-sample is given");
        return Ok(false);
    };
    let mut program = load_program(script)?;

    if cli.validate {
        println!(
            "{}: well-typed ({} routine(s), {} test(s))",
            script.display(),
            program.routines().len(),
            program.tests().len()
        );
        return Ok(true);
    }

    let mut devices = build_devices(&config)?;
    let mut output = StdoutSink;

    if !cli.run_routines.is_empty() {
        for name in &cli.run_routines {
            program.run_routine(name, &mut devices, &mut output)?;
        }
        return Ok(true);
    }

    let report = if cli.run_tests.is_empty() {
        program.run_all_tests(&mut devices, &mut output)
    } else {
        program.run_tests(&cli.run_tests, &mut devices, &mut output)?
    };

    print_summary(&report);
    if let Some(path) = &cli.report_json {
        let json = report
            .to_json()
            .map_err(RunnerError::BadArtifact)?;
        std::fs::write(path, json)?;
    }
    Ok(report.all_passed())
}

/// Reject non-.pers paths, then load and analyze the sibling parse artifact
fn load_program(script: &Path) -> Result<Program, RunnerError> {
    if script.extension().and_then(|e| e.to_str()) != Some(SCRIPT_EXTENSION) {
        return Err(RunnerError::BadExtension(script.to_path_buf()));
    }
    let artifact = artifact_path(script);
    if !artifact.exists() {
        return Err(RunnerError::MissingArtifact(artifact));
    }
    let raw = std::fs::read_to_string(&artifact)?;
    let outcome: ParseOutcome = serde_json::from_str(&raw)?;
    analyze(outcome).map_err(|diags| RunnerError::Rejected(diags.len()))
}

/// `bench.pers` -> `bench.pers.ast.json`
fn artifact_path(script: &Path) -> PathBuf {
    let mut raw = script.as_os_str().to_os_string();
    raw.push(".");
    raw.push(PARSE_ARTIFACT_SUFFIX);
    PathBuf::from(raw)
}

/// Only the loopback complement ships in-tree; real adapter selectors come
/// from out-of-tree drivers
fn build_devices(config: &RunnerConfig) -> Result<Devices, RunnerError> {
    let mut devices = Devices::loopback();
    devices.console = Box::new(StdinConsole);

    if let Some(selector) = &config.can_device {
        if selector != "loopback" {
            return Err(RunnerError::UnknownDevice(selector.clone()));
        }
        devices.can.open(selector, config.bit_rate())?;
    }
    Ok(devices)
}

fn print_summary(report: &RunReport) {
    for result in &report.results {
        println!("{:<40} {}", result.name, result.state.as_str());
    }
    println!("{} passed, {} failed", report.passed, report.failed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_shape() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_artifact_path_is_appended() {
        assert_eq!(
            artifact_path(Path::new("bench.pers")),
            PathBuf::from("bench.pers.ast.json")
        );
    }

    #[test]
    fn test_wrong_extension_is_rejected() {
        let err = load_program(Path::new("bench.txt")).unwrap_err();
        assert!(matches!(err, RunnerError::BadExtension(_)));
    }

    #[test]
    fn test_unknown_can_selector_is_rejected() {
        let config = RunnerConfig {
            can_device: Some("pcan-usb0".into()),
            ..RunnerConfig::default()
        };
        let err = match build_devices(&config) {
            Ok(_) => panic!("unknown selector must be rejected"),
            Err(err) => err,
        };
        assert!(matches!(err, RunnerError::UnknownDevice(_)));
    }
}
