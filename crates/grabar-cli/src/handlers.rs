//! Command handlers wiring the CLI onto the pipeline.

use std::fs;
use std::path::Path;

use grabar::runner::layout;
use grabar::{
    apply_parameterization, confirm_candidates, detect_candidates, render_data_file,
    CaptureEvent, CodeGenerator, ExecutionOrchestrator, LocatorExtractor, LocatorLibrary,
    MaintenanceService, RecordedStep, RecordingEngine, RemoteTarget, RunEvent, RunStatus,
    RunnerConfig, SignatureRegistry,
};
use tokio::sync::watch;
use tracing::debug;

use crate::commands::{CleanArgs, GenerateArgs, LibraryArgs, ParamsArgs, RunArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;

fn reporter_for(config: &CliConfig) -> ProgressReporter {
    ProgressReporter::new(config.use_color(), config.verbosity.is_quiet())
}

/// Read a capture dump and replay it through the recording engine
fn load_session(path: &Path) -> CliResult<Vec<RecordedStep>> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::session_dump(format!("{}: {e}", path.display())))?;
    let events: Vec<CaptureEvent> = serde_json::from_str(&content)
        .map_err(|e| CliError::session_dump(format!("{}: {e}", path.display())))?;

    let mut engine = RecordingEngine::new(LocatorExtractor::new(), SignatureRegistry::new());
    engine.start()?;
    for event in &events {
        engine.observe(event)?;
    }
    Ok(engine.stop()?)
}

/// Clean a session dump against the locator library
pub fn run_clean(config: &CliConfig, args: &CleanArgs) -> CliResult<()> {
    let reporter = reporter_for(config);
    let mut steps = load_session(&args.session)?;
    let library = LocatorLibrary::open(&args.library)?;
    let report = MaintenanceService::new(&library).clean(&mut steps)?;

    let target = args
        .output
        .clone()
        .unwrap_or_else(|| args.session.with_extension("steps.json"));
    fs::write(&target, serde_json::to_string_pretty(&steps)?)?;

    if report.is_noop() {
        reporter.success("session already matches the library");
    } else {
        reporter.success(&format!(
            "replaced {} locator(s), added {} new entr(ies) to {}",
            report.replaced,
            report.inserted,
            args.library.display()
        ));
    }
    Ok(())
}

/// Generate test source and data file from a session dump
pub fn run_generate(config: &CliConfig, args: &GenerateArgs) -> CliResult<()> {
    let reporter = reporter_for(config);
    let mut steps = load_session(&args.session)?;

    if let Some(library_path) = &args.library {
        let library = LocatorLibrary::open(library_path)?;
        let report = MaintenanceService::new(&library).clean(&mut steps)?;
        debug!(replaced = report.replaced, inserted = report.inserted, "cleanup before generation");
    }

    let test = CodeGenerator::new(&args.name).generate(&steps, None);
    fs::create_dir_all(&args.out_dir)?;
    let source_path = args.out_dir.join(test.source_file_name());
    fs::write(&source_path, &test.source)?;
    if let Some(data) = &test.data_file {
        fs::write(args.out_dir.join(test.data_file_name()), data)?;
    }

    reporter.success(&format!(
        "generated {} ({} steps)",
        source_path.display(),
        steps.len()
    ));
    Ok(())
}

/// Detect or apply parameterization on generated source
pub fn run_params(config: &CliConfig, args: &ParamsArgs) -> CliResult<()> {
    let reporter = reporter_for(config);
    let source = fs::read_to_string(&args.spec)?;
    let candidates = detect_candidates(&source)?;

    if candidates.is_empty() {
        reporter.info("no parameterizable literals found");
        return Ok(());
    }

    if !args.apply {
        for candidate in &candidates {
            reporter.info(&format!(
                "{:<24} {:<20} {}",
                candidate.suggested_name,
                format!("{:?}", candidate.original_value),
                candidate.label
            ));
        }
        return Ok(());
    }

    let map = confirm_candidates(&candidates);
    let applied = apply_parameterization(&source, &map)?;
    fs::write(&args.spec, applied)?;
    let data_path = args
        .data
        .clone()
        .unwrap_or_else(|| layout::data_file_for(&args.spec));
    fs::write(&data_path, render_data_file(&args.scenario_id, &map))?;

    reporter.success(&format!(
        "parameterized {} literal value(s); data file {}",
        map.len(),
        data_path.display()
    ));
    Ok(())
}

/// Run a generated test to a terminal status
pub fn run_run(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::config(format!("tokio runtime: {e}")))?;
    runtime.block_on(run_async(config, args))
}

async fn run_async(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let reporter = reporter_for(config);
    let runner_config = build_runner_config(args)?;

    let mut orchestrator = ExecutionOrchestrator::new(runner_config)?;
    if let Some(library_path) = &args.library {
        orchestrator = orchestrator.with_library(LocatorLibrary::open(library_path)?);
    }

    let mut events = orchestrator.subscribe();
    let quiet = config.verbosity.is_quiet();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let RunEvent::Output { line, .. } = event {
                if !quiet {
                    println!("{line}");
                }
            }
        }
    });

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let outcome = orchestrator.run(&args.name, cancel_rx).await;
    drop(orchestrator);
    let _ = printer.await;
    let record = outcome?;

    reporter.info(&format!(
        "{} {} ({})",
        reporter.status_label(record.status),
        record.test_name,
        record.run_id
    ));
    if let Some(dir) = &record.artifact_dir {
        reporter.info(&format!("artifacts: {}", dir.display()));
    }
    for key in &record.failing_keys {
        reporter.error(&format!("failing locator key: {key}"));
    }

    match record.status {
        RunStatus::Passed => Ok(()),
        status => Err(CliError::RunFinished {
            status: format!("{status:?}"),
        }),
    }
}

fn build_runner_config(args: &RunArgs) -> CliResult<RunnerConfig> {
    let mut runner_config = RunnerConfig::new(&args.workspace, &args.artifacts);
    if let Some(program) = &args.program {
        runner_config = runner_config.with_command(program, args.args.clone());
    } else if !args.args.is_empty() {
        return Err(CliError::invalid_argument(
            "--arg requires --program".to_string(),
        ));
    }

    match (&args.remote_host, args.browser, &args.platform) {
        (None, None, None) => {}
        (Some(host), Some(browser), Some(platform)) => {
            runner_config =
                runner_config.with_remote(RemoteTarget::new(host, browser.into(), platform));
        }
        _ => {
            return Err(CliError::invalid_argument(
                "remote runs need --remote-host, --browser and --platform together".to_string(),
            ));
        }
    }
    Ok(runner_config)
}

/// Inspect or compact the locator library
pub fn run_library(config: &CliConfig, args: &LibraryArgs) -> CliResult<()> {
    let reporter = reporter_for(config);
    let library = LocatorLibrary::open(&args.path)?;

    if args.compact {
        library.compact()?;
        reporter.success(&format!(
            "compacted {} entr(ies) in {}",
            library.len(),
            args.path.display()
        ));
        return Ok(());
    }

    let mut entries = library.entries();
    entries.sort_by(|a, b| a.locator_key.cmp(&b.locator_key));
    for entry in &entries {
        reporter.info(&format!(
            "{}  {:<9} {:<32} {}",
            entry.locator_key,
            entry.strategy.name(),
            entry.value,
            reporter.health_label(entry.status)
        ));
    }
    reporter.info(&format!("{} entr(ies)", entries.len()));
    Ok(())
}
