use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use splitwatch::config::{Settings, load_settings};
use splitwatch::definition::ProcessorGenerator;
use splitwatch::engine::SignalRegistry;
use splitwatch::perception::{FrameDirectoryCapture, Perception, RecordedPredictions};
use splitwatch::processes::standard_registry;
use splitwatch::run::{RunListener, Runner, StopReason};
use splitwatch::timer::{DryRunTimer, LiveSplitClient, TimerClient};
use splitwatch::{SplitError, StateSnapshot, assemble_switch, load_route};

mod cli;

use cli::Cli;
use cli::commands::Commands;

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("splitwatch")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("splitwatch.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none()
        && let Some(level) = level
    {
        builder.parse_filters(level);
    }
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Prints state changes and errors to the terminal
struct ConsoleListener {
    json: bool,
}

impl RunListener for ConsoleListener {
    fn on_update(&mut self, snapshot: &StateSnapshot) {
        if self.json {
            match serde_json::to_string(snapshot) {
                Ok(line) => println!("{}", line),
                Err(e) => log::warn!("Cannot serialize snapshot: {}", e),
            }
            return;
        }
        println!(
            "{} progress {:>3}  split {:>2}  {}",
            snapshot.captured_at.format("%H:%M:%S%.3f").to_string().dimmed(),
            snapshot.progress.to_string().green(),
            snapshot.split_index.to_string().cyan(),
            snapshot.fade_status
        );
    }

    fn on_error(&mut self, error: &SplitError) {
        eprintln!("{} {}", "Error:".red(), error);
    }
}

fn run_application(cli: &Cli, settings: &Settings) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run {
            route,
            frames,
            predictions,
            dry_run,
            json,
        } => handle_run_command(route, frames, predictions.as_deref(), *dry_run, *json, cli, settings),
        Commands::CheckRoute { route } => handle_check_route_command(route),
        Commands::CheckDefinitions { logic, route } => {
            handle_check_definitions_command(logic, route.as_deref(), cli, settings)
        }
    }
}

fn handle_run_command(
    route_path: &Path,
    frames: &Path,
    predictions: Option<&Path>,
    dry_run: bool,
    json: bool,
    cli: &Cli,
    settings: &Settings,
) -> Result<()> {
    let route = load_route(route_path).context("Failed to load route")?;
    let switch = assemble_switch(settings, &route).context("Failed to generate processors")?;

    let capture = FrameDirectoryCapture::open(frames, settings.regions.rects.clone()).context("Failed to open frames")?;
    let model = match predictions {
        Some(path) => RecordedPredictions::load(path).context("Failed to load predictions")?,
        None => {
            println!("{}", "No predictions given; progress will not be tracked".yellow());
            RecordedPredictions::default()
        }
    };
    let timer: Box<dyn TimerClient> = if dry_run {
        Box::new(DryRunTimer::new())
    } else {
        Box::new(LiveSplitClient::new(settings.live_split()))
    };

    let templates =
        Perception::load_reset_templates(&settings.general.reset_templates).context("Failed to load reset templates")?;
    let perception = Perception::new(settings.perception(), settings.camera_detector()).with_reset_templates(templates);

    let mut runner = Runner::new(route, switch, settings, Box::new(capture), Box::new(model), timer)
        .with_perception(perception)
        .with_listener(Box::new(ConsoleListener { json }));

    let stop = runner.stop_flag();
    ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst)).context("Failed to install Ctrl-C handler")?;

    println!(
        "{} {} ({} checkpoints)",
        "Running:".green(),
        runner.route().title,
        runner.route().len()
    );
    let reason = runner.run();
    let stats = runner.stats();

    match reason {
        StopReason::Requested => println!("{}", "Stopped".yellow()),
        StopReason::CaptureFailed(e) => println!("{} {}", "Capture ended:".yellow(), e),
    }
    if cli.is_verbose() {
        println!(
            "  ticks {}  samples {} ({} dropped)  commands {} ({} failed)",
            stats.ticks, stats.samples, stats.dropped_samples, stats.commands, stats.timer_errors
        );
    }
    println!(
        "  final progress {}  split {}/{}",
        runner.state().progress,
        runner.state().split_index,
        runner.route().len()
    );
    Ok(())
}

fn handle_check_route_command(path: &Path) -> Result<()> {
    info!("Checking route: {}", path.display());
    let route = load_route(path).context("Route check failed")?;

    println!("{} {}", "Route OK:".green(), route.title);
    if !route.category.is_empty() {
        println!("  category: {}", route.category);
    }
    println!("  logic: {}  mode: {:?}  forward skip: {}", route.logic, route.mode, route.forward_skip);
    for (index, split) in route.splits.iter().enumerate() {
        let progress = split.progress.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
        println!("  {:>2}. {:<32} {:<10} progress {}", index, split.title, split.kind.cyan(), progress);
    }
    Ok(())
}

fn handle_check_definitions_command(logic: &str, route: Option<&Path>, cli: &Cli, settings: &Settings) -> Result<()> {
    info!("Checking definition set: {}", logic);

    let route = route.map(load_route).transpose().context("Failed to load route")?;
    let mut signals = SignalRegistry::new();
    let registry = standard_registry(&mut signals, settings);

    let mut generator = ProcessorGenerator::new(&settings.definitions.dir, &registry, &mut signals)
        .with_redirects(settings.definitions.redirects.clone());
    if let Some(route) = &route {
        generator = generator.with_redirects(route.redirects.clone());
    }

    let processors = match generator.generate_set(logic) {
        Ok(processors) => processors,
        Err(e) => {
            println!("{} {}", "Definition error:".red(), e);
            return Err(SplitError::from(e)).context("Definition check failed");
        }
    };

    println!(
        "{} {} ({} processors)",
        "Definitions OK:".green(),
        settings.definitions.dir.join(logic).display(),
        processors.len()
    );
    for (kind, processor) in &processors {
        println!(
            "  {:<16} initial {:<16} {} transitions",
            kind.cyan(),
            processor.initial_name().unwrap_or("-"),
            processor.transition_count()
        );
        if cli.is_verbose() {
            println!("    processes: {}", processor.process_names().join(", "));
        }
    }

    if let Some(route) = route {
        let missing: Vec<&str> = route
            .kinds()
            .into_iter()
            .filter(|kind| !processors.contains_key(*kind))
            .collect();
        if !missing.is_empty() {
            eyre::bail!("Route '{}' uses kinds with no definition: {}", route.title, missing.join(", "));
        }
        println!("{} every kind of '{}' is covered", "Route OK:".green(), route.title);
    }
    Ok(())
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let settings = load_settings(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging once the configured level is known
    setup_logging(settings.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &settings).context("Application failed")?;

    Ok(())
}
