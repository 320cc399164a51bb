//! Beamline control room
//!
//! Assembles the requested widgets from the configuration document and opens
//! the window. Configuration and registry errors exit with status 2 before
//! anything is shown; other failures exit with status 1.

use anyhow::{Context, Result};
use beamline_gui::cli::Cli;
use beamline_gui::config::ConfigDocument;
use beamline_gui::error::GuiError;
use beamline_gui::host::{assemble, Assembly};
use beamline_gui::logging;
use beamline_gui::queue::{spawn_console_monitor, spawn_poller, NullQueueClient, QueueClient, QueueStateModel};
use beamline_gui::registry::{WidgetRegistry, WidgetServices};
use beamline_gui::status::StatusBus;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            exit_code(&err)
        }
    }
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<GuiError>() {
        Some(err) if err.is_startup_error() => ExitCode::from(2),
        _ => ExitCode::from(1),
    }
}

fn run(cli: Cli) -> Result<()> {
    let status_bus = StatusBus::default();
    logging::init(cli.log_level.as_deref(), Some(status_bus.clone()))?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start the async runtime")?;
    let queue_client: Arc<dyn QueueClient> = Arc::new(NullQueueClient);
    let services = WidgetServices {
        queue_model: Arc::new(QueueStateModel::new()),
        queue_client: queue_client.clone(),
        status_bus: status_bus.clone(),
        console_bus: StatusBus::default(),
        runtime: Some(runtime.handle().clone()),
    };

    let mut registry = WidgetRegistry::new();
    registry.register_defaults(&services);
    let registry = registry.freeze();

    if cli.list_widgets {
        for descriptor in registry.descriptors() {
            println!("{:<18} {}", descriptor.key(), descriptor.title());
            if !descriptor.description().is_empty() {
                println!("{:<18} {}", "", descriptor.description());
            }
            println!(
                "{:<18} options: {}",
                "",
                descriptor.schema().names().collect::<Vec<_>>().join(", ")
            );
        }
        return Ok(());
    }

    let document = ConfigDocument::load_or_default(cli.config.as_deref())?;
    let assembly = assemble(
        &registry,
        &document,
        &cli.requested_widgets(),
        cli.data_paths.clone(),
    )?;

    if cli.dry_run || cfg!(not(feature = "standalone")) {
        return print_layout(&assembly);
    }

    let (poller, console_monitor) = {
        let _guard = runtime.enter();
        (
            spawn_poller(queue_client.clone(), services.queue_model.clone(), assembly.poll_interval),
            spawn_console_monitor(queue_client, services.console_bus.clone(), assembly.poll_interval),
        )
    };
    let result = open_window(assembly, status_bus);
    runtime.block_on(async {
        poller.shutdown().await;
        console_monitor.shutdown().await;
    });
    result
}

#[cfg(feature = "standalone")]
fn open_window(assembly: Assembly, status_bus: StatusBus) -> Result<()> {
    use beamline_gui::host::ControlRoomApp;

    info!(title = %assembly.title, "opening window");
    let title = assembly.title.clone();
    let [width, height] = assembly.window_size;
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([width as f32, height as f32])
            .with_title(&title),
        ..Default::default()
    };
    eframe::run_native(
        &title,
        options,
        Box::new(|_cc| Ok(Box::new(ControlRoomApp::new(assembly, status_bus)))),
    )
    .map_err(|err| anyhow::anyhow!("window error: {}", err))
}

#[cfg(not(feature = "standalone"))]
fn open_window(assembly: Assembly, _status_bus: StatusBus) -> Result<()> {
    print_layout(&assembly)
}

fn print_layout(assembly: &Assembly) -> Result<()> {
    info!(tabs = assembly.tabs.len(), "dry run, not opening a window");
    println!("{} ({}x{})", assembly.title, assembly.window_size[0], assembly.window_size[1]);
    println!("layout: {:?}, poll interval: {} ms", assembly.mode, assembly.poll_interval.as_millis());
    for tab in &assembly.tabs {
        println!();
        println!("[{}] {}", tab.key, tab.title);
        for line in tab.widget.summary() {
            println!("  {}", line);
        }
        let options = serde_yaml::to_string(&tab.config.options)
            .with_context(|| format!("failed to print options of '{}'", tab.key))?;
        for line in options.lines() {
            println!("  | {}", line);
        }
    }
    Ok(())
}
