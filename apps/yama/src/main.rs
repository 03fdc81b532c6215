//! yama - fetch, verify and atomically install prebuilt packages
//!
//! Thin CLI over the install crate: it loads configuration, wires Ctrl-C
//! to cancellation, drains pipeline events into logs and status lines, and
//! turns install results into an exit code.

mod batch;
mod cli;
mod display;
mod error;
mod events;
mod logging;

use crate::cli::{Cli, Commands, GlobalArgs};
use crate::display::{CommandOutput, OutputRenderer};
use crate::error::CliError;
use crate::events::EventHandler;
use clap::Parser;
use std::path::Path;
use std::process;
use std::sync::Arc;
use tokio::select;
use tracing::{error, info};
use yama_config::Config;
use yama_events::EventReceiver;
use yama_install::{InstallConfig, InstallCoordinator, InstallPool, InstalledRegistry};
use yama_types::{CancellationToken, ColorChoice, LockMode, OutputFormat};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli.global).await {
        Ok(config) => config,
        Err(e) => {
            init_tracing(cli.global.json, false, None);
            eprintln!("Error: {e}");
            process::exit(e.exit_code());
        }
    };

    let json_mode = cli.global.json || config.general.default_output == OutputFormat::Json;
    init_tracing(json_mode, cli.global.debug, Some(&config.logs_path()));

    let code = match run(cli, config, json_mode).await {
        Ok(code) => code,
        Err(e) => {
            error!("Application error: {}", e);
            if json_mode {
                let body = serde_json::json!({ "error": e.to_string(), "exit_code": e.exit_code() });
                println!("{body}");
            } else {
                eprintln!("Error: {e}");
            }
            e.exit_code()
        }
    };
    process::exit(code);
}

/// Configuration with precedence defaults < file < environment < flags
async fn load_config(global: &GlobalArgs) -> Result<Config, CliError> {
    let mut config = Config::load_or_default(global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, global);
    config.validate()?;
    Ok(config)
}

fn apply_cli_config(config: &mut Config, global: &GlobalArgs) {
    if let Some(color) = global.color {
        config.general.color = color;
    }
    if global.fail_fast {
        config.install.lock_mode = LockMode::FailFast;
    }
    if let Some(jobs) = global.jobs {
        config.install.pool_size = jobs;
    }
}

async fn run(cli: Cli, config: Config, json_mode: bool) -> Result<i32, CliError> {
    info!("Starting yama v{}", env!("CARGO_PKG_VERSION"));

    let colors = match config.general.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => console::Term::stdout().features().colors_supported(),
    };

    let (event_sender, event_receiver) = yama_events::channel();
    let coordinator = Arc::new(
        InstallCoordinator::new(InstallConfig::from_config(&config))?
            .with_event_sender(event_sender),
    );

    // Ctrl-C cancels in-flight installs; they unwind and report Cancelled
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let mut handler = EventHandler::new(colors, json_mode, cli.global.debug);
    let command = execute_command(cli.command, &coordinator, &config, cancel);
    let output = drive_with_events(command, event_receiver, &mut handler).await?;

    OutputRenderer::new(json_mode, colors).render(&output)?;
    let code = output.exit_code();
    info!(exit_code = code, "Command completed");
    Ok(code)
}

/// Run a command while draining its events
async fn drive_with_events(
    command: impl std::future::Future<Output = Result<CommandOutput, CliError>>,
    mut event_receiver: EventReceiver,
    handler: &mut EventHandler,
) -> Result<CommandOutput, CliError> {
    tokio::pin!(command);
    let mut events_open = true;

    loop {
        select! {
            result = &mut command => {
                while let Ok(event) = event_receiver.try_recv() {
                    handler.handle_event(&event);
                }
                return result;
            }

            event = event_receiver.recv(), if events_open => {
                match event {
                    Some(event) => handler.handle_event(&event),
                    None => events_open = false,
                }
            }
        }
    }
}

async fn execute_command(
    command: Commands,
    coordinator: &Arc<InstallCoordinator>,
    config: &Config,
    cancel: CancellationToken,
) -> Result<CommandOutput, CliError> {
    let algorithm = config.install.digest_algorithm;

    match command {
        Commands::Install {
            name,
            url,
            digest,
            dest,
        } => {
            let package = batch::package_from_args(&name, &url, &digest, &dest, algorithm)?;
            let result = coordinator.install_with_cancel(&package, &cancel).await;
            Ok(CommandOutput::Installs(vec![result]))
        }

        Commands::Batch { file } => {
            let packages = batch::load_batch(&file, algorithm).await?;
            let pool_size = coordinator.config().pool_size;
            let pool = InstallPool::new(Arc::clone(coordinator), pool_size).with_cancel_token(cancel);
            Ok(CommandOutput::Installs(pool.install_all(packages).await))
        }

        Commands::List => {
            let packages = registry(config).list().await?;
            Ok(CommandOutput::Packages(packages))
        }

        Commands::Info { name } => {
            let package = registry(config).get(&name).await?.ok_or_else(|| {
                yama_errors::Error::from(yama_errors::InstallError::PackageNotInstalled {
                    package: name.clone(),
                })
            })?;
            Ok(CommandOutput::Package(package))
        }

        Commands::Remove { name } => {
            let removed = coordinator.remove(&name).await?;
            Ok(CommandOutput::Removed(removed))
        }
    }
}

fn registry(config: &Config) -> InstalledRegistry {
    InstalledRegistry::new(config.registry_path())
}

/// Initialize tracing/logging
fn init_tracing(json_mode: bool, debug_enabled_flag: bool, log_dir: Option<&Path>) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;
    let debug_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(
                "info,yama=debug,yama_install=debug,yama_net=debug,yama::events=debug",
            )
        })
    };

    if debug_enabled {
        // Structured JSON logs to a timestamped file
        if let Some(log_dir) = log_dir {
            if let Err(e) = std::fs::create_dir_all(log_dir) {
                if !json_mode {
                    eprintln!("Warning: Failed to create log directory: {e}");
                }
            }
            let log_file = log_dir.join(format!(
                "yama-{}.log",
                chrono::Utc::now().format("%Y%m%d-%H%M%S")
            ));
            if let Ok(file) = std::fs::File::create(&log_file) {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(file)
                    .with_env_filter(debug_filter())
                    .init();
                if !json_mode {
                    eprintln!("Debug logging enabled: {}", log_file.display());
                }
                return;
            }
        }
    }

    if json_mode {
        // Nothing may contaminate the JSON result on stdout
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else if debug_enabled {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(debug_filter())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }
}
