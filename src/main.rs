//! whouses: find and stop the processes using a file or folder.
//!
//! This is the main entry point for the CLI application.

use anyhow::anyhow;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use whouses::actions::Terminator;
use whouses::core::config::{Config, LockQueryMode};
use whouses::core::error::{Error, Result};
use whouses::core::types::Target;
use whouses::scanner::Discovery;
use whouses::ui::cli::{Cli, Commands, ConfigAction, OutputFormat};
use whouses::ui::report::{render_outcomes, render_report};
use whouses::utils::logging::{init_logging, LogConfig};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("Exiting after {} error: {:?}", e.category(), e);
            eprintln!("Error: {}", e);
            if let Some(hint) = e.suggestion() {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse_args();

    // Logging comes up before the full config load so its warnings are visible
    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        Config::load(&Config::default_config_path())
            .map(|c| LogConfig::from_config(&c))
            .unwrap_or_default()
    };
    init_logging(log_config)?;

    log::info!("whouses v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_default();
    log::debug!("Configuration loaded");

    match cli.command {
        Some(Commands::Scan {
            path,
            batched,
            max_files,
        }) => run_scan(&config, &path, batched, max_files, cli.format),
        Some(Commands::Kill { pids, yes, rescan }) => {
            run_kill(&config, &pids, yes, rescan, cli.format)
        }
        Some(Commands::Config { action }) => run_config(action, &config),
        Some(Commands::Info) => run_info(&config),
        None => {
            println!("whouses - find the processes using a file or folder");
            println!();
            println!("Use --help for usage information");
            println!();
            println!("Quick start:");
            println!("  whouses scan <PATH>        List processes using PATH");
            println!("  whouses kill <PID>...      Terminate processes");
            Ok(())
        }
    }
}

/// Run discovery on a path and print the findings.
fn run_scan(
    config: &Config,
    path: &Path,
    batched: bool,
    max_files: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let mut discovery_config = config.discovery.clone();
    if batched {
        discovery_config.lock_query_mode = LockQueryMode::Batched;
    }
    if let Some(max_files) = max_files {
        if max_files == 0 {
            return Err(Error::ConfigInvalid {
                field: "--max-files".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }
        discovery_config.max_files = max_files;
    }

    let target = Target::resolve(path)?;
    log::info!(
        "Starting {} scan of {}",
        discovery_config.lock_query_mode,
        target.path.display()
    );

    let report = Discovery::system(discovery_config).discover_report(&target);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", render_report(&report)),
    }
    Ok(())
}

/// Terminate processes after confirmation, then optionally rescan.
fn run_kill(
    config: &Config,
    pids: &[u32],
    yes: bool,
    rescan: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    if !yes {
        let list: Vec<String> = pids.iter().map(|p| p.to_string()).collect();
        let question = format!("Forcefully terminate PID(s) {}?", list.join(", "));
        if !confirm(&question)? {
            println!("Aborted.");
            return Ok(());
        }
    }

    let outcomes = Terminator::system(config.termination.grace_delay()).terminate(pids);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcomes)?),
        OutputFormat::Text => print!("{}", render_outcomes(&outcomes)),
    }

    if let Some(path) = rescan {
        if format == OutputFormat::Text {
            println!();
        }
        run_scan(config, &path, false, None, format)?;
    }

    let failed = outcomes.iter().filter(|o| !o.success).count();
    if failed > 0 {
        return Err(anyhow!("{} of {} termination(s) failed", failed, outcomes.len()).into());
    }
    Ok(())
}

/// Handle configuration commands.
fn run_config(action: ConfigAction, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigAction::Reset { yes } => {
            if !yes && !confirm("Reset configuration to defaults?")? {
                println!("Aborted.");
                return Ok(());
            }
            log::info!("Resetting configuration to defaults...");
            Config::default().save(&Config::default_config_path())?;
            println!("Configuration reset to defaults.");
        }
        ConfigAction::Path => {
            println!("{}", Config::default_config_path().display());
        }
    }
    Ok(())
}

/// Show application information.
fn run_info(config: &Config) -> Result<()> {
    println!("whouses - find the processes using a file or folder");
    println!();
    println!("Version:          {}", env!("CARGO_PKG_VERSION"));
    println!("Platform:         {}", std::env::consts::OS);
    println!("Config Path:      {}", Config::default_config_path().display());
    println!("Data Directory:   {}", Config::data_dir().display());
    println!();
    println!("Discovery Settings:");
    println!("  Lock Queries:   {}", config.discovery.lock_query_mode);
    println!("  Batch Size:     {}", config.discovery.batch_size);
    println!("  Max Files:      {}", config.discovery.max_files);
    println!(
        "  Executables:    {}",
        config.discovery.executable_extensions.join(", ")
    );
    println!();
    println!("Termination Settings:");
    println!("  Grace Delay:    {} ms", config.termination.grace_delay_ms);
    Ok(())
}

/// Ask a yes/no question on stdin.
fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
