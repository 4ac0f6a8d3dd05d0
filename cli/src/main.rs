//! xuad console host - runs the ad runtime against a real backend.
//!
//! # Flow
//!
//! ```text
//! main() -> XuadConfig::load() -> AdRuntime::new() -> init() -> stdin command loop
//!                                                                  |
//!                                                                  v
//!                                                      track / leave / fg / bg / ...
//! ```
//!
//! Ads are simulated on stdout by [`console`]; logs go to `~/.xuad/logs/xuad.log`.

mod commands;
mod console;

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, stdin};
use tokio::runtime::Handle;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::Command;
use xuad_config::XuadConfig;
use xuad_engine::{
    AdRuntime, AdSession, ApiClient, InitObserver, InitStep, Interaction, MainThreadDispatcher,
    RuntimeOptions, StepError,
};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file available: stderr keeps stdout clean for ad output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.xuad/logs/xuad.log
    if let Some(config_path) = XuadConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("xuad.log"));
    }

    // Fallback: ./.xuad/logs/xuad.log
    candidates.push(PathBuf::from(".xuad").join("logs").join("xuad.log"));

    candidates
}

/// Prints pipeline progress to stdout.
struct ConsoleObserver;

impl InitObserver for ConsoleObserver {
    fn on_step_completed(&self, step: InitStep) {
        println!("[init] {step} ok");
    }

    fn on_step_failed(&self, step: InitStep, error: &StepError) {
        println!("[init] {step} failed: {error}");
    }

    fn on_ad_disabled(&self) {
        println!("[init] ads are disabled for this app");
    }

    fn on_init_completed(&self, session: &AdSession) {
        print_session(session);
    }
}

fn print_session(session: &AdSession) {
    let strategy = session.active_strategy();
    println!(
        "[session] ads={} strategy={} device_id={:?} pages={}",
        if session.ads_enabled() { "on" } else { "off" },
        if strategy.is_some() { "parsed" } else { "none" },
        session.device_id,
        strategy.map_or(0, |s| s.page_configs.len()),
    );
}

/// Run one command. Returns `false` when the console should exit.
async fn execute(ads: &Arc<AdRuntime>, command: Command<'_>) -> bool {
    match command {
        Command::Track(page) => ads.track(page),
        Command::Leave(page) => ads.on_page_leave(page),
        Command::State(page) => match ads.page_state(page) {
            Some(state) => println!("{state:#?}"),
            None => println!("{page} has never been tracked"),
        },
        Command::Banner(page) => {
            let name = page.to_string();
            let runtime = Arc::downgrade(ads);
            ads.register_banner_container(page, move |visible| {
                println!("[banner] {name} visible={visible}");
                if visible && let Some(ads) = runtime.upgrade() {
                    ads.report_banner(Interaction::View, console::SIMULATED_ECPM);
                }
            });
        }
        Command::Unbanner(page) => ads.unregister_banner_container(page),
        Command::Click(page) => println!("click ads on {page}: {}", ads.is_click_ad_enabled(page)),
        Command::Foreground => {
            if ads.on_foreground() {
                println!("hot start splash scheduled");
            }
        }
        Command::Background => ads.on_background(),
        Command::Init => {
            ads.init(&ConsoleObserver).await;
        }
        Command::Session => match ads.session() {
            Some(session) => print_session(&session),
            None => println!("startup has not completed"),
        },
        Command::Feedback {
            subject,
            content,
            contact,
        } => match ads.submit_feedback(subject, content, contact).await {
            Ok(Some(ticket)) => println!("feedback sent (ticket {ticket})"),
            Ok(None) => println!("feedback sent"),
            Err(e) => println!("feedback failed: {e}"),
        },
        Command::Clear => ads.clear_all_states(),
        Command::Help => print!("{}", commands::help_text()),
        Command::Quit => return false,
        Command::Missing(usage) => println!("usage: {usage}"),
        Command::Unknown(name) => println!("unknown command `{name}` (try `help`)"),
        Command::Empty => {}
    }
    true
}

async fn run_console(ads: &Arc<AdRuntime>) -> Result<()> {
    let mut lines = BufReader::new(stdin()).lines();
    print!("{}", commands::help_text());

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        if !execute(ads, Command::parse(&line)).await {
            break;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = match XuadConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(path = %e.path().display(), "Ignoring config: {e}");
            eprintln!("Warning: {e}");
            XuadConfig::default()
        }
    };
    let base_url = config.api_base_url().context(
        "No backend configured: set api.base_url in ~/.xuad/config.toml or XUAD_API_URL",
    )?;

    let runtime = Handle::current();
    let api =
        ApiClient::new(base_url, config.api_timeout()).context("Failed to build HTTP client")?;
    let dispatcher =
        MainThreadDispatcher::start(runtime.clone()).context("Failed to start main lane")?;
    let options = RuntimeOptions::from_config(&config).with_device_info(&console::device_info());

    let ads = Arc::new(AdRuntime::new(
        config.identity(),
        api,
        Arc::new(dispatcher),
        console::collaborators(runtime.clone()),
        options,
        runtime,
    ));

    // Cold start counts as the first foreground.
    ads.on_foreground();
    ads.init(&ConsoleObserver).await;

    let result = run_console(&ads).await;
    ads.shutdown();
    result
}
