//! `twinsync` – TwinSync Spot service and shell.
//!
//! This binary:
//!
//! 1. Loads `~/.twinsync/config.toml`, running a **First-Run Wizard** when
//!    the file is absent and stdin is a terminal.
//! 2. Opens the spot database and starts the JSON API on a Tokio runtime.
//! 3. Drops the user into an **interactive REPL**, or serves headless until
//!    **Ctrl-C** when stdin is not a terminal.

mod config;
mod repl;

use colored::Colorize;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

use twinsync_memory::SpotStore;
use twinsync_runtime::telemetry::init_tracing;
use twinsync_runtime::{HaCamera, SpotChecker, VisionAnalyzer};
use twinsync_server::{ApiServer, ApiState, ServiceStatus};

use crate::config::Config;

fn main() {
    let telemetry = init_tracing("twinsync");

    print_banner();

    let interactive = std::io::stdin().is_terminal();
    let cfg = load_config(interactive);
    info!(config = ?cfg, "configuration loaded");

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    // ── Store ─────────────────────────────────────────────────────────────
    let store = match open_store(&cfg.database_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            println!("{}: {}", "Failed to open database".red(), e);
            std::process::exit(1);
        }
    };
    println!("  Database     : {}", cfg.database_path.bold());

    // ── Check pipeline ────────────────────────────────────────────────────
    let camera = HaCamera::new(cfg.supervisor_token(), cfg.ha_url.clone());
    let analyzer = VisionAnalyzer::new(cfg.gemini_api_key(), cfg.gemini_model.clone());
    let status = ServiceStatus {
        gemini_api_key_configured: analyzer.is_configured(),
        supervisor_token_configured: camera.is_configured(),
    };
    print_service_status(analyzer.model(), &cfg.ha_url, status);
    println!(
        "  Tracing      : {}",
        if telemetry.is_exporting() {
            "OTLP export".green()
        } else {
            "local logs only".dimmed()
        }
    );

    let checker = SpotChecker::new(store, Arc::new(camera), Arc::new(analyzer))
        .with_concurrency(cfg.check_all_concurrency);

    // ── Runtime + API server ──────────────────────────────────────────────
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            println!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };

    let server = ApiServer::new(ApiState::new(checker.clone(), status)).with_port(cfg.api_port);
    println!(
        "  API          : {}",
        format!("http://localhost:{}/api", server.port()).bold()
    );
    rt.spawn(async move {
        if let Err(e) = server.run().await {
            error!(error = %e, "API server stopped");
        }
    });

    if interactive {
        println!();
        println!("  Type {} for a list of commands.\n", "/help".bold().cyan());
        repl::run(&rt, &checker, shutdown);
    } else {
        println!("  Running headless. Press Ctrl-C to stop.");
        while !shutdown.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(200));
        }
    }

    rt.shutdown_timeout(Duration::from_secs(2));
    println!("{}", "  ✓ Exiting TwinSync.".green());
}

fn load_config(interactive: bool) -> Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) if interactive => run_first_run_wizard(),
        Ok(None) => env_defaults(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            env_defaults()
        }
    }
}

fn env_defaults() -> Config {
    let mut cfg = Config::default();
    config::apply_env_overrides(&mut cfg);
    cfg
}

fn open_store(path: &str) -> Result<SpotStore, String> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }
    SpotStore::open(path).map_err(|e| e.to_string())
}

fn print_service_status(model: &str, ha_url: &str, status: ServiceStatus) {
    let mark = |ok: bool| if ok { "online".green() } else { "not configured".yellow() };
    println!(
        "  Gemini       : {} ({})",
        mark(status.gemini_api_key_configured),
        model.dimmed()
    );
    println!(
        "  Home Assistant: {} ({})",
        mark(status.supervisor_token_configured),
        ha_url.dimmed()
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║      TwinSync First-Run Wizard       ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up TwinSync Spot.\n");

    let mut cfg = Config::default();

    let key = repl::prompt_str("  Gemini API key (leave blank to set later): ", "");
    cfg.gemini_api_key = key;

    cfg.gemini_model = repl::prompt_str(
        &format!("  Gemini model [{}]: ", cfg.gemini_model),
        &cfg.gemini_model,
    );

    cfg.api_port = repl::prompt_u16(&format!("  API port [{}]: ", cfg.api_port), cfg.api_port);

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }

    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"  _____       _         ____                  "#.bold().cyan());
    println!("{}", r#" |_   _|_ __ (_)_ _    / ___| _   _ _ __   ___ "#.bold().cyan());
    println!("{}", r#"   | | \ V  V / | ' \  \___ \| | | | '_ \ / __|"#.bold().cyan());
    println!("{}", r#"   |_|  \_/\_/|_|_||_|  ___) | |_| | | | | (__ "#.bold().cyan());
    println!("{}", r#"                       |____/ \__, |_| |_|\___|"#.bold().cyan());
    println!("{}", r#"                              |___/            "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "TwinSync Spot".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Does this match your definition of ready?");
    println!();
}
