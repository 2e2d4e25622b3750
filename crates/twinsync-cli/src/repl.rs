//! REPL – interactive shell over the running spot service.
//!
//! Supported slash-commands:
//!   /help           – show this list
//!   /spots          – list spots with their latest status
//!   /history <id>   – recent checks of a spot
//!   /memory <id>    – patterns and the memory context of a spot
//!   /check <id>     – check a spot now
//!   /check-all      – check every non-snoozed spot
//!   /cameras        – list Home Assistant cameras
//!   /test-camera <entity> – try one snapshot from a camera
//!   /settings       – view and edit `~/.twinsync/config.toml`
//!   /quit | /exit   – exit

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Runtime;
use twinsync_memory::{DEFAULT_HISTORY_LIMIT, SpotMemory, SpotSummary, render_context};
use twinsync_memory::patterns::weekday_name;
use twinsync_runtime::{Outcome, SpotChecker};
use twinsync_types::{SpotStatus, StoredCheck};

use crate::config::{self, Config};

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Spots,
    History(i64),
    Memory(i64),
    Check(i64),
    CheckAll,
    Cameras,
    TestCamera(String),
    Settings,
    Quit,
    /// A known command with a missing or invalid argument.
    Usage(&'static str),
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Command::Unknown(String::new());
        };
        let arg = words.next();
        let id = arg.and_then(|w| w.parse::<i64>().ok());

        match (name, id) {
            ("/help", _) => Command::Help,
            ("/spots", _) => Command::Spots,
            ("/history", Some(id)) => Command::History(id),
            ("/history", None) => Command::Usage("/history <spot id>"),
            ("/memory", Some(id)) => Command::Memory(id),
            ("/memory", None) => Command::Usage("/memory <spot id>"),
            ("/check", Some(id)) => Command::Check(id),
            ("/check", None) => Command::Usage("/check <spot id>"),
            ("/check-all", _) => Command::CheckAll,
            ("/cameras", _) => Command::Cameras,
            ("/test-camera", _) => match arg {
                Some(entity) => Command::TestCamera(entity.to_string()),
                None => Command::Usage("/test-camera <camera entity id>"),
            },
            ("/settings", _) => Command::Settings,
            ("/quit" | "/exit", _) => Command::Quit,
            (other, _) => Command::Unknown(other.to_string()),
        }
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(rt: &Runtime, checker: &SpotChecker, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "twinsync>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match Command::parse(line) {
            Command::Help => cmd_help(),
            Command::Spots => cmd_spots(checker),
            Command::History(id) => cmd_history(checker, id),
            Command::Memory(id) => cmd_memory(checker, id),
            Command::Check(id) => cmd_check(rt, checker, id),
            Command::CheckAll => cmd_check_all(rt, checker),
            Command::Cameras => cmd_cameras(rt, checker),
            Command::TestCamera(entity) => cmd_test_camera(rt, checker, &entity),
            Command::Settings => cmd_settings(),
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Command::Usage(usage) => println!("{} {}", "Usage:".yellow(), usage.bold()),
            Command::Unknown(other) => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "TwinSync Commands".bold().underline());
    println!("  {}         – list spots and their latest status", "/spots".bold().cyan());
    println!("  {}  – recent checks of a spot", "/history <id>".bold().cyan());
    println!("  {}   – patterns and memory context", "/memory <id>".bold().cyan());
    println!("  {}    – check a spot now", "/check <id>".bold().cyan());
    println!("  {}     – check every non-snoozed spot", "/check-all".bold().cyan());
    println!("  {}       – list Home Assistant cameras", "/cameras".bold().cyan());
    println!("  {} – try one snapshot", "/test-camera <entity>".bold().cyan());
    println!("  {}      – edit ~/.twinsync/config.toml", "/settings".bold().cyan());
    println!("  {}   – exit", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_spots(checker: &SpotChecker) {
    match checker.store().list_spots() {
        Ok(spots) if spots.is_empty() => {
            println!("  {}", "No spots yet. Create one via POST /api/spots.".dimmed());
        }
        Ok(spots) => {
            println!("{}", "Spots".bold().underline());
            for summary in &spots {
                println!("  {}", spot_line(summary));
            }
        }
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn cmd_history(checker: &SpotChecker, id: i64) {
    match checker.store().history(id, DEFAULT_HISTORY_LIMIT) {
        Ok(checks) if checks.is_empty() => println!("  {}", "No checks recorded.".dimmed()),
        Ok(checks) => {
            println!("{} {}", "History of spot".bold().underline(), id.to_string().bold());
            for check in &checks {
                println!("  {}", check_line(check));
            }
        }
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn cmd_memory(checker: &SpotChecker, id: i64) {
    match checker.store().get_spot(id) {
        Ok(Some(summary)) => match &summary.memory {
            Some(memory) => {
                println!("{} {}", "Memory of".bold().underline(), summary.spot.name.bold());
                for line in memory_lines(memory) {
                    println!("  {line}");
                }
                println!("  Context : {}", render_context(Some(memory)).italic());
            }
            None => println!("  {}", "Never checked – no memory yet.".dimmed()),
        },
        Ok(None) => println!("{} {}", "Spot not found:".red(), id),
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn cmd_check(rt: &Runtime, checker: &SpotChecker, id: i64) {
    print!("  Checking spot {} … ", id.to_string().bold());
    io::stdout().flush().ok();
    match rt.block_on(checker.check_spot(id)) {
        Ok(check) => {
            println!("{}", status_label(check.record.status));
            println!("  {}", check_line(&check));
            for item in &check.record.items_to_sort {
                println!(
                    "    • {} ({}) – {}",
                    item.name.bold(),
                    item.location.dimmed(),
                    item.suggestion
                );
            }
        }
        Err(e) => println!("{}: {}", "FAILED".red(), e),
    }
}

fn cmd_check_all(rt: &Runtime, checker: &SpotChecker) {
    match rt.block_on(checker.check_all()) {
        Ok(outcomes) if outcomes.is_empty() => {
            println!("  {}", "Nothing to check.".dimmed());
        }
        Ok(outcomes) => {
            for o in &outcomes {
                match &o.outcome {
                    Outcome::Checked { status, score } => println!(
                        "  {} {:<24} {:>3}",
                        status_label(*status),
                        o.spot_name,
                        score
                    ),
                    Outcome::Failed { error } => {
                        println!("  {} {:<24} {}", "ERROR".red(), o.spot_name, error.dimmed())
                    }
                }
            }
        }
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn cmd_cameras(rt: &Runtime, checker: &SpotChecker) {
    let cameras = rt.block_on(checker.camera().cameras());
    if cameras.is_empty() {
        println!(
            "  {}",
            "No cameras found (is SUPERVISOR_TOKEN set?).".dimmed()
        );
        return;
    }
    println!("{}", "Cameras".bold().underline());
    for cam in &cameras {
        println!("  {} {} {}", cam.entity_id.bold(), cam.name, cam.state.dimmed());
    }
}

fn cmd_test_camera(rt: &Runtime, checker: &SpotChecker, entity_id: &str) {
    if rt.block_on(checker.camera().test_camera(entity_id)) {
        println!("  {} {} returned a snapshot", "✓".green().bold(), entity_id.bold());
    } else {
        println!("  {} {} returned no snapshot", "✗".red().bold(), entity_id.bold());
    }
}

fn cmd_settings() {
    let mut cfg = match config::load_file() {
        Ok(Some(c)) => c,
        Ok(None) => Config::default(),
        Err(e) => {
            println!("{}: {}", "Error loading config".red(), e);
            return;
        }
    };

    println!("{}", "Settings Editor".bold().underline());
    println!(
        "  Gemini API key : {}",
        configured_label(cfg.gemini_api_key().is_some())
    );
    println!(
        "  Supervisor token: {}",
        configured_label(cfg.supervisor_token().is_some())
    );

    cfg.api_port = prompt_u16(&format!("  API port        [{}]: ", cfg.api_port), cfg.api_port);
    cfg.gemini_model = prompt_str(
        &format!("  Gemini model    [{}]: ", cfg.gemini_model),
        &cfg.gemini_model,
    );
    let key = prompt_str("  Gemini API key  [keep]: ", "");
    if !key.is_empty() {
        cfg.gemini_api_key = key;
    }
    let concurrency = prompt_str(
        &format!("  Check-all concurrency [{}]: ", cfg.check_all_concurrency),
        &cfg.check_all_concurrency.to_string(),
    );
    if let Ok(n) = concurrency.parse::<usize>() {
        cfg.check_all_concurrency = n.max(1);
    }

    match config::save(&cfg) {
        Ok(()) => {
            println!(
                "{} {}",
                "✓ Settings saved to".green(),
                config::config_path().display().to_string().bold()
            );
            println!("  {}", "Changes take effect on next start.".dimmed());
        }
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Formatting
// ─────────────────────────────────────────────────────────────────────────────

fn status_label(status: SpotStatus) -> colored::ColoredString {
    match status {
        SpotStatus::Pass => "PASS".green().bold(),
        SpotStatus::Fail => "FAIL".red().bold(),
        SpotStatus::Unknown => "UNKNOWN".yellow().bold(),
    }
}

fn configured_label(configured: bool) -> colored::ColoredString {
    if configured {
        "configured".green()
    } else {
        "not set".yellow()
    }
}

pub(crate) fn spot_line(summary: &SpotSummary) -> String {
    let spot = &summary.spot;
    let last = match &summary.last_check {
        Some(check) => format!("{} {:>3}", status_label(check.status), check.score),
        None => "never checked".dimmed().to_string(),
    };
    let snoozed = match spot.snoozed_until {
        Some(until) if until > chrono::Utc::now() => {
            format!(" (snoozed until {})", until.format("%Y-%m-%d %H:%M UTC"))
        }
        _ => String::new(),
    };
    format!(
        "[{}] {} – {} · {}{}",
        spot.id,
        spot.name,
        spot.spot_type,
        last,
        snoozed
    )
}

pub(crate) fn check_line(check: &StoredCheck) -> String {
    let r = &check.record;
    format!(
        "{} {} {:>3}  {}",
        r.timestamp.format("%Y-%m-%d %H:%M"),
        status_label(r.status),
        r.score,
        r.feedback
    )
}

pub(crate) fn memory_lines(memory: &SpotMemory) -> Vec<String> {
    let p = &memory.patterns;
    let day = |d: Option<chrono::Weekday>| d.map(weekday_name).unwrap_or("–");
    let items = if p.recurring_items.is_empty() {
        "–".to_string()
    } else {
        p.recurring_items.join(", ")
    };
    vec![
        format!("Checks  : {}", memory.total_checks),
        format!("Pass    : {:.0}%", memory.pass_rate),
        format!("Streak  : {} (best {})", p.current_streak, p.best_streak),
        format!("Best day: {}  Worst day: {}", day(p.best_day), day(p.worst_day)),
        format!("Items   : {items}"),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Prompts
// ─────────────────────────────────────────────────────────────────────────────

/// Prompt for a u16 value.  Returns `default` when the user presses Enter.
pub(crate) fn prompt_u16(msg: &str, default: u16) -> u16 {
    let raw = prompt_str(msg, &default.to_string());
    match raw.parse::<u16>() {
        Ok(v) => v,
        Err(_) => {
            println!(
                "  {} '{}' is not a valid port number, keeping {}",
                "Warning:".yellow(),
                raw,
                default
            );
            default
        }
    }
}

/// Prompt for a string value.  Returns `default` when the user presses Enter.
pub(crate) fn prompt_str(msg: &str, default: &str) -> String {
    print!("{}", msg);
    io::stdout().flush().ok();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let trimmed = line.trim().to_string();
            if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed
            }
        }
        Err(_) => default.to_string(),
    }
}
