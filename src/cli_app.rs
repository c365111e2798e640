//! Top-level CLI definition and dispatch.

use std::fs::File;
use std::io::{self, BufReader, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use netpanel::core::config::Config;
use netpanel::core::errors::NetpanelError;
use netpanel::display::field::Field;
use netpanel::display::state::DisplayState;
use netpanel::display::units::{Context, UnitBase, format};
use netpanel::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
use netpanel::preferences::display::{DisplayPreferenceStore, PreferenceKey};
use netpanel::preferences::store::{DashboardId, JsonFileStore, KeyValueStore, LoadOutcome};
use netpanel::presenter::reset::ResetBus;
use netpanel::presenter::sink::RecordingSink;
use netpanel::presenter::{Presenter, PresenterOptions};
use netpanel::telemetry::events::read_events;

/// netpanel: replay network telemetry through the dashboard presenter.
#[derive(Debug, Parser)]
#[command(
    name = "netpanel",
    author,
    version,
    about = "Network dashboard presentation engine",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Feed a JSONL event stream through a presenter and print the final state.
    Replay(ReplayArgs),
    /// Format a byte count the way the dashboard shows it.
    Format(FormatArgs),
    /// Show or change a dashboard's stored preferences.
    Prefs(PrefsArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args)]
struct ReplayArgs {
    /// JSONL file of source events.
    file: PathBuf,
    /// Dashboard identity (preference namespace).
    #[arg(long, value_name = "ID")]
    identity: Option<String>,
    /// Treat the dashboard as visible for the whole replay.
    #[arg(long)]
    visible: bool,
    /// Preferences file to read.
    #[arg(long, value_name = "PATH")]
    prefs: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct FormatArgs {
    /// Raw byte count; negative values render as zero.
    #[arg(allow_negative_numbers = true)]
    bytes: i64,
    /// Cumulative total instead of a per-second rate.
    #[arg(long)]
    total: bool,
    /// Render in bits.
    #[arg(long)]
    bits: bool,
}

#[derive(Debug, Clone, Args)]
struct PrefsArgs {
    /// Dashboard identity (preference namespace).
    #[arg(long, global = true, value_name = "ID")]
    identity: Option<String>,
    /// Preferences file.
    #[arg(long, global = true, value_name = "PATH")]
    prefs: Option<PathBuf>,
    #[command(subcommand)]
    action: PrefsAction,
}

#[derive(Debug, Clone, Subcommand)]
enum PrefsAction {
    /// Print every preference with its effective value.
    Show,
    /// Set one preference by key (e.g. `chartScale fixed`).
    Set {
        /// Preference key: uploadColor, downloadColor, reverseOrder, chartScale,
        /// chartFixedScale, chartFixedScaleSize, base, processes, publicIP.
        key: String,
        value: String,
    },
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

impl From<NetpanelError> for CliError {
    fn from(err: NetpanelError) -> Self {
        let message = err.to_string();
        if err.is_retryable() {
            Self::Runtime(message)
        } else {
            Self::User(message)
        }
    }
}

pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Replay(args) => run_replay(cli, args),
        Command::Format(args) => run_format(cli, args),
        Command::Prefs(args) => run_prefs(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("NETPANEL_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn open_preferences(path: &Path) -> Arc<JsonFileStore> {
    let (store, outcome) = JsonFileStore::open(path);
    match &outcome {
        LoadOutcome::Corrupt { details } => eprintln!(
            "[NETPANEL] WARNING: preferences file {} is corrupt ({details}); using defaults",
            path.display()
        ),
        LoadOutcome::IoError { details } => eprintln!(
            "[NETPANEL] WARNING: cannot read preferences file {} ({details}); using defaults",
            path.display()
        ),
        LoadOutcome::Loaded { .. } | LoadOutcome::Missing => {}
    }
    Arc::new(store)
}

// ──────────────────── replay ────────────────────

fn run_replay(cli: &Cli, args: &ReplayArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let dashboard = DashboardId::new(
        args.identity
            .clone()
            .unwrap_or_else(|| config.presenter.dashboard.clone()),
    );

    let file = File::open(&args.file).map_err(|e| {
        CliError::User(format!("cannot open event file {}: {e}", args.file.display()))
    })?;
    let events = read_events(BufReader::new(file))?;

    let logging = if config.logging.enabled {
        let (handle, join) = spawn_logger(config.logging.jsonl(), config.logging.channel_capacity)?;
        handle.send(ActivityEvent::PresenterStarted {
            dashboard: dashboard.to_string(),
            config_hash: config.stable_hash()?,
        });
        Some((handle, join))
    } else {
        None
    };

    let prefs_path = args.prefs.as_ref().unwrap_or(&config.preferences.file);
    let store: Arc<dyn KeyValueStore> = open_preferences(prefs_path);
    let bus = Arc::new(ResetBus::with_capacity(config.presenter.reset_notice_capacity));
    let sink = RecordingSink::with_capacities(
        config.presenter.chart_window,
        config.presenter.reachability_window,
    );
    let mut options = PresenterOptions::from(&config);
    options.logger = logging.as_ref().map(|(handle, _)| handle.clone());

    let (presenter, report) = Presenter::new(dashboard.clone(), store, &bus, sink, options);
    for warning in &report.warnings {
        eprintln!("[NETPANEL] WARNING: {warning}");
    }

    if args.visible {
        presenter.set_visible(true);
    }
    for event in &events {
        presenter.apply_event(event);
    }

    let state = presenter.display_state();
    let phase = presenter.phase();
    let stats = presenter.gate_stats();
    let chart = presenter.with_sink(|sink| {
        json!({
            "upload": sink.upload_series(),
            "download": sink.download_series(),
            "reachability": sink.reachability(),
            "peak": sink.chart_peak(),
        })
    });
    drop(presenter);
    shutdown_logger(logging);

    match output_mode(cli) {
        OutputMode::Json => {
            let payload = json!({
                "dashboard": dashboard.as_str(),
                "events": events.len(),
                "phase": phase,
                "state": state,
                "gate": stats,
                "chart": chart,
            });
            write_json_line(&payload)?;
        }
        OutputMode::Human => {
            print!("{}", render_state_human(&dashboard, events.len(), &state));
            println!(
                "{} usage {}/{} connectivity {}/{} processes {}/{} (published/skipped)",
                "Gate:".bold(),
                stats.usage_published,
                stats.usage_skipped,
                stats.connectivity_published,
                stats.connectivity_skipped,
                stats.processes_published,
                stats.processes_skipped,
            );
        }
    }
    Ok(())
}

fn shutdown_logger(logging: Option<(ActivityLoggerHandle, std::thread::JoinHandle<()>)>) {
    if let Some((handle, join)) = logging {
        handle.shutdown();
        if join.join().is_err() {
            eprintln!("[NETPANEL] WARNING: logger thread panicked");
        }
    }
}

fn field_text<T: std::fmt::Display>(field: &Field<T>) -> String {
    match field {
        Field::Known(_) => field.to_string(),
        Field::Unknown | Field::NotApplicable => field.to_string().dimmed().to_string(),
    }
}

fn render_state_human(dashboard: &DashboardId, events: usize, state: &DisplayState) -> String {
    let usage = &state.usage;
    let conn = &state.connectivity;
    let mut out = String::new();
    out.push_str(&format!(
        "{} {} ({events} events)\n",
        "Dashboard".bold(),
        dashboard.as_str().cyan()
    ));
    out.push_str(&format!(
        "  Upload:      {}\n  Download:    {}\n",
        usage.upload, usage.download
    ));
    out.push_str(&format!(
        "  Total up:    {}\n  Total down:  {}\n  {}\n",
        usage.total_upload, usage.total_download, usage.last_reset_label
    ));
    out.push_str(&format!(
        "  Interface:   {}\n  MAC:         {}\n  Status:      {}\n",
        field_text(&usage.interface),
        field_text(&usage.physical_address),
        field_text(&usage.link)
    ));
    out.push_str(&format!(
        "  SSID:        {}\n  Standard:    {}\n  Channel:     {}\n",
        field_text(&usage.wifi.ssid),
        field_text(&usage.wifi.standard),
        field_text(&usage.wifi.channel)
    ));
    if state.public_ip_visible {
        out.push_str(&format!(
            "  Public IPv4: {}\n  Public IPv6: {}\n",
            field_text(&usage.public_v4),
            field_text(&usage.public_v6)
        ));
    }
    out.push_str(&format!(
        "  Local IP:    {}\n",
        field_text(&usage.local_address)
    ));

    let status = conn.status.to_string();
    let status = match conn.status {
        netpanel::display::state::Reachability::Up => status.green(),
        netpanel::display::state::Reachability::Down => status.red(),
        netpanel::display::state::Reachability::Unknown => status.yellow(),
    };
    out.push_str(&format!(
        "{}\n  Internet:    {status}\n  Latency:     {}\n",
        "Connectivity".bold(),
        conn.latency
    ));

    if state.process_rows_visible > 0 {
        out.push_str(&format!("{}\n", "Processes".bold()));
        for row in &state.processes.rows {
            out.push_str(&format!(
                "  {:>7} {:<24} ↓ {:>12} ↑ {:>12}\n",
                row.pid,
                row.name,
                row.download.to_string(),
                row.upload.to_string()
            ));
        }
    }
    out
}

// ──────────────────── format ────────────────────

fn run_format(cli: &Cli, args: &FormatArgs) -> Result<(), CliError> {
    let context = if args.total {
        Context::Total
    } else {
        Context::Rate
    };
    let base = if args.bits {
        UnitBase::Bit
    } else {
        UnitBase::Byte
    };
    let reading = format(args.bytes, context, base);
    match output_mode(cli) {
        OutputMode::Json => write_json_line(&json!({
            "bytes": args.bytes,
            "value": reading.value,
            "unit": reading.unit,
            "text": reading.to_string(),
        })),
        OutputMode::Human => {
            println!("{reading}");
            Ok(())
        }
    }
}

// ──────────────────── prefs ────────────────────

fn run_prefs(cli: &Cli, args: &PrefsArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let dashboard = DashboardId::new(
        args.identity
            .clone()
            .unwrap_or_else(|| config.presenter.dashboard.clone()),
    );
    let path = args.prefs.as_ref().unwrap_or(&config.preferences.file);
    let store: Arc<dyn KeyValueStore> = open_preferences(path);
    let (mut prefs, report) = DisplayPreferenceStore::open(store, dashboard);
    for warning in &report.warnings {
        eprintln!("[NETPANEL] WARNING: {warning}");
    }

    if let PrefsAction::Set { key, value } = &args.action {
        let key = PreferenceKey::from_leaf(key).ok_or_else(|| {
            let known: Vec<&str> = PreferenceKey::ALL.iter().map(|k| k.leaf()).collect();
            CliError::User(format!(
                "unknown preference key {key:?}; expected one of {}",
                known.join(", ")
            ))
        })?;
        prefs.set_from_str(key, value)?;
    }

    match output_mode(cli) {
        OutputMode::Json => {
            let mut values = serde_json::Map::new();
            for key in PreferenceKey::ALL {
                values.insert(key.leaf().to_string(), Value::from(prefs.display_value(key)));
            }
            write_json_line(&json!({
                "dashboard": prefs.keys().dashboard().as_str(),
                "file": path.display().to_string(),
                "preferences": values,
            }))
        }
        OutputMode::Human => {
            for key in PreferenceKey::ALL {
                println!(
                    "{:<28} = {}",
                    prefs.keys().get(key).bold(),
                    prefs.display_value(key)
                );
            }
            Ok(())
        }
    }
}
