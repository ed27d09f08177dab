// crates/loadgrid-cli/src/main.rs
// ============================================================================
// Module: Loadgrid CLI Entry Point
// Description: Command dispatcher for loadgrid locations, runs, and jobs.
// Purpose: Drive the orchestrator against a durable store from the shell.
// Dependencies: clap, loadgrid-config, loadgrid-core, loadgrid-store-sqlite
// ============================================================================

//! ## Overview
//! Every invocation loads `loadgrid.toml`, opens the configured `SQLite`
//! store, runs one orchestrator command, and prints the resulting view as
//! JSON on stdout. Errors go to stderr with a failure exit code. Worker
//! agents use the `job` commands to report status; operators use `location`
//! and `run`.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use loadgrid_config::LoadgridConfig;
use loadgrid_config::StoreType;
use loadgrid_config::config_toml_example;
use loadgrid_core::KeyValue;
use loadgrid_core::LocationName;
use loadgrid_core::LocationRequest;
use loadgrid_core::LocationStatus;
use loadgrid_core::Orchestrator;
use loadgrid_core::OrchestratorError;
use loadgrid_core::RandomNameGenerator;
use loadgrid_core::RunName;
use loadgrid_core::RunParams;
use loadgrid_core::SharedAuditSink;
use loadgrid_core::SystemClock;
use loadgrid_core::Transition;
use loadgrid_store_sqlite::SqliteRunStore;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Orchestrator wired to the durable adapters.
type CliOrchestrator =
    Orchestrator<SqliteRunStore, RandomNameGenerator, SystemClock, SharedAuditSink>;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "loadgrid", version, disable_help_subcommand = true)]
struct Cli {
    /// Store and config selection shared by every command.
    #[command(flatten)]
    global: GlobalArgs,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Arguments accepted by every subcommand.
#[derive(Args, Debug, Clone)]
struct GlobalArgs {
    /// Config file path (defaults to `LOADGRID_CONFIG` or ./loadgrid.toml).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// `SQLite` database path, overriding the `[store]` section.
    #[arg(long, value_name = "PATH", global = true)]
    store_path: Option<PathBuf>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Test location registry.
    Location {
        /// Selected location subcommand.
        #[command(subcommand)]
        command: LocationCommand,
    },
    /// Test run lifecycle.
    Run {
        /// Selected run subcommand.
        #[command(subcommand)]
        command: RunCommand,
    },
    /// Location job status reporting.
    Job {
        /// Selected job subcommand.
        #[command(subcommand)]
        command: JobCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Location subcommands.
#[derive(Subcommand, Debug)]
enum LocationCommand {
    /// Register a location.
    Add {
        /// Location slug.
        name: String,
        /// Human-readable label (defaults to the slug).
        #[arg(long, default_value = "")]
        display_name: String,
    },
    /// List registered locations with their liveness.
    List,
    /// Remove a location no run references.
    Remove {
        /// Location slug.
        name: String,
    },
    /// Record a check-in from a location.
    Ping {
        /// Location slug.
        name: String,
    },
}

/// Run subcommands.
#[derive(Subcommand, Debug)]
enum RunCommand {
    /// Create a draft run.
    Create(RunCreateCommand),
    /// Take a draft run live.
    Start {
        /// Run name.
        name: String,
    },
    /// Cancel every non-terminal job of a run.
    Cancel {
        /// Run name.
        name: String,
        /// Description recorded on canceled jobs.
        #[arg(long)]
        message: Option<String>,
    },
    /// Copy a run into a fresh draft.
    Duplicate {
        /// Run name.
        name: String,
    },
    /// Delete a run and its jobs.
    Delete {
        /// Run name.
        name: String,
    },
    /// Replace the location shares of a draft run.
    SetLocations {
        /// Run name.
        name: String,
        /// Location share as `LOCATION=WORKERS`; repeatable.
        #[arg(long = "location", value_name = "LOCATION=WORKERS", value_parser = parse_share)]
        locations: Vec<LocationRequest>,
    },
    /// Show one run.
    Show {
        /// Run name.
        name: String,
    },
    /// List runs, oldest first.
    List,
}

/// Arguments for `run create`.
#[derive(Args, Debug)]
struct RunCreateCommand {
    /// URL under test.
    #[arg(long)]
    target: String,
    /// Location share as `LOCATION=WORKERS`; repeatable.
    #[arg(long = "location", value_name = "LOCATION=WORKERS", value_parser = parse_share)]
    locations: Vec<LocationRequest>,
    /// Script repository.
    #[arg(long)]
    repo: Option<String>,
    /// Script git ref.
    #[arg(long = "ref")]
    git_ref: Option<String>,
    /// Script path inside the repository.
    #[arg(long)]
    script: Option<String>,
    /// CPU request per worker.
    #[arg(long)]
    cpu: Option<String>,
    /// Memory request per worker.
    #[arg(long)]
    memory: Option<String>,
    /// Allow workers to share nodes.
    #[arg(long, action = ArgAction::SetTrue)]
    shared_nodes: bool,
    /// Node selector as space-separated `key=value` pairs.
    #[arg(long)]
    node_selector: Option<String>,
    /// Worker job deadline as a duration such as `1h30m`.
    #[arg(long)]
    job_deadline: Option<String>,
    /// Environment variable as `NAME=VALUE`; repeatable.
    #[arg(long = "env", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    env_vars: Vec<KeyValue>,
    /// Metric label as `NAME=VALUE`; repeatable.
    #[arg(long = "label", value_name = "NAME=VALUE", value_parser = parse_key_value)]
    labels: Vec<KeyValue>,
}

/// Job subcommands.
#[derive(Subcommand, Debug)]
enum JobCommand {
    /// Apply a named transition to a job.
    Transition {
        /// Run name.
        run: String,
        /// Location slug.
        location: String,
        /// Transition verb (accept, ready, start, finish, fail, cancel, retry).
        transition: Transition,
        /// Description recorded with fail, cancel, or retry.
        #[arg(long)]
        message: Option<String>,
    },
    /// Request a target status for a job.
    Status {
        /// Run name.
        run: String,
        /// Location slug.
        location: String,
        /// Target status.
        status: LocationStatus,
        /// Description recorded with failed, canceled, or pending.
        #[arg(long)]
        message: Option<String>,
    },
    /// Report how many workers are online.
    Workers {
        /// Run name.
        run: String,
        /// Location slug.
        location: String,
        /// Online worker count.
        online: u32,
    },
    /// Show the worker view of one job.
    Show {
        /// Run name.
        run: String,
        /// Location slug.
        location: String,
    },
    /// List the jobs assigned to a location.
    List {
        /// Location slug.
        location: String,
        /// Include jobs of draft runs.
        #[arg(long, action = ArgAction::SetTrue)]
        include_drafts: bool,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the configuration file.
    Validate,
    /// Print an example configuration.
    Example,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

impl From<OrchestratorError> for CliError {
    fn from(error: OrchestratorError) -> Self {
        Self::new(format!("{}: {error}", error_kind(&error)))
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Returns a stable label for an orchestrator error.
const fn error_kind(error: &OrchestratorError) -> &'static str {
    match error {
        OrchestratorError::InvalidTransition(_) => "invalid_transition",
        OrchestratorError::UnknownEntity {
            ..
        } => "unknown_entity",
        OrchestratorError::ConcurrentModification(_) => "concurrent_modification",
        OrchestratorError::ConstraintViolation(_) => "constraint_violation",
        OrchestratorError::InvalidInput(_) => "invalid_input",
        OrchestratorError::Store(_) => "store",
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Location {
            command,
        } => command_location(&open_orchestrator(&cli.global)?, command),
        Commands::Run {
            command,
        } => command_run(&open_orchestrator(&cli.global)?, command),
        Commands::Job {
            command,
        } => command_job(&open_orchestrator(&cli.global)?, command),
        Commands::Config {
            command,
        } => command_config(&cli.global, &command),
    }
}

/// Loads configuration and wires the orchestrator to a `SQLite` store.
fn open_orchestrator(global: &GlobalArgs) -> CliResult<CliOrchestrator> {
    let config = load_config(global)?;
    let sqlite = config.store.sqlite_config().ok_or_else(|| {
        CliError::new(
            "the cli requires a durable store: set [store] type = \"sqlite\" or pass --store-path"
                .to_string(),
        )
    })?;
    let store = SqliteRunStore::new(sqlite)
        .map_err(|err| CliError::new(format!("failed to open store: {err}")))?;
    let audit = config.audit.build_sink().map_err(|err| CliError::new(err.to_string()))?;
    Ok(Orchestrator::new(
        store,
        RandomNameGenerator,
        SystemClock,
        audit,
        config.orchestrator_config(),
    ))
}

/// Loads configuration and applies command-line overrides.
fn load_config(global: &GlobalArgs) -> CliResult<LoadgridConfig> {
    let mut config = LoadgridConfig::load_or_default(global.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    if let Some(path) = &global.store_path {
        config.store.store_type = StoreType::Sqlite;
        config.store.path = Some(path.clone());
        config.validate().map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    }
    Ok(config)
}

// ============================================================================
// SECTION: Location Commands
// ============================================================================

/// Dispatches location subcommands.
fn command_location(
    orchestrator: &CliOrchestrator,
    command: LocationCommand,
) -> CliResult<ExitCode> {
    match command {
        LocationCommand::Add {
            name,
            display_name,
        } => write_json(&orchestrator.register_location(&name, &display_name)?)?,
        LocationCommand::List => write_json(&orchestrator.list_locations()?)?,
        LocationCommand::Remove {
            name,
        } => {
            orchestrator.remove_location(&LocationName::new(name.as_str()))?;
            write_json(&json!({ "removed": name }))?;
        }
        LocationCommand::Ping {
            name,
        } => write_json(&orchestrator.ping_location(&LocationName::new(name))?)?,
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Run Commands
// ============================================================================

/// Dispatches run subcommands.
fn command_run(orchestrator: &CliOrchestrator, command: RunCommand) -> CliResult<ExitCode> {
    match command {
        RunCommand::Create(command) => write_json(&orchestrator.create_run(run_params(command))?)?,
        RunCommand::Start {
            name,
        } => write_json(&orchestrator.start_run(&RunName::new(name))?)?,
        RunCommand::Cancel {
            name,
            message,
        } => write_json(&orchestrator.cancel_run(&RunName::new(name), message.as_deref())?)?,
        RunCommand::Duplicate {
            name,
        } => write_json(&orchestrator.duplicate_run(&RunName::new(name))?)?,
        RunCommand::Delete {
            name,
        } => {
            orchestrator.delete_run(&RunName::new(name.as_str()))?;
            write_json(&json!({ "deleted": name }))?;
        }
        RunCommand::SetLocations {
            name,
            locations,
        } => write_json(&orchestrator.replace_locations(&RunName::new(name), &locations)?)?,
        RunCommand::Show {
            name,
        } => write_json(&orchestrator.run_view(&RunName::new(name))?)?,
        RunCommand::List => write_json(&orchestrator.list_runs()?)?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Builds run parameters from `run create` arguments.
fn run_params(command: RunCreateCommand) -> RunParams {
    let mut params = RunParams::new(command.target);
    params.locations = command.locations;
    params.env_vars = command.env_vars;
    params.labels = command.labels;
    if let Some(repo) = command.repo {
        params.source.repo = repo;
    }
    if let Some(git_ref) = command.git_ref {
        params.source.git_ref = git_ref;
    }
    if let Some(script) = command.script {
        params.source.script = script;
    }
    if let Some(cpu) = command.cpu {
        params.resources.cpu = cpu;
    }
    if let Some(memory) = command.memory {
        params.resources.memory = memory;
    }
    if command.shared_nodes {
        params.resources.dedicated_nodes = false;
    }
    if let Some(node_selector) = command.node_selector {
        params.resources.node_selector = node_selector;
    }
    if let Some(job_deadline) = command.job_deadline {
        params.resources.job_deadline = job_deadline;
    }
    params
}

// ============================================================================
// SECTION: Job Commands
// ============================================================================

/// Dispatches job subcommands.
fn command_job(orchestrator: &CliOrchestrator, command: JobCommand) -> CliResult<ExitCode> {
    match command {
        JobCommand::Transition {
            run,
            location,
            transition,
            message,
        } => write_json(&orchestrator.transition_location(
            &RunName::new(run),
            &LocationName::new(location),
            transition,
            message.as_deref(),
        )?)?,
        JobCommand::Status {
            run,
            location,
            status,
            message,
        } => write_json(&orchestrator.request_status(
            &RunName::new(run),
            &LocationName::new(location),
            status,
            message.as_deref(),
        )?)?,
        JobCommand::Workers {
            run,
            location,
            online,
        } => write_json(&orchestrator.report_online_workers(
            &RunName::new(run),
            &LocationName::new(location),
            online,
        )?)?,
        JobCommand::Show {
            run,
            location,
        } => write_json(
            &orchestrator.location_view(&RunName::new(run), &LocationName::new(location))?,
        )?,
        JobCommand::List {
            location,
            include_drafts,
        } => write_json(&orchestrator.list_jobs(&LocationName::new(location), include_drafts)?)?,
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(global: &GlobalArgs, command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate => {
            let _config = load_config(global)?;
            write_stdout_line("config ok")
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
        ConfigCommand::Example => {
            write_stdout_bytes(config_toml_example().as_bytes())
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Argument Parsers
// ============================================================================

/// Parses a `LOCATION=WORKERS` share.
fn parse_share(value: &str) -> Result<LocationRequest, String> {
    let (location, workers) = value
        .split_once('=')
        .ok_or_else(|| format!("expected LOCATION=WORKERS, got {value}"))?;
    if location.is_empty() {
        return Err(format!("missing location in {value}"));
    }
    let num_workers =
        workers.parse::<u32>().map_err(|_| format!("invalid worker count in {value}"))?;
    Ok(LocationRequest::new(location, num_workers))
}

/// Parses a `NAME=VALUE` pair; the value may contain `=`.
fn parse_key_value(value: &str) -> Result<KeyValue, String> {
    let (name, rest) =
        value.split_once('=').ok_or_else(|| format!("expected NAME=VALUE, got {value}"))?;
    if name.is_empty() {
        return Err(format!("missing name in {value}"));
    }
    Ok(KeyValue::new(name, rest))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a value as pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .map_err(|err| CliError::new(format!("failed to serialize output: {err}")))?;
    bytes.push(b'\n');
    write_stdout_bytes(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(&format!("error: {message}"));
    ExitCode::FAILURE
}
