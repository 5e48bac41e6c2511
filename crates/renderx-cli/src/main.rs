use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use renderx_contracts::commands::{parse_command, SessionCommand, SESSION_HELP_COMMANDS};
use renderx_contracts::events::{tail_file, EventWriter, DEFAULT_TAIL_BYTES};
use renderx_contracts::models::{GenerationRequest, ModelFamily, ModelRegistry, DEFAULT_MODEL};
use renderx_contracts::runs::export::export_results;
use renderx_contracts::runs::summary::read_summary;
use renderx_contracts::session::{ResultStore, SessionState};
use renderx_engine::{
    ApiKey, BatchOrchestrator, BatchProgress, BatchReport, CopyToDirectory, DryrunBackend,
    EngineConfig, GeminiVeoBackend, VideoBackend,
};
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Target prefix shared by the binary and the `renderx_*` library crates.
const DEFAULT_LOG_FILTER: &str = "renderx=info";
const DRYRUN_API_KEY: &str = "dryrun";

#[derive(Debug, Parser)]
#[command(name = "renderx", version, about = "Batch video generation with Veo")]
struct Cli {
    /// Tracing filter, e.g. `debug` or `renderx_engine=debug`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate one video per prompt. Exits with 2 when any prompt failed.
    Run(RunArgs),
    /// Interactive prompt queue with slash commands.
    Session(SessionArgs),
    /// Print the tail of the event log.
    Logs(LogsArgs),
    /// List known models and their parameter rules.
    Models(ModelsArgs),
    /// Copy the files of the last batch summary into a directory.
    Export(ExportArgs),
}

#[derive(Debug, Args)]
struct EngineArgs {
    /// Output directory (default `$HOME/Downloads/VEO_OUTPUT`).
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    api_base: Option<String>,
    #[arg(long)]
    poll_timeout_secs: Option<u64>,
    #[arg(long)]
    poll_interval_secs: Option<u64>,
    /// Run the whole pipeline offline against a fake backend.
    #[arg(long)]
    dry_run: bool,
    /// Copy each successful video here as soon as it is downloaded.
    #[arg(long)]
    deliver_to: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct GenerationArgs {
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
    #[arg(long, default_value = "16:9")]
    aspect: String,
    #[arg(long)]
    duration: Option<u32>,
    #[arg(long)]
    negative: Option<String>,
    #[arg(long)]
    person: Option<String>,
}

#[derive(Debug, Parser)]
struct RunArgs {
    #[command(flatten)]
    engine: EngineArgs,
    #[command(flatten)]
    generation: GenerationArgs,
    /// Prompt text; repeat for several jobs.
    #[arg(long)]
    prompt: Vec<String>,
    /// Text file with one prompt per line.
    #[arg(long)]
    prompts_file: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[command(flatten)]
    engine: EngineArgs,
    #[command(flatten)]
    generation: GenerationArgs,
}

#[derive(Debug, Parser)]
struct LogsArgs {
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_TAIL_BYTES)]
    bytes: u64,
}

#[derive(Debug, Parser)]
struct ModelsArgs {
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct ExportArgs {
    /// Summary written by the last batch (default `<output dir>/summary.json`).
    #[arg(long)]
    summary: Option<PathBuf>,
    #[arg(long)]
    out: PathBuf,
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("renderx error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Run(args) => run_batch_command(args),
        Command::Session(args) => {
            run_session_command(args)?;
            Ok(0)
        }
        Command::Logs(args) => run_logs_command(args),
        Command::Models(args) => run_models_command(args),
        Command::Export(args) => run_export_command(args),
    }
}

/// Backend, credential and event log shared by `run` and `session`.
struct Runtime {
    config: EngineConfig,
    backend: Box<dyn VideoBackend>,
    credential: Option<ApiKey>,
    events: EventWriter,
    delivery: Option<CopyToDirectory>,
}

impl Runtime {
    fn new(args: &EngineArgs, session_id: &str) -> Result<Self> {
        let config = apply_engine_overrides(EngineConfig::from_env(), args);
        std::fs::create_dir_all(&config.output_dir)
            .with_context(|| format!("failed to create {}", config.output_dir.display()))?;
        let events_path = args.events.clone().unwrap_or_else(|| config.events_path());
        let events = EventWriter::new(events_path, session_id.to_string());

        let backend: Box<dyn VideoBackend> = if args.dry_run {
            Box::new(DryrunBackend::default())
        } else {
            Box::new(GeminiVeoBackend::new(config.api_base.clone()))
        };
        let credential = if args.dry_run {
            Some(
                config
                    .api_key
                    .clone()
                    .unwrap_or_else(|| ApiKey::new(DRYRUN_API_KEY)),
            )
        } else {
            config.api_key.clone()
        };
        tracing::info!(
            backend = backend.name(),
            output_dir = %config.output_dir.display(),
            credential = credential.is_some(),
            "runtime ready"
        );

        Ok(Self {
            config,
            backend,
            credential,
            events,
            delivery: args.deliver_to.clone().map(CopyToDirectory::new),
        })
    }

    fn orchestrator(&self) -> BatchOrchestrator<'_> {
        let orchestrator = BatchOrchestrator::new(self.backend.as_ref(), &self.config.output_dir)
            .with_poll_settings(self.config.poll)
            .with_events(self.events.clone());
        match self.delivery.as_ref() {
            Some(hook) => orchestrator.with_delivery(hook),
            None => orchestrator,
        }
    }
}

fn apply_engine_overrides(mut config: EngineConfig, args: &EngineArgs) -> EngineConfig {
    if let Some(out) = args.out.clone() {
        config.output_dir = out;
    }
    if let Some(base) = args
        .api_base
        .as_deref()
        .map(|value| value.trim().trim_end_matches('/'))
        .filter(|value| !value.is_empty())
    {
        config.api_base = base.to_string();
    }
    if let Some(secs) = args.poll_timeout_secs.filter(|value| *value > 0) {
        config.poll.timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = args.poll_interval_secs.filter(|value| *value > 0) {
        config.poll.interval = Duration::from_secs(secs);
    }
    config
}

fn apply_generation_args(state: &mut SessionState, args: &GenerationArgs) {
    state.set_model(&args.model);
    state.set_aspect_ratio(&args.aspect);
    state.set_duration(args.duration);
    state.set_negative_prompt(args.negative.as_deref());
    state.set_person_generation(args.person.as_deref());
}

fn run_batch_command(args: RunArgs) -> Result<i32> {
    let mut state = SessionState::new();
    apply_generation_args(&mut state, &args.generation);
    for prompt in &args.prompt {
        state.prompts.add_lines(prompt);
    }
    if let Some(path) = args.prompts_file.as_ref() {
        state.prompts.import_file(path)?;
    }
    if state.prompts.is_empty() {
        bail!("no prompts given; use --prompt or --prompts-file");
    }

    let runtime = Runtime::new(&args.engine, &state.session_id)?;
    state.set_auto_deliver(runtime.delivery.is_some());
    print_param_warnings(&state);
    let report = runtime.orchestrator().run_session(
        runtime.credential.as_ref(),
        &mut state,
        &mut render_progress,
    )?;
    print_report(&report);
    if report.ok_count() == report.records.len() {
        Ok(0)
    } else {
        Ok(2)
    }
}

fn run_session_command(args: SessionArgs) -> Result<()> {
    let mut state = SessionState::new();
    apply_generation_args(&mut state, &args.generation);
    let runtime = Runtime::new(&args.engine, &state.session_id)?;
    let registry = ModelRegistry::default();
    if runtime.credential.is_none() {
        println!("No API key found. Set GEMINI_API_KEY (or use --dry-run).");
    }

    let stdin = io::stdin();
    let mut line = String::new();
    println!("RenderX session started. Type /help for commands; plain text adds prompts.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        match parse_command(input) {
            SessionCommand::Noop => continue,
            SessionCommand::Help => {
                println!("Commands: {}", SESSION_HELP_COMMANDS.join(" "));
            }
            SessionCommand::Quit => break,
            SessionCommand::AddPrompts(text) => {
                let added = state.prompts.add_lines(&text);
                println!("Added {added} prompt(s); {} queued.", state.prompts.len());
            }
            SessionCommand::ImportPrompts(path) => match state.prompts.import_file(&path) {
                Ok(added) => println!(
                    "Imported {added} prompt(s) from {}; {} queued.",
                    path.display(),
                    state.prompts.len()
                ),
                Err(err) => println!("Import failed: {err}"),
            },
            SessionCommand::EditPrompt { reference, text } => {
                let Some(id) = state.prompts.resolve_ref(&reference) else {
                    println!("No prompt matches '{reference}'.");
                    continue;
                };
                match state.prompts.edit(&id, &text) {
                    Ok(Some(diff)) => {
                        for diff_line in diff {
                            println!("{diff_line}");
                        }
                    }
                    Ok(None) => println!("Prompt unchanged."),
                    Err(err) => println!("Edit failed: {err}"),
                }
            }
            SessionCommand::DeletePrompt(reference) => {
                let removed = state
                    .prompts
                    .resolve_ref(&reference)
                    .and_then(|id| state.prompts.delete(&id));
                match removed {
                    Some(item) => println!("Deleted prompt: {}", item.text),
                    None => println!("No prompt matches '{reference}'."),
                }
            }
            SessionCommand::ClearPrompts => {
                let removed = state.prompts.clear();
                println!("Cleared {removed} prompt(s).");
            }
            SessionCommand::ListPrompts => print!("{}", render_prompts(&state)),
            SessionCommand::SetModel(name) => {
                let spec = registry.resolve(&name);
                state.set_model(&spec.name);
                println!("Model set to {} ({}).", spec.name, spec.family.label());
                if spec.family == ModelFamily::Other {
                    println!("Unregistered model: parameters are passed through unchecked.");
                }
                print_param_warnings(&state);
            }
            SessionCommand::ListModels => print!("{}", render_models(&registry)),
            SessionCommand::SetAspectRatio(ratio) => {
                state.set_aspect_ratio(&ratio);
                println!("Aspect ratio set to {}.", state.params.aspect_ratio);
                print_param_warnings(&state);
            }
            SessionCommand::SetDuration(seconds) => {
                state.set_duration(seconds);
                match seconds {
                    Some(seconds) => println!("Duration set to {seconds}s."),
                    None => println!("Duration reset to the model default."),
                }
                print_param_warnings(&state);
            }
            SessionCommand::SetNegativePrompt(text) => {
                state.set_negative_prompt(text.as_deref());
                match state.params.negative_prompt.as_deref() {
                    Some(text) => println!("Negative prompt: {text}"),
                    None => println!("Negative prompt cleared."),
                }
            }
            SessionCommand::SetPersonGeneration(option) => {
                state.set_person_generation(option.as_deref());
                println!(
                    "Person generation: {}",
                    state.params.person_generation.as_deref().unwrap_or("(default)")
                );
                print_param_warnings(&state);
            }
            SessionCommand::SetAutoDeliver(enabled) => {
                if enabled && runtime.delivery.is_none() {
                    println!("Auto-delivery needs a target; restart with --deliver-to <dir>.");
                    continue;
                }
                state.set_auto_deliver(enabled);
                println!("Auto-delivery {}.", if enabled { "on" } else { "off" });
            }
            SessionCommand::ShowSettings => print!("{}", render_settings(&state, &runtime)),
            SessionCommand::RunBatch => {
                let result = runtime.orchestrator().run_session(
                    runtime.credential.as_ref(),
                    &mut state,
                    &mut render_progress,
                );
                match result {
                    Ok(report) => print_report(&report),
                    Err(err) => println!("Run failed: {err}"),
                }
            }
            SessionCommand::ListResults => print!("{}", render_results(&state.results)),
            SessionCommand::DeleteResult(reference) => {
                let removed = state
                    .results
                    .resolve_ref(&reference)
                    .and_then(|id| state.results.delete(&id));
                match removed {
                    Some(record) => println!("Forgot result {}.", record.summary_line()),
                    None => println!("No result matches '{reference}'."),
                }
            }
            SessionCommand::ClearResults => {
                let removed = state.results.clear();
                println!("Forgot {removed} result(s).");
            }
            SessionCommand::ExportResults(dir) => match export_results(&state.results, &dir) {
                Ok(report) => println!(
                    "Exported {} file(s) to {} (manifest {}).",
                    report.files.len(),
                    dir.display(),
                    report.manifest_path.display()
                ),
                Err(err) => println!("Export failed: {err:#}"),
            },
            SessionCommand::Invalid { reason, .. } => println!("{reason}"),
            SessionCommand::Unknown { command, .. } => {
                println!("Unknown command /{command}. Type /help for commands.")
            }
        }
    }

    println!("Session ended with {} result(s).", state.results.len());
    Ok(())
}

fn run_logs_command(args: LogsArgs) -> Result<i32> {
    let path = match (args.events, args.out) {
        (Some(events), _) => events,
        (None, Some(out)) => out.join(renderx_engine::config::EVENTS_FILE_NAME),
        (None, None) => EngineConfig::from_env().events_path(),
    };
    if !path.exists() {
        println!("No event log at {}.", path.display());
        return Ok(0);
    }
    print!("{}", tail_file(&path, args.bytes)?);
    Ok(0)
}

fn run_models_command(args: ModelsArgs) -> Result<i32> {
    let registry = ModelRegistry::default();
    if args.json {
        let rows: Vec<Value> = registry
            .list()
            .map(|spec| {
                json!({
                    "name": spec.name,
                    "family": spec.family.label(),
                    "aspect_ratios": spec.family.aspect_ratios(),
                    "durations": spec.family.durations(),
                    "sends_duration": spec.family.sends_duration(),
                    "audio": spec.family.audio(),
                    "description": spec.description,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print!("{}", render_models(&registry));
    }
    Ok(0)
}

fn run_export_command(args: ExportArgs) -> Result<i32> {
    let summary_path = args
        .summary
        .unwrap_or_else(|| EngineConfig::from_env().summary_path());
    let summary = read_summary(&summary_path)?;
    let store = ResultStore::from_records(summary.records);
    let report = export_results(&store, &args.out)?;
    println!(
        "Exported {} file(s) to {}",
        report.files.len(),
        args.out.display()
    );
    Ok(0)
}

fn render_progress(event: BatchProgress) {
    match event {
        BatchProgress::JobStarted {
            index,
            total,
            prompt,
        } => println!("[{index}/{total}] {}", renderx_engine::submit::prompt_preview(&prompt)),
        BatchProgress::Submitted { operation, .. } => println!("  submitted {operation}"),
        BatchProgress::Polling { percent, .. } => {
            print!("\r  generating {percent:>3}%");
            if percent == 100 {
                println!();
            }
            let _ = io::stdout().flush();
        }
        BatchProgress::Downloading { destination, .. } => {
            println!("  downloading to {}", destination.display());
        }
        BatchProgress::JobFinished(record) => println!("\r  {}", record.summary_line()),
    }
}

fn print_report(report: &BatchReport) {
    println!();
    println!(
        "Batch {}: {} of {} succeeded.",
        report.batch_id,
        report.ok_count(),
        report.records.len()
    );
    for record in &report.records {
        println!("{}", record.summary_line());
    }
    if report.delivered > 0 {
        println!("Delivered {} file(s).", report.delivered);
    }
    if let Some(path) = report.summary_path.as_ref() {
        println!("Summary: {}", path.display());
    }
}

fn print_param_warnings(state: &SessionState) {
    let preview = GenerationRequest::build(&state.model, "", &state.params);
    for warning in preview.warnings {
        println!("warning: {warning}");
    }
}

fn render_prompts(state: &SessionState) -> String {
    if state.prompts.is_empty() {
        return "No prompts queued.\n".to_string();
    }
    let mut out = String::new();
    for (offset, item) in state.prompts.items().iter().enumerate() {
        let short_id: String = item.id.chars().take(8).collect();
        out.push_str(&format!("{}. [{short_id}] {}\n", offset + 1, item.text));
    }
    out
}

fn render_results(results: &ResultStore) -> String {
    if results.is_empty() {
        return "No results yet.\n".to_string();
    }
    let mut out = String::new();
    for (offset, record) in results.records().iter().enumerate() {
        let delivered = if record.auto_delivered { " (delivered)" } else { "" };
        out.push_str(&format!(
            "#{} {}{delivered}\n",
            offset + 1,
            record.summary_line()
        ));
    }
    out
}

fn render_models(registry: &ModelRegistry) -> String {
    let mut out = String::new();
    for spec in registry.list() {
        let family = spec.family;
        let durations = family
            .durations()
            .iter()
            .map(|value| format!("{value}s"))
            .collect::<Vec<_>>()
            .join("/");
        out.push_str(&format!(
            "{:<32} {:<3} aspect {:<10} duration {:<12} audio {}\n",
            spec.name,
            family.label(),
            family.aspect_ratios().join("|"),
            if family.sends_duration() {
                durations
            } else {
                format!("{durations} fixed")
            },
            if family.audio() { "on" } else { "off" },
        ));
    }
    out
}

fn render_settings(state: &SessionState, runtime: &Runtime) -> String {
    let request = GenerationRequest::build(&state.model, "", &state.params);
    let mut out = String::new();
    out.push_str(&format!("model:        {} ({})\n", request.model, request.family.label()));
    out.push_str(&format!("aspect ratio: {}\n", request.aspect_ratio));
    out.push_str(&format!(
        "duration:     {}s{}\n",
        request.effective_duration(),
        if request.duration_seconds.is_some() { "" } else { " (not sent)" }
    ));
    out.push_str(&format!(
        "negative:     {}\n",
        request.negative_prompt.as_deref().unwrap_or("(none)")
    ));
    out.push_str(&format!(
        "person:       {}\n",
        request.person_generation.as_deref().unwrap_or("(default)")
    ));
    out.push_str(&format!(
        "autodeliver:  {}\n",
        if state.auto_deliver { "on" } else { "off" }
    ));
    out.push_str(&format!("backend:      {}\n", runtime.backend.name()));
    out.push_str(&format!(
        "output:       {}\n",
        runtime.config.output_dir.display()
    ));
    out.push_str(&format!("queued:       {}\n", state.prompts.len()));
    out
}
