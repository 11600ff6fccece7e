use anyhow::{Context, Result};
use chrono::Local;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use daily_note_casing_core::{
    apply_casing, default_settings_path, format_date, is_daily_note, note_path,
    watch_created_notes, DailyNoteHandler, FsVault, NoteFile, Notifier, Settings,
    SettingsStore,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "daily-note-casing")]
#[command(about = "Renames newly created daily notes to a consistent letter case")]
struct Cli {
    /// Settings file to use instead of the one in the OS config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Watch(WatchArgs),
    Check(CheckArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct WatchArgs {
    #[arg(long)]
    vault: PathBuf,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Note file name, e.g. "2024-01-15.md".
    name: String,
    /// Date format to test against instead of the configured one.
    #[arg(long)]
    format: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    /// Date format daily notes are named with, e.g. "YYYY-MM-DD". Empty disables renaming.
    DateFormat { format: String },
    /// "lowercase" or "uppercase".
    Casing { casing: String },
    /// Whether to show a notice after each rename.
    Notify {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    name: String,
    date_format: String,
    daily_note: bool,
    renamed_to: Option<PathBuf>,
}

struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notice(&self, message: &str) {
        eprintln!("{message}");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daily_note_casing_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => default_settings_path()?,
    };
    let store = Arc::new(SettingsStore::open(config_path)?);

    match cli.command {
        Commands::Watch(args) => cmd_watch(args, store),
        Commands::Check(args) => cmd_check(args, &store),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(&store),
            ConfigAction::DateFormat { format } => {
                let settings = store.set_date_format(&format)?;
                print_settings(&store, &settings)
            }
            ConfigAction::Casing { casing } => {
                let settings = store.set_casing(&casing)?;
                print_settings(&store, &settings)
            }
            ConfigAction::Notify { enabled } => {
                let settings = store.set_notify_on_rename(enabled)?;
                print_settings(&store, &settings)
            }
        },
    }
}

fn cmd_watch(args: WatchArgs, store: Arc<SettingsStore>) -> Result<()> {
    let root = std::fs::canonicalize(&args.vault)
        .with_context(|| format!("could not resolve vault: {}", args.vault.display()))?;
    if !store.snapshot().is_enabled() {
        eprintln!(
            "no date format configured; new notes will be left alone until `config date-format` is set"
        );
    }

    let runtime = tokio::runtime::Runtime::new().context("could not start async runtime")?;
    runtime.block_on(async move {
        let vault = FsVault::new(root);
        let subscription = watch_created_notes(&vault)?;
        let handler = Arc::new(DailyNoteHandler::new(
            Arc::new(vault),
            Arc::new(StderrNotifier),
            store,
        ));

        handler
            .serve(subscription, async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::error!("could not listen for ctrl-c: {err}");
                    std::future::pending::<()>().await;
                }
            })
            .await;
        Ok::<_, anyhow::Error>(())
    })
}

fn cmd_check(args: CheckArgs, store: &SettingsStore) -> Result<()> {
    let mut settings = store.snapshot();
    if let Some(format) = args.format {
        settings.date_format = format;
    }

    let file = NoteFile::new(&args.name);
    let daily_note = is_daily_note(&file, &settings);
    let report = CheckReport {
        name: args.name,
        date_format: settings.date_format.clone(),
        daily_note,
        renamed_to: daily_note
            .then(|| note_path(file.parent(), &apply_casing(file.basename(), settings.casing))),
    };

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => match &report.renamed_to {
            Some(target) => println!("{} -> {}", report.name, target.display()),
            None if !settings.is_enabled() => {
                println!("{}: no date format configured", report.name)
            }
            None => println!(
                "{}: not a daily note for format \"{}\"",
                report.name, report.date_format
            ),
        },
    }
    Ok(())
}

fn cmd_config_show(store: &SettingsStore) -> Result<()> {
    print_settings(store, &store.snapshot())
}

fn print_settings(store: &SettingsStore, settings: &Settings) -> Result<()> {
    println!("settings file: {}", store.path().display());
    println!("{}", toml::to_string_pretty(settings)?);
    if settings.is_enabled() {
        match format_date(Local::now().naive_local(), &settings.date_format) {
            Ok(sample) => println!("today's daily note: {sample}"),
            Err(err) => println!("date format is unusable ({err}); no note will match it"),
        }
    }
    Ok(())
}
