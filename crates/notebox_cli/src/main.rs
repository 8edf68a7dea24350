//! Notebox command-line front end.
//!
//! # Responsibility
//! - Stand in for the notes list screen and its new/edit/delete dialogs.
//! - Route every command through `NoteSynchronizer` so the CLI observes the
//!   same refresh-after-mutation contract as any other UI.
//!
//! # Invariants
//! - Failures are printed and mapped to a non-zero exit code; nothing is
//!   silently dropped.

use clap::{Parser, Subcommand};
use notebox_core::{
    default_log_level, init_logging, Note, NoteName, NoteSynchronizer, NotesSnapshot,
    StoreConfig,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const PREVIEW_CHARS: usize = 60;

#[derive(Parser, Debug)]
#[command(name = "notebox")]
#[command(about = "Keep plain-text notes as one file per note")]
#[command(version)]
struct Cli {
    /// Notes directory. Defaults to NOTEBOX_NOTES_DIR or a temp folder.
    #[arg(long, global = true)]
    notes_dir: Option<PathBuf>,
    /// Log level for the rolling log file (requires --log-dir).
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Directory for rolling log files. Logging is off when omitted.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// List every note.
    List,
    /// Print one note's full content.
    Show { name: String },
    /// Create a note under a generated, time-based name.
    Add { content: String },
    /// Replace the content of an existing note.
    Edit { name: String, content: String },
    /// Delete one note.
    Delete { name: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        let log_dir = absolute_dir(log_dir)?;
        init_logging(level, &log_dir.to_string_lossy()).map_err(|err| err.to_string())?;
    }

    let mut config = StoreConfig::from_env();
    if let Some(dir) = cli.notes_dir {
        config.notes_dir = dir;
    }
    let synchronizer =
        NoteSynchronizer::open(&config).map_err(|err| format!("cannot open notes: {err}"))?;

    match cli.command {
        Commands::List => {
            let snapshot = synchronizer
                .load_all()
                .await
                .map_err(|err| err.to_string())?;
            print_list(&snapshot, cli.json)
        }
        Commands::Show { name } => {
            let name = parse_name(&name)?;
            let snapshot = synchronizer
                .load_all()
                .await
                .map_err(|err| err.to_string())?;
            let note = snapshot
                .get(&name)
                .ok_or_else(|| format!("note `{name}` not found"))?;
            print_note(note, cli.json)
        }
        Commands::Add { content } => {
            let (note, _) = synchronizer
                .create(content)
                .await
                .map_err(|err| err.to_string())?;
            print_note(&note, cli.json)
        }
        Commands::Edit { name, content } => {
            let name = parse_name(&name)?;
            let snapshot = synchronizer
                .update(name.clone(), content)
                .await
                .map_err(|err| err.to_string())?;
            match snapshot.get(&name) {
                Some(note) => print_note(note, cli.json),
                None => Err(format!("note `{name}` vanished after update")),
            }
        }
        Commands::Delete { name } => {
            let name = parse_name(&name)?;
            synchronizer
                .delete(name.clone())
                .await
                .map_err(|err| err.to_string())?;
            if cli.json {
                println!("{}", serde_json::json!({ "deleted": name }));
            } else {
                println!("deleted {name}");
            }
            Ok(())
        }
    }
}

fn parse_name(raw: &str) -> Result<NoteName, String> {
    NoteName::parse(raw).map_err(|err| err.to_string())
}

fn absolute_dir(dir: &Path) -> Result<PathBuf, String> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(dir))
        .map_err(|err| format!("cannot resolve `{}`: {err}", dir.display()))
}

fn print_list(snapshot: &NotesSnapshot, json: bool) -> Result<(), String> {
    if json {
        let rendered = serde_json::to_string_pretty(&*snapshot.notes)
            .map_err(|err| format!("cannot render notes: {err}"))?;
        println!("{rendered}");
        return Ok(());
    }
    if snapshot.is_empty() {
        println!("(no notes)");
        return Ok(());
    }
    for note in snapshot.iter() {
        println!("{}\t{}", note.name, preview(&note.content));
    }
    Ok(())
}

fn print_note(note: &Note, json: bool) -> Result<(), String> {
    if json {
        let rendered = serde_json::to_string_pretty(note)
            .map_err(|err| format!("cannot render note: {err}"))?;
        println!("{rendered}");
    } else {
        println!("# {}\n{}", note.name, note.content);
    }
    Ok(())
}

fn preview(content: &str) -> String {
    let first_line = content.lines().next().unwrap_or("").trim();
    let mut shown: String = first_line.chars().take(PREVIEW_CHARS).collect();
    if first_line.chars().count() > PREVIEW_CHARS || content.lines().nth(1).is_some() {
        shown.push_str("...");
    }
    shown
}
