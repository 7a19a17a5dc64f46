use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tasksheet::cli::{Cli, Command};
use tasksheet::commands;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();
    let command = args.command.unwrap_or(Command::Tui);
    init_logging(matches!(command, Command::Tui))?;
    let api = args.api;
    match command {
        Command::Serve(config) => commands::serve(config),
        Command::Init { name } => commands::init(name),
        Command::List {
            view,
            filter,
            sort,
            category,
            html,
        } => commands::list(&api, view, filter, sort, category, html),
        Command::Add {
            title,
            content,
            due,
            category,
            priority,
        } => commands::add(&api, title, content, due, category, priority),
        Command::Edit {
            id,
            title,
            content,
            due,
            clear_due,
            category,
            priority,
        } => commands::edit(&api, id, title, content, due, clear_due, category, priority),
        Command::Toggle { id } => commands::toggle(&api, id),
        Command::Delete { id } => commands::delete(&api, id),
        Command::Tui => commands::tui(&api),
    }
}

/// Logs go to stderr, except under the TUI where they would corrupt the
/// screen and go to `tasksheet.log` in the data dir instead.
fn init_logging(to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if !to_file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }
    let dirs = ProjectDirs::from("", "", "tasksheet")
        .context("could not determine a data directory for logs")?;
    fs::create_dir_all(dirs.data_dir())?;
    let path = dirs.data_dir().join("tasksheet.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
