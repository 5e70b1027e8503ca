use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use dbc_config::{ConfigStore, create_database, default_path, delete_database, update_database};
use dbc_sqlite::SqliteEngine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

mod picker;
mod session;

use session::{DEFAULT_PAGE_SIZE, Flow, Session};

const VERBOSE_FILTER: &str = "dbc_cli=debug,dbc_core=debug,dbc_sqlite=debug,dbc_config=debug";

#[derive(Debug, Parser)]
#[command(name = "dbc", version)]
#[command(about = "Browse and edit SQLite tables with staged, undoable changes")]
struct Cli {
    /// SQLite database file to open instead of picking a configured one.
    #[arg(short = 'd', long)]
    database: Option<PathBuf>,
    /// Config file (default: ~/.config/dbc/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Rows shown per page.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = parse_page_size)]
    page_size: usize,
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage configured databases.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// List configured databases.
    List,
    /// Add a database after checking that it opens.
    Add(EntryArgs),
    /// Replace the database at a list position.
    Edit(EditArgs),
    /// Remove the database at a list position.
    Remove(RemoveArgs),
}

#[derive(Debug, Args)]
struct EntryArgs {
    /// Display name.
    name: String,
    /// Path to an existing SQLite file.
    path: String,
}

#[derive(Debug, Args)]
struct EditArgs {
    /// Position as shown by `dbc config list`.
    index: usize,
    #[command(flatten)]
    entry: EntryArgs,
}

#[derive(Debug, Args)]
struct RemoveArgs {
    /// Position as shown by `dbc config list`.
    index: usize,
}

fn parse_page_size(text: &str) -> Result<usize, String> {
    match text.parse::<usize>() {
        Ok(0) | Err(_) => Err(format!("expected a positive number, got `{text}`")),
        Ok(n) => Ok(n),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Some(Command::Config(command)) => run_config(cli.config, command),
        None => run_session(cli.database, cli.config, cli.page_size),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn config_store(path: Option<PathBuf>) -> Result<ConfigStore, String> {
    let path = match path {
        Some(path) => path,
        None => default_path().map_err(|e| e.to_string())?,
    };
    Ok(ConfigStore::new(path))
}

fn check_database(path: &Path) -> dbc_sqlite::Result<()> {
    SqliteEngine::check_connection(path)
}

/// Converts a 1-based list position to an index.
fn list_index(position: usize) -> Result<usize, String> {
    position
        .checked_sub(1)
        .ok_or_else(|| "positions start at 1".to_string())
}

fn run_config(config: Option<PathBuf>, command: ConfigCommand) -> Result<(), String> {
    let store = config_store(config)?;
    match command {
        ConfigCommand::List => {
            let databases = store.list().map_err(|e| e.to_string())?;
            println!("Config: {}", store.active_path().display());
            if databases.is_empty() {
                println!("No databases configured.");
            }
            for (i, db) in databases.iter().enumerate() {
                println!("  {}. {} ({})", i + 1, db.name, db.path);
            }
        }
        ConfigCommand::Add(args) => {
            create_database(&store, &args.name, &args.path, check_database)
                .map_err(|e| e.to_string())?;
            println!("Added {}", args.name.trim());
        }
        ConfigCommand::Edit(args) => {
            let index = list_index(args.index)?;
            update_database(&store, index, &args.entry.name, &args.entry.path, check_database)
                .map_err(|e| e.to_string())?;
            println!("Updated {}", args.index);
        }
        ConfigCommand::Remove(args) => {
            let index = list_index(args.index)?;
            delete_database(&store, index).map_err(|e| e.to_string())?;
            println!("Removed {}", args.index);
        }
    }
    Ok(())
}

fn run_session(
    database: Option<PathBuf>,
    config: Option<PathBuf>,
    page_size: usize,
) -> Result<(), String> {
    let path = match database {
        Some(path) => path,
        None => pick_configured_database(config)?,
    };
    let engine = SqliteEngine::open(&path).map_err(|e| e.to_string())?;
    let mut session = Session::new(engine, page_size);
    println!("Connected to {} (type `help` for commands)", path.display());

    if std::io::stdin().is_terminal() {
        run_interactive(&mut session)
    } else {
        run_piped(&mut session)
    }
}

fn pick_configured_database(config: Option<PathBuf>) -> Result<PathBuf, String> {
    let store = config_store(config)?;
    let databases = store.list().map_err(|e| e.to_string())?;
    if databases.is_empty() {
        return Err(format!(
            "no databases configured in {}; pass -d <path> or run `dbc config add <name> <path>`",
            store.active_path().display()
        ));
    }

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut out = std::io::stdout();
    match picker::pick_database(&databases, &mut input, &mut out)? {
        Some(index) => Ok(PathBuf::from(&databases[index].path)),
        None => Err("no database selected".to_string()),
    }
}

fn run_interactive(session: &mut Session) -> Result<(), String> {
    let mut editor = DefaultEditor::new().map_err(|e| e.to_string())?;
    let mut out = std::io::stdout();
    loop {
        match editor.readline(&session.prompt()) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(line.as_str());
                }
                if session.execute(&line, &mut out).map_err(|e| e.to_string())? == Flow::Quit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.to_string()),
        }
    }
    warn_unsaved(session);
    Ok(())
}

fn run_piped(session: &mut Session) -> Result<(), String> {
    let stdin = std::io::stdin();
    let mut out = std::io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| e.to_string())?;
        if session.execute(&line, &mut out).map_err(|e| e.to_string())? == Flow::Quit {
            break;
        }
    }
    out.flush().map_err(|e| e.to_string())?;
    warn_unsaved(session);
    Ok(())
}

fn warn_unsaved(session: &Session) {
    let dirty = session.dirty_count();
    if dirty > 0 {
        eprintln!("warning: {dirty} unsaved changes discarded");
    }
}
