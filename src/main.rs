mod config;
mod error;
mod store;
mod task;
mod task_list;
mod ui;

use clap::{value_parser, Arg, ArgMatches, Command};
use config::{Config, StoreKind, DEFAULT_CONFIG_FILE};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use error::StoreResult;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    fs::OpenOptions,
    io,
    path::{Path, PathBuf},
    sync::Mutex,
};
use store::{FileStore, MemoryStore, TodoStore};
use task_list::TaskList;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("foodo")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Terminal to-do list")
        .arg(
            Arg::new("store")
                .long("store")
                .value_parser(value_parser!(StoreKind))
                .help("Where tasks live: memory, sample or file"),
        )
        .arg(
            Arg::new("data")
                .long("data")
                .value_parser(value_parser!(PathBuf))
                .help("Data file used by the file store"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("Config file (default: foodo_config.json)"),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_parser(value_parser!(PathBuf))
                .help("Write logs to this file"),
        )
        .subcommand(Command::new("list").about("Print all tasks"))
        .subcommand(
            Command::new("add").about("Add a task").arg(
                Arg::new("text")
                    .required(true)
                    .num_args(1..)
                    .help("Task text"),
            ),
        )
        .subcommand(
            Command::new("toggle")
                .about("Toggle a task between done and not done")
                .arg(position_arg()),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a task")
                .arg(position_arg()),
        )
}

fn position_arg() -> Arg {
    Arg::new("position")
        .required(true)
        .value_parser(value_parser!(usize))
        .help("Zero-based position as shown by `list`")
}

fn load_config(matches: &ArgMatches) -> io::Result<Config> {
    let path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = Config::load(path)?;

    if let Some(store) = matches.get_one::<StoreKind>("store") {
        config.store = *store;
    }
    if let Some(data) = matches.get_one::<PathBuf>("data") {
        config.data_file = data.clone();
    }
    if let Some(log_file) = matches.get_one::<PathBuf>("log-file") {
        config.log_file = Some(log_file.clone());
    }
    Ok(config)
}

/// Logs go to `log_file` when set. Otherwise the TUI discards them so they
/// do not draw over the screen, and one-shot commands write to stderr.
fn init_logging(log_file: Option<&Path>, tui: bool) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None if tui => builder.with_writer(io::sink).init(),
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

fn open_store(config: &Config) -> StoreResult<Box<dyn TodoStore>> {
    Ok(match config.store {
        StoreKind::Memory => Box::new(MemoryStore::new()),
        StoreKind::Sample => Box::new(MemoryStore::with_sample_data()),
        StoreKind::File => Box::new(FileStore::open(&config.data_file)?),
    })
}

fn print_list(list: &TaskList) {
    for (i, task) in list.iter().enumerate() {
        let check = if task.done { "x" } else { " " };
        println!("{i:>3} [{check}] {}", task.text);
    }
    println!("{} of {} remaining", list.remaining(), list.len());
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    init_logging(config.log_file.as_deref(), matches.subcommand().is_none())?;
    info!(store = %config.store, "starting");

    let mut list = TaskList::new(open_store(&config)?);

    match matches.subcommand() {
        Some(("list", _)) => print_list(&list),
        Some(("add", sub_matches)) => {
            let words: Vec<&str> = sub_matches
                .get_many::<String>("text")
                .unwrap_or_default()
                .map(String::as_str)
                .collect();
            list.new_todo_text = words.join(" ");
            if list.add_new_todo()?.is_none() {
                eprintln!("Nothing to add");
            }
            print_list(&list);
        }
        Some(("toggle", sub_matches)) => {
            let position = sub_matches.get_one::<usize>("position").copied().unwrap_or(0);
            let task = list.toggle_done(position)?;
            let state = if task.done { "done" } else { "not done" };
            println!("{} is {state}", task.text);
        }
        Some(("delete", sub_matches)) => {
            let position = sub_matches.get_one::<usize>("position").copied().unwrap_or(0);
            list.delete_todo(position)?;
            print_list(&list);
        }
        _ => run_tui(&mut list)?,
    }

    Ok(())
}

fn run_tui(list: &mut TaskList) -> io::Result<()> {
    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = ui::run_app(&mut terminal, list);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}
