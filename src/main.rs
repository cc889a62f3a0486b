//! tablemirror - inspect a local table mirror from the command line.

use std::path::PathBuf;
use std::process::ExitCode;

use serde_json::Value;
use tracing_subscriber::EnvFilter;

use tablemirror::db::{Database, MirrorConfig};

enum Command {
    Tables,
    Schema(String),
    Dump(String),
    Resolve(String),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tablemirror=info,warn")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    // Parse simple command line args.
    let mut config = MirrorConfig::from_env().create_if_missing(false);
    let mut positional: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-d" | "--database" => {
                i += 1;
                if i < args.len() {
                    config.path = PathBuf::from(&args[i]);
                }
            }
            "-m" | "--media-root" => {
                i += 1;
                if i < args.len() {
                    config = config.media_root(&args[i]);
                }
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--version" => {
                println!("tablemirror v{}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown option: {}", arg);
                return ExitCode::FAILURE;
            }
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    let command = match parse_command(&positional) {
        Some(command) => command,
        None => {
            print_help();
            return ExitCode::FAILURE;
        }
    };

    let db = match Database::open_with_config(config) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error opening mirror: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&db, command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn parse_command(args: &[String]) -> Option<Command> {
    match args {
        [cmd] if cmd == "tables" => Some(Command::Tables),
        [cmd, table] if cmd == "schema" => Some(Command::Schema(table.clone())),
        [cmd, table] if cmd == "dump" => Some(Command::Dump(table.clone())),
        [cmd, reference] if cmd == "resolve" => Some(Command::Resolve(reference.clone())),
        _ => None,
    }
}

fn print_help() {
    println!("tablemirror - inspect a local table mirror");
    println!();
    println!("Usage: tablemirror [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  tables                 List mirrored tables");
    println!("  schema <table>         Show a table's columns");
    println!("  dump <table>           Print every row of a table");
    println!("  resolve <reference>    Turn a media reference into its URL");
    println!();
    println!("Options:");
    println!("  -d, --database PATH    Mirror database file (default: local.db)");
    println!("  -m, --media-root DIR   Directory holding media_files/");
    println!("  -h, --help             Show this help message");
    println!("  --version              Show version");
    println!();
    println!("Environment:");
    println!("  TABLEMIRROR_DB, TABLEMIRROR_MEDIA_ROOT, TABLEMIRROR_BASE_URL, RUST_LOG");
}

fn run(db: &Database, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Tables => {
            for table in db.tables()? {
                println!("{}", table);
            }
        }
        Command::Schema(name) => {
            let table = db.table(&name)?;
            println!("{} (key: {})", name, table.key_shape());
            for column in table.schema()? {
                println!("  {}", column);
            }
        }
        Command::Dump(name) => {
            let rows = db.table(&name)?.all()?;
            if rows.is_empty() {
                println!("(0 rows)");
                return Ok(());
            }

            let columns: Vec<String> = rows[0].keys().cloned().collect();
            println!("{}", columns.join("\t"));
            for row in &rows {
                let values: Vec<String> = columns
                    .iter()
                    .map(|col| row.raw(col).map(format_value).unwrap_or_default())
                    .collect();
                println!("{}", values.join("\t"));
            }
            println!("({} rows)", rows.len());
        }
        Command::Resolve(reference) => {
            println!("{}", db.media().resolve(&reference)?);
        }
    }
    Ok(())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}
