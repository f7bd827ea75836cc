use std::path::PathBuf;
use std::process;

use canaime::config::{Config, DEFAULT_PHOTO_BASE_URL};
use canaime::parser::parse_roster;
use canaime::utils::{RosterFilter, RosterStats};
use canaime::{Entry, PortalScraper};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "canaime")]
#[command(about = "A Canaimé prison roster scraper", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Args)]
struct FilterArgs {
    #[arg(long, help = "Only show entries from this wing, e.g. REMIÇÃO01")]
    wing: Option<String>,

    #[arg(long, help = "Only show entries whose name contains this text")]
    name: Option<String>,

    #[arg(
        long,
        help = "Maximum number of results to return",
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    limit: Option<u16>,

    #[arg(
        long,
        help = "Number of results to skip from the beginning",
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    offset: Option<u16>,

    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value = "text",
        help = "Output format"
    )]
    format: OutputFormat,
}

impl FilterArgs {
    fn roster_filter(&self) -> RosterFilter {
        RosterFilter {
            wing: self.wing.clone(),
            name: self.name.clone(),
            limit: self.limit.map(usize::from),
            offset: self.offset.map(usize::from),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Log into the portal with a headless browser and print the current roster
    Scrape {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Extract roster entries from a saved copy of the listing page
    Parse {
        #[arg(help = "Path to the saved listing HTML")]
        file: PathBuf,

        #[arg(
            long,
            default_value = DEFAULT_PHOTO_BASE_URL,
            help = "Base URL prepended to photo file names"
        )]
        photo_base: String,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn print_entries(entries: Vec<Entry>, args: &FilterArgs) {
    let filter = args.roster_filter().validate().unwrap_or_else(|e| {
        log::error!("Invalid args: {e}");
        process::exit(1);
    });
    let entries = filter.apply(entries);

    match args.format {
        OutputFormat::Json => serialize_json(&entries),
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No entries to display.");
            } else {
                for (i, entry) in entries.iter().enumerate() {
                    println!("{:>4}. {}", i + 1, entry);
                }
                print!("{}", RosterStats::from_entries(&entries));
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    match cli.command {
        Commands::Scrape { filter } => {
            let config = Config::load().unwrap_or_else(|e| {
                log::error!("Invalid configuration: {}", e);
                process::exit(1);
            });

            log::info!("Fetching roster from {}...", config.scraper.listing_url);

            let scraper = PortalScraper::new(config.scraper);
            let entries = scraper.fetch_roster().await.unwrap_or_else(|e| {
                log::error!("Error fetching roster: {}", e);
                process::exit(1);
            });

            print_entries(entries, &filter);
        }

        Commands::Parse {
            file,
            photo_base,
            filter,
        } => {
            log::info!("Parsing roster from {}...", file.display());

            let html = std::fs::read_to_string(&file).unwrap_or_else(|e| {
                log::error!("Error reading {}: {}", file.display(), e);
                process::exit(1);
            });

            let entries = parse_roster(&html, &photo_base).unwrap_or_else(|e| {
                log::error!("Error parsing roster: {}", e);
                process::exit(1);
            });

            print_entries(entries, &filter);
        }
    }
}
