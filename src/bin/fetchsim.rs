//! Fetch front-end simulator CLI.
//!
//! Runs a program image through the fetch unit with its collaborator models
//! and prints the fetch statistics. Configuration comes from a JSON file
//! (see `fetchsim::config::Config`) or built-in defaults.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use fetchsim::config::Config;
use fetchsim::sim::loader;
use fetchsim::stats::STATS_SECTIONS;
use fetchsim::FetchSystem;

#[derive(Parser, Debug)]
#[command(
    name = "fetchsim",
    version,
    about = "Cycle-accurate instruction fetch unit simulator",
    long_about = "Run a flat program image through the fetch front-end.\n\n\
                  Configuration is JSON (see Config); the CLI uses built-in defaults otherwise.\n\n\
                  Examples:\n  fetchsim run -f prog.bin\n  fetchsim run -f prog.bin -c dfe.json -t 10000"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a program image through the fetch front-end.
    Run {
        /// Flat little-endian program image to fetch.
        #[arg(short, long)]
        file: PathBuf,

        /// JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of ticks to simulate.
        #[arg(short, long, default_value_t = 10_000)]
        ticks: u64,

        /// Stats sections to print (default: all).
        #[arg(long, value_parser = parse_section)]
        stats: Vec<String>,
    },
}

fn parse_section(s: &str) -> Result<String, String> {
    if STATS_SECTIONS.contains(&s) {
        Ok(s.to_string())
    } else {
        Err(format!(
            "unknown section '{}', expected one of {:?}",
            s, STATS_SECTIONS
        ))
    }
}

fn load_config(path: Option<&PathBuf>) -> Config {
    match path {
        None => Config::default(),
        Some(path) => {
            let text = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("error: cannot read config {}: {}", path.display(), e);
                process::exit(1);
            });
            serde_json::from_str(&text).unwrap_or_else(|e| {
                eprintln!("error: cannot parse config {}: {}", path.display(), e);
                process::exit(1);
            })
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            file,
            config,
            ticks,
            stats,
        } => {
            let config = load_config(config.as_ref());
            let image = loader::read_image(&file).unwrap_or_else(|e| {
                eprintln!("error: cannot load {}: {}", file.display(), e);
                process::exit(1);
            });

            let start_pc = config.general.start_pc;
            let mut system = FetchSystem::new(config);
            system.load_image(start_pc, &image);
            system.run(ticks);

            println!(
                "fetched {} instructions to decode in {} ticks",
                system.decoded.len(),
                system.now()
            );
            system.fetch.stats.print_sections(&stats);
        }
    }
}
