use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use paper_ladder::config::{find_config_file, load_config, Config};
use paper_ladder::models::Paper;
use paper_ladder::sources::{api_limits, known_providers};
use paper_ladder::utils::{find_duplicates, DuplicateStrategy, EntityResolver};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Paper Ladder - concurrent multi-source academic paper search
#[derive(Parser, Debug)]
#[command(name = "paper-ladder")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Search academic paper providers concurrently and merge duplicate records",
    long_about = None
)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Strategy for handling duplicates
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Strategy {
    /// Merge each duplicate group field by field
    Merge,
    /// Keep the first occurrence of each duplicate group
    First,
}

impl From<Strategy> for DuplicateStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Merge => DuplicateStrategy::Merge,
            Strategy::First => DuplicateStrategy::KeepFirst,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List known providers with their pagination limits and configured rates
    Sources,

    /// Resolve duplicate papers in a JSON file
    Resolve {
        /// Input JSON file containing an array of papers
        input: PathBuf,

        /// How to collapse duplicate groups
        #[arg(long, short, value_enum, default_value_t = Strategy::Merge)]
        strategy: Strategy,

        /// Output file (defaults to stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Only list the duplicate groups
        #[arg(long)]
        show: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn log_filter(cli: &Cli, config: &Config) -> String {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };
    std::env::var("RUST_LOG").unwrap_or_else(|_| format!("paper_ladder={}", level))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration from file if specified or found in default locations
    let config_path = cli.config.clone().or_else(find_config_file);
    let config = load_config(config_path.as_deref()).with_context(|| match &config_path {
        Some(path) => format!("loading {}", path.display()),
        None => "loading configuration from environment".to_string(),
    })?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(log_filter(&cli, &config)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }

    match cli.command {
        Some(Commands::Sources) | None => print_sources(&config),

        Some(Commands::Resolve {
            input,
            strategy,
            output,
            show,
        }) => {
            let json_str = std::fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let papers: Vec<Paper> = serde_json::from_str(&json_str)
                .with_context(|| format!("parsing papers from {}", input.display()))?;

            if show {
                let groups = find_duplicates(&papers);
                if groups.is_empty() {
                    println!("No duplicates found");
                } else {
                    println!("Found {} duplicate groups:", groups.len());
                    for (i, group) in groups.iter().enumerate() {
                        println!("  Group {}: {} papers", i + 1, group.len());
                        for idx in group {
                            println!("    - {} ({})", papers[*idx].title, papers[*idx].source);
                        }
                    }
                }
                return Ok(());
            }

            let before = papers.len();
            let resolved =
                EntityResolver::new(config.priority.clone()).resolve(papers, strategy.into());
            let output_json = serde_json::to_string_pretty(&resolved)?;

            match &output {
                Some(path) => std::fs::write(path, output_json)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{}", output_json),
            }

            if !cli.quiet {
                eprintln!("Resolved: {} -> {} papers", before, resolved.len());
            }
        }

        Some(Commands::Config) => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn print_sources(config: &Config) {
    use comfy_table::{Attribute, Cell, Table};

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec![
        "Source", "Per request", "Max offset", "Cursor", "Req/s", "Cap", "Notes",
    ]);

    for name in known_providers() {
        let limits = api_limits(name);
        let default_marker = if config.default_sources.iter().any(|s| s == name) {
            " *"
        } else {
            ""
        };

        table.add_row(vec![
            Cell::new(format!("{}{}", name, default_marker)).add_attribute(Attribute::Bold),
            Cell::new(limits.per_request_max),
            Cell::new(
                limits
                    .offset_max
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "unbounded".to_string()),
            ),
            Cell::new(if limits.cursor_support { "yes" } else { "no" }),
            Cell::new(config.rate_for(name)),
            Cell::new(config.cap_for(name)),
            Cell::new(limits.note),
        ]);
    }

    println!("{table}");
    println!("* queried by default");
}
