//! chain_auditor - sink detection and call-chain reconstruction CLI.

use clap::{Parser, Subcommand, ValueEnum};
use chain_auditor::{
    analyzer::builtin_rules,
    concurrency::Deadline,
    config::{Config, OutputFormat},
    reporter::{create_reporter, HtmlReporter},
    Scanner, VulnClass,
};
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn parse_family(s: &str) -> Result<VulnClass, String> {
    s.parse()
}

/// Sink detection and call-chain reconstruction for Java web applications
#[derive(Parser)]
#[command(name = "chain_auditor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,

    /// Output format
    #[arg(short = 'f', long)]
    format: Option<OutputFormatArg>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy)]
enum OutputFormatArg {
    Text,
    Json,
    Sarif,
    Html,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Text => OutputFormat::Text,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Sarif => OutputFormat::Sarif,
            OutputFormatArg::Html => OutputFormat::Html,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a local project
    Scan {
        /// Project root
        path: PathBuf,

        /// Rule families to run (repeatable): sql-injection, command-exec,
        /// deserialization, script-exec
        #[arg(long = "family", value_parser = parse_family)]
        families: Vec<VulnClass>,

        /// Additional web entry-point annotation (repeatable, without `@`)
        #[arg(long = "annotation")]
        annotations: Vec<String>,

        /// Match process-spawning sinks by name only
        #[arg(long)]
        no_resolve: bool,

        /// Wall-clock budget in seconds; remaining findings are reported untraced
        #[arg(long)]
        budget_secs: Option<u64>,

        /// Maximum implementation chain depth
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// List the built-in sink rules
    Rules,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 if cli.quiet => Level::ERROR,
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_level.to_string())),
        )
        .init();

    // Load configuration
    let mut config = if let Some(ref config_path) = cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    // Override with CLI options
    if let Some(format) = cli.format {
        config.output.format = format.into();
    }
    if cli.output.is_some() {
        config.output.output_path = cli.output.clone();
    }

    let result = match cli.command {
        Commands::Rules => {
            for rule in builtin_rules() {
                let callees = if rule.callees.is_empty() {
                    "${...} in mapping statements".to_string()
                } else {
                    rule.callees.join("|")
                };
                println!(
                    "{:<34} {:<16} {:<9} {:<7} {}",
                    rule.id,
                    rule.class.as_str(),
                    rule.severity.to_string(),
                    rule.cwe(),
                    callees
                );
            }
            return Ok(());
        }

        Commands::Scan {
            path,
            families,
            annotations,
            no_resolve,
            budget_secs,
            max_depth,
        } => {
            if !families.is_empty() {
                config.analysis.families = families;
            }
            config
                .analysis
                .entry_point_annotations
                .extend(annotations.into_iter().map(|a| a.trim_start_matches('@').to_string()));
            if no_resolve {
                config.analysis.resolve_symbols = false;
            }
            if budget_secs.is_some() {
                config.analysis.budget_secs = budget_secs;
            }
            if max_depth.is_some() {
                config.analysis.max_chain_depth = max_depth;
            }

            let deadline = Deadline::from_secs(config.analysis.budget_secs);

            // Set up graceful shutdown handling
            let signal_deadline = deadline.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for shutdown signal: {}", e);
                    return;
                }

                warn!("Received interrupt signal, reporting what has been traced so far...");
                signal_deadline.cancel();

                // If we get a second signal, force exit
                if let Ok(()) = tokio::signal::ctrl_c().await {
                    error!("Received second interrupt, forcing shutdown");
                    std::process::exit(130); // Standard exit code for SIGINT
                }
            });

            let families = config.analysis.families.clone();
            let scanner = Scanner::new(config.clone())?.with_deadline(deadline);

            tokio::task::spawn_blocking(move || scanner.scan_path(&path, &families)).await??
        }
    };

    // Generate and output report
    let reporter = create_reporter(&config.output);
    let report = reporter.generate(&result);

    if let Some(ref output_path) = config.output.output_path {
        let unchanged = config.output.format == OutputFormat::Html
            && std::fs::read_to_string(output_path)
                .map(|existing| existing.contains(&HtmlReporter::content_fingerprint(&result)))
                .unwrap_or(false);

        if unchanged {
            info!("Report at {} is up to date", output_path.display());
        } else {
            std::fs::write(output_path, &report)?;
            info!("Report written to: {}", output_path.display());
        }
    } else {
        println!("{}", report);
    }

    // Exit with non-zero code if critical/high rows
    if result.has_blocking_rows() {
        std::process::exit(1);
    }

    Ok(())
}
