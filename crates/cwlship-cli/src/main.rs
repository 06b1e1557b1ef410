//! 🚀 cwlship-cli: the front door. Parses flags, sets up logging, loads config, runs the
//! pipeline, prints the tally.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! Like a manager: delegates everything, takes credit for the summary table. 🦆

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{Cell, CellAlignment, Table, presets::UTF8_FULL_CONDENSED};
use cwlship::RunSummary;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "cwlship.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    /// human-friendly, colors and all
    Pretty,
    /// one JSON object per line, for whatever is collecting our logs
    Json,
}

/// 🚚 Ship a CloudWatch Logs export into date-partitioned OpenSearch indices.
#[derive(Debug, Parser)]
#[command(name = "cwlship", version, about)]
struct Args {
    /// TOML config file. Defaults to ./cwlship.toml when that exists; env vars fill the rest.
    #[arg(short, long, env = "CWLSHIP_CONFIG")]
    config: Option<PathBuf>,

    /// The export file to read (plain or .gz). Overrides `source.file_name`.
    #[arg(short, long)]
    file: Option<String>,

    /// Draw a progress table on stderr.
    #[arg(long)]
    progress: bool,

    #[arg(long, value_enum, env = "CWLSHIP_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    // -- info by default: the per-line "sending POST" logs are the whole point of watching
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// 🔒 An explicit `--config` must exist. The default one is optional.
fn resolve_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        let exists = path.try_exists().with_context(|| {
            format!(
                "💀 Couldn't check whether the configuration file exists. Was checking here: '{}'",
                path.display()
            )
        })?;
        anyhow::ensure!(
            exists,
            "💀 Configuration file '{}' doesn't exist. Maybe it's a pwd/cwd thing with relative \
             paths; an absolute path is absolutely certain.",
            path.display()
        );
        return Ok(Some(path.to_path_buf()));
    }

    let default = Path::new(DEFAULT_CONFIG_FILE);
    Ok(default
        .try_exists()
        .unwrap_or(false)
        .then(|| default.to_path_buf()))
}

fn summary_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["outcome", "lines"]);
    let rows = [
        ("read", summary.lines_read),
        ("not data", summary.not_data),
        ("shipped", summary.shipped),
        ("transform errors", summary.transform_errors),
        ("transport errors", summary.transport_errors),
        ("protocol errors", summary.protocol_errors),
        ("failed items", summary.failed_items),
    ];
    for (outcome, count) in rows {
        table.add_row(vec![
            Cell::new(outcome),
            Cell::new(count).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

async fn run(args: Args) -> Result<RunSummary> {
    let config_file = resolve_config_file(args.config.as_deref())?;
    let mut app_config = cwlship::app_config::load_config(config_file.as_deref()).context(
        "💀 In cwlship-cli, main, we couldn't load the config. Take a look at the file and the \
         environment, make sure you didn't forget something obvious.",
    )?;

    if let Some(file) = args.file {
        app_config.source.file_name = file;
    }
    if args.progress {
        app_config.runtime.show_progress = true;
    }

    cwlship::run(app_config).await
}

#[tokio::main]
async fn main() -> Result<()> {
    // -- before clap, so CWLSHIP_CONFIG and CWLSHIP_LOG_FORMAT can come from .env too
    let dotenv = cwlship::app_config::load_dotenv();
    let args = Args::parse();
    init_tracing(args.log_format);
    match dotenv {
        Ok(Some(path)) => info!("🌱 Environment topped up from {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("⚠️  {:#}. Carrying on with the environment we've got.", e),
    }

    match run(args).await {
        Ok(summary) => {
            // -- lines that didn't make it are in the table and the logs. the run itself worked.
            println!("{}", summary_table(&summary));
            Ok(())
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion of sadness, one layer at a time
            let mut the_vibes_are_giving_connection_issues = false;
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
                let cause_str = cause.to_string();
                if cause_str.contains("error sending request")
                    || cause_str.contains("connection refused")
                    || cause_str.contains("Connection refused")
                    || cause_str.contains("tcp connect error")
                    || cause_str.contains("dns error")
                {
                    the_vibes_are_giving_connection_issues = true;
                }
            }

            if the_vibes_are_giving_connection_issues {
                error!(
                    "🔧 hint: looks like the OpenSearch endpoint isn't reachable. \
                     Double-check OPENSEARCH_ENDPOINT, VPC access and security groups. \
                     Even clusters need a nudge sometimes. ☕"
                );
            }

            std::process::exit(1);
        }
    }
}
