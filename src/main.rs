use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sql_comparer::comparison::{
    BatchResult, BatchRunner, ComparisonEngine, ComparisonReport, FailurePolicy,
};
use sql_comparer::config::{Config, ConfigOverrides};
use sql_comparer::executor::{QueryExecutor, SqliteBackend};
use sql_comparer::output::csv::{batch_to_csv, differences_to_csv};
use sql_comparer::output::json::render_json;
use sql_comparer::output::table::{render_batch_table, render_report};
use sql_comparer::tabular::{ParameterSet, ScalarValue};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "sql-comparer",
    about = "Compare the results of a master and a branch SQL query"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long)]
    database: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    /// Attempts per query, including the first one.
    #[arg(long)]
    retries: Option<u32>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run both queries once and compare their results.
    Compare {
        /// SQL text, or @path to read it from a file.
        #[arg(long)]
        master: String,
        #[arg(long)]
        branch: String,
        #[arg(short = 'p', long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
        #[arg(long)]
        details: bool,
    },
    /// Compare once per row of a data-source query, binding the row as parameters.
    Sweep {
        #[arg(long)]
        master: String,
        #[arg(long)]
        branch: String,
        #[arg(long = "data-source")]
        data_source: String,
        #[arg(long)]
        continue_on_error: bool,
        #[arg(short, long)]
        jobs: Option<usize>,
        #[arg(long)]
        details: bool,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(overrides_from_cli(&cli));

    if let Commands::Config { init, show } = &cli.command {
        handle_config_command(*init, *show, &config, &config_path)?;
        return Ok(ExitCode::SUCCESS);
    }

    let engine = build_engine(&config)?;
    let all_match = match &cli.command {
        Commands::Compare {
            master,
            branch,
            params,
            details,
        } => {
            let master = read_sql(master)?;
            let branch = read_sql(branch)?;
            let params = parse_params(params)?;
            let report = engine
                .compare(&master, &branch, params.as_ref())
                .await?;
            print_report(&report, cli.output, *details)?;
            report.exact_match()
        }
        Commands::Sweep {
            master,
            branch,
            data_source,
            details,
            ..
        } => {
            let master = read_sql(master)?;
            let branch = read_sql(branch)?;
            let data_source = read_sql(data_source)?;
            let runner = BatchRunner::new(engine).with_options(config.sweep_options());
            let batch = runner
                .run_sweep(&master, &branch, &data_source, |percent| {
                    info!(percent, "sweep progress");
                })
                .await?;
            info!(
                compared = batch.report_count(),
                mismatches = batch.mismatch_count(),
                failures = batch.failures().len(),
                "sweep finished"
            );
            print_batch(&batch, cli.output, *details)?;
            batch.all_match()
        }
        Commands::Config { .. } => true,
    };

    Ok(if all_match {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn overrides_from_cli(cli: &Cli) -> ConfigOverrides {
    let (failure_policy, max_in_flight) = match &cli.command {
        Commands::Sweep {
            continue_on_error,
            jobs,
            ..
        } => (
            continue_on_error.then_some(FailurePolicy::Continue),
            *jobs,
        ),
        _ => (None, None),
    };
    ConfigOverrides {
        database_path: cli.database.clone(),
        max_attempts: cli.retries,
        failure_policy,
        max_in_flight,
    }
}

fn build_engine(config: &Config) -> Result<ComparisonEngine> {
    let db_path = config.resolved_database_path().ok_or_else(|| {
        anyhow!("no database configured; pass --database or set [database] path")
    })?;
    let backend = SqliteBackend::open(db_path)
        .with_busy_timeout(Duration::from_millis(config.database.busy_timeout_ms));
    let executor = QueryExecutor::new(Arc::new(backend)).with_policy(config.retry_policy());
    Ok(ComparisonEngine::new(executor).with_options(config.compare_options()))
}

fn handle_config_command(
    init: bool,
    show: bool,
    config: &Config,
    config_path: &PathBuf,
) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn read_sql(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed reading SQL file: {path}")),
        None => Ok(arg.to_string()),
    }
}

fn parse_param(raw: &str) -> Result<(String, ScalarValue)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("parameter must look like NAME=VALUE: {raw}"))?;
    let name = name.trim().trim_start_matches([':', '@', '$']);
    if name.is_empty() {
        return Err(anyhow!("parameter name is empty: {raw}"));
    }
    Ok((name.to_string(), ScalarValue::parse_literal(value)))
}

fn parse_params(raw: &[String]) -> Result<Option<ParameterSet>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let params = raw
        .iter()
        .map(String::as_str)
        .map(parse_param)
        .collect::<Result<ParameterSet>>()?;
    Ok(Some(params))
}

fn print_report(report: &ComparisonReport, format: OutputFormat, details: bool) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_report(report, details)),
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Csv => print!("{}", differences_to_csv(report)?),
    }
    Ok(())
}

fn print_batch(batch: &BatchResult, format: OutputFormat, details: bool) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", render_batch_table(batch));
            if details {
                for report in batch.reports() {
                    println!("{}", render_report(report, true));
                }
            }
        }
        OutputFormat::Json => println!("{}", render_json(batch)?),
        OutputFormat::Csv => print!("{}", batch_to_csv(batch)?),
    }
    Ok(())
}
