//! The `repbatch` command line.

use std::io::Write;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use query_engine_execution::postgres::PgContext;
use query_engine_metadata::metadata::{ExerciseFilter, NewExercise, Page};
use query_engine_translation::translation::exercises::exercises_query;
use repbatch_catalog::ExerciseService;
use repbatch_configuration::environment::Environment;
use repbatch_configuration::{
    configuration_jsonschema, make_runtime_configuration, parse_configuration,
    write_parsed_configuration, Configuration, DatabaseConfig, ParsedConfiguration,
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "repbatch", version, about = "Browse the exercise library")]
pub struct Cli {
    /// Read the database settings from `configuration.json` in this directory
    /// instead of the `--db-*` flags.
    #[arg(long, env = "REPBATCH_CONFIGURATION", global = true)]
    pub configuration: Option<PathBuf>,
    /// Give up on database calls after this many seconds.
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,
    #[command(flatten)]
    pub database: DatabaseConfig,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the database answers.
    Health,
    /// Search the exercise library.
    Exercises(SearchArgs),
    /// Show one exercise.
    Exercise { id: Uuid },
    /// Add an exercise described by a JSON file.
    Create { file: PathBuf },
    /// Write the database settings into a configuration directory.
    Initialize {
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Print the JSON schema of the configuration file.
    ConfigSchema,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Case-insensitive part of the name.
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    /// Repeat to match any of several equipment types.
    #[arg(long = "equipment")]
    pub equipment_types: Option<Vec<String>>,
    #[arg(long = "muscle")]
    pub primary_muscles: Option<Vec<String>>,
    #[arg(long = "tag")]
    pub tags: Option<Vec<String>>,
    #[arg(long, default_value = "20")]
    pub page_size: NonZeroU32,
    #[arg(long, default_value = "1")]
    pub page: NonZeroU32,
    /// Print the statement instead of running it.
    #[arg(long)]
    pub print_sql: bool,
}

impl SearchArgs {
    pub fn filter(&self) -> ExerciseFilter {
        ExerciseFilter {
            name: self.name.clone(),
            category: self.category.clone(),
            equipment_types: self.equipment_types.clone(),
            primary_muscles: self.primary_muscles.clone(),
            tags: self.tags.clone(),
        }
    }

    pub fn page(&self) -> Page {
        Page::new(self.page_size, self.page)
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
}

pub async fn run(cli: Cli, environment: impl Environment, out: &mut impl Write) -> anyhow::Result<()> {
    match &cli.command {
        Command::ConfigSchema => {
            print_json(out, &configuration_jsonschema())?;
            return Ok(());
        }
        Command::Initialize { out_dir } => {
            let parsed = ParsedConfiguration {
                database: cli.database.clone(),
                ..ParsedConfiguration::initial()
            };
            write_parsed_configuration(&parsed, out_dir).await?;
            return Ok(());
        }
        Command::Exercises(search) if search.print_sql => {
            let (sql, args) = exercises_query(&search.filter(), search.page());
            let pretty = sqlformat::format(
                &sql,
                &sqlformat::QueryParams::None,
                sqlformat::FormatOptions::default(),
            );
            writeln!(out, "{pretty}")?;
            for (name, value) in args.iter() {
                writeln!(out, "-- @{name} = {value:?}")?;
            }
            return Ok(());
        }
        _ => {}
    }

    let configuration = configuration(&cli).await?;
    let ctx = match cli.timeout {
        Some(seconds) => PgContext::new().with_timeout(Duration::from_secs(seconds)),
        None => PgContext::new(),
    };

    if let Command::Health = cli.command {
        let pool = configuration.database.connect_lazy(&environment)?;
        let service = ExerciseService::new(pool);
        service.status_check(&ctx).await?;
        writeln!(out, "ok")?;
        return Ok(());
    }

    let pool = configuration.database.connect(&environment).await?;
    let service = ExerciseService::new(pool);

    match &cli.command {
        Command::Exercises(search) => {
            let page = service.exercises(&ctx, &search.filter(), search.page()).await?;
            print_json(out, &page)?;
        }
        Command::Exercise { id } => {
            let exercise = service.exercise(&ctx, *id).await?;
            print_json(out, &exercise)?;
        }
        Command::Create { file } => {
            let contents = tokio::fs::read_to_string(file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let new: NewExercise = serde_json::from_str(&contents)
                .with_context(|| format!("parsing {}", file.display()))?;
            let exercise = service.create_exercise(&ctx, &new).await?;
            print_json(out, &exercise)?;
        }
        Command::Health | Command::Initialize { .. } | Command::ConfigSchema => {}
    }

    service.pool().close();
    Ok(())
}

/// The settings from `--configuration` if given, otherwise from the flags.
async fn configuration(cli: &Cli) -> anyhow::Result<Configuration> {
    let parsed = match &cli.configuration {
        Some(dir) => parse_configuration(dir).await?,
        None => ParsedConfiguration {
            database: cli.database.clone(),
            ..ParsedConfiguration::initial()
        },
    };
    Ok(make_runtime_configuration(parsed)?)
}

fn print_json(out: &mut impl Write, value: &impl serde::Serialize) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
