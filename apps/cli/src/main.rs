//! Command line front end
//!
//! Usage:
//!   ferrum extract measure.cql
//!   ferrum validate 2.16.840.1.113883.3.464.1003.103.12.1001 1.2
//!   ferrum fetch 2.16.840.1.113883.3.464.1003.103.12.1001 [--version <v>]
//!   ferrum fetch-many <oid>...
//!   ferrum pipeline measure.cql [--mode mapped] [--schema cdm] [--concept-set-only]
//!
//! Results are printed as pretty JSON on stdout, logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ferrum_cql::{extract_valuesets, partition_oids};
use ferrum_mcp::config::Config;
use ferrum_mcp::pipeline::{run_pipeline, PipelineRequest};
use ferrum_mcp::state::AppState;
use ferrum_omop::MappingMode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Read;

#[derive(Parser, Debug)]
#[clap(name = "ferrum", version)]
#[clap(about = "Extract, validate and resolve CQL value sets against VSAC and OMOP")]
struct Cli {
    /// VSAC username ("apikey" when authenticating with a UMLS API key)
    #[clap(long, env = "VSAC_USERNAME", global = true, hide_env_values = true)]
    username: Option<String>,

    /// VSAC password or UMLS API key
    #[clap(long, env = "VSAC_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    /// Log progress to stderr
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract value set declarations from a CQL file ("-" reads stdin)
    Extract { input: String },

    /// Split OIDs into valid and invalid
    Validate {
        #[clap(required = true)]
        oids: Vec<String>,
    },

    /// Fetch one value set from VSAC
    Fetch {
        oid: String,

        /// Value set version (latest when omitted)
        #[clap(long = "version")]
        valueset_version: Option<String>,
    },

    /// Fetch several value sets from VSAC
    FetchMany {
        #[clap(required = true)]
        oids: Vec<String>,
    },

    /// Run extraction, retrieval, OMOP mapping and SQL generation for a CQL file
    Pipeline {
        input: String,

        #[clap(long, value_enum, default_value_t = ModeArg::Mapped)]
        mode: ModeArg,

        /// CDM schema (configured schema when omitted)
        #[clap(long)]
        schema: Option<String>,

        /// Emit only the concept set lookup
        #[clap(long)]
        concept_set_only: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Verbatim,
    Standard,
    Mapped,
}

impl From<ModeArg> for MappingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Verbatim => MappingMode::Verbatim,
            ModeArg::Standard => MappingMode::Standard,
            ModeArg::Mapped => MappingMode::Mapped,
        }
    }
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read CQL from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_state() -> Result<AppState> {
    let config = Config::load().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;
    AppState::from_config(&config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                if cli.verbose {
                    "ferrum_cli=debug,ferrum_vsac=debug,ferrum_omop=info,ferrum_mcp=info,warn".into()
                } else {
                    "error".into()
                }
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Extract { input } => {
            let cql = read_input(&input)?;
            print_json(&extract_valuesets(&cql))
        }
        Command::Validate { oids } => print_json(&partition_oids(&oids)),
        Command::Fetch {
            oid,
            valueset_version,
        } => {
            let state = build_state()?;
            let credentials = state.credentials(cli.username.as_deref(), cli.password.as_deref())?;
            match state
                .fetch_valueset(&oid, valueset_version.as_deref(), &credentials)
                .await
            {
                Ok(result) => print_json(&result),
                Err(e) => {
                    print_json(&e.to_json())?;
                    Err(e.into())
                }
            }
        }
        Command::FetchMany { oids } => {
            let state = build_state()?;
            let credentials = state.credentials(cli.username.as_deref(), cli.password.as_deref())?;
            let results: BTreeMap<_, _> = state
                .fetch_valuesets(&oids, &credentials)
                .await
                .into_iter()
                .collect();
            tracing::debug!(count = results.len(), "Fetched value sets");
            print_json(&results)
        }
        Command::Pipeline {
            input,
            mode,
            schema,
            concept_set_only,
        } => {
            let state = build_state()?;
            let request = PipelineRequest {
                cql: Some(read_input(&input)?),
                mode: mode.into(),
                schema,
                concept_set_only,
                username: cli.username,
                password: cli.password,
                ..Default::default()
            };
            print_json(&run_pipeline(&state, &request).await)
        }
    }
}
