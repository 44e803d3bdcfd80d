//! `hermes`: load a client configuration, then run one GraphQL operation against it and print
//! the responses as JSON.

mod args;

use args::{Cli, Commands, OperationArgs};
use clap::Parser;
use hermes::{
    Client, ClientBuilder, ClientConfig, ConfigError, DocumentError, HttpLink, QueryDocument,
    QueryError, QueryOptions, Variables
};
use serde_json::Value;
use std::{fs, path::PathBuf};
use thiserror::Error;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read {path}: {source}")]
    InputFile {
        path: PathBuf,
        source: std::io::Error
    },
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("invalid variables: {0}")]
    Variables(String),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("failed to print response: {0}")]
    Output(#[from] serde_json::Error)
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy()
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = build_client(&cli)?;

    match cli.command {
        Commands::Query(args) => run(&client, args, false).await,
        Commands::Mutate(args) => run(&client, args, true).await
    }
}

fn build_client(cli: &Cli) -> Result<Client<HttpLink>, CliError> {
    let mut config = ClientConfig::load(cli.config_file.as_deref())?;
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = Some(endpoint.clone());
    }
    for header in &cli.headers {
        config.headers.insert(header.0.clone(), header.1.clone());
    }
    tracing::debug!(endpoint = ?config.endpoint, headers = config.headers.len(), "loaded config");

    Ok(ClientBuilder::from_config(&config)?.build())
}

async fn run(client: &Client<HttpLink>, args: OperationArgs, mutation: bool) -> Result<(), CliError> {
    let source = fs::read_to_string(&args.file).map_err(|source| CliError::InputFile {
        path: args.file.clone(),
        source
    })?;
    let document = QueryDocument::parse(&source)?;
    let variables = parse_variables(args.variables.as_deref())?;
    let mut options = QueryOptions::default();
    if let Some(fetch_policy) = args.fetch_policy {
        options = options.with_fetch_policy(fetch_policy.into());
    }

    for _ in 0..args.repeat.max(1) {
        let response = if mutation {
            client
                .mutate_with_options(&document, variables.clone(), options.clone())
                .await?
        } else {
            client
                .query_with_options(&document, variables.clone(), options.clone())
                .await?
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
    }
    Ok(())
}

fn parse_variables(raw: Option<&str>) -> Result<Variables, CliError> {
    let raw = match raw {
        Some(raw) => raw,
        None => return Ok(Variables::new())
    };
    match serde_json::from_str(raw) {
        Ok(Value::Object(variables)) => Ok(variables),
        Ok(Value::Null) => Ok(Variables::new()),
        Ok(other) => Err(CliError::Variables(format!(
            "expected a JSON object, got `{}`",
            other
        ))),
        Err(e) => Err(CliError::Variables(e.to_string()))
    }
}
