//! Command-line surface of the `hermes` binary.

use clap::{Parser, Subcommand, ValueEnum};
use hermes::{FetchPolicy, HeaderPair};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hermes", version, about = "Run GraphQL operations through a caching client")]
pub struct Cli {
    /// TOML, JSON or YAML file with the client configuration
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// GraphQL endpoint, overrides the configured one
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Extra request header as `name: value`, repeatable
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<HeaderPair>,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a query
    Query(OperationArgs),
    /// Run a mutation
    Mutate(OperationArgs)
}

#[derive(Parser, Debug)]
pub struct OperationArgs {
    /// File containing the GraphQL document
    pub file: PathBuf,

    /// Variables as a JSON object
    #[arg(long)]
    pub variables: Option<String>,

    #[arg(long, value_enum)]
    pub fetch_policy: Option<FetchPolicyArg>,

    /// Run the operation this many times, one after another
    #[arg(long, default_value_t = 1)]
    pub repeat: u32
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FetchPolicyArg {
    CacheFirst,
    NetworkOnly
}

impl From<FetchPolicyArg> for FetchPolicy {
    fn from(arg: FetchPolicyArg) -> Self {
        match arg {
            FetchPolicyArg::CacheFirst => FetchPolicy::CacheFirst,
            FetchPolicyArg::NetworkOnly => FetchPolicy::NetworkOnly
        }
    }
}

pub fn parse_header(raw: &str) -> Result<HeaderPair, String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `name: value`, got `{}`", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing header name in `{}`", raw));
    }
    Ok(HeaderPair(name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_split_on_the_first_colon() {
        assert_eq!(
            parse_header("x-admin-secret: a:b"),
            Ok(HeaderPair("x-admin-secret".to_string(), "a:b".to_string()))
        );
        assert!(parse_header("no separator").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn parses_a_full_command_line() {
        let cli = Cli::try_parse_from(&[
            "hermes",
            "--endpoint",
            "http://localhost:8080/v1/graphql",
            "-H",
            "x-admin-secret: secret",
            "query",
            "recipe.graphql",
            "--variables",
            r#"{"id": "1"}"#,
            "--fetch-policy",
            "network-only",
            "--repeat",
            "3"
        ])
        .unwrap();

        assert_eq!(cli.headers.len(), 1);
        match cli.command {
            Commands::Query(args) => {
                assert_eq!(args.fetch_policy, Some(FetchPolicyArg::NetworkOnly));
                assert_eq!(args.repeat, 3);
                assert_eq!(args.variables.as_deref(), Some(r#"{"id": "1"}"#));
            }
            other => panic!("unexpected command {:?}", other)
        }
    }
}
