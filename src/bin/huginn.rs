//! huginn: request orchestration CLI
//!
//! Issue requests against a booking API through the orchestrator and
//! inspect the resolved configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use huginn::{Config, Method, Orchestrator, OrchestratorBuilder, Params, RequestOptions};
use serde_json::{Value, json};

/// Huginn CLI
#[derive(Parser)]
#[command(name = "huginn")]
#[command(version = huginn::version::PKG_VERSION)]
#[command(about = "Request orchestration for booking API clients")]
struct Args {
    /// Config file (default: ~/.huginn/config.toml, then /etc/huginn/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// API base URL (overrides the config file)
    #[arg(short, long, global = true, env = "HUGINN_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a request through the orchestrator
    Request {
        /// Resource path, e.g. /rooms
        path: String,
        /// Query parameter as name=value (value parsed as JSON when valid)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
        /// HTTP method
        #[arg(short, long, default_value = "GET", value_parser = parse_method)]
        method: Method,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
        /// Issue the request this many times concurrently
        #[arg(short, long, default_value_t = 1)]
        repeat: usize,
        /// Skip the response cache
        #[arg(long)]
        bypass_cache: bool,
    },

    /// Print the resolved configuration
    Config,

    /// Print version information
    Version,
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {raw:?}"))?;
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

fn parse_method(raw: &str) -> Result<Method, String> {
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::Get),
        "POST" => Ok(Method::Post),
        "PUT" => Ok(Method::Put),
        "PATCH" => Ok(Method::Patch),
        "DELETE" => Ok(Method::Delete),
        other => Err(format!("unsupported method: {other}")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: huginn=info; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("huginn=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(url) = args.base_url {
        config.transport.base_url = Some(url);
    }

    match args.command {
        Command::Version => {
            println!("huginn {}", huginn::version::version_string());
        }

        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }

        Command::Request {
            path,
            params,
            method,
            body,
            repeat,
            bypass_cache,
        } => {
            let orchestrator = OrchestratorBuilder::from_config(&config).build()?;
            let mut options = RequestOptions::new()
                .method(method)
                .params(params.into_iter().collect::<Params>())
                .bypass_cache(bypass_cache);
            if let Some(body) = body {
                options = options.body(serde_json::from_str(&body)?);
            }
            let report = run_requests(&orchestrator, &path, options, repeat.max(1)).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn run_requests(
    orchestrator: &Orchestrator,
    path: &str,
    options: RequestOptions,
    repeat: usize,
) -> Value {
    let calls = (0..repeat).map(|_| orchestrator.request(path, options.clone()));
    let results: Vec<Value> = join_all(calls)
        .await
        .into_iter()
        .map(|result| match result {
            Ok(value) => json!({ "ok": value }),
            Err(e) => json!({ "error": e.to_string() }),
        })
        .collect();

    json!({
        "strategy": orchestrator.classify(path, &options),
        "results": results,
        "metrics": orchestrator.metrics(),
    })
}
