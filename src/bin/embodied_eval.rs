//! embodied-eval: run a planning turn, repair replies and combine benchmark results
//!
//! Usage:
//!   embodied-eval respond --config <yaml> --prompt <text> [--image <path>] [--system <text>]
//!   embodied-eval normalize [--file <path>]
//!   embodied-eval combine [--root <dir>] [--output <file>]
//!   embodied-eval bindings

use std::io::Read;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use embodied_eval::results::{DEFAULT_OUTPUT_FILE, DEFAULT_RESULTS_ROOT};
use embodied_eval::routing::{self, AuthScheme, BaseUrl};
use embodied_eval::{EvalClient, EvalConfig, ImageRef, Message, ModelRequest};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "respond" => cmd_respond(&args[2..]),
        "normalize" => cmd_normalize(&args[2..]),
        "combine" => cmd_combine(&args[2..]),
        "bindings" => cmd_bindings(),
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"embodied-eval: evaluation harness runtime for embodied-agent benchmarks

USAGE:
    embodied-eval <COMMAND> [OPTIONS]

COMMANDS:
    respond --config <yaml> --prompt <text> [--image <path>] [--system <text>]
                                Send one turn and print the canonical plan JSON
    normalize [--file <path>]   Repair a raw reply (stdin by default) into canonical JSON
    combine [--root <dir>] [--output <file>]
                                Combine <root>/<model>/<task>/results/summary.json files
    bindings                    List backend bindings in match order
    version                     Show version information
    help                        Show this help message

ENVIRONMENT:
    RUST_LOG                    Log filter (default: info)
    EVAL_HTTP_TIMEOUT_SECS      Per-call timeout in seconds (default: 120)
    EVAL_PROXY_URL              HTTP(S) proxy for every backend
    remote_url                  Self-hosted OpenAI-compatible server
    LOCAL_MODEL_URL             Local serving endpoint (default: http://localhost:23333/v1)"#
    );
}

fn cmd_version() {
    println!("embodied-eval {}", env!("CARGO_PKG_VERSION"));
}

/// Value following `flag`, if present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn cmd_respond(args: &[String]) -> anyhow::Result<()> {
    let Some(config_path) = flag_value(args, "--config") else {
        bail!("respond needs --config <yaml>");
    };
    let Some(prompt) = flag_value(args, "--prompt") else {
        bail!("respond needs --prompt <text>");
    };

    let config = EvalConfig::from_yaml_file(config_path)
        .with_context(|| format!("loading {config_path}"))?;
    let client = EvalClient::from_config(config).context("building evaluation client")?;

    let mut messages = Vec::new();
    if let Some(system) = flag_value(args, "--system") {
        messages.push(Message::system(system));
    }
    messages.push(match flag_value(args, "--image") {
        Some(path) => Message::user_with_image(prompt, ImageRef::path(path)),
        None => Message::user(prompt),
    });

    let plan = client
        .respond(&ModelRequest::new(messages))
        .with_context(|| format!("model {}", client.model_name()))?;
    println!("{plan}");
    Ok(())
}

fn cmd_normalize(args: &[String]) -> anyhow::Result<()> {
    let raw = match flag_value(args, "--file") {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            buf
        }
    };
    println!("{}", embodied_eval::normalize(&raw)?);
    Ok(())
}

fn cmd_combine(args: &[String]) -> anyhow::Result<()> {
    let root = flag_value(args, "--root").unwrap_or(DEFAULT_RESULTS_ROOT);
    let output = flag_value(args, "--output").unwrap_or(DEFAULT_OUTPUT_FILE);

    let results = embodied_eval::results::combine_to_file(root, output)
        .with_context(|| format!("combining results under {root}"))?;
    println!(
        "Combined {} task(s) from {} model(s) into {output}",
        results.task_count(),
        results.model_count()
    );
    Ok(())
}

fn cmd_bindings() -> anyhow::Result<()> {
    println!("{:<4} {:<42} {:<22} {:<12} {:<20} ENDPOINT", "#", "MARKER", "BINDING", "MODE", "CREDENTIAL");
    for (i, b) in routing::all_bindings().iter().enumerate() {
        let credential = match b.auth {
            AuthScheme::None => "-".to_string(),
            AuthScheme::Bearer { env } | AuthScheme::AnthropicKey { env } => env.to_string(),
            AuthScheme::AzureAd => "azure ad".to_string(),
        };
        let endpoint = match b.base_url {
            BaseUrl::Vendor { default, env: Some(var) } => format!("{default} (${var})"),
            BaseUrl::Vendor { default, env: None } => default.to_string(),
            BaseUrl::Remote => "$remote_url".to_string(),
            BaseUrl::Local => "$LOCAL_MODEL_URL".to_string(),
            BaseUrl::Azure => "$AZURE_OPENAI_ENDPOINT".to_string(),
        };
        println!(
            "{:<4} {:<42} {:<22} {:<12} {:<20} {}",
            i + 1,
            b.marker.unwrap_or("*"),
            b.name,
            b.mode.as_str(),
            credential,
            endpoint
        );
    }
    Ok(())
}
