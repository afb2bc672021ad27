// src/main.rs

//! A small command-line front end: sends one command and prints the reply.
//!
//! ```text
//! spineldb-client [--config path] [--host h] [--port p] COMMAND [ARG ...]
//! ```

use anyhow::{Result, anyhow};
use spineldb_client::{Client, ClientConfig, Command, RespValue};
use std::env;
use std::path::Path;
use tracing::{debug, error};
use tracing_subscriber::{filter::EnvFilter, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|a| a == "--version") {
        println!("spineldb-client version {VERSION}");
        return Ok(());
    }

    let (flags, words) = split_args(&args)?;

    // An explicitly named config file must exist; the default one is optional.
    let config_path = flags.config.as_deref().unwrap_or("config.toml");
    let mut config = if flags.config.is_some() || Path::new(config_path).exists() {
        match ClientConfig::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from \"{config_path}\": {e:#}");
                std::process::exit(1);
            }
        }
    } else {
        ClientConfig::default()
    };
    if let Some(host) = flags.host {
        config.host = host;
    }
    if let Some(port) = flags.port {
        config.port = port;
    }
    config.validate()?;

    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::new(log_level))
        .with(tracing_subscriber::fmt::layer().compact().with_ansi(true))
        .init();

    let Some((name, rest)) = words.split_first() else {
        eprintln!("Usage: spineldb-client [--config path] [--host h] [--port p] COMMAND [ARG ...]");
        std::process::exit(1);
    };
    let command = Command::new(name.as_str()).with_args(rest.iter().cloned());

    debug!("Connecting to {}", config.address());
    let client = Client::new(config);
    let outcome = client.send(command).await;
    if let Err(e) = client.quit().await {
        debug!("QUIT failed: {e}");
    }

    match outcome {
        Ok(value) => {
            print_value(&value, 0);
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {e}");
            Err(e.into())
        }
    }
}

#[derive(Default)]
struct Flags {
    config: Option<String>,
    host: Option<String>,
    port: Option<u16>,
}

/// Separates leading `--flag value` pairs from the command words.
fn split_args(args: &[String]) -> Result<(Flags, Vec<String>)> {
    let mut flags = Flags::default();
    let mut iter = args.iter();
    let mut words = Vec::new();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow!("{flag} flag requires a value"))
        };
        match arg.as_str() {
            "--config" => flags.config = Some(value("--config")?),
            "--host" => flags.host = Some(value("--host")?),
            "--port" => {
                let raw = value("--port")?;
                flags.port = Some(
                    raw.parse()
                        .map_err(|_| anyhow!("Invalid port number: {raw}"))?,
                );
            }
            _ => {
                words.push(arg.clone());
                words.extend(iter.by_ref().cloned());
                break;
            }
        }
    }
    Ok((flags, words))
}

fn print_value(value: &RespValue, indent: usize) {
    let pad = " ".repeat(indent);
    match value {
        RespValue::SimpleString(s) => println!("{pad}{s}"),
        RespValue::BulkString(b) => println!("{pad}\"{}\"", String::from_utf8_lossy(b)),
        RespValue::Integer(i) => println!("{pad}(integer) {i}"),
        RespValue::Null | RespValue::NullArray => println!("{pad}(nil)"),
        RespValue::Error(e) => println!("{pad}(error) {e}"),
        RespValue::Array(items) if items.is_empty() => println!("{pad}(empty array)"),
        RespValue::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                println!("{pad}{})", i + 1);
                print_value(item, indent + 2);
            }
        }
    }
}
