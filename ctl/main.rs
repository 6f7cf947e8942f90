#![forbid(unsafe_code)]

//! `focus-ctl` — local CLI companion for `focus-orchestrator`.
//!
//! Connects to the IPC socket and sends JSON commands to the server.

use std::io::{BufRead, BufReader, Write};

use clap::{Parser, Subcommand};
use interprocess::local_socket::{traits::Stream as _, GenericNamespaced, Stream, ToNsName};

#[derive(Debug, Parser)]
#[command(
    name = "focus-ctl",
    about = "Local CLI for focus-orchestrator",
    version,
    long_about = None
)]
struct Cli {
    /// IPC socket name (must match the server's `ipc_name` config).
    #[arg(long, default_value = "focus-orchestrator")]
    ipc_name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start an analysis session and wait for its outcome.
    Start {
        /// User the session runs for.
        user_id: String,
        /// Optional session kind (e.g. the certification being prepared).
        #[arg(long)]
        kind: Option<String>,
    },

    /// Stop the running session.
    Stop,

    /// Show the current session state.
    Status,
}

fn main() {
    let args = Cli::parse();

    let request_json = match &args.command {
        Command::Start { user_id, kind } => {
            let mut req = serde_json::json!({ "command": "start", "user_id": user_id });
            if let Some(k) = kind {
                req["kind"] = serde_json::Value::String(k.clone());
            }
            req
        }
        Command::Stop => serde_json::json!({ "command": "stop" }),
        Command::Status => serde_json::json!({ "command": "status" }),
    };

    match send_ipc_command(&args.ipc_name, &request_json) {
        Ok(response) => {
            if let Some(obj) = response.as_object() {
                let ok = obj
                    .get("ok")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                if ok {
                    if let Some(data) = obj.get("data") {
                        println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
                    } else {
                        println!("OK");
                    }
                } else {
                    let err_msg = obj
                        .get("error")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown error");
                    eprintln!("Error: {err_msg}");
                    std::process::exit(1);
                }
            } else {
                println!("{response}");
            }
        }
        Err(err) => {
            eprintln!("Failed to connect to server: {err}");
            eprintln!(
                "Is focus-orchestrator running with ipc_name '{}'?",
                args.ipc_name
            );
            std::process::exit(1);
        }
    }
}

/// Connect to the IPC socket, send a JSON command, and read the response.
fn send_ipc_command(
    ipc_name: &str,
    request: &serde_json::Value,
) -> std::result::Result<serde_json::Value, Box<dyn std::error::Error>> {
    let name = ipc_name.to_ns_name::<GenericNamespaced>()?;
    let mut stream = Stream::connect(name)?;

    let mut request_line = serde_json::to_string(request)?;
    request_line.push('\n');
    stream.write_all(request_line.as_bytes())?;
    stream.flush()?;

    // `start` blocks here until the session ends.
    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    let response: serde_json::Value = serde_json::from_str(response_line.trim())?;
    Ok(response)
}
