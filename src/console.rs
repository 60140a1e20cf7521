//! Line console on stdin for driving the bridge from a terminal.
//!
//! Accepts either raw requests (`POST /api/move {"command":"left"}`) or the
//! shorthands `connect [path] [baud]`, `disconnect`, `status`, `voltage`,
//! `move <command>` and `quit`.

use std::future::Future;

use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::bridge::Bridge;
use crate::commands;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Request {
        method: String,
        path: String,
        body: Option<String>,
    },
    Quit,
    Empty,
}

pub fn parse_line(line: &str) -> Result<ConsoleCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleCommand::Empty);
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let request = |method: &str, path: &str, body: Option<String>| ConsoleCommand::Request {
        method: method.to_string(),
        path: path.to_string(),
        body,
    };

    match head.to_ascii_lowercase().as_str() {
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        "connect" => {
            let mut args = rest.split_whitespace();
            let path = args.next();
            let baud_rate = match args.next() {
                Some(baud) => Some(
                    baud.parse::<u32>()
                        .map_err(|_| format!("Invalid baud rate: {}", baud))?,
                ),
                None => None,
            };
            let body = match (path, baud_rate) {
                (None, None) => None,
                (path, baud_rate) => {
                    Some(json!({ "path": path, "baudRate": baud_rate }).to_string())
                }
            };
            Ok(request("POST", "/api/connect", body))
        }
        "disconnect" => Ok(request("POST", "/api/disconnect", None)),
        "status" => Ok(request("GET", "/api/status", None)),
        "voltage" => Ok(request("GET", "/api/voltage", None)),
        "move" if !rest.is_empty() => Ok(request(
            "POST",
            "/api/move",
            Some(json!({ "command": rest }).to_string()),
        )),
        "move" => Err("Usage: move <command>".to_string()),
        "get" | "post" => {
            let (path, body) = match rest.split_once(char::is_whitespace) {
                Some((path, body)) => (path, Some(body.trim().to_string())),
                None => (rest, None),
            };
            if path.is_empty() {
                return Err(format!("Usage: {} <path> [json]", head.to_ascii_uppercase()));
            }
            Ok(request(&head.to_ascii_uppercase(), path, body))
        }
        _ => Err(format!("Unknown console command: {}", head)),
    }
}

/// Read commands from stdin until EOF, `quit` or Ctrl-C.
pub async fn run_console(bridge: &Bridge) -> std::io::Result<()> {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Ctrl-C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };
    drive_console(bridge, BufReader::new(tokio::io::stdin()), interrupt).await
}

/// Dispatch lines from `input` until EOF or `quit`. `interrupt` ends the loop
/// at any point, including while a request is in flight.
pub async fn drive_console<R, I>(bridge: &Bridge, input: R, interrupt: I) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = ()>,
{
    let session = async {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            match parse_line(&line) {
                Ok(ConsoleCommand::Request { method, path, body }) => {
                    let reply = commands::route(bridge, &method, &path, body.as_deref()).await;
                    println!("{} {}", reply.status, reply.body);
                }
                Ok(ConsoleCommand::Quit) => break,
                Ok(ConsoleCommand::Empty) => {}
                Err(message) => eprintln!("{}", message),
            }
        }
        Ok::<(), std::io::Error>(())
    };

    tokio::select! {
        result = session => result,
        _ = interrupt => {
            log::info!("Interrupted, shutting down");
            Ok(())
        }
    }
}
