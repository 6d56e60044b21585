//! Interactive/batch client tool (out of core scope, §1), grounded in
//! `original_source/src/client.py`.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde_json::{json, Value};

#[derive(Debug, Parser)]
struct Args {
    /// Base address of any peer to contact first, e.g. http://127.0.0.1:5000
    addr: String,

    /// Command to run once and exit; omit for interactive mode.
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let client = reqwest::Client::builder().timeout(Duration::from_secs(1)).build()?;

    if args.command.is_empty() {
        interactive(&client, args.addr).await
    } else {
        run_command(&client, &args.addr, &args.command).await
    }
}

async fn interactive(client: &reqwest::Client, addr: String) -> Result<()> {
    println!("Enter command (get <key> | put <key> <value> | delete <key> | show_log | exit):");
    loop {
        print!("> ");
        io::stdout().flush().ok();
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if words.is_empty() {
            continue;
        }
        if words[0].eq_ignore_ascii_case("exit") {
            break;
        }
        if let Err(err) = run_command(client, &addr, &words).await {
            println!("error: {err}");
        }
    }
    Ok(())
}

async fn run_command(client: &reqwest::Client, addr: &str, command: &[String]) -> Result<()> {
    match command {
        [cmd, key] if cmd.eq_ignore_ascii_case("get") => {
            let message = json!({"type": "get", "payload": {"key": key}});
            let result = redirect_to_leader(client, format!("{addr}/request"), "get", message).await?;
            println!("GET request result: {result}");
        }
        [cmd, key, value] if cmd.eq_ignore_ascii_case("put") => {
            let message = json!({"type": "put", "payload": {"key": key, "value": value}});
            let result = redirect_to_leader(client, format!("{addr}/request"), "put", message).await?;
            println!("PUT request result: {result}");
        }
        [cmd, key] if cmd.eq_ignore_ascii_case("delete") => {
            let message = json!({"type": "delete", "payload": {"key": key}});
            let reply = client.delete(format!("{addr}/request")).json(&message).send().await?;
            println!("DELETE request result: {}", reply.json::<Value>().await?);
        }
        [cmd] if cmd.eq_ignore_ascii_case("show_log") => {
            let reply = client.get(format!("{addr}/show_log")).send().await?;
            println!("Log of the node at {addr}: {}", reply.json::<Value>().await?);
        }
        _ => println!(
            "Invalid command. Use 'get <key>', 'put <key> <value>', 'delete <key>', 'show_log', or 'exit'."
        ),
    }
    Ok(())
}

/// Mirrors `client.py`'s `redirect_to_leader`: follow `payload.message`
/// redirects until a reply arrives without one.
async fn redirect_to_leader(
    client: &reqwest::Client,
    mut server_address: String,
    kind: &str,
    message: Value,
) -> Result<Value> {
    loop {
        let request = if kind == "get" {
            client.get(&server_address)
        } else {
            client.put(&server_address)
        };
        let reply: Value = request.json(&message).send().await?.json().await?;

        match reply.get("payload").and_then(|p| p.get("message")) {
            Some(leader) if leader.is_string() => {
                server_address = format!("{}/request", leader.as_str().unwrap());
                println!("Redirecting to leader at {server_address}");
            }
            _ => return Ok(reply),
        }
    }
}
