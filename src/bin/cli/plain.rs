use stompline::{AckMode, ConnError, ConnectOptions, Connection, Credentials, Message};
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tokio::sync::mpsc;

use super::args::Cli;
use super::commands::{CommandResult, execute_command, print_help};
use super::exit_codes;

/// Run the interactive line-oriented client.
pub async fn run(cli: &Cli) -> Result<(), (String, u8)> {
    println!("Connecting to {}...", cli.locator);

    let mut options =
        ConnectOptions::default().connect_timeout(Duration::from_millis(cli.timeout));
    if let Some(vhost) = &cli.vhost {
        options = options.host(vhost.clone());
    }
    let credentials = match (&cli.login, &cli.passcode) {
        (Some(login), Some(passcode)) => Some(Credentials::new(login.clone(), passcode.clone())),
        _ => None,
    };

    let conn = Connection::connect(&cli.locator, credentials, options)
        .await
        .map_err(|e| format_connection_error(&e, &cli.locator))?;

    match conn.session_id().await {
        Some(id) => println!("Connected (session {}).", id),
        None => println!("Connected."),
    }

    let default_ack = if cli.client_ack {
        AckMode::Client
    } else {
        AckMode::Auto
    };
    for dest in &cli.subscribe {
        conn.subscribe(dest, default_ack).await.map_err(|e| {
            (
                format!("Failed to subscribe to '{}': {}", dest, e),
                exit_codes::PROTOCOL_ERROR,
            )
        })?;
        println!("Subscribed to: {}", dest);
    }

    // Print every delivered MESSAGE until the connection goes away.
    let conn_rx = conn.clone();
    let receiver = tokio::spawn(async move {
        loop {
            match conn_rx.receive().await {
                Ok(msg) => print_message(&msg),
                Err(ConnError::ConnectionClosed) => break,
                Err(e) => {
                    eprintln!("\n[receive] {}", e);
                    break;
                }
            }
        }
    });

    // Channel to receive user commands from stdin reader
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<String>(16);

    // Spawn blocking stdin reader
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if cmd_tx.blocking_send(l).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    println!();
    print_help();
    println!();

    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let line = tokio::select! {
            line = cmd_rx.recv() => match line {
                Some(l) => l,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        match execute_command(&line, &conn, default_ack).await {
            CommandResult::Ok => {}
            CommandResult::Quit => break,
            CommandResult::Info(msg) => println!("{}", msg),
            CommandResult::Error(msg) => eprintln!("{}", msg),
        }
    }

    println!("Disconnecting...");
    conn.disconnect().await;
    let _ = receiver.await;
    Ok(())
}

/// Print an incoming message
fn print_message(msg: &Message) {
    let dest = msg.destination().unwrap_or("?");
    println!("\n[{}] MESSAGE {}", dest, msg.message_id);
    if msg.requires_ack() {
        println!("  (client ack: 'ack {}' when done)", msg.message_id);
    }
    for (k, v) in &msg.frame.headers {
        println!("  {}: {}", k, v);
    }
    if !msg.body().is_empty() {
        match std::str::from_utf8(msg.body()) {
            Ok(s) => println!("  Body: {}", s),
            Err(_) => println!("  Body: ({} bytes, binary)", msg.body().len()),
        }
    }
    print!("> ");
    let _ = io::stdout().flush();
}

/// Format a connection error with user-friendly messaging
fn format_connection_error(err: &ConnError, locator: &str) -> (String, u8) {
    match err {
        ConnError::Connect(io_err) | ConnError::Io(io_err) => {
            let message = match io_err.kind() {
                io::ErrorKind::ConnectionRefused => format!("Connection refused: {}", locator),
                io::ErrorKind::TimedOut => format!("Connection timed out: {}", locator),
                _ => format!("Connection failed: {}", io_err),
            };
            (message, exit_codes::NETWORK_ERROR)
        }
        ConnError::ConnectTimeout(after) => (
            format!("No CONNECTED from {} within {:?}", locator, after),
            exit_codes::NETWORK_ERROR,
        ),
        ConnError::ConnectionClosed => (
            format!("Broker closed the connection: {}", locator),
            exit_codes::NETWORK_ERROR,
        ),
        ConnError::ServerRejected(server_err) => {
            let mut message = format!("Connection rejected: {}", server_err.message);
            if let Some(body) = &server_err.body {
                message.push_str(&format!(" ({})", body));
            }
            (message, exit_codes::AUTH_ERROR)
        }
        ConnError::InvalidLocator(msg) => {
            (format!("Invalid locator: {}", msg), exit_codes::USAGE_ERROR)
        }
        other => (format!("{}", other), exit_codes::PROTOCOL_ERROR),
    }
}
