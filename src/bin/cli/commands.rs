use stompline::{AckMode, Connection};
use std::time::Duration;

/// Result of executing a command
pub enum CommandResult {
    /// Command executed successfully
    Ok,
    /// Command requests exit
    Quit,
    /// Informational output for the user
    Info(String),
    /// Error executing command
    Error(String),
}

/// A parsed command line.
#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Empty,
    Quit,
    Help,
    Send { destination: &'a str, body: &'a str, transaction: Option<&'a str> },
    Subscribe { destination: &'a str, ack: AckMode },
    Unsubscribe(&'a str),
    Begin(&'a str),
    Commit(&'a str),
    Abort(&'a str),
    Ack { message_id: &'a str, transaction: Option<&'a str>, confirm: bool },
}

/// Parse one line typed by the user.
pub fn parse(line: &str, default_ack: AckMode) -> Result<Input<'_>, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim_start();
    let args: Vec<&str> = rest.split_whitespace().collect();

    match word {
        "" => Ok(Input::Empty),
        "quit" | "exit" | "q" => Ok(Input::Quit),
        "help" | "?" => Ok(Input::Help),

        "send" => {
            let (destination, body) = rest
                .split_once(' ')
                .ok_or("Usage: send <destination> <message>")?;
            Ok(Input::Send { destination, body, transaction: None })
        }

        // txsend <transaction> <destination> <message>
        "txsend" => {
            let mut parts = rest.splitn(3, ' ');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(tx), Some(destination), Some(body)) if !tx.is_empty() => Ok(Input::Send {
                    destination,
                    body,
                    transaction: Some(tx),
                }),
                _ => Err("Usage: txsend <transaction> <destination> <message>".to_string()),
            }
        }

        "sub" | "subscribe" => match args[..] {
            [destination] => Ok(Input::Subscribe { destination, ack: default_ack }),
            [destination, "auto"] => Ok(Input::Subscribe { destination, ack: AckMode::Auto }),
            [destination, "client"] => Ok(Input::Subscribe { destination, ack: AckMode::Client }),
            _ => Err("Usage: sub <destination> [auto|client]".to_string()),
        },

        "unsub" | "unsubscribe" => match args[..] {
            [destination] => Ok(Input::Unsubscribe(destination)),
            _ => Err("Usage: unsub <destination>".to_string()),
        },

        "begin" | "commit" | "abort" => match args[..] {
            [tx] => Ok(match word {
                "begin" => Input::Begin(tx),
                "commit" => Input::Commit(tx),
                _ => Input::Abort(tx),
            }),
            _ => Err(format!("Usage: {} <transaction>", word)),
        },

        "ack" | "ackr" => {
            let confirm = word == "ackr";
            match args[..] {
                [message_id] => Ok(Input::Ack { message_id, transaction: None, confirm }),
                [message_id, tx] => Ok(Input::Ack { message_id, transaction: Some(tx), confirm }),
                _ => Err(format!("Usage: {} <message-id> [transaction]", word)),
            }
        }

        other => Err(format!("Unknown command: {}. Type 'help' for commands.", other)),
    }
}

/// Parse and execute a command
pub async fn execute_command(line: &str, conn: &Connection, default_ack: AckMode) -> CommandResult {
    let input = match parse(line, default_ack) {
        Ok(input) => input,
        Err(usage) => return CommandResult::Error(usage),
    };

    let result = match input {
        Input::Empty => return CommandResult::Ok,
        Input::Quit => return CommandResult::Quit,
        Input::Help => {
            print_help();
            return CommandResult::Ok;
        }
        Input::Send { destination, body, transaction } => {
            let mut headers = vec![("content-type".to_string(), "text/plain".to_string())];
            if let Some(tx) = transaction {
                headers.push(("transaction".to_string(), tx.to_string()));
            }
            conn.send_with_headers(destination, body, headers).await.map(|()| None)
        }
        Input::Subscribe { destination, ack } => conn
            .subscribe(destination, ack)
            .await
            .map(|()| Some(format!("Subscribed to: {} (ack: {})", destination, ack.as_str()))),
        Input::Unsubscribe(destination) => conn
            .unsubscribe(destination)
            .await
            .map(|()| Some(format!("Unsubscribed from: {}", destination))),
        Input::Begin(tx) => conn.begin(tx).await.map(|()| None),
        Input::Commit(tx) => conn.commit(tx).await.map(|()| None),
        Input::Abort(tx) => conn.abort(tx).await.map(|()| None),
        Input::Ack { message_id, transaction, confirm: false } => {
            conn.ack(message_id, transaction).await.map(|()| None)
        }
        Input::Ack { message_id, transaction, confirm: true } => conn
            .ack_confirmed(message_id, transaction, Duration::from_secs(5))
            .await
            .map(|()| Some(format!("Broker confirmed ack of {}", message_id))),
    };

    match result {
        Ok(Some(info)) => CommandResult::Info(info),
        Ok(None) => CommandResult::Ok,
        Err(e) => CommandResult::Error(format!("Error: {}", e)),
    }
}

/// Print help text
pub fn print_help() {
    println!("Commands:");
    println!("  send <destination> <message>              - Send a message");
    println!("  txsend <tx> <destination> <message>       - Send inside a transaction");
    println!("  sub <destination> [auto|client]           - Subscribe to a destination");
    println!("  unsub <destination>                       - Unsubscribe");
    println!("  begin|commit|abort <tx>                   - Transaction control");
    println!("  ack <message-id> [tx]                     - Acknowledge a message");
    println!("  ackr <message-id> [tx]                    - Acknowledge and wait for RECEIPT");
    println!("  quit                                      - Disconnect and exit");
}
