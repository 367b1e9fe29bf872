//! TableKV CLI Client
//!
//! Command-line interface for interacting with TableKV.

use std::io::{self, BufRead};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tablekv::client::{self, Client};
use tablekv::protocol::{Message, MessageKind};

/// TableKV CLI
#[derive(Parser, Debug)]
#[command(name = "tablekv-cli")]
#[command(about = "CLI for the TableKV table store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6380")]
    server: String,

    /// User name sent with LOGIN
    #[arg(short, long, default_value = "cli")]
    username: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the value stored under a key
    Get {
        table: String,
        key: String,
    },

    /// Store a value under a key
    Set {
        table: String,
        key: String,
        value: String,
    },

    /// Add one to the value stored under a key
    Incr {
        /// Run the increment inside BEGIN / COMMIT
        #[arg(short = 't', long)]
        transaction: bool,

        table: String,
        key: String,
    },

    /// Send raw protocol lines and print every reply
    Send {
        /// Stop at the first FAILED or ERROR reply
        #[arg(short = 'e', long)]
        fail_fast: bool,

        /// Lines to send; read from stdin when none are given
        lines: Vec<String>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let outcome = match args.command {
        Commands::Get { table, key } => {
            client::get_value(&args.server, &args.username, &table, &key).map(|value| {
                println!("{}", value);
                true
            })
        }
        Commands::Set { table, key, value } => {
            client::set_value(&args.server, &args.username, &table, &key, &value).map(|_| true)
        }
        Commands::Incr {
            transaction,
            table,
            key,
        } => client::incr_value(&args.server, &args.username, &table, &key, transaction).map(
            |value| {
                println!("{}", value);
                true
            },
        ),
        Commands::Send { fail_fast, lines } => send_lines(&args.server, lines, fail_fast),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every reply was OK or DATA
fn send_lines(server: &str, lines: Vec<String>, fail_fast: bool) -> tablekv::Result<bool> {
    let lines: Vec<String> = if lines.is_empty() {
        io::stdin().lock().lines().collect::<io::Result<_>>()?
    } else {
        lines
    };

    let mut client = Client::connect(server)?;
    let mut success = true;

    for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        println!("{}", line);
        let reply = client.send_line(line)?;
        println!("  -> {}", render(&reply));

        match reply.kind() {
            MessageKind::Failed | MessageKind::Error => {
                success = false;
                if fail_fast || reply.kind() == MessageKind::Error {
                    break;
                }
            }
            MessageKind::Ok if line == "BYE" => break,
            _ => {}
        }
    }

    Ok(success)
}

fn render(reply: &Message) -> String {
    tablekv::protocol::encode(reply)
        .map(|line| line.trim_end().to_string())
        .unwrap_or_else(|_| format!("{:?}", reply))
}
