//! Filepost client binary.
//!
//! Interactive shell over one authenticated session: prompts for
//! credentials, then accepts commands until `exit`.

use clap::Parser;
use filepost_client::{
    sha512_hex, spawn_progress, ClientError, Command, DotProgress, EditOutcome, SendOutcome,
    Session, SystemEditor, HELP_TEXT,
};
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Filepost file upload and shared log client.
#[derive(Parser)]
#[command(name = "filepost-client")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server address
    address: String,

    /// Server port
    port: u16,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn prompt(question: &str) -> std::io::Result<String> {
    print!("{question}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let client_id = prompt("Client id: ")?;
    let password = prompt("Password: ")?;
    let password_hash = sha512_hex(&password);

    let mut session =
        Session::connect((cli.address.as_str(), cli.port), client_id).await?;
    let _progress = spawn_progress(session.watch_state(), Arc::new(DotProgress));

    if let Err(e) = session.authenticate(&password_hash).await {
        if e.is_capacity() {
            eprintln!("\nThe server is full, try again later.");
        } else {
            eprintln!("\nAuthentication refused: {e}");
        }
        std::process::exit(1);
    }
    println!("\nConnected. Type \"help\" for the command list.");

    loop {
        let line = prompt("> ")?;
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(usage) => {
                println!("{usage}");
                continue;
            }
        };

        match command {
            Command::Empty => {}
            Command::Help => println!("{HELP_TEXT}"),
            Command::Clear => {
                // ANSI: clear screen, cursor home.
                print!("\x1B[2J\x1B[H");
                std::io::stdout().flush()?;
            }
            Command::Version => {
                let version = session.query_version().await?;
                println!("\nServer is running version {version}.");
            }
            Command::Send { path, version } => {
                let file_data = match std::fs::read(&path) {
                    Ok(data) => data,
                    Err(e) => {
                        println!("Cannot read {}: {e}", path.display());
                        continue;
                    }
                };
                let file_name = match path.file_name().and_then(|n| n.to_str()) {
                    Some(name) => name.to_string(),
                    None => {
                        println!("{} has no usable file name.", path.display());
                        continue;
                    }
                };
                match session.send_file(&file_name, file_data, version).await? {
                    SendOutcome::Accepted => println!("\nFile sent."),
                    SendOutcome::VersionMismatch => {
                        println!("\nThe server rejected the file: it is not running version {version}.");
                    }
                    SendOutcome::ServerError => {
                        println!("\nThe server failed to store the file.");
                    }
                }
            }
            Command::EditLog => match session.edit_log(&SystemEditor).await {
                Ok(EditOutcome::Saved) => println!("\nLog updated."),
                Ok(EditOutcome::Denied) => {
                    println!("\nOnly administrators may edit the log.");
                }
                Ok(EditOutcome::ServerError) => {
                    println!("\nThe server failed to store the log.");
                }
                Err(ClientError::Editor { message }) => {
                    println!("\nEditing failed locally: {message}");
                }
                Err(e) => return Err(e.into()),
            },
            Command::Exit => {
                session.end_connection().await?;
                println!("\nBye.");
                return Ok(());
            }
        }
    }
}
