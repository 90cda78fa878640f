//! Filepost server binary.
//!
//! Listens on the loopback address and serves file uploads and shared
//! log editing. Unknown clients are registered interactively when the
//! process has a terminal, and rejected otherwise.

use clap::Parser;
use filepost_server::{
    DenyUnknown, FileServer, JsonCredentialStore, RegistrationDecision, RegistrationPolicy, Role,
    ServerConfig,
};
use std::io::{IsTerminal, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Filepost file upload and shared log server.
#[derive(Parser)]
#[command(name = "filepost-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to listen on
    port: u16,

    /// Running server version (1 = text uploads, 2 = binary uploads)
    #[arg(value_parser = clap::value_parser!(u8).range(1..=2))]
    server_version: u8,

    /// Path of the shared log file
    #[arg(long, default_value = "log.txt")]
    log_file: PathBuf,

    /// Directory uploaded files are written into
    #[arg(long, default_value = ".")]
    upload_dir: PathBuf,

    /// Path of the credential store
    #[arg(long, default_value = "users.json")]
    users_file: PathBuf,

    /// Maximum simultaneously authenticated sessions
    #[arg(long, default_value_t = 3)]
    max_connections: usize,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Asks the operator about unknown clients on the controlling terminal.
struct ConsoleRegistration;

impl RegistrationPolicy for ConsoleRegistration {
    fn decide(&self, client_id: &str) -> RegistrationDecision {
        if !prompt_yes_no(&format!(
            "Unknown client {client_id:?} is connecting. Register it?"
        )) {
            return RegistrationDecision::Reject;
        }
        if prompt_yes_no("Grant administrator rights to this client?") {
            RegistrationDecision::Accept(Role::Admin)
        } else {
            RegistrationDecision::Accept(Role::User)
        }
    }
}

fn prompt_yes_no(question: &str) -> bool {
    // The operator answers on the blocking console; hand the wait off
    // so the runtime worker stays usable for other connections.
    tokio::task::block_in_place(|| loop {
        eprint!("{question} [y/n] ");
        let _ = std::io::stderr().flush();
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        if let Some(decision) = parse_answer(&answer) {
            return decision;
        }
    })
}

fn parse_answer(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let bind_addr = SocketAddr::from(([127, 0, 0, 1], cli.port));
    let config = ServerConfig::new(bind_addr, cli.server_version)
        .with_max_connections(cli.max_connections)
        .with_log_file(cli.log_file)
        .with_upload_dir(cli.upload_dir);

    let credentials = Arc::new(JsonCredentialStore::open(cli.users_file)?);

    let registration: Arc<dyn RegistrationPolicy> = if std::io::stdin().is_terminal() {
        Arc::new(ConsoleRegistration)
    } else {
        Arc::new(DenyUnknown)
    };

    let server = FileServer::bind(config, credentials, registration).await?;
    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yes_no_answers() {
        assert_eq!(parse_answer("y\n"), Some(true));
        assert_eq!(parse_answer("YES\n"), Some(true));
        assert_eq!(parse_answer(" no "), Some(false));
        assert_eq!(parse_answer("n"), Some(false));
        assert_eq!(parse_answer("maybe\n"), None);
        assert_eq!(parse_answer(""), None);
    }
}
