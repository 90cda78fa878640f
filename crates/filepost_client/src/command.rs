//! Operator command parsing for the interactive shell.

use std::path::PathBuf;
use thiserror::Error;

/// Help text printed by the `help` command.
pub const HELP_TEXT: &str = "\
Commands:
  help                      show this help
  version                   ask the server for its running version
  send <file> <version>     upload a file (version 1 = text, 2 = binary)
  editlog                   fetch, edit and store the shared log (admin)
  clear                     clear the screen
  exit                      disconnect and quit";

/// One parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Blank input; the shell loops without doing anything.
    Empty,
    /// Print [`HELP_TEXT`].
    Help,
    /// Clear the screen locally.
    Clear,
    /// Query the server version.
    Version,
    /// Fetch the shared log for editing.
    EditLog,
    /// Disconnect and quit.
    Exit,
    /// Upload a file, declaring which server version it targets.
    Send {
        /// Local path of the file to upload.
        path: PathBuf,
        /// Declared server version (1 or 2).
        version: u8,
    },
}

/// A command line the shell could not understand.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    /// The command word is not in the vocabulary.
    #[error("unknown command {0:?}, try \"help\"")]
    UnknownCommand(String),

    /// `send` was given the wrong number of arguments.
    #[error("usage: send <file> <version>")]
    SendUsage,

    /// `send` was given a version other than 1 or 2.
    #[error("version must be 1 or 2, got {0:?}")]
    BadVersion(String),
}

impl Command {
    /// Parses one input line. The command word is case-insensitive;
    /// arguments are taken verbatim.
    pub fn parse(line: &str) -> Result<Self, UsageError> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Ok(Self::Empty);
        };

        match word.to_lowercase().as_str() {
            "help" => Ok(Self::Help),
            "clear" => Ok(Self::Clear),
            "version" => Ok(Self::Version),
            "editlog" => Ok(Self::EditLog),
            "exit" => Ok(Self::Exit),
            "send" => {
                let (Some(path), Some(version), None) =
                    (words.next(), words.next(), words.next())
                else {
                    return Err(UsageError::SendUsage);
                };
                match version.parse::<u8>() {
                    Ok(version @ (1 | 2)) => Ok(Self::Send {
                        path: PathBuf::from(path),
                        version,
                    }),
                    _ => Err(UsageError::BadVersion(version.to_string())),
                }
            }
            _ => Err(UsageError::UnknownCommand(word.to_string())),
        }
    }
}
