//! External editing of the shared log.

use crate::error::{ClientError, ClientResult};
use std::io::Write;
use std::process::Command;

/// Turns the current log bytes into their edited replacement.
pub trait LogEditor {
    /// Edits `contents` and returns the new log bytes.
    fn edit(&self, contents: &[u8]) -> ClientResult<Vec<u8>>;
}

/// Launches the operator's editor (`$EDITOR`, falling back to `vi`) on
/// a temporary copy of the log and reads the result back once the
/// editor exits. The temporary file is removed afterwards.
#[derive(Debug, Default)]
pub struct SystemEditor;

impl LogEditor for SystemEditor {
    fn edit(&self, contents: &[u8]) -> ClientResult<Vec<u8>> {
        let mut file = tempfile::Builder::new()
            .prefix("filepost-log-")
            .suffix(".txt")
            .tempfile()?;
        file.write_all(contents)?;
        file.flush()?;

        let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".into());
        let status = Command::new(&editor)
            .arg(file.path())
            .status()
            .map_err(|e| ClientError::editor(format!("could not launch {editor:?}: {e}")))?;
        if !status.success() {
            return Err(ClientError::editor(format!(
                "{editor:?} exited with {status}"
            )));
        }

        let edited = std::fs::read(file.path())?;
        Ok(edited)
    }
}

impl<F> LogEditor for F
where
    F: Fn(&[u8]) -> Vec<u8>,
{
    fn edit(&self, contents: &[u8]) -> ClientResult<Vec<u8>> {
        Ok(self(contents))
    }
}
