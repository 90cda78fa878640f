//! # Filepost Client
//!
//! Client library for the filepost protocol: a [`Session`] state
//! machine over any async stream, operator [`Command`] parsing for the
//! interactive shell, password hashing, and the external-editor seam
//! used for shared log editing.
//!
//! The binary (`filepost-client`) wires these together into the
//! interactive shell; the library itself stays free of terminal I/O so
//! every piece can be driven from tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod editor;
mod error;
mod hash;
mod progress;
mod session;

pub use command::{Command, UsageError, HELP_TEXT};
pub use editor::{LogEditor, SystemEditor};
pub use error::{ClientError, ClientResult};
pub use hash::sha512_hex;
pub use progress::{spawn as spawn_progress, DotProgress, ProgressSink};
pub use session::{EditOutcome, SendOutcome, Session, SessionState};
