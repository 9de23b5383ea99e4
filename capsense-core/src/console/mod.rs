//! Line-oriented console shared by the emulator and any serial front-end.
//!
//! [`grammar`] turns a line into a [`Command`](grammar::Command) without
//! allocating; [`catalog`] lists the commands for help output and
//! [`status`] renders the controller snapshot.

pub mod catalog;
pub mod grammar;
pub mod status;

pub use grammar::{Command, ParseError, parse};
pub use status::StatusSnapshot;
