//! Command handlers.
//!
//! Each handler is a thin `execute` that wires bootstrap pieces together,
//! calls into the library crates and formats the result for the terminal.

pub mod doctor;
pub mod health;
pub mod init;
pub mod mcp;
pub mod paths;
pub mod reset;
pub mod speak;
pub mod worker;
