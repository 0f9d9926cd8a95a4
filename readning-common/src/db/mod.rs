//! Database pool setup and schema

pub mod init;

pub use init::*;
