//! # Readning Common Library
//!
//! Shared code for the Readning services:
//! - Error and result types
//! - TOML configuration and root folder resolution
//! - SQLite pool initialisation and the chapter/chunk schema

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
