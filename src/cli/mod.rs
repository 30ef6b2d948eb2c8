//! CLI module - Command-line interface for schoolhub
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// schoolhub - School management backend
/// Serves schools, classes, courses, chats, clubs and users over HTTP
#[derive(Parser)]
#[command(name = "schoolhub")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server (default)
    #[command(alias = "-d", alias = "--daemon")]
    Serve,

    /// Write a default config.toml if none exists
    Init,

    /// Print every record of a collection as JSON
    #[command(alias = "ls", alias = "l")]
    List {
        /// Collection name, e.g. chats or users
        collection: String,
    },
}

pub use commands::*;
