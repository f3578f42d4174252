//! CLI module - Command-line interface for ndt-hours
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// ndt-hours - NDT Hours Tracker
/// Log inspection hours per method and keep the signature trail intact
#[derive(Parser)]
#[command(name = "ndt-hours")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Sign up, sign in and manage your password
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Manage your logged hours
    #[command(alias = "e")]
    Entries {
        #[command(subcommand)]
        command: EntryCommands,
    },

    /// Manage user profiles
    #[command(alias = "u")]
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Create an account
    Signup {
        email: String,
        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        username: Option<String>,
    },
    /// Sign in and keep the session for later commands
    #[command(alias = "signin")]
    Login {
        email: String,
        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out and forget the stored session
    #[command(alias = "signout")]
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Email a password-reset link
    ResetPassword { email: String },
    /// Change the signed-in user's password
    UpdatePassword {
        /// New password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum EntryCommands {
    /// List your entries, newest first
    #[command(alias = "ls")]
    List {
        /// Only this inspection method (e.g. UT, RT, MT, PT)
        #[arg(long)]
        method: Option<String>,
        /// Only this company
        #[arg(long)]
        company: Option<String>,
        /// Earliest entry date (inclusive, YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Latest entry date (inclusive, YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Show one entry
    Show { id: String },
    /// Log hours
    Add {
        #[arg(long)]
        method: String,
        #[arg(long)]
        hours: f64,
        #[arg(long)]
        company: Option<String>,
        /// Entry date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Change fields of an entry
    Update {
        id: String,
        #[arg(long)]
        method: Option<String>,
        #[arg(long)]
        hours: Option<f64>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete an entry and its signatures
    #[command(alias = "rm")]
    Delete { id: String },
    /// Total hours per method
    Totals,
    /// Check whether an entry has been signed
    Signed { id: String },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Show a profile (your own when no id is given)
    Show { id: Option<String> },
    /// List all profiles (admin)
    #[command(alias = "ls")]
    List,
    /// Change your profile
    Update {
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        username: Option<String>,
    },
    /// Delete a profile (admin)
    #[command(alias = "rm")]
    Delete { id: String },
    /// Grant or revoke admin rights (needs the service role key)
    SetAdmin {
        id: String,
        #[arg(action = clap::ArgAction::Set)]
        admin: bool,
    },
}

pub use commands::*;
