//! # Command Line
//!
//! Argument definitions for `encryptedssm`.
//!
//! ## Usage
//!
//! ```bash
//! # Show what would change
//! encryptedssm plan -f parameter.yaml --state parameter.state.json
//!
//! # Create, update or replace the parameter
//! encryptedssm apply -f parameter.yaml --state parameter.state.json
//!
//! # Adopt an existing parameter
//! encryptedssm import /my-service/prod/db_password -f parameter.yaml
//!
//! # Delete it
//! encryptedssm destroy -f parameter.yaml
//!
//! # Print the document JSON schema
//! encryptedssm schema
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use encrypted_ssm::ParameterDocument;
use std::path::{Path, PathBuf};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// Reconcile a KMS-encrypted SecureString parameter in AWS SSM Parameter Store
#[derive(Debug, Parser)]
#[command(name = "encryptedssm", version, long_version = LONG_VERSION)]
#[command(
    about = "Reconcile a KMS-encrypted SecureString parameter in AWS SSM Parameter Store",
    long_about = None,
    after_help = "\
Environment:
  AWS_REGION, AWS_PROFILE, AWS_MAX_ATTEMPTS      provider defaults
  ENCRYPTEDSSM_VALIDATION_TIMEOUT_SECS            creation validation window (default 120)
  RUST_LOG                                        log filter, overrides --log-level
"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level for this tool (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Disable colored log output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long, global = true)]
    pub metrics: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Refresh state and show the planned change
    Plan(StateArgs),
    /// Refresh state and carry out the planned change
    Apply(StateArgs),
    /// Re-read the parameter and update the state file
    Refresh(StateArgs),
    /// Adopt an existing parameter by name
    Import {
        /// Name of the existing parameter
        id: String,
        #[command(flatten)]
        args: StateArgs,
    },
    /// Delete the parameter recorded in the state file
    Destroy(StateArgs),
    /// Print the JSON schema of the parameter document
    Schema,
}

#[derive(Debug, Args)]
pub struct StateArgs {
    /// Parameter document (YAML)
    #[arg(short = 'f', long = "file", default_value = "parameter.yaml")]
    pub document: PathBuf,

    /// State file; defaults to the document path with a `.state.json` extension
    #[arg(long)]
    pub state: Option<PathBuf>,
}

impl StateArgs {
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.state
            .clone()
            .unwrap_or_else(|| self.document.with_extension("state.json"))
    }
}

/// Read and parse a parameter document
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid document.
pub fn load_document(path: &Path) -> Result<ParameterDocument> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read parameter document {}", path.display()))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse parameter document {}", path.display()))
}
