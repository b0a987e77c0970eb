//! # encryptedssm
//!
//! Reconciles one KMS-encrypted `SecureString` parameter in AWS Systems
//! Manager Parameter Store from a YAML document.
//!
//! The document only ever carries the KMS ciphertext. The plaintext is
//! decrypted in memory, written to Parameter Store, and compared on refresh;
//! it is never logged or written to the state file.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{load_document, Cli, Commands, StateArgs};
use encrypted_ssm::config::ReconcilerConfig;
use encrypted_ssm::controller::reconciler::Reconciler;
use encrypted_ssm::observability::{logging, metrics};
use encrypted_ssm::provider::aws;
use encrypted_ssm::state::StateFile;
use encrypted_ssm::ParameterDocument;
use std::io::IsTerminal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Configure rustls crypto provider FIRST, before any AWS client is built
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let cli = Cli::parse();
    logging::init_logging(
        cli.log_level.as_deref(),
        !cli.no_color && std::io::stderr().is_terminal(),
    );
    metrics::register_metrics()?;

    let result = run(&cli).await;
    if cli.metrics {
        eprintln!("{}", metrics::gather_text()?);
    }
    result
}

async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Schema => {
            let schema = schemars::schema_for!(ParameterDocument);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
        Commands::Plan(args) => {
            let (reconciler, document, state) = prepare(args).await?;
            let (plan, _) = reconciler
                .plan(&document.parameter, state.parameter.as_ref())
                .await?;
            println!("{plan}");
            Ok(())
        }
        Commands::Apply(args) => {
            let (reconciler, document, state) = prepare(args).await?;
            let outcome = match reconciler
                .apply(&document.parameter, state.parameter.as_ref())
                .await
            {
                Ok(outcome) => outcome,
                Err(err) => {
                    if let Some(committed) = err.committed_state() {
                        save_state(args, StateFile::new(Some(committed.clone())))?;
                    }
                    return Err(err.into());
                }
            };
            println!("{}", outcome.plan);
            save_state(args, StateFile::new(outcome.state))
        }
        Commands::Refresh(args) => {
            let (reconciler, document, state) = prepare(args).await?;
            let refreshed = reconciler
                .refresh(&document.parameter, state.parameter.as_ref())
                .await?;
            match &refreshed {
                Some(parameter) => println!("{} at version {}", parameter.id, parameter.version),
                None => println!("No parameter is managed"),
            }
            save_state(args, StateFile::new(refreshed))
        }
        Commands::Import { id, args } => {
            let (reconciler, document, state) = prepare(args).await?;
            if let Some(existing) = &state.parameter {
                anyhow::bail!(
                    "State file {} already manages {}",
                    args.state_path().display(),
                    existing.id
                );
            }
            let imported = reconciler
                .import(&document.parameter, id)
                .await?
                .with_context(|| format!("Cannot import non-existent SSM Parameter {id}"))?;
            println!("Imported {} at version {}", imported.id, imported.version);
            save_state(args, StateFile::new(Some(imported)))
        }
        Commands::Destroy(args) => {
            let (reconciler, _, state) = prepare(args).await?;
            reconciler.destroy(state.parameter.as_ref()).await?;
            if let Some(parameter) = &state.parameter {
                println!("Destroyed {}", parameter.id);
            }
            save_state(args, StateFile::new(None))
        }
    }
}

/// Load the document and state, and connect to AWS
async fn prepare(args: &StateArgs) -> Result<(Reconciler, ParameterDocument, StateFile)> {
    let document = load_document(&args.document)?;
    let state = StateFile::load(&args.state_path())?;

    let provider = document
        .provider
        .clone()
        .unwrap_or_default()
        .with_env_defaults();
    let clients = aws::connect(&provider)
        .await
        .context("Failed to configure AWS clients")?;

    info!("Loaded parameter document {}", args.document.display());
    let reconciler = Reconciler::new(clients, ReconcilerConfig::from_env(), provider.ignore_config());
    Ok((reconciler, document, state))
}

fn save_state(args: &StateArgs, state: StateFile) -> Result<()> {
    let path = args.state_path();
    state.save(&path)?;
    info!("State written to {}", path.display());
    Ok(())
}
