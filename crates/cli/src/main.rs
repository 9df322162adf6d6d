//! shopsync CLI - Database migrations and manual sync tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! shopsync migrate
//!
//! # Connect a store to a tenant and run a full sync
//! shopsync sync --tenant 0b6f... --store demo.myshopify.com --token shpat_...
//!
//! # Inspect a sync job
//! shopsync job show 4c1e...
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `sync` - Onboard a store and run a full sync in the foreground
//! - `job show` - Print a sync job record as JSON

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use shopsync_core::{SyncJobId, TenantId};

mod commands;

#[derive(Parser)]
#[command(name = "shopsync")]
#[command(author, version, about = "shopsync CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Connect a store to a tenant and run a full sync
    Sync {
        /// Tenant id (UUID); created on first use
        #[arg(short, long)]
        tenant: TenantId,

        /// Store URL or domain (e.g. `demo`, `demo.myshopify.com`)
        #[arg(short, long)]
        store: String,

        /// Admin API access token
        #[arg(long, env = "SHOPIFY_ACCESS_TOKEN", hide_env_values = true)]
        token: String,

        /// Store-specific webhook signing secret (overrides the app-level one)
        #[arg(long, env = "SHOPSYNC_STORE_WEBHOOK_SECRET", hide_env_values = true)]
        webhook_secret: Option<String>,
    },
    /// Inspect sync jobs
    Job {
        #[command(subcommand)]
        action: JobAction,
    },
}

#[derive(Subcommand)]
enum JobAction {
    /// Show a sync job by id
    Show {
        /// Sync job id (UUID)
        id: SyncJobId,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Sync {
            tenant,
            store,
            token,
            webhook_secret,
        } => {
            commands::sync::full_sync(tenant, &store, token.into(), webhook_secret.map(Into::into))
                .await?;
        }
        Commands::Job { action } => match action {
            JobAction::Show { id } => commands::job::show(id).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_arguments_parse() {
        let tenant = TenantId::generate();
        let cli = Cli::try_parse_from([
            "shopsync",
            "sync",
            "--tenant",
            &tenant.to_string(),
            "--store",
            "demo",
            "--token",
            "shpat_test",
        ])
        .expect("parse");

        match cli.command {
            Commands::Sync {
                tenant: parsed,
                store,
                ..
            } => {
                assert_eq!(parsed, tenant);
                assert_eq!(store, "demo");
            }
            _ => panic!("expected sync command"),
        }
    }

    #[test]
    fn test_sync_accepts_webhook_secret() {
        let tenant = TenantId::generate();
        let cli = Cli::try_parse_from([
            "shopsync",
            "sync",
            "--tenant",
            &tenant.to_string(),
            "--store",
            "demo",
            "--token",
            "shpat_test",
            "--webhook-secret",
            "wh_store",
        ])
        .expect("parse");

        match cli.command {
            Commands::Sync { webhook_secret, .. } => {
                assert_eq!(webhook_secret.as_deref(), Some("wh_store"));
            }
            _ => panic!("expected sync command"),
        }
    }

    #[test]
    fn test_bad_job_id_is_rejected() {
        assert!(Cli::try_parse_from(["shopsync", "job", "show", "not-a-uuid"]).is_err());
    }
}
