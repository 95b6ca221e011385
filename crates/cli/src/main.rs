//! Shopfleet CLI - Database migrations and catalog maintenance tools.
//!
//! # Usage
//!
//! ```bash
//! # Run catalog database migrations
//! sf-cli migrate
//!
//! # Re-propagate a product from Shopify
//! sf-cli resync 8123456789
//!
//! # Publish a product to the online store
//! sf-cli publish 8123456789
//!
//! # Repair stored stock for a product
//! sf-cli reconcile main prod-42
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `resync` - Fetch a product from Shopify and propagate it
//! - `publish` - Publish a product to the online store channel
//! - `reconcile` - Repair stored variant stock against Shopify

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(author, version, about = "Shopfleet CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run catalog database migrations
    Migrate,
    /// Fetch a product from Shopify and propagate it to every storefront
    Resync {
        /// Shopify product ID (numeric or `gid://shopify/Product/...`)
        product: String,
    },
    /// Publish a product to the online store channel
    Publish {
        /// Shopify product ID (numeric or `gid://shopify/Product/...`)
        product: String,
    },
    /// Repair stored stock for every variant of a product
    Reconcile {
        /// Storefront ID
        storefront: String,

        /// Storefront product ID
        product: String,
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
        Commands::Resync { product } => commands::catalog::resync(&product).await?,
        Commands::Publish { product } => commands::catalog::publish(&product).await?,
        Commands::Reconcile {
            storefront,
            product,
        } => commands::catalog::reconcile(&storefront, &product).await?,
    }
    Ok(())
}
