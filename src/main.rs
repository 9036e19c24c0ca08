//! cti-enrichment
//!
//! Internal enrichment connectors for OpenCTI: ChainPatrol, Etherscan and Hexagate.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod enrichment;
mod models;
mod platform;

use api::{create_router, AppState};
use enrichment::{
    chainpatrol::ChainPatrolProvider, ens::ENS_REGISTRY, etherscan::EtherscanProvider,
    hexagate::HexagateProvider, Connector, EnrichmentProvider,
};
use models::ioc_utils::parse_wallet_address;
use models::Tlp;
use platform::OpenCtiClient;

/// cti-enrichment
#[derive(Parser, Debug)]
#[command(name = "cti-enrichment")]
#[command(about = "Enrich OpenCTI observables from third-party reputation sources")]
struct Args {
    /// Server host
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Server port
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// OpenCTI base URL
    #[arg(long, env = "OPENCTI_URL")]
    opencti_url: String,

    /// OpenCTI API token
    #[arg(long, env = "OPENCTI_TOKEN", hide_env_values = true)]
    opencti_token: String,

    /// Connector id used when pushing bundles
    #[arg(long, env = "CONNECTOR_ID")]
    connector_id: String,

    /// Whether existing data may be updated on import (true/false)
    #[arg(long, env = "CONNECTOR_UPDATE_EXISTING_DATA", default_value = "false")]
    update_existing_data: String,

    /// TLP marking applied to published notes
    #[arg(long, env = "NOTE_MARKING", value_enum, default_value = "white")]
    note_marking: Tlp,

    #[command(subcommand)]
    connector: ConnectorCommand,
}

#[derive(Subcommand, Debug)]
enum ConnectorCommand {
    /// Domain reputation from ChainPatrol
    Chainpatrol {
        /// ChainPatrol API key
        #[arg(long, env = "CHAINPATROL_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Identity credited as note author
        #[arg(long, env = "CHAINPATROL_AUTHOR_ID")]
        author_id: Option<String>,

        /// Override the ChainPatrol API base URL
        #[arg(long, env = "CHAINPATROL_API_URL")]
        api_url: Option<String>,
    },

    /// Contract and ENS details from an Ethereum RPC endpoint
    Etherscan {
        /// Ethereum JSON-RPC endpoint
        #[arg(long, env = "ALCHEMY_URL")]
        rpc_url: String,

        /// Identity credited as note author
        #[arg(long, env = "ETHERSCAN_AUTHOR_ID")]
        author_id: Option<String>,

        /// ENS registry contract
        #[arg(long, env = "ENS_REGISTRY", default_value = ENS_REGISTRY)]
        ens_registry: String,
    },

    /// Wallet risk analysis from Hexagate
    Hexagate {
        /// Hexagate API key
        #[arg(long, env = "HEXAGATE_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Identity credited as note author
        #[arg(long, env = "HEXAGATE_AUTHOR_ID")]
        author_id: Option<String>,

        /// Override the Hexagate API base URL
        #[arg(long, env = "HEXAGATE_API_URL")]
        api_url: Option<String>,
    },
}

impl ConnectorCommand {
    fn build(self) -> Result<(Box<dyn EnrichmentProvider>, Option<String>)> {
        Ok(match self {
            ConnectorCommand::Chainpatrol { api_key, author_id, api_url } => {
                let provider = match api_url {
                    Some(url) => ChainPatrolProvider::with_base_url(api_key, url)?,
                    None => ChainPatrolProvider::new(api_key)?,
                };
                (Box::new(provider), author_id)
            }
            ConnectorCommand::Etherscan { rpc_url, author_id, ens_registry } => {
                let registry = parse_wallet_address(&ens_registry)
                    .context("Invalid ENS registry address")?;
                (Box::new(EtherscanProvider::new(rpc_url, registry)?), author_id)
            }
            ConnectorCommand::Hexagate { api_key, author_id, api_url } => {
                let provider = match api_url {
                    Some(url) => HexagateProvider::with_base_url(api_key, url)?,
                    None => HexagateProvider::new(api_key)?,
                };
                (Box::new(provider), author_id)
            }
        })
    }
}

/// Interpret CONNECTOR_UPDATE_EXISTING_DATA, falling back to false on anything unexpected
fn parse_update_existing_data(raw: &str) -> bool {
    match raw.to_lowercase().as_str() {
        "true" => true,
        "false" => false,
        other => {
            tracing::warn!(
                "Error when grabbing CONNECTOR_UPDATE_EXISTING_DATA environment variable: '{}'. \
                 It SHOULD be either `true` or `false`. `false` is assumed.",
                other
            );
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cti_enrichment=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse arguments
    let args = Args::parse();

    let update_existing_data = parse_update_existing_data(&args.update_existing_data);

    let platform = OpenCtiClient::new(&args.opencti_url, args.opencti_token, args.connector_id)
        .context("Failed to configure OpenCTI client")?;

    let (provider, author_id) = args.connector.build()?;

    tracing::info!(
        connector = provider.name(),
        scope = %provider.scope(),
        update_existing_data,
        "Starting enrichment connector"
    );

    let connector = Connector::new(provider, Arc::new(platform), author_id, args.note_marking);
    let state = Arc::new(AppState { connector });

    // Create router
    let app = create_router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const BASE: [&str; 7] = [
        "cti-enrichment",
        "--opencti-url",
        "http://localhost:4000",
        "--opencti-token",
        "token",
        "--connector-id",
        "connector-1",
    ];

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn update_existing_data_is_case_insensitive() {
        assert!(parse_update_existing_data("TRUE"));
        assert!(parse_update_existing_data("true"));
        assert!(!parse_update_existing_data("False"));
    }

    #[test]
    fn unexpected_update_existing_data_falls_back_to_false() {
        assert!(!parse_update_existing_data("yes"));
        assert!(!parse_update_existing_data(""));
    }

    #[test]
    fn hexagate_subcommand_parses() {
        let mut argv = BASE.to_vec();
        argv.extend(["hexagate", "--api-key", "hg-key", "--author-id", "identity--1"]);
        let args = Args::try_parse_from(argv).unwrap();

        assert_eq!(args.note_marking, Tlp::White);
        match args.connector {
            ConnectorCommand::Hexagate { api_key, author_id, api_url } => {
                assert_eq!(api_key, "hg-key");
                assert_eq!(author_id.as_deref(), Some("identity--1"));
                assert!(api_url.is_none());
            }
            other => panic!("unexpected connector: {:?}", other),
        }
    }

    #[test]
    fn etherscan_builds_with_default_registry() {
        let mut argv = BASE.to_vec();
        argv.extend(["--note-marking", "green", "etherscan", "--rpc-url", "http://localhost:8545"]);
        let args = Args::try_parse_from(argv).unwrap();

        assert_eq!(args.note_marking, Tlp::Green);
        let (provider, author_id) = args.connector.build().unwrap();
        assert_eq!(provider.name(), "etherscan");
        assert!(author_id.is_none());
    }

    #[test]
    fn bad_registry_is_rejected() {
        let command = ConnectorCommand::Etherscan {
            rpc_url: "http://localhost:8545".to_string(),
            author_id: None,
            ens_registry: "registry".to_string(),
        };
        assert!(command.build().is_err());
    }
}
