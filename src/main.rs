//! wallet-manager - connect a local key to Cosmos chains from the command line

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use wallet_manager::{
    ChainConnectionView, ChainConnector, ChainInfoResolver, ConnectionCoordinator,
    LocalKeyWallet, SigningClientFactory, StaticChainInfoResolver, WalletManagerConfig,
    WalletManagerContext, WalletManagerError,
};

/// wallet-manager: multi-chain Cosmos wallet connections
#[derive(Parser)]
#[command(name = "wallet-manager")]
#[command(about = "Connect one wallet to many Cosmos chains", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect a key to the default chain and derive connections for more chains
    Connect {
        /// Hex-encoded secp256k1 private key
        #[arg(short, long)]
        key: String,

        /// Additional chain to connect (repeatable)
        #[arg(short, long = "chain", value_name = "CHAIN_ID")]
        chains: Vec<String>,

        /// Path to a JSON config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Derive chains one at a time without caching them
        #[arg(long)]
        explicit: bool,
    },

    /// List chains known without a registry
    ListChains,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set subscriber: {}", e);
    }

    let result = match cli.command {
        Commands::Connect {
            key,
            chains,
            config,
            explicit,
        } => connect(&key, &chains, config, explicit).await,
        Commands::ListChains => {
            list_chains();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn connect(
    key: &str,
    chains: &[String],
    config: Option<PathBuf>,
    explicit: bool,
) -> Result<(), WalletManagerError> {
    let config = match config {
        Some(path) => WalletManagerConfig::from_file(path)?,
        None => WalletManagerConfig::default(),
    };

    let resolver: Arc<dyn ChainInfoResolver> = match config.registry_resolver() {
        Some(registry) => {
            info!("Resolving chains through registry");
            Arc::new(registry)
        }
        None => Arc::new(StaticChainInfoResolver::with_known_chains()),
    };

    let wallet = LocalKeyWallet::from_private_key(key)?;
    let coordinator = Arc::new(
        ConnectionCoordinator::from_config(&config, resolver, Arc::new(SigningClientFactory::new()))
            .with_wallet(Arc::new(wallet)),
    );
    coordinator.initialize();

    let ctx = WalletManagerContext::new(coordinator.clone());
    let primary = match config.preferred_wallet.as_deref() {
        Some(wallet_id) => coordinator.auto_connect(wallet_id).await?,
        None => coordinator.connect(wallet_manager::wallet::local::LOCAL_WALLET_ID).await?,
    };

    println!("{:<16} {}", primary.chain_id(), primary.address);

    if explicit {
        let connector = ChainConnector::from_context(&ctx)?;
        for chain_id in chains {
            match connector.connect_to_chain(chain_id).await {
                Ok(info) => println!("{:<16} {}", chain_id, info.address),
                Err(e) => warn!("{}", e),
            }
        }
        return Ok(());
    }

    for chain_id in chains {
        let mut view = ChainConnectionView::from_context(&ctx, Some(chain_id.as_str()))?;
        let connection = view.settled().await;
        match (connection.address(), &connection.error) {
            (Some(address), _) => println!("{:<16} {}", chain_id, address),
            (None, Some(e)) => warn!("{}", e),
            (None, None) => warn!("{} is {}", chain_id, connection.status),
        }
    }

    info!("{} chain(s) cached", coordinator.connected_wallets().len());
    Ok(())
}

fn list_chains() {
    for info in wallet_manager::chain_info::known_chains() {
        println!(
            "{:<16} {:<12} {}",
            info.chain_id,
            info.bech32_prefix,
            info.default_gas_price()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
}
