//! utxo-bots CLI
//!
//!   utxo-bots run                 → wait for the ledger, start every bot
//!   utxo-bots addresses           → key-store addresses as a JSON array
//!   utxo-bots import-addresses    → watch-only import into the node
//!   utxo-bots received            → per-address received totals (sat)
//!   utxo-bots mine --blocks <n>   → regtest block generation
//!
//! Every flag falls back to an environment variable; a `.env` file in the
//! working directory is loaded first.

use anyhow::Context;
use bitcoin::Network;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use utxo_bots::chain::{BitcoindChain, ChainAdmin, ChainQuery};
use utxo_bots::clock::SystemClock;
use utxo_bots::config::{self, BotsConfig};
use utxo_bots::ledger::HttpLedger;
use utxo_bots::logging::init_logging;
use utxo_bots::{bots, driver, runtime, KeyStore};

#[derive(Parser)]
#[command(name = "utxo-bots", version, about = "UTXO reconciliation and transfer bots")]
struct Cli {
    #[command(flatten)]
    opts: Opts,
    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Args)]
struct Opts {
    /// Ledger gateway base URL
    #[arg(long, env = "UTXO_BOTS_LEDGER_URL", default_value = config::DEFAULT_LEDGER_URL, global = true)]
    ledger_url: String,
    /// Bitcoin Core RPC URL
    #[arg(long, env = "BITCOIN_RPC_URL", default_value = config::DEFAULT_NODE_URL, global = true)]
    rpc_url: String,
    #[arg(long, env = "BITCOIN_RPC_USER", default_value = "admin1", global = true)]
    rpc_user: String,
    #[arg(long, env = "BITCOIN_RPC_PASS", default_value = "123", hide_env_values = true, global = true)]
    rpc_pass: String,
    /// File of WIF private keys, one per line
    #[arg(long, env = "UTXO_BOTS_KEY_FILE", default_value = "secretKeyStore.regtest.txt", global = true)]
    key_file: PathBuf,
    #[arg(long, env = "UTXO_BOTS_NETWORK", default_value = "regtest", global = true)]
    network: Network,
    #[arg(long, env = "UTXO_BOTS_OPERATOR", default_value = config::DEFAULT_OPERATOR, global = true)]
    operator: String,
    #[arg(long, env = "UTXO_BOTS_SIGNING_PARTY", default_value = config::DEFAULT_SIGNING_PARTY, global = true)]
    signing_party: String,
    #[arg(long, env = "UTXO_BOTS_APPLICATION_ID", default_value = config::DEFAULT_APPLICATION_ID, global = true)]
    application_id: String,
    /// Seconds added to "now" for each batch's max record time
    #[arg(long, env = "UTXO_BOTS_MAX_RECORD_SECS", default_value_t = 10, global = true)]
    max_record_secs: u64,
    /// Fee attached to prepared transfers (sat)
    #[arg(long, env = "UTXO_BOTS_FEE_SAT", default_value_t = config::DEFAULT_FEE_SAT, global = true)]
    fee_sat: u64,
    #[arg(long, env = "UTXO_BOTS_MIN_CONF", default_value_t = 1, global = true)]
    min_confirmations: u32,
    #[arg(long, env = "UTXO_BOTS_POLL_MS", default_value_t = 1000, global = true)]
    poll_ms: u64,
}

#[derive(Subcommand)]
enum Cmd {
    /// Start all bots (default)
    Run,
    /// Print key-store addresses
    Addresses,
    /// Import key-store addresses into the node as watch-only
    ImportAddresses {
        /// Skip the wallet rescan; earlier payments stay invisible
        #[arg(long)]
        no_rescan: bool,
    },
    /// Received totals per key-store address
    Received,
    /// Generate blocks (regtest)
    Mine {
        #[arg(long, default_value_t = 1)]
        blocks: u64,
        /// Defaults to the first key-store address
        #[arg(long)]
        address: Option<String>,
    },
}

impl Opts {
    fn config(&self) -> BotsConfig {
        BotsConfig::new()
            .with_ledger_url(&self.ledger_url)
            .with_node(&self.rpc_url, &self.rpc_user, &self.rpc_pass)
            .with_key_file(&self.key_file)
            .with_network(self.network)
            .with_parties(&self.operator, &self.signing_party)
            .with_application_id(&self.application_id)
            .with_max_record_time(Duration::from_secs(self.max_record_secs))
            .with_fee(self.fee_sat)
            .with_min_confirmations(self.min_confirmations)
            .with_poll_interval(Duration::from_millis(self.poll_ms))
    }
}

fn main() -> ExitCode {
    let _ = dotenv::dotenv();
    init_logging();
    let cli = Cli::parse();
    let config = cli.opts.config();

    let result = match cli.command.unwrap_or(Cmd::Run) {
        Cmd::Run => cmd_run(config),
        Cmd::Addresses => cmd_addresses(&config),
        Cmd::ImportAddresses { no_rescan } => cmd_import(&config, !no_rescan),
        Cmd::Received => cmd_received(&config),
        Cmd::Mine { blocks, address } => cmd_mine(&config, blocks, address),
    };

    match result {
        Ok(Some(output)) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", json!({"error": format!("{e:#}")}));
            ExitCode::FAILURE
        }
    }
}

fn load_keys(config: &BotsConfig) -> anyhow::Result<KeyStore> {
    KeyStore::load(&config.key_file, config.network).with_context(|| format!("loading {}", config.key_file.display()))
}

fn connect_node(config: &BotsConfig) -> anyhow::Result<BitcoindChain> {
    BitcoindChain::connect(&config.node).with_context(|| format!("connecting to {}", config.node.url))
}

fn cmd_run(config: BotsConfig) -> anyhow::Result<Option<Value>> {
    let keys = Arc::new(load_keys(&config)?);
    let chain: Arc<dyn ChainQuery> = Arc::new(connect_node(&config)?);
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let shutdown = runtime::install_signal_handlers();
        let ledger = Arc::new(HttpLedger::connect(&config.ledger_url, config.poll_interval).await?);
        let bots = bots::standard_bots(&config, chain, keys);
        info!(bots = bots.len(), operator = %config.operator_party, signing = %config.signing_party, "Starting bots");
        driver::run_bots(bots, ledger, Arc::new(SystemClock), &config.application_id, config.max_record_time, shutdown).await
    })?;
    Ok(None)
}

fn cmd_addresses(config: &BotsConfig) -> anyhow::Result<Option<Value>> {
    let keys = load_keys(config)?;
    Ok(Some(json!(keys.addresses().collect::<Vec<_>>())))
}

fn cmd_import(config: &BotsConfig, rescan: bool) -> anyhow::Result<Option<Value>> {
    let keys = load_keys(config)?;
    let node = connect_node(config)?;
    for address in keys.addresses() {
        node.import_address(address, rescan).with_context(|| format!("importing {address}"))?;
        info!(%address, rescan, "Imported");
    }
    Ok(Some(json!({"imported": keys.len()})))
}

fn cmd_received(config: &BotsConfig) -> anyhow::Result<Option<Value>> {
    let keys = load_keys(config)?;
    let node = connect_node(config)?;
    let mut totals = serde_json::Map::new();
    for address in keys.addresses() {
        let sat = node.received_by_address(address, config.min_confirmations)?;
        totals.insert(address.to_string(), json!(sat));
    }
    Ok(Some(Value::Object(totals)))
}

fn cmd_mine(config: &BotsConfig, blocks: u64, address: Option<String>) -> anyhow::Result<Option<Value>> {
    let address = match address {
        Some(address) => address,
        None => load_keys(config)?.addresses().next().map(String::from).context("key store is empty")?,
    };
    let node = connect_node(config)?;
    let hashes = node.generate_to_address(blocks, &address)?;
    Ok(Some(json!({"address": address, "blocks": hashes})))
}
