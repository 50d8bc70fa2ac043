//! Bot configuration - passed from the binary (CLI flags + environment)

use bitcoin::Network;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LEDGER_URL: &str = "http://localhost:6865";
pub const DEFAULT_NODE_URL: &str = "http://localhost:19091";
pub const DEFAULT_APPLICATION_ID: &str = "InventoryManagement";
pub const DEFAULT_OPERATOR: &str = "Operator";
pub const DEFAULT_SIGNING_PARTY: &str = "SigningParty";
pub const DEFAULT_FEE_SAT: u64 = 20_000;

/// Bitcoin Core RPC endpoint.
#[derive(Debug, Clone)]
pub struct NodeRpcConfig {
    pub url: String,
    pub user: String,
    pub pass: String,
}

impl Default for NodeRpcConfig {
    fn default() -> Self {
        Self { url: DEFAULT_NODE_URL.into(), user: "admin1".into(), pass: "123".into() }
    }
}

#[derive(Debug, Clone)]
pub struct BotsConfig {
    pub ledger_url: String,
    pub node: NodeRpcConfig,
    pub key_file: PathBuf,
    pub network: Network,
    pub application_id: String,
    pub operator_party: String,
    pub signing_party: String,
    /// Window added to "now" to form each batch's max record time.
    pub max_record_time: Duration,
    /// Fee attached by the transfer preparer.
    pub fee_sat: u64,
    pub min_confirmations: u32,
    /// Ledger snapshot poll period (HTTP gateway).
    pub poll_interval: Duration,
}

impl Default for BotsConfig {
    fn default() -> Self {
        Self {
            ledger_url: DEFAULT_LEDGER_URL.into(),
            node: NodeRpcConfig::default(),
            key_file: PathBuf::from("secretKeyStore.regtest.txt"),
            network: Network::Regtest,
            application_id: DEFAULT_APPLICATION_ID.into(),
            operator_party: DEFAULT_OPERATOR.into(),
            signing_party: DEFAULT_SIGNING_PARTY.into(),
            max_record_time: Duration::from_secs(10),
            fee_sat: DEFAULT_FEE_SAT,
            min_confirmations: 1,
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl BotsConfig {
    pub fn new() -> Self { Self::default() }
    pub fn with_ledger_url(mut self, url: impl Into<String>) -> Self { self.ledger_url = url.into(); self }
    pub fn with_node(mut self, url: impl Into<String>, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.node = NodeRpcConfig { url: url.into(), user: user.into(), pass: pass.into() };
        self
    }
    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self { self.key_file = path.into(); self }
    pub fn with_network(mut self, network: Network) -> Self { self.network = network; self }
    pub fn with_parties(mut self, operator: impl Into<String>, signing: impl Into<String>) -> Self {
        self.operator_party = operator.into();
        self.signing_party = signing.into();
        self
    }
    pub fn with_application_id(mut self, id: impl Into<String>) -> Self { self.application_id = id.into(); self }
    pub fn with_max_record_time(mut self, window: Duration) -> Self { self.max_record_time = window; self }
    pub fn with_fee(mut self, fee_sat: u64) -> Self { self.fee_sat = fee_sat; self }
    pub fn with_min_confirmations(mut self, n: u32) -> Self { self.min_confirmations = n; self }
    pub fn with_poll_interval(mut self, every: Duration) -> Self { self.poll_interval = every; self }
}
