//! Chain query facade - synchronous view of a Bitcoin node
//!
//! ```text
//! UtxoReconcilerBot ──┐                       ┌── BitcoindChain (bitcoincore-rpc)
//!                     ├──▶ dyn ChainQuery ────┤
//! RawTxPusher ────────┘                       └── MemoryChain (in-process)
//! ```
//!
//! | Method | Node RPC | Notes |
//! |--------|----------|-------|
//! | `list_unspent` | `listunspent` | amounts converted to sat exactly |
//! | `transaction_block_hash` | `gettransaction` | `None` while unconfirmed |
//! | `block_header` | `getblockheader` | height + unix time |
//! | `block_hash` | `getblockhash` | `None` past the tip |
//! | `send_raw_transaction` | `sendrawtransaction` | node errors come back in the reply, not as `Err` |
//!
//! Calls block. Async callers go through `spawn_blocking`.

mod amount;
mod bitcoind;
mod memory;

pub use amount::btc_to_sat;
pub use bitcoind::BitcoindChain;
pub use memory::MemoryChain;

use crate::error::ChainError;
use crate::ledger::UtxoRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One `listunspent` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub txid: String,
    pub vout: u32,
    pub amount_sat: u64,
    pub script_pub_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub height: u64,
    /// Unix seconds.
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub block_height: u64,
    pub confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcReplyError {
    #[serde(default)]
    pub code: Option<i32>,
    pub message: String,
}

/// JSON-RPC reply envelope of `sendrawtransaction`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcReply {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcReplyError>,
}

impl RpcReply {
    pub fn ok(result: Value) -> Self { Self { result: Some(result), error: None } }

    pub fn err(code: i32, message: impl Into<String>) -> Self {
        Self { result: None, error: Some(RpcReplyError { code: Some(code), message: message.into() }) }
    }
}

pub trait ChainQuery: Send + Sync {
    fn list_unspent(&self, min_conf: u32, address: &str) -> Result<Vec<UnspentOutput>, ChainError>;
    fn transaction_block_hash(&self, txid: &str) -> Result<Option<String>, ChainError>;
    fn block_header(&self, hash: &str) -> Result<BlockHeader, ChainError>;
    fn block_hash(&self, height: u64) -> Result<Option<String>, ChainError>;
    fn send_raw_transaction(&self, raw_hex: &str) -> Result<RpcReply, ChainError>;

    /// Height of the block holding `txid`, and the time of the block
    /// `min_conf` above it if that block exists yet.
    fn confirmation(&self, txid: &str, min_conf: u32) -> Result<Confirmation, ChainError> {
        let Some(hash) = self.transaction_block_hash(txid)? else {
            return Ok(Confirmation { block_height: 0, confirmed_at: None });
        };
        let header = self.block_header(&hash)?;
        let confirmed_at = match self.block_hash(header.height + u64::from(min_conf))? {
            Some(later) => {
                let time = self.block_header(&later)?.time;
                let secs = i64::try_from(time).map_err(|_| ChainError::Malformed(format!("block time {time}")))?;
                DateTime::from_timestamp(secs, 0)
            }
            None => None,
        };
        Ok(Confirmation { block_height: header.height, confirmed_at })
    }

    /// Ledger record for an output of `address`, with confirmation metadata.
    fn utxo_record(&self, address: &str, output: &UnspentOutput, min_conf: u32) -> Result<UtxoRecord, ChainError> {
        let confirmation = self.confirmation(&output.txid, min_conf)?;
        Ok(UtxoRecord {
            address: address.to_string(),
            tx_hash: output.txid.clone(),
            output_index: output.vout,
            block_height: confirmation.block_height,
            value: output.amount_sat,
            confirmed_at: confirmation.confirmed_at,
            script_pub_key: output.script_pub_key.clone(),
        })
    }
}

/// Bootstrap and regtest helpers. Never used by the bots.
pub trait ChainAdmin {
    /// Watch-only import so `listunspent` reports the address. Without
    /// `rescan` only outputs paid after the import are seen.
    fn import_address(&self, address: &str, rescan: bool) -> Result<(), ChainError>;
    fn generate_to_address(&self, blocks: u64, address: &str) -> Result<Vec<String>, ChainError>;
    fn received_by_address(&self, address: &str, min_conf: u32) -> Result<u64, ChainError>;
}
