use super::{BlockHeader, ChainAdmin, ChainQuery, RpcReply, UnspentOutput};
use crate::error::ChainError;
use bitcoin::Transaction;
use serde_json::json;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct Output {
    address: String,
    unspent: UnspentOutput,
    height: u64,
}

#[derive(Default)]
struct State {
    /// (hash, unix time) per height.
    blocks: Vec<(String, u64)>,
    outputs: Vec<Output>,
    /// txid → containing block hash.
    tx_blocks: BTreeMap<String, String>,
    failing: HashSet<String>,
    offline: bool,
    replies: VecDeque<RpcReply>,
    sent: Vec<String>,
    imported: Vec<String>,
}

/// In-process chain: a block list and an unspent set, nothing validated.
/// Addresses can be made to fail and broadcast replies can be scripted.
#[derive(Default)]
pub struct MemoryChain {
    state: Mutex<State>,
}

impl MemoryChain {
    /// Chain with a genesis block at `time`.
    pub fn new(time: u64) -> Self {
        let chain = Self::default();
        chain.mine_block(time);
        chain
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn tip_height(&self) -> u64 {
        (self.state().blocks.len() as u64).saturating_sub(1)
    }

    /// Append a block and return its hash.
    pub fn mine_block(&self, time: u64) -> String {
        let mut state = self.state();
        let hash = format!("{:064x}", state.blocks.len() + 1);
        state.blocks.push((hash.clone(), time));
        hash
    }

    /// Add an output paying `address`, confirmed in the current tip block.
    pub fn add_output(&self, address: &str, txid: &str, vout: u32, amount_sat: u64, script_pub_key: &str) {
        let mut state = self.state();
        let height = (state.blocks.len() as u64).saturating_sub(1);
        if let Some((hash, _)) = state.blocks.last().cloned() {
            state.tx_blocks.insert(txid.to_string(), hash);
        }
        state.outputs.push(Output {
            address: address.to_string(),
            unspent: UnspentOutput { txid: txid.into(), vout, amount_sat, script_pub_key: script_pub_key.into() },
            height,
        });
    }

    pub fn spend(&self, txid: &str, vout: u32) {
        self.state().outputs.retain(|o| !(o.unspent.txid == txid && o.unspent.vout == vout));
    }

    /// Every query for `address` fails with a transport error until healed.
    pub fn fail_address(&self, address: &str) {
        self.state().failing.insert(address.to_string());
    }

    pub fn heal_address(&self, address: &str) {
        self.state().failing.remove(address);
    }

    /// While offline, broadcasts fail with a transport error and reach nothing.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Reply used for the next broadcast instead of the default acceptance.
    pub fn script_reply(&self, reply: RpcReply) {
        self.state().replies.push_back(reply);
    }

    /// Raw transactions received, in order.
    pub fn sent(&self) -> Vec<String> {
        self.state().sent.clone()
    }

    pub fn imported(&self) -> Vec<String> {
        self.state().imported.clone()
    }
}

impl ChainQuery for MemoryChain {
    fn list_unspent(&self, min_conf: u32, address: &str) -> Result<Vec<UnspentOutput>, ChainError> {
        let state = self.state();
        if state.failing.contains(address) {
            return Err(ChainError::Transport(format!("connection refused while listing {address}")));
        }
        let tip = (state.blocks.len() as u64).saturating_sub(1);
        Ok(state
            .outputs
            .iter()
            .filter(|o| o.address == address && tip + 1 - o.height >= u64::from(min_conf))
            .map(|o| o.unspent.clone())
            .collect())
    }

    fn transaction_block_hash(&self, txid: &str) -> Result<Option<String>, ChainError> {
        Ok(self.state().tx_blocks.get(txid).cloned())
    }

    fn block_header(&self, hash: &str) -> Result<BlockHeader, ChainError> {
        let state = self.state();
        state
            .blocks
            .iter()
            .enumerate()
            .find(|(_, (h, _))| h == hash)
            .map(|(height, (_, time))| BlockHeader { height: height as u64, time: *time })
            .ok_or_else(|| ChainError::Rpc { code: -5, message: "Block not found".into() })
    }

    fn block_hash(&self, height: u64) -> Result<Option<String>, ChainError> {
        let state = self.state();
        Ok(usize::try_from(height).ok().and_then(|h| state.blocks.get(h)).map(|(hash, _)| hash.clone()))
    }

    fn send_raw_transaction(&self, raw_hex: &str) -> Result<RpcReply, ChainError> {
        let mut state = self.state();
        if state.offline {
            return Err(ChainError::Transport("connection refused while broadcasting".into()));
        }
        state.sent.push(raw_hex.to_string());
        if let Some(reply) = state.replies.pop_front() {
            return Ok(reply);
        }
        let decoded = hex::decode(raw_hex).ok().and_then(|bytes| bitcoin::consensus::deserialize::<Transaction>(&bytes).ok());
        Ok(match decoded {
            Some(tx) => RpcReply::ok(json!(tx.compute_txid().to_string())),
            None => RpcReply::err(-22, "TX decode failed"),
        })
    }
}

impl ChainAdmin for MemoryChain {
    fn import_address(&self, address: &str, _rescan: bool) -> Result<(), ChainError> {
        self.state().imported.push(address.to_string());
        Ok(())
    }

    fn generate_to_address(&self, blocks: u64, _address: &str) -> Result<Vec<String>, ChainError> {
        let base = self.state().blocks.last().map(|(_, t)| *t).unwrap_or_default();
        Ok((1..=blocks).map(|i| self.mine_block(base + i * 600)).collect())
    }

    fn received_by_address(&self, address: &str, min_conf: u32) -> Result<u64, ChainError> {
        Ok(self.list_unspent(min_conf, address)?.iter().map(|u| u.amount_sat).sum())
    }
}
