//! UTXO reconciler - recorded outputs vs. the node's live listing
//!
//! ```text
//! for each owned address (once, first contract wins):
//!     live      = listunspent(min_conf, address)
//!     balance   = Σ live values, tx_count = |live|
//!     spends    = recorded(address) − live        (by tx_hash:output_index)
//!     registers = live − recorded(address)        (+ confirmation metadata)
//! ```
//!
//! Balance and count always come straight from the node, whatever the
//! per-output diff says. An address whose queries fail contributes nothing
//! this cycle; recorded outputs of addresses that were not queried are never
//! touched.

use crate::chain::ChainQuery;
use crate::error::ChainError;
use crate::ledger::{ContractId, OwnedAddress, UtxoKey, UtxoRecord};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceUpdate {
    /// The `OwnedAddress` contract to update.
    pub address: ContractId,
    pub balance: u64,
    pub tx_count: u64,
}

#[derive(Debug)]
pub struct AddressFailure {
    pub address: String,
    pub error: ChainError,
}

#[derive(Debug, Default)]
pub struct Reconciliation {
    pub registrations: Vec<UtxoRecord>,
    pub spends: Vec<ContractId>,
    pub balances: Vec<BalanceUpdate>,
    pub failures: Vec<AddressFailure>,
}

impl Reconciliation {
    /// No register or spend deltas.
    pub fn is_settled(&self) -> bool { self.registrations.is_empty() && self.spends.is_empty() }
}

struct AddressDelta {
    registrations: Vec<UtxoRecord>,
    spends: Vec<ContractId>,
    balance: u64,
    tx_count: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    min_confirmations: u32,
}

impl Default for Reconciler {
    fn default() -> Self { Self::new(1) }
}

impl Reconciler {
    pub fn new(min_confirmations: u32) -> Self { Self { min_confirmations } }

    pub fn reconcile(
        &self,
        recorded: &[(ContractId, UtxoRecord)],
        addresses: &[(ContractId, OwnedAddress)],
        chain: &dyn ChainQuery,
    ) -> Reconciliation {
        let mut by_address: HashMap<&str, Vec<(&ContractId, &UtxoRecord)>> = HashMap::new();
        for (id, utxo) in recorded {
            by_address.entry(utxo.address.as_str()).or_default().push((id, utxo));
        }

        let mut result = Reconciliation::default();
        let mut seen = HashSet::new();
        for (contract, owned) in addresses {
            if !seen.insert(owned.address.as_str()) {
                continue;
            }
            let recorded = by_address.get(owned.address.as_str()).map(Vec::as_slice).unwrap_or_default();
            match self.reconcile_address(&owned.address, recorded, chain) {
                Ok(delta) => {
                    debug!(
                        address = %owned.address,
                        balance = delta.balance,
                        tx_count = delta.tx_count,
                        new = delta.registrations.len(),
                        spent = delta.spends.len(),
                        "Reconciled address"
                    );
                    result.registrations.extend(delta.registrations);
                    result.spends.extend(delta.spends);
                    result.balances.push(BalanceUpdate {
                        address: contract.clone(),
                        balance: delta.balance,
                        tx_count: delta.tx_count,
                    });
                }
                Err(error) => {
                    warn!(address = %owned.address, %error, "Address query failed, skipping until next trigger");
                    result.failures.push(AddressFailure { address: owned.address.clone(), error });
                }
            }
        }
        result
    }

    fn reconcile_address(
        &self,
        address: &str,
        recorded: &[(&ContractId, &UtxoRecord)],
        chain: &dyn ChainQuery,
    ) -> Result<AddressDelta, ChainError> {
        let live = chain.list_unspent(self.min_confirmations, address)?;
        let balance = live.iter().map(|u| u.amount_sat).sum();
        let live_keys: HashSet<UtxoKey> =
            live.iter().map(|u| UtxoKey { tx_hash: u.txid.clone(), output_index: u.vout }).collect();
        let recorded_keys: HashSet<UtxoKey> = recorded.iter().map(|(_, r)| r.key()).collect();

        let spends = recorded
            .iter()
            .filter(|(_, r)| !live_keys.contains(&r.key()))
            .map(|(id, _)| (*id).clone())
            .collect();

        let mut registrations = Vec::new();
        for output in &live {
            let key = UtxoKey { tx_hash: output.txid.clone(), output_index: output.vout };
            if !recorded_keys.contains(&key) {
                registrations.push(chain.utxo_record(address, output, self.min_confirmations)?);
            }
        }

        Ok(AddressDelta { registrations, spends, balance, tx_count: live.len() as u64 })
    }
}
