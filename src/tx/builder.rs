use super::{SignedTransaction, TransferIntent};
use crate::error::BuildError;
use crate::keys::KeyLookup;
use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::serialize_hex;
use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{ecdsa, Address, Amount, Network, OutPoint, PrivateKey, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use std::str::FromStr;
use std::sync::Arc;

/// Builds and signs legacy P2PKH spends.
pub struct TransactionBuilder {
    network: Network,
    keys: Arc<dyn KeyLookup>,
    secp: Secp256k1<All>,
}

impl TransactionBuilder {
    pub fn new(network: Network, keys: Arc<dyn KeyLookup>) -> Self {
        Self { network, keys, secp: Secp256k1::new() }
    }

    pub fn build(&self, intent: &TransferIntent) -> Result<SignedTransaction, BuildError> {
        if intent.inputs.is_empty() {
            return Err(BuildError::NoInputs);
        }
        let total = intent
            .inputs
            .iter()
            .try_fold(0u64, |acc, u| acc.checked_add(u.value))
            .ok_or(BuildError::ValueOverflow("input total"))?;
        let required = intent.amount.checked_add(intent.fee).ok_or(BuildError::ValueOverflow("amount + fee"))?;
        if total < required {
            return Err(BuildError::InsufficientInputs { total, required });
        }

        let mut output = vec![TxOut {
            value: Amount::from_sat(intent.amount),
            script_pubkey: self.parse_address(&intent.destination)?.script_pubkey(),
        }];
        let change = total - required;
        if change > 0 {
            output.push(TxOut {
                value: Amount::from_sat(change),
                script_pubkey: self.parse_address(&intent.change_address)?.script_pubkey(),
            });
        }

        let mut input = Vec::with_capacity(intent.inputs.len());
        let mut signers: Vec<(&PrivateKey, ScriptBuf)> = Vec::with_capacity(intent.inputs.len());
        for utxo in &intent.inputs {
            let key = self
                .keys
                .key_for(&utxo.address)
                .ok_or_else(|| BuildError::MissingKey { address: utxo.address.clone() })?;
            let invalid = |reason: String| BuildError::InvalidInput {
                tx_hash: utxo.tx_hash.clone(),
                output_index: utxo.output_index,
                reason,
            };
            let txid = Txid::from_str(&utxo.tx_hash).map_err(|e| invalid(e.to_string()))?;
            let prev_script = ScriptBuf::from_hex(&utxo.script_pub_key).map_err(|e| invalid(e.to_string()))?;
            input.push(TxIn {
                previous_output: OutPoint::new(txid, utxo.output_index),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            });
            signers.push((key, prev_script));
        }

        let mut tx = Transaction { version: Version::ONE, lock_time: LockTime::ZERO, input, output };

        // Legacy sighashes commit to the unsigned transaction, so sign every
        // input before any script_sig is filled in.
        let script_sigs = {
            let cache = SighashCache::new(&tx);
            signers
                .iter()
                .enumerate()
                .map(|(index, (key, prev_script))| self.sign_input(&cache, index, key, prev_script))
                .collect::<Result<Vec<_>, _>>()?
        };
        for (txin, script_sig) in tx.input.iter_mut().zip(script_sigs) {
            txin.script_sig = script_sig;
        }

        let txid = tx.compute_txid().to_string();
        tracing::debug!(%txid, inputs = tx.input.len(), outputs = tx.output.len(), change, "Signed transaction");
        Ok(SignedTransaction { txid, raw_hex: serialize_hex(&tx) })
    }

    fn sign_input(
        &self,
        cache: &SighashCache<&Transaction>,
        index: usize,
        key: &PrivateKey,
        prev_script: &ScriptBuf,
    ) -> Result<ScriptBuf, BuildError> {
        let sighash = cache
            .legacy_signature_hash(index, prev_script, EcdsaSighashType::All.to_u32())
            .map_err(|e| BuildError::Sighash(e.to_string()))?;
        let message = Message::from_digest(sighash.to_byte_array());
        let signature = ecdsa::Signature { signature: self.secp.sign_ecdsa(&message, &key.inner), sighash_type: EcdsaSighashType::All };
        let push = PushBytesBuf::try_from(signature.to_vec()).map_err(|e| BuildError::PushBytes(e.to_string()))?;
        Ok(Builder::new().push_slice(push).push_key(&key.public_key(&self.secp)).into_script())
    }

    fn parse_address(&self, address: &str) -> Result<Address, BuildError> {
        let invalid = |reason: String| BuildError::InvalidAddress { address: address.to_string(), reason };
        Address::from_str(address)
            .map_err(|e| invalid(e.to_string()))?
            .require_network(self.network)
            .map_err(|e| invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyStore;
    use crate::ledger::UtxoRecord;
    use bitcoin::secp256k1::SecretKey;

    fn store() -> (Arc<KeyStore>, String) {
        let key = PrivateKey::new(SecretKey::from_slice(&[7; 32]).unwrap(), Network::Regtest);
        let store = KeyStore::from_keys([key], Network::Regtest);
        let address = store.addresses().next().unwrap().to_string();
        (Arc::new(store), address)
    }

    fn utxo(address: &str, value: u64) -> UtxoRecord {
        let script = Address::from_str(address).unwrap().assume_checked().script_pubkey();
        UtxoRecord {
            address: address.into(),
            tx_hash: "11".repeat(32),
            output_index: 0,
            block_height: 1,
            value,
            confirmed_at: None,
            script_pub_key: hex::encode(script.as_bytes()),
        }
    }

    #[test]
    fn empty_inputs_rejected() {
        let (keys, address) = store();
        let builder = TransactionBuilder::new(Network::Regtest, keys);
        let intent = TransferIntent { inputs: vec![], destination: address.clone(), amount: 1, fee: 1, change_address: address };
        assert!(matches!(builder.build(&intent), Err(BuildError::NoInputs)));
    }

    #[test]
    fn wrong_network_destination_rejected() {
        let (keys, address) = store();
        let builder = TransactionBuilder::new(Network::Regtest, keys);
        let intent = TransferIntent {
            inputs: vec![utxo(&address, 10_000)],
            destination: "1BoatSLRHtKNngkdXEeobR76b53LETtpyT".into(),
            amount: 1_000,
            fee: 100,
            change_address: address,
        };
        assert!(matches!(builder.build(&intent), Err(BuildError::InvalidAddress { .. })));
    }

    #[test]
    fn bad_prev_script_rejected() {
        let (keys, address) = store();
        let builder = TransactionBuilder::new(Network::Regtest, keys);
        let mut input = utxo(&address, 10_000);
        input.script_pub_key = "zz".into();
        let intent = TransferIntent { inputs: vec![input], destination: address.clone(), amount: 1_000, fee: 100, change_address: address };
        assert!(matches!(builder.build(&intent), Err(BuildError::InvalidInput { output_index: 0, .. })));
    }

    #[test]
    fn overflowing_values_rejected() {
        let (keys, address) = store();
        let builder = TransactionBuilder::new(Network::Regtest, keys);
        let intent = TransferIntent {
            inputs: vec![utxo(&address, u64::MAX), utxo(&address, 1_100_000)],
            destination: address.clone(),
            amount: 1_000_000,
            fee: 20_000,
            change_address: address.clone(),
        };
        assert!(matches!(builder.build(&intent), Err(BuildError::ValueOverflow("input total"))));

        let intent = TransferIntent {
            inputs: vec![utxo(&address, 10_000)],
            destination: address.clone(),
            amount: u64::MAX,
            fee: 1,
            change_address: address,
        };
        assert!(matches!(builder.build(&intent), Err(BuildError::ValueOverflow("amount + fee"))));
    }
}
