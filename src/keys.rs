//! Address key store
//!
//! Loaded once from a file of WIF keys (one per line, `#` comments allowed)
//! and shared read-only as `Arc<KeyStore>` afterwards. Every key is indexed
//! by its P2PKH address on the configured network.

use crate::error::KeyStoreError;
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::{Address, Network, NetworkKind, PrivateKey};
use std::collections::BTreeMap;
use std::path::Path;

/// Signing key lookup by address string.
pub trait KeyLookup: Send + Sync {
    fn key_for(&self, address: &str) -> Option<&PrivateKey>;
}

#[derive(Debug, Clone)]
pub struct KeyStore {
    network: Network,
    keys: BTreeMap<String, PrivateKey>,
}

impl KeyStore {
    pub fn load(path: impl AsRef<Path>, network: Network) -> Result<Self, KeyStoreError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| KeyStoreError::Io { path: path.display().to_string(), source })?;
        Self::parse(&text, network)
    }

    pub fn parse(text: &str, network: Network) -> Result<Self, KeyStoreError> {
        let secp = Secp256k1::new();
        let expected = NetworkKind::from(network);
        let mut keys = BTreeMap::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let wif = raw.trim();
            if wif.is_empty() || wif.starts_with('#') {
                continue;
            }
            let key = PrivateKey::from_wif(wif).map_err(|e| KeyStoreError::InvalidKey { line, reason: e.to_string() })?;
            if key.network != expected {
                return Err(KeyStoreError::WrongNetwork { line, found: key.network, expected });
            }
            let address = p2pkh_address(&secp, &key, network);
            if keys.insert(address.clone(), key).is_some() {
                return Err(KeyStoreError::Duplicate { line, address });
            }
        }
        tracing::info!(count = keys.len(), %network, "Loaded signing keys");
        Ok(Self { network, keys })
    }

    pub fn from_keys(keys: impl IntoIterator<Item = PrivateKey>, network: Network) -> Self {
        let secp = Secp256k1::new();
        let keys = keys.into_iter().map(|k| (p2pkh_address(&secp, &k, network), k)).collect();
        Self { network, keys }
    }

    pub fn network(&self) -> Network { self.network }

    /// Owned addresses, sorted.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize { self.keys.len() }

    pub fn is_empty(&self) -> bool { self.keys.is_empty() }
}

impl KeyLookup for KeyStore {
    fn key_for(&self, address: &str) -> Option<&PrivateKey> { self.keys.get(address) }
}

fn p2pkh_address(secp: &Secp256k1<All>, key: &PrivateKey, network: Network) -> String {
    Address::p2pkh(key.public_key(secp).pubkey_hash(), network).to_string()
}
