//! Ledger entities as seen by the bots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque ledger contract identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(pub String);

impl ContractId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Identity of an output on chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtxoKey {
    pub tx_hash: String,
    pub output_index: u32,
}

/// An address held by the signing party, with the last reconciled totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedAddress {
    pub address: String,
    pub balance: u64,
    pub tx_count: u64,
}

/// A spendable output, as registered on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoRecord {
    pub address: String,
    pub tx_hash: String,
    pub output_index: u32,
    pub block_height: u64,
    /// Satoshis.
    pub value: u64,
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Hex-encoded previous output script.
    pub script_pub_key: String,
}

impl UtxoRecord {
    pub fn key(&self) -> UtxoKey {
        UtxoKey { tx_hash: self.tx_hash.clone(), output_index: self.output_index }
    }
}

/// Transfer approved by the workflow and waiting for a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransfer {
    pub inputs: Vec<UtxoRecord>,
    pub destination: String,
    pub amount: u64,
    pub fee: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Entity {
    OperatorRole,
    SigningPartyRole,
    OwnedAddress(OwnedAddress),
    Utxo(UtxoRecord),
    UtxoUpdateRequest,
    UncheckedTransferRequest,
    ValidatedTransferRequest,
    NewTransfer(NewTransfer),
    PendingTransfer { raw_tx: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    OperatorRole,
    SigningPartyRole,
    OwnedAddress,
    Utxo,
    UtxoUpdateRequest,
    UncheckedTransferRequest,
    ValidatedTransferRequest,
    NewTransfer,
    PendingTransfer,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::OperatorRole => "OperatorRole",
            EntityKind::SigningPartyRole => "SigningPartyRole",
            EntityKind::OwnedAddress => "OwnedAddress",
            EntityKind::Utxo => "Utxo",
            EntityKind::UtxoUpdateRequest => "UtxoUpdateRequest",
            EntityKind::UncheckedTransferRequest => "UncheckedTransferRequest",
            EntityKind::ValidatedTransferRequest => "ValidatedTransferRequest",
            EntityKind::NewTransfer => "NewTransfer",
            EntityKind::PendingTransfer => "PendingTransfer",
        }
    }
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::OperatorRole => EntityKind::OperatorRole,
            Entity::SigningPartyRole => EntityKind::SigningPartyRole,
            Entity::OwnedAddress(_) => EntityKind::OwnedAddress,
            Entity::Utxo(_) => EntityKind::Utxo,
            Entity::UtxoUpdateRequest => EntityKind::UtxoUpdateRequest,
            Entity::UncheckedTransferRequest => EntityKind::UncheckedTransferRequest,
            Entity::ValidatedTransferRequest => EntityKind::ValidatedTransferRequest,
            Entity::NewTransfer(_) => EntityKind::NewTransfer,
            Entity::PendingTransfer { .. } => EntityKind::PendingTransfer,
        }
    }
}

/// An active contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub entity: Entity,
}

impl Contract {
    pub fn new(id: impl Into<String>, entity: Entity) -> Self {
        Self { id: ContractId::new(id), entity }
    }
}

/// Which contracts a subscriber wants to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFilter {
    pub party: String,
    pub kinds: Vec<EntityKind>,
}

impl EntityFilter {
    pub fn new(party: impl Into<String>, kinds: &[EntityKind]) -> Self {
        Self { party: party.into(), kinds: kinds.to_vec() }
    }

    pub fn matches(&self, entity: &Entity) -> bool { self.kinds.contains(&entity.kind()) }
}

/// The active contracts visible to one party at a ledger offset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub offset: u64,
    pub contracts: Vec<Contract>,
}

impl LedgerSnapshot {
    pub fn new(offset: u64, contracts: Vec<Contract>) -> Self { Self { offset, contracts } }

    /// Copy restricted to the filter's kinds.
    pub fn filtered(&self, filter: &EntityFilter) -> Self {
        Self {
            offset: self.offset,
            contracts: self.contracts.iter().filter(|c| filter.matches(&c.entity)).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_json_is_tagged_by_kind() {
        let entity = Entity::OwnedAddress(OwnedAddress { address: "mx".into(), balance: 5, tx_count: 1 });
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["kind"], "OwnedAddress");
        assert_eq!(json["balance"], 5);
        assert_eq!(serde_json::from_value::<Entity>(json).unwrap(), entity);
    }

    #[test]
    fn snapshot_filter_keeps_requested_kinds() {
        let snapshot = LedgerSnapshot::new(3, vec![
            Contract::new("a", Entity::OperatorRole),
            Contract::new("b", Entity::UtxoUpdateRequest),
            Contract::new("c", Entity::SigningPartyRole),
        ]);
        let filter = EntityFilter::new("Operator", &[EntityKind::OperatorRole, EntityKind::UtxoUpdateRequest]);
        let seen = snapshot.filtered(&filter);
        assert_eq!(seen.offset, 3);
        assert_eq!(seen.contracts.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
