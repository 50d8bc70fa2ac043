use super::Bot;
use crate::error::BotError;
use crate::ledger::{Command, Contract, ContractId, Entity, EntityFilter, EntityKind, LedgerSnapshot};
use std::collections::HashSet;
use tracing::{debug, info};

/// Whether this process has published its addresses yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    NotYetRegistered,
    Registered,
}

enum View<'a> {
    SigningRole(&'a ContractId),
    Known(&'a str),
}

impl<'a> View<'a> {
    fn of(contract: &'a Contract) -> Option<Self> {
        match &contract.entity {
            Entity::SigningPartyRole => Some(View::SigningRole(&contract.id)),
            Entity::OwnedAddress(owned) => Some(View::Known(&owned.address)),
            Entity::OperatorRole | Entity::Utxo(_) | Entity::UtxoUpdateRequest |
            Entity::UncheckedTransferRequest | Entity::ValidatedTransferRequest |
            Entity::NewTransfer(_) | Entity::PendingTransfer { .. } => None,
        }
    }
}

/// Publishes every key-store address as an owned address, once per process,
/// as soon as the signing party role is visible.
pub struct OwnedAddressRegistrar {
    party: String,
    addresses: Vec<String>,
    state: Registration,
}

impl OwnedAddressRegistrar {
    pub fn new(party: impl Into<String>, addresses: Vec<String>) -> Self {
        Self { party: party.into(), addresses, state: Registration::NotYetRegistered }
    }

    pub fn state(&self) -> Registration { self.state }
}

impl Bot for OwnedAddressRegistrar {
    fn name(&self) -> &'static str { "OwnedAddressRegistrar" }

    fn party(&self) -> &str { &self.party }

    fn filter(&self) -> EntityFilter {
        EntityFilter::new(&self.party, &[EntityKind::SigningPartyRole, EntityKind::OwnedAddress])
    }

    fn process(&mut self, snapshot: &LedgerSnapshot) -> Result<Vec<Command>, BotError> {
        if self.state == Registration::Registered {
            return Ok(vec![]);
        }

        let mut role = None;
        let mut known = HashSet::new();
        for view in snapshot.contracts.iter().filter_map(View::of) {
            match view {
                View::SigningRole(id) => role = role.or(Some(id)),
                View::Known(address) => {
                    known.insert(address);
                }
            }
        }
        let Some(role) = role else {
            debug!("Signing party role not visible yet");
            return Ok(vec![]);
        };

        let commands: Vec<Command> = self
            .addresses
            .iter()
            .filter(|a| !known.contains(a.as_str()))
            .map(|address| Command::RegisterOwnedAddress { signing_role: role.clone(), address: address.clone() })
            .collect();
        info!(new = commands.len(), already = known.len(), "Registering owned addresses");
        self.state = Registration::Registered;
        Ok(commands)
    }
}
