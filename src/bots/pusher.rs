use super::Bot;
use crate::broadcast::{BroadcastCoordinator, BroadcastOutcome};
use crate::chain::ChainQuery;
use crate::error::BotError;
use crate::ledger::{Command, Contract, ContractId, Entity, EntityFilter, EntityKind, LedgerSnapshot};
use std::sync::Arc;
use tracing::{info, warn};

enum View<'a> {
    Pending(&'a ContractId, &'a str),
}

impl<'a> View<'a> {
    fn of(contract: &'a Contract) -> Option<Self> {
        match &contract.entity {
            Entity::PendingTransfer { raw_tx } => Some(View::Pending(&contract.id, raw_tx)),
            Entity::OperatorRole | Entity::SigningPartyRole | Entity::OwnedAddress(_) |
            Entity::Utxo(_) | Entity::UtxoUpdateRequest | Entity::UncheckedTransferRequest |
            Entity::ValidatedTransferRequest | Entity::NewTransfer(_) => None,
        }
    }
}

/// Broadcasts signed transfers and reports each outcome on the transfer.
pub struct RawTxPusher {
    party: String,
    chain: Arc<dyn ChainQuery>,
}

impl RawTxPusher {
    pub fn new(party: impl Into<String>, chain: Arc<dyn ChainQuery>) -> Self {
        Self { party: party.into(), chain }
    }
}

impl Bot for RawTxPusher {
    fn name(&self) -> &'static str { "RawTxPusher" }

    fn party(&self) -> &str { &self.party }

    fn filter(&self) -> EntityFilter {
        EntityFilter::new(&self.party, &[EntityKind::PendingTransfer])
    }

    fn process(&mut self, snapshot: &LedgerSnapshot) -> Result<Vec<Command>, BotError> {
        let coordinator = BroadcastCoordinator::new(self.chain.as_ref());
        let mut commands = Vec::new();
        for view in snapshot.contracts.iter().filter_map(View::of) {
            let View::Pending(id, raw_tx) = view;
            match coordinator.push_raw(raw_tx) {
                Ok(BroadcastOutcome::Transmitted { txid }) => {
                    info!(transfer = %id, %txid, "Transmitted");
                    commands.push(Command::Transmit { transfer: id.clone(), message: format!("Transmitted Tx Hash: {txid}") });
                }
                Ok(BroadcastOutcome::FailedToTransmit { message }) => {
                    warn!(transfer = %id, %message, "Node rejected transaction");
                    commands.push(Command::Fail { transfer: id.clone(), message });
                }
                // Node unreachable: no outcome yet, the transfer stays pending.
                Err(e) => warn!(transfer = %id, error = %e, "Broadcast not attempted"),
            }
        }
        Ok(commands)
    }
}
