use super::Bot;
use crate::error::BotError;
use crate::ledger::{Command, Contract, ContractId, Entity, EntityFilter, EntityKind, LedgerSnapshot};

enum View<'a> {
    Unchecked(&'a ContractId),
}

impl<'a> View<'a> {
    fn of(contract: &'a Contract) -> Option<Self> {
        match contract.entity {
            Entity::UncheckedTransferRequest => Some(View::Unchecked(&contract.id)),
            Entity::OperatorRole | Entity::SigningPartyRole | Entity::OwnedAddress(_) |
            Entity::Utxo(_) | Entity::UtxoUpdateRequest | Entity::ValidatedTransferRequest |
            Entity::NewTransfer(_) | Entity::PendingTransfer { .. } => None,
        }
    }
}

/// Moves every unchecked transfer request into validation. The checks
/// themselves live in the ledger workflow.
pub struct TransferRequestValidator {
    party: String,
}

impl TransferRequestValidator {
    pub fn new(party: impl Into<String>) -> Self { Self { party: party.into() } }
}

impl Bot for TransferRequestValidator {
    fn name(&self) -> &'static str { "TransferRequestValidator" }

    fn party(&self) -> &str { &self.party }

    fn filter(&self) -> EntityFilter {
        EntityFilter::new(&self.party, &[EntityKind::UncheckedTransferRequest])
    }

    fn process(&mut self, snapshot: &LedgerSnapshot) -> Result<Vec<Command>, BotError> {
        Ok(snapshot
            .contracts
            .iter()
            .filter_map(View::of)
            .map(|view| match view {
                View::Unchecked(id) => Command::ValidateRequest { request: id.clone() },
            })
            .collect())
    }
}
