use super::Bot;
use crate::error::BotError;
use crate::ledger::{Command, Contract, ContractId, Entity, EntityFilter, EntityKind, LedgerSnapshot};

enum View<'a> {
    Validated(&'a ContractId),
    SigningRole(&'a ContractId),
    Utxo(&'a ContractId),
}

impl<'a> View<'a> {
    fn of(contract: &'a Contract) -> Option<Self> {
        match contract.entity {
            Entity::ValidatedTransferRequest => Some(View::Validated(&contract.id)),
            Entity::SigningPartyRole => Some(View::SigningRole(&contract.id)),
            Entity::Utxo(_) => Some(View::Utxo(&contract.id)),
            Entity::OperatorRole | Entity::OwnedAddress(_) | Entity::UtxoUpdateRequest |
            Entity::UncheckedTransferRequest | Entity::NewTransfer(_) |
            Entity::PendingTransfer { .. } => None,
        }
    }
}

/// Hands each validated request to the signing party together with a fixed
/// fee and every recorded UTXO. Input selection happens in the ledger workflow.
pub struct TransferPreparer {
    party: String,
    fee_sat: u64,
}

impl TransferPreparer {
    pub fn new(party: impl Into<String>, fee_sat: u64) -> Self { Self { party: party.into(), fee_sat } }
}

impl Bot for TransferPreparer {
    fn name(&self) -> &'static str { "TransferPreparer" }

    fn party(&self) -> &str { &self.party }

    fn filter(&self) -> EntityFilter {
        EntityFilter::new(
            &self.party,
            &[EntityKind::ValidatedTransferRequest, EntityKind::SigningPartyRole, EntityKind::Utxo],
        )
    }

    fn process(&mut self, snapshot: &LedgerSnapshot) -> Result<Vec<Command>, BotError> {
        let mut requests = Vec::new();
        let mut role = None;
        let mut utxos = Vec::new();
        for view in snapshot.contracts.iter().filter_map(View::of) {
            match view {
                View::Validated(id) => requests.push(id),
                View::SigningRole(id) => role = role.or(Some(id)),
                View::Utxo(id) => utxos.push(id.clone()),
            }
        }
        if requests.is_empty() {
            return Ok(vec![]);
        }
        let role = role.ok_or(BotError::MissingRole("SigningPartyRole"))?;

        Ok(requests
            .into_iter()
            .map(|request| Command::PrepareToTransfer {
                request: request.clone(),
                signing_role: role.clone(),
                fee: self.fee_sat,
                utxos: utxos.clone(),
            })
            .collect())
    }
}
