use super::Bot;
use crate::chain::ChainQuery;
use crate::error::BotError;
use crate::ledger::{Command, Contract, ContractId, Entity, EntityFilter, EntityKind, LedgerSnapshot, OwnedAddress, UtxoRecord};
use crate::reconcile::Reconciler;
use std::sync::Arc;
use tracing::info;

enum View<'a> {
    Operator(&'a ContractId),
    Address(&'a ContractId, &'a OwnedAddress),
    Utxo(&'a ContractId, &'a UtxoRecord),
    Request(&'a ContractId),
}

impl<'a> View<'a> {
    fn of(contract: &'a Contract) -> Option<Self> {
        let id = &contract.id;
        match &contract.entity {
            Entity::OperatorRole => Some(View::Operator(id)),
            Entity::OwnedAddress(owned) => Some(View::Address(id, owned)),
            Entity::Utxo(utxo) => Some(View::Utxo(id, utxo)),
            Entity::UtxoUpdateRequest => Some(View::Request(id)),
            Entity::SigningPartyRole | Entity::UncheckedTransferRequest |
            Entity::ValidatedTransferRequest | Entity::NewTransfer(_) |
            Entity::PendingTransfer { .. } => None,
        }
    }
}

/// Reconciles recorded UTXOs against the node whenever an update request
/// is outstanding, and acknowledges every request it consumed.
pub struct UtxoReconcilerBot {
    party: String,
    chain: Arc<dyn ChainQuery>,
    reconciler: Reconciler,
}

impl UtxoReconcilerBot {
    pub fn new(party: impl Into<String>, chain: Arc<dyn ChainQuery>, min_confirmations: u32) -> Self {
        Self { party: party.into(), chain, reconciler: Reconciler::new(min_confirmations) }
    }
}

impl Bot for UtxoReconcilerBot {
    fn name(&self) -> &'static str { "UtxoReconciler" }

    fn party(&self) -> &str { &self.party }

    fn filter(&self) -> EntityFilter {
        EntityFilter::new(
            &self.party,
            &[EntityKind::OperatorRole, EntityKind::OwnedAddress, EntityKind::Utxo, EntityKind::UtxoUpdateRequest],
        )
    }

    fn process(&mut self, snapshot: &LedgerSnapshot) -> Result<Vec<Command>, BotError> {
        let mut operator = None;
        let mut addresses = Vec::new();
        let mut recorded = Vec::new();
        let mut requests = Vec::new();
        for view in snapshot.contracts.iter().filter_map(View::of) {
            match view {
                View::Operator(id) => operator = operator.or(Some(id)),
                View::Address(id, owned) => addresses.push((id.clone(), owned.clone())),
                View::Utxo(id, utxo) => recorded.push((id.clone(), utxo.clone())),
                View::Request(id) => requests.push(id),
            }
        }
        if requests.is_empty() {
            return Ok(vec![]);
        }
        let operator = operator.ok_or(BotError::MissingRole("OperatorRole"))?;

        let result = self.reconciler.reconcile(&recorded, &addresses, self.chain.as_ref());
        info!(
            requests = requests.len(),
            addresses = addresses.len(),
            new = result.registrations.len(),
            spent = result.spends.len(),
            failed = result.failures.len(),
            "Reconciliation cycle"
        );

        let mut commands = Vec::new();
        commands.extend(result.registrations.into_iter().map(|utxo| Command::RegisterUtxo { operator: operator.clone(), utxo }));
        commands.extend(result.balances.into_iter().map(|b| Command::UpdateBalance {
            address: b.address,
            balance: b.balance,
            tx_count: b.tx_count,
        }));
        commands.extend(result.spends.into_iter().map(|utxo| Command::SpendUtxo { utxo }));
        commands.extend(requests.into_iter().map(|request| Command::AckUtxoUpdateRequest { request: request.clone() }));
        Ok(commands)
    }
}
