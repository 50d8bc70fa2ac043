use super::Bot;
use crate::error::BotError;
use crate::keys::KeyLookup;
use crate::ledger::{Command, Contract, ContractId, Entity, EntityFilter, EntityKind, LedgerSnapshot, NewTransfer, OwnedAddress};
use crate::tx::{TransactionBuilder, TransferIntent};
use bitcoin::Network;
use std::sync::Arc;
use tracing::{error, info, warn};

enum View<'a> {
    Address(&'a OwnedAddress),
    Transfer(&'a ContractId, &'a NewTransfer),
}

impl<'a> View<'a> {
    fn of(contract: &'a Contract) -> Option<Self> {
        match &contract.entity {
            Entity::OwnedAddress(owned) => Some(View::Address(owned)),
            Entity::NewTransfer(transfer) => Some(View::Transfer(&contract.id, transfer)),
            Entity::OperatorRole | Entity::SigningPartyRole | Entity::Utxo(_) |
            Entity::UtxoUpdateRequest | Entity::UncheckedTransferRequest |
            Entity::ValidatedTransferRequest | Entity::PendingTransfer { .. } => None,
        }
    }
}

/// Signs approved transfers. Change goes to the first owned address that
/// currently holds nothing.
pub struct TransactionSigner {
    party: String,
    builder: TransactionBuilder,
}

impl TransactionSigner {
    pub fn new(party: impl Into<String>, network: Network, keys: Arc<dyn KeyLookup>) -> Self {
        Self { party: party.into(), builder: TransactionBuilder::new(network, keys) }
    }
}

impl Bot for TransactionSigner {
    fn name(&self) -> &'static str { "TransactionSigner" }

    fn party(&self) -> &str { &self.party }

    fn filter(&self) -> EntityFilter {
        EntityFilter::new(&self.party, &[EntityKind::OwnedAddress, EntityKind::NewTransfer])
    }

    fn process(&mut self, snapshot: &LedgerSnapshot) -> Result<Vec<Command>, BotError> {
        let mut change_address = None;
        let mut transfers = Vec::new();
        for view in snapshot.contracts.iter().filter_map(View::of) {
            match view {
                View::Address(owned) => {
                    if change_address.is_none() && owned.balance == 0 {
                        change_address = Some(owned.address.as_str());
                    }
                }
                View::Transfer(id, transfer) => transfers.push((id, transfer)),
            }
        }
        if transfers.is_empty() {
            return Ok(vec![]);
        }
        if change_address.is_none() {
            warn!("No empty owned address for change; only exact-amount transfers can be signed");
        }

        let mut commands = Vec::with_capacity(transfers.len());
        for (id, transfer) in transfers {
            let intent = TransferIntent {
                inputs: transfer.inputs.clone(),
                destination: transfer.destination.clone(),
                amount: transfer.amount,
                fee: transfer.fee,
                change_address: change_address.unwrap_or_default().to_string(),
            };
            match self.builder.build(&intent) {
                Ok(signed) => {
                    info!(transfer = %id, txid = %signed.txid, "Signed transfer");
                    commands.push(Command::SignTransfer { transfer: id.clone(), raw_tx: signed.raw_hex });
                }
                Err(e) => error!(transfer = %id, error = %e, "Cannot sign transfer"),
            }
        }
        Ok(commands)
    }
}
