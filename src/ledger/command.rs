//! Commands the bots submit, and the batch envelope they travel in.

use super::model::{ContractId, UtxoRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum Command {
    /// Record a newly observed output (non-consuming, on the operator role).
    RegisterUtxo { operator: ContractId, utxo: UtxoRecord },
    SpendUtxo { utxo: ContractId },
    UpdateBalance { address: ContractId, balance: u64, tx_count: u64 },
    AckUtxoUpdateRequest { request: ContractId },
    /// Publish an owned address (non-consuming, on the signing party role).
    RegisterOwnedAddress { signing_role: ContractId, address: String },
    ValidateRequest { request: ContractId },
    PrepareToTransfer { request: ContractId, signing_role: ContractId, fee: u64, utxos: Vec<ContractId> },
    SignTransfer { transfer: ContractId, raw_tx: String },
    Transmit { transfer: ContractId, message: String },
    Fail { transfer: ContractId, message: String },
}

impl Command {
    /// Contract archived by this command, if any.
    pub fn consumes(&self) -> Option<&ContractId> {
        match self {
            Command::RegisterUtxo { .. } | Command::RegisterOwnedAddress { .. } => None,
            Command::SpendUtxo { utxo } => Some(utxo),
            Command::UpdateBalance { address, .. } => Some(address),
            Command::AckUtxoUpdateRequest { request }
            | Command::ValidateRequest { request }
            | Command::PrepareToTransfer { request, .. } => Some(request),
            Command::SignTransfer { transfer, .. }
            | Command::Transmit { transfer, .. }
            | Command::Fail { transfer, .. } => Some(transfer),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::RegisterUtxo { .. } => "RegisterUtxo",
            Command::SpendUtxo { .. } => "SpendUtxo",
            Command::UpdateBalance { .. } => "UpdateBalance",
            Command::AckUtxoUpdateRequest { .. } => "AckUtxoUpdateRequest",
            Command::RegisterOwnedAddress { .. } => "RegisterOwnedAddress",
            Command::ValidateRequest { .. } => "ValidateRequest",
            Command::PrepareToTransfer { .. } => "PrepareToTransfer",
            Command::SignTransfer { .. } => "SignTransfer",
            Command::Transmit { .. } => "Transmit",
            Command::Fail { .. } => "Fail",
        }
    }
}

/// One atomic submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBatch {
    pub application_id: String,
    pub command_id: String,
    pub party: String,
    pub workflow_id: String,
    pub ledger_effective_time: DateTime<Utc>,
    pub max_record_time: DateTime<Utc>,
    /// Contracts this batch archives; the ledger hides them from later snapshots.
    pub pending: Vec<ContractId>,
    pub commands: Vec<Command>,
}

impl CommandBatch {
    pub fn is_empty(&self) -> bool { self.commands.is_empty() }

    pub fn len(&self) -> usize { self.commands.len() }

    /// Append unless an identical command is already queued.
    pub fn push(&mut self, command: Command) -> bool {
        if self.commands.contains(&command) {
            return false;
        }
        if let Some(id) = command.consumes() {
            if !self.pending.contains(id) {
                self.pending.push(id.clone());
            }
        }
        self.commands.push(command);
        true
    }

    pub fn count(&self, name: &str) -> usize {
        self.commands.iter().filter(|c| c.name() == name).count()
    }
}
