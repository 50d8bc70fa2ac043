//! Bots - one reaction per ledger snapshot
//!
//! Every bot sees only the entity kinds in its [`EntityFilter`], projects each
//! contract into its own closed view enum, and returns the commands for one
//! batch. A bot owns whatever state it keeps; the runner gives it exactly one
//! snapshot at a time.
//!
//! | Bot | Party | Reacts to | Emits |
//! |-----|-------|-----------|-------|
//! | [`OwnedAddressRegistrar`] | signing | SigningPartyRole, OwnedAddress | RegisterOwnedAddress (once) |
//! | [`TransactionSigner`] | signing | OwnedAddress, NewTransfer | SignTransfer |
//! | [`TransferRequestValidator`] | operator | UncheckedTransferRequest | ValidateRequest |
//! | [`TransferPreparer`] | operator | ValidatedTransferRequest, SigningPartyRole, Utxo | PrepareToTransfer |
//! | [`UtxoReconcilerBot`] | operator | OperatorRole, OwnedAddress, Utxo, UtxoUpdateRequest | RegisterUtxo, UpdateBalance, SpendUtxo, AckUtxoUpdateRequest |
//! | [`RawTxPusher`] | operator | PendingTransfer | Transmit / Fail |

mod preparer;
mod pusher;
mod reconciler;
mod registrar;
mod signer;
mod validator;

pub use preparer::TransferPreparer;
pub use pusher::RawTxPusher;
pub use reconciler::UtxoReconcilerBot;
pub use registrar::{OwnedAddressRegistrar, Registration};
pub use signer::TransactionSigner;
pub use validator::TransferRequestValidator;

use crate::chain::ChainQuery;
use crate::config::BotsConfig;
use crate::error::BotError;
use crate::keys::KeyStore;
use crate::ledger::{Command, EntityFilter, LedgerSnapshot};
use std::sync::Arc;

pub trait Bot: Send + 'static {
    fn name(&self) -> &'static str;
    fn party(&self) -> &str;
    fn filter(&self) -> EntityFilter;
    /// Commands for one batch. `Err` means the cycle emits nothing.
    fn process(&mut self, snapshot: &LedgerSnapshot) -> Result<Vec<Command>, BotError>;
}

/// The full set of bots for one deployment.
pub fn standard_bots(config: &BotsConfig, chain: Arc<dyn ChainQuery>, keys: Arc<KeyStore>) -> Vec<Box<dyn Bot>> {
    let operator = config.operator_party.as_str();
    let signing = config.signing_party.as_str();
    let addresses = keys.addresses().map(String::from).collect::<Vec<_>>();
    vec![
        Box::new(OwnedAddressRegistrar::new(signing, addresses)),
        Box::new(TransactionSigner::new(signing, config.network, keys)),
        Box::new(TransferRequestValidator::new(operator)),
        Box::new(TransferPreparer::new(operator, config.fee_sat)),
        Box::new(UtxoReconcilerBot::new(operator, chain.clone(), config.min_confirmations)),
        Box::new(RawTxPusher::new(operator, chain)),
    ]
}
