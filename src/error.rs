//! Error types, one enum per concern.
//!
//! | Type | Raised by | Handling |
//! |------|-----------|----------|
//! | [`ChainError`] | chain facade | isolated to one address / transfer, retried next cycle |
//! | [`BuildError`] | transaction builder | hard failure for that transfer |
//! | [`LedgerError`] | ledger clients | fatal once bots are running |
//! | [`KeyStoreError`] | key file loading | fatal at startup |
//! | [`BotError`] | bot cycles | cycle emits nothing |

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    /// The node answered with a JSON-RPC error object.
    #[error("node rpc error {code}: {message}")]
    Rpc { code: i32, message: String },
    /// The node could not be reached or the reply could not be read.
    #[error("node transport error: {0}")]
    Transport(String),
    #[error("malformed node reply: {0}")]
    Malformed(String),
    #[error(transparent)]
    Amount(#[from] AmountError),
}

#[derive(Debug, Error, PartialEq)]
pub enum AmountError {
    #[error("amount {0} is not a finite non-negative value")]
    OutOfRange(String),
    #[error("amount {0} is not an exact number of satoshis")]
    Inexact(String),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("transfer has no inputs")]
    NoInputs,
    #[error("inputs total {total} sat, need {required} sat (amount + fee)")]
    InsufficientInputs { total: u64, required: u64 },
    #[error("{0} overflows u64 satoshis")]
    ValueOverflow(&'static str),
    #[error("no signing key for address {address}")]
    MissingKey { address: String },
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("invalid input {tx_hash}:{output_index}: {reason}")]
    InvalidInput { tx_hash: String, output_index: u32, reason: String },
    #[error("sighash: {0}")]
    Sighash(String),
    #[error("signature push: {0}")]
    PushBytes(String),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unreachable: {0}")]
    Unavailable(String),
    #[error("ledger rejected batch {command_id}: {reason}")]
    Rejected { command_id: String, reason: String },
    #[error("ledger reply decode: {0}")]
    Decode(String),
    #[error("ledger closed")]
    Closed,
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() { LedgerError::Decode(e.to_string()) } else { LedgerError::Unavailable(e.to_string()) }
    }
}

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("key file {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("line {line}: invalid WIF key: {reason}")]
    InvalidKey { line: usize, reason: String },
    #[error("line {line}: key is for {found:?}, expected {expected:?}")]
    WrongNetwork { line: usize, found: bitcoin::NetworkKind, expected: bitcoin::NetworkKind },
    #[error("line {line}: duplicate key for address {address}")]
    Duplicate { line: usize, address: String },
}

#[derive(Debug, Error)]
pub enum BotError {
    #[error("snapshot has no {0} contract")]
    MissingRole(&'static str),
}
