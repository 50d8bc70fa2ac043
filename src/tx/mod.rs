//! Transaction builder - intent in, signed raw transaction out
//!
//! ```text
//! TransferIntent { inputs, destination, amount, fee, change_address }
//!     │
//!     ├── output 0: destination ← amount
//!     ├── output 1: change_address ← Σinputs − amount − fee   (only if > 0)
//!     │
//!     └── each input: SIGHASH_ALL over its recorded script, key of its recorded address
//!             │
//!             ▼
//!     SignedTransaction { txid, raw_hex }
//! ```
//!
//! Version 1, lock time 0, every input sequence `0xFFFFFFFF`. No coin
//! selection: the caller hands over a sufficient input set. Signatures use
//! RFC 6979 nonces, so a fixed intent signs to the same bytes here, but
//! nothing downstream relies on that.

mod builder;

pub use builder::TransactionBuilder;

use crate::ledger::UtxoRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferIntent {
    pub inputs: Vec<UtxoRecord>,
    pub destination: String,
    /// Satoshis paid to `destination`.
    pub amount: u64,
    pub fee: u64,
    pub change_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub txid: String,
    pub raw_hex: String,
}
