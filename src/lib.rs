//! utxo-bots: keeps a programmable ledger's view of Bitcoin outputs in step
//! with a node, and carries outbound transfers from approval to broadcast.
//!
//! # Architecture
//!
//! ```text
//! Ledger (HttpLedger | ChannelLedger)
//!   │  subscribe(filter) → snapshots          submit(batch) ▲
//!   ▼                                                       │
//! driver::BotRunner  (one tokio task per bot)  ──────────────┘
//!   │
//!   ├── OwnedAddressRegistrar ── KeyStore
//!   ├── TransactionSigner ────── tx::TransactionBuilder ── KeyStore
//!   ├── TransferRequestValidator
//!   ├── TransferPreparer
//!   ├── UtxoReconcilerBot ────── reconcile::Reconciler ──┐
//!   └── RawTxPusher ──────────── broadcast::BroadcastCoordinator ──┤
//!                                                        ▼
//!                                          chain::ChainQuery (BitcoindChain)
//! ```
//!
//! # Cycle
//!
//! | Step | Where | Notes |
//! |------|-------|-------|
//! | snapshot arrives | `Ledger::subscribe` | filtered per bot by entity kind |
//! | compute | `Bot::process` | blocking pool, one cycle at a time per bot |
//! | stamp | `driver::CommandFactory` | workflow id, command id, max record time |
//! | submit | `Ledger::submit` | skipped when empty |

pub mod bots;
pub mod broadcast;
pub mod chain;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod logging;
pub mod reconcile;
pub mod runtime;
pub mod tx;

pub use broadcast::{BroadcastCoordinator, BroadcastOutcome};
pub use config::BotsConfig;
pub use error::{BotError, BuildError, ChainError, KeyStoreError, LedgerError};
pub use keys::{KeyLookup, KeyStore};
pub use reconcile::{Reconciler, Reconciliation};
pub use runtime::{install_signal_handlers, Shutdown};
pub use tx::{SignedTransaction, TransactionBuilder, TransferIntent};
