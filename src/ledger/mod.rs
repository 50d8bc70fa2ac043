//! Ledger boundary - snapshots in, command batches out
//!
//! The bots never see a concrete ledger client. They hold an
//! `Arc<dyn Ledger>` and only ever call the two verbs below.
//!
//! ```text
//!            subscribe(filter)                 submit(batch)
//! Ledger ─────────────────────▶ BotRunner ─────────────────────▶ Ledger
//!          stream of snapshots      │       one atomic CommandBatch
//!                                   ▼
//!                          Bot::process(snapshot)
//! ```
//!
//! | Implementation | Use |
//! |----------------|-----|
//! | [`ChannelLedger`] | in-process, snapshots published by the embedder (tests) |
//! | [`HttpLedger`] | JSON gateway: `/health`, `/parties/{p}/snapshot`, `/commands` |

mod channel;
mod command;
mod http;
mod model;

pub use channel::ChannelLedger;
pub use command::{Command, CommandBatch};
pub use http::HttpLedger;
pub use model::{
    Contract, ContractId, Entity, EntityFilter, EntityKind, LedgerSnapshot, NewTransfer, OwnedAddress,
    UtxoKey, UtxoRecord,
};

use crate::error::LedgerError;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Snapshots in arrival order. An `Err` item ends the subscription.
pub type SnapshotStream = BoxStream<'static, Result<LedgerSnapshot, LedgerError>>;

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn subscribe(&self, filter: EntityFilter) -> Result<SnapshotStream, LedgerError>;
    async fn submit(&self, batch: CommandBatch) -> Result<(), LedgerError>;
}
