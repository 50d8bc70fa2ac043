use super::{CommandBatch, EntityFilter, Ledger, LedgerSnapshot, SnapshotStream};
use crate::error::LedgerError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc};

struct Inner {
    latest: Mutex<HashMap<String, LedgerSnapshot>>,
    snapshots: broadcast::Sender<(String, LedgerSnapshot)>,
    submissions: mpsc::UnboundedSender<CommandBatch>,
}

/// In-process ledger. The embedder publishes per-party snapshots and reads
/// back every submitted batch.
#[derive(Clone)]
pub struct ChannelLedger {
    inner: Arc<Inner>,
}

impl ChannelLedger {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CommandBatch>) {
        let (snapshots, _) = broadcast::channel(64);
        let (submissions, rx) = mpsc::unbounded_channel();
        let inner = Inner { latest: Mutex::new(HashMap::new()), snapshots, submissions };
        (Self { inner: Arc::new(inner) }, rx)
    }

    /// Replace the party's view. Subscribers of that party receive it filtered.
    pub fn publish(&self, party: &str, snapshot: LedgerSnapshot) {
        let mut latest = self.inner.latest.lock().unwrap_or_else(PoisonError::into_inner);
        latest.insert(party.to_string(), snapshot.clone());
        // No receivers is fine; late subscribers start from `latest`.
        let _ = self.inner.snapshots.send((party.to_string(), snapshot));
    }
}

#[async_trait]
impl Ledger for ChannelLedger {
    async fn subscribe(&self, filter: EntityFilter) -> Result<SnapshotStream, LedgerError> {
        // Subscribe and read `latest` under the publish lock so nothing is seen twice.
        let (rx, initial) = {
            let latest = self.inner.latest.lock().unwrap_or_else(PoisonError::into_inner);
            let rx = self.inner.snapshots.subscribe();
            (rx, latest.get(&filter.party).map(|s| s.filtered(&filter)))
        };

        let updates = stream::unfold((rx, filter), |(mut rx, filter)| async move {
            loop {
                match rx.recv().await {
                    Ok((party, snapshot)) if party == filter.party => {
                        let seen = snapshot.filtered(&filter);
                        return Some((Ok(seen), (rx, filter)));
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(party = %filter.party, skipped, "Subscriber lagged, skipping to newest snapshot");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(stream::iter(initial.map(Ok)).chain(updates).boxed())
    }

    async fn submit(&self, batch: CommandBatch) -> Result<(), LedgerError> {
        self.inner.submissions.send(batch).map_err(|_| LedgerError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Contract, Entity, EntityKind};

    #[tokio::test]
    async fn late_subscriber_gets_latest_then_updates() {
        let (ledger, _rx) = ChannelLedger::new();
        ledger.publish("Operator", LedgerSnapshot::new(1, vec![Contract::new("a", Entity::OperatorRole)]));

        let filter = EntityFilter::new("Operator", &[EntityKind::OperatorRole]);
        let mut stream = ledger.subscribe(filter).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap().offset, 1);

        ledger.publish("SigningParty", LedgerSnapshot::new(2, vec![]));
        ledger.publish("Operator", LedgerSnapshot::new(3, vec![Contract::new("b", Entity::SigningPartyRole)]));
        let next = stream.next().await.unwrap().unwrap();
        assert_eq!(next.offset, 3);
        assert!(next.contracts.is_empty());
    }
}
