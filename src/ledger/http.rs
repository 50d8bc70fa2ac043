use super::{CommandBatch, EntityFilter, Ledger, LedgerSnapshot, SnapshotStream};
use crate::error::LedgerError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::{debug, info};

const CONNECT_RETRY: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Client for a JSON ledger gateway. Snapshots are polled and only
/// forwarded when the ledger offset moves.
#[derive(Debug, Clone)]
pub struct HttpLedger {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
}

impl HttpLedger {
    pub fn new(base_url: impl Into<String>, poll_interval: Duration) -> Result<Self, LedgerError> {
        Self::with_timeout(base_url, poll_interval, REQUEST_TIMEOUT)
    }

    /// Every request, snapshot polls included, fails after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, poll_interval: Duration, timeout: Duration) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url, poll_interval })
    }

    pub async fn health(&self) -> Result<(), LedgerError> {
        self.client.get(format!("{}/health", self.base_url)).send().await?.error_for_status()?;
        Ok(())
    }

    /// Block until the gateway answers its health check, retrying every second.
    pub async fn connect(base_url: impl Into<String>, poll_interval: Duration) -> Result<Self, LedgerError> {
        let ledger = Self::new(base_url, poll_interval)?;
        loop {
            match ledger.health().await {
                Ok(()) => {
                    info!(url = %ledger.base_url, "Connected to ledger");
                    return Ok(ledger);
                }
                Err(e) => {
                    info!(url = %ledger.base_url, error = %e, "Waiting for ledger");
                    tokio::time::sleep(CONNECT_RETRY).await;
                }
            }
        }
    }

    async fn fetch(&self, filter: &EntityFilter) -> Result<LedgerSnapshot, LedgerError> {
        let kinds = filter.kinds.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(",");
        let snapshot = self
            .client
            .get(format!("{}/parties/{}/snapshot", self.base_url, filter.party))
            .query(&[("kinds", kinds)])
            .send()
            .await?
            .error_for_status()?
            .json::<LedgerSnapshot>()
            .await?;
        Ok(snapshot)
    }
}

struct Poll {
    ledger: HttpLedger,
    filter: EntityFilter,
    last_offset: Option<u64>,
    done: bool,
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn subscribe(&self, filter: EntityFilter) -> Result<SnapshotStream, LedgerError> {
        let state = Poll { ledger: self.clone(), filter, last_offset: None, done: false };
        let stream = stream::unfold(state, |mut poll| async move {
            if poll.done {
                return None;
            }
            loop {
                if poll.last_offset.is_some() {
                    tokio::time::sleep(poll.ledger.poll_interval).await;
                }
                match poll.ledger.fetch(&poll.filter).await {
                    Ok(snapshot) if poll.last_offset == Some(snapshot.offset) => continue,
                    Ok(snapshot) => {
                        debug!(party = %poll.filter.party, offset = snapshot.offset, "Snapshot");
                        poll.last_offset = Some(snapshot.offset);
                        return Some((Ok(snapshot), poll));
                    }
                    Err(e) => {
                        poll.done = true;
                        return Some((Err(e), poll));
                    }
                }
            }
        });
        Ok(stream.boxed())
    }

    async fn submit(&self, batch: CommandBatch) -> Result<(), LedgerError> {
        let response = self.client.post(format!("{}/commands", self.base_url)).json(&batch).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(LedgerError::Rejected { command_id: batch.command_id, reason: format!("{status}: {body}") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalised() {
        let ledger = HttpLedger::new("http://localhost:6865/", Duration::from_secs(1)).unwrap();
        assert_eq!(ledger.base_url, "http://localhost:6865");
    }

    #[tokio::test]
    async fn unreachable_gateway_fails_health() {
        let ledger = HttpLedger::new("http://127.0.0.1:1", Duration::from_millis(10)).unwrap();
        assert!(matches!(ledger.health().await, Err(LedgerError::Unavailable(_))));
    }

    #[tokio::test]
    async fn silent_gateway_times_out() {
        // Accepts connections (kernel backlog) but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let ledger = HttpLedger::with_timeout(url, Duration::from_millis(10), Duration::from_millis(200)).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), ledger.health()).await.expect("request gave up on its own");
        assert!(matches!(result, Err(LedgerError::Unavailable(_))));
        drop(listener);
    }
}
