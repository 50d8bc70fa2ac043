//! Broadcast coordinator - one submission per signed transaction, no retries.

use crate::chain::{ChainQuery, RpcReply};
use crate::error::ChainError;
use crate::tx::SignedTransaction;
use serde_json::Value;

const EMPTY_REPLY: &str = "node returned neither result nor error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Transmitted { txid: String },
    /// Node rejection, message verbatim.
    FailedToTransmit { message: String },
}

impl BroadcastOutcome {
    /// `error` wins over `result`; a reply with neither is a failure.
    pub fn classify(reply: &RpcReply) -> Self {
        match (&reply.error, &reply.result) {
            (Some(error), _) => BroadcastOutcome::FailedToTransmit { message: error.message.clone() },
            (None, Some(Value::Null)) | (None, None) => BroadcastOutcome::FailedToTransmit { message: EMPTY_REPLY.into() },
            (None, Some(Value::String(txid))) => BroadcastOutcome::Transmitted { txid: txid.clone() },
            (None, Some(other)) => BroadcastOutcome::Transmitted { txid: other.to_string() },
        }
    }

    pub fn is_transmitted(&self) -> bool { matches!(self, BroadcastOutcome::Transmitted { .. }) }
}

pub struct BroadcastCoordinator<'a> {
    chain: &'a dyn ChainQuery,
}

impl<'a> BroadcastCoordinator<'a> {
    pub fn new(chain: &'a dyn ChainQuery) -> Self { Self { chain } }

    /// `Err` only when the node could not be asked at all.
    pub fn broadcast(&self, tx: &SignedTransaction) -> Result<BroadcastOutcome, ChainError> {
        self.push_raw(&tx.raw_hex)
    }

    pub fn push_raw(&self, raw_hex: &str) -> Result<BroadcastOutcome, ChainError> {
        let reply = self.chain.send_raw_transaction(raw_hex)?;
        Ok(BroadcastOutcome::classify(&reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_field_is_failure_with_message() {
        let reply: RpcReply = serde_json::from_value(json!({"error": {"message": "bad-txns-inputs-missingorspent"}})).unwrap();
        assert_eq!(
            BroadcastOutcome::classify(&reply),
            BroadcastOutcome::FailedToTransmit { message: "bad-txns-inputs-missingorspent".into() }
        );
    }

    #[test]
    fn error_beats_result() {
        let reply: RpcReply = serde_json::from_value(json!({"result": "ab", "error": {"code": -25, "message": "missing inputs"}})).unwrap();
        assert!(!BroadcastOutcome::classify(&reply).is_transmitted());
    }

    #[test]
    fn result_field_is_transmitted() {
        let reply: RpcReply = serde_json::from_value(json!({"result": "deadbeef", "error": null})).unwrap();
        assert_eq!(BroadcastOutcome::classify(&reply), BroadcastOutcome::Transmitted { txid: "deadbeef".into() });
    }

    #[test]
    fn empty_reply_is_failure() {
        assert_eq!(
            BroadcastOutcome::classify(&RpcReply::default()),
            BroadcastOutcome::FailedToTransmit { message: EMPTY_REPLY.into() }
        );
        let null_result: RpcReply = serde_json::from_value(json!({"result": null})).unwrap();
        assert!(!BroadcastOutcome::classify(&null_result).is_transmitted());
    }

    #[test]
    fn coordinator_reports_node_rejection() {
        let chain = crate::chain::MemoryChain::new(0);
        let tx = SignedTransaction { txid: String::new(), raw_hex: "zz".into() };
        let outcome = BroadcastCoordinator::new(&chain).broadcast(&tx).unwrap();
        assert_eq!(outcome, BroadcastOutcome::FailedToTransmit { message: "TX decode failed".into() });
    }
}
