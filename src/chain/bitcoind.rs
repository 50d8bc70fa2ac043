use super::{btc_to_sat, BlockHeader, ChainAdmin, ChainQuery, RpcReply, UnspentOutput};
use crate::config::NodeRpcConfig;
use crate::error::ChainError;
use bitcoincore_rpc::{jsonrpc, Auth, Client, RpcApi};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

/// `getblockhash` past the tip.
const RPC_INVALID_PARAMETER: i32 = -8;
const MAX_CONFIRMATIONS: u32 = 9_999_999;

/// [`ChainQuery`] over Bitcoin Core JSON-RPC.
pub struct BitcoindChain {
    client: Client,
}

#[derive(Deserialize)]
struct RawUnspent {
    txid: String,
    vout: u32,
    amount: f64,
    #[serde(rename = "scriptPubKey")]
    script_pub_key: String,
}

#[derive(Deserialize)]
struct RawHeader {
    height: u64,
    time: u64,
}

#[derive(Deserialize)]
struct RawWalletTx {
    #[serde(default)]
    blockhash: Option<String>,
}

pub(crate) fn map_rpc_error(err: bitcoincore_rpc::Error) -> ChainError {
    match err {
        bitcoincore_rpc::Error::JsonRpc(jsonrpc::Error::Rpc(e)) => ChainError::Rpc { code: e.code, message: e.message },
        bitcoincore_rpc::Error::Json(e) => ChainError::Malformed(e.to_string()),
        other => ChainError::Transport(other.to_string()),
    }
}

impl BitcoindChain {
    pub fn connect(config: &NodeRpcConfig) -> Result<Self, ChainError> {
        let auth = Auth::UserPass(config.user.clone(), config.pass.clone());
        let client = Client::new(&config.url, auth).map_err(map_rpc_error)?;
        Ok(Self { client })
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: &[Value]) -> Result<T, ChainError> {
        self.client.call(method, params).map_err(map_rpc_error)
    }
}

impl ChainQuery for BitcoindChain {
    fn list_unspent(&self, min_conf: u32, address: &str) -> Result<Vec<UnspentOutput>, ChainError> {
        let raw: Vec<RawUnspent> = self.call("listunspent", &[json!(min_conf), json!(MAX_CONFIRMATIONS), json!([address])])?;
        raw.into_iter()
            .map(|u| {
                Ok(UnspentOutput { txid: u.txid, vout: u.vout, amount_sat: btc_to_sat(u.amount)?, script_pub_key: u.script_pub_key })
            })
            .collect()
    }

    fn transaction_block_hash(&self, txid: &str) -> Result<Option<String>, ChainError> {
        let tx: RawWalletTx = self.call("gettransaction", &[json!(txid)])?;
        Ok(tx.blockhash)
    }

    fn block_header(&self, hash: &str) -> Result<BlockHeader, ChainError> {
        let header: RawHeader = self.call("getblockheader", &[json!(hash), json!(true)])?;
        Ok(BlockHeader { height: header.height, time: header.time })
    }

    fn block_hash(&self, height: u64) -> Result<Option<String>, ChainError> {
        match self.call::<String>("getblockhash", &[json!(height)]) {
            Ok(hash) => Ok(Some(hash)),
            Err(ChainError::Rpc { code: RPC_INVALID_PARAMETER, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn send_raw_transaction(&self, raw_hex: &str) -> Result<RpcReply, ChainError> {
        match self.client.call::<Value>("sendrawtransaction", &[json!(raw_hex)]) {
            Ok(result) => Ok(RpcReply::ok(result)),
            Err(bitcoincore_rpc::Error::JsonRpc(jsonrpc::Error::Rpc(e))) => Ok(RpcReply::err(e.code, e.message)),
            Err(e) => Err(map_rpc_error(e)),
        }
    }
}

/// `importaddress address label rescan`
fn import_params(address: &str, rescan: bool) -> [Value; 3] {
    [json!(address), json!(""), json!(rescan)]
}

impl ChainAdmin for BitcoindChain {
    fn import_address(&self, address: &str, rescan: bool) -> Result<(), ChainError> {
        self.call::<Value>("importaddress", &import_params(address, rescan))?;
        Ok(())
    }

    fn generate_to_address(&self, blocks: u64, address: &str) -> Result<Vec<String>, ChainError> {
        self.call("generatetoaddress", &[json!(blocks), json!(address)])
    }

    fn received_by_address(&self, address: &str, min_conf: u32) -> Result<u64, ChainError> {
        let btc: f64 = self.call("getreceivedbyaddress", &[json!(address), json!(min_conf)])?;
        Ok(btc_to_sat(btc)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_errors_keep_code_and_message() {
        let err = bitcoincore_rpc::Error::JsonRpc(jsonrpc::Error::Rpc(jsonrpc::error::RpcError {
            code: -26,
            message: "bad-txns-inputs-missingorspent".into(),
            data: None,
        }));
        match map_rpc_error(err) {
            ChainError::Rpc { code, message } => {
                assert_eq!(code, -26);
                assert_eq!(message, "bad-txns-inputs-missingorspent");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn undecodable_reply_is_malformed() {
        let json_err = serde_json::from_str::<u64>("\"x\"").unwrap_err();
        assert!(matches!(map_rpc_error(bitcoincore_rpc::Error::Json(json_err)), ChainError::Malformed(_)));
    }

    #[test]
    fn import_rescans_unless_told_not_to() {
        assert_eq!(import_params("mx", true), [json!("mx"), json!(""), json!(true)]);
        assert_eq!(import_params("mx", false)[2], json!(false));
    }

    #[test]
    fn listunspent_entry_decodes() {
        let raw: RawUnspent = serde_json::from_value(json!({
            "txid": "ab", "vout": 1, "amount": 0.5, "scriptPubKey": "76a9", "confirmations": 3
        }))
        .unwrap();
        assert_eq!(raw.vout, 1);
        assert_eq!(btc_to_sat(raw.amount).unwrap(), 50_000_000);
    }
}
