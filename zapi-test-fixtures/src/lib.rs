//! In-memory node for tests: replies from a per-method script and records
//! every call it receives.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;
use zapi_rpc::{RpcTransport, ZapiError, ZapiResult, ZcashRpc};

pub const CREATED_AT_UNIX: i64 = 1_700_000_000;
pub const SAMPLE_TXID: &str = "5b3e6f0a9c2d41e7b8f1a0c3d5e7f9b1a3c5e7f9b1d3f5a7c9e1b3d5f7a9c1e3";

#[derive(Clone, Debug)]
enum Reply {
    Ok(Value),
    Rpc { code: i64, message: String },
    Network(String),
}

impl Reply {
    fn to_result(&self) -> ZapiResult<Value> {
        match self {
            Reply::Ok(value) => Ok(value.clone()),
            Reply::Rpc { code, message } => Err(ZapiError::Rpc {
                code: *code,
                message: message.clone(),
            }),
            Reply::Network(message) => Err(ZapiError::Network(message.clone())),
        }
    }
}

/// One call observed by the transport.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub method: String,
    pub params: Vec<Value>,
    /// Tokio clock at the time of the call, so paused-clock tests can check
    /// pacing.
    pub at: Instant,
}

#[derive(Default)]
struct Script {
    replies: HashMap<String, VecDeque<Reply>>,
    calls: Vec<RecordedCall>,
}

/// Scripted [`RpcTransport`].
///
/// Replies for a method are served in the order they were added; the last
/// one repeats forever. A method with no script fails with a network error.
/// Clones share the same script and call log.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(self, method: &str, reply: Reply) -> Self {
        self.lock()
            .replies
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn reply(self, method: &str, value: Value) -> Self {
        self.push(method, Reply::Ok(value))
    }

    pub fn reply_rpc_error(self, method: &str, code: i64, message: &str) -> Self {
        self.push(
            method,
            Reply::Rpc {
                code,
                message: message.to_string(),
            },
        )
    }

    pub fn reply_network_error(self, method: &str, message: &str) -> Self {
        self.push(method, Reply::Network(message.to_string()))
    }

    /// Node client backed by this transport.
    pub fn client(&self) -> ZcashRpc {
        ZcashRpc::new(Arc::new(self.clone()))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn call(&self, method: &str, params: Vec<Value>) -> ZapiResult<Value> {
        let mut script = self.lock();
        script.calls.push(RecordedCall {
            method: method.to_string(),
            params,
            at: Instant::now(),
        });

        let reply = script.replies.get_mut(method).and_then(|queue| {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        });
        match reply {
            Some(reply) => reply.to_result(),
            None => Err(ZapiError::Network(format!(
                "no scripted reply for {}",
                method
            ))),
        }
    }
}

/// `z_getoperationstatus` entry in the given state.
pub fn operation_json(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "status": status,
        "creation_time": CREATED_AT_UNIX,
        "method": "z_sendmany",
        "params": {
            "fromaddress": "t1SenderAddressForTests",
            "amounts": [{ "address": "zs1receiver", "amount": 0.5 }],
            "minconf": 1,
            "fee": null
        }
    })
}

pub fn success_operation_json(id: &str, txid: &str) -> Value {
    let mut op = operation_json(id, "success");
    op["result"] = json!({ "txid": txid });
    op["execution_secs"] = json!(4.2);
    op
}

pub fn failed_operation_json(id: &str, code: i64, message: &str) -> Value {
    let mut op = operation_json(id, "failed");
    op["error"] = json!({ "code": code, "message": message });
    op
}

/// `z_getbalanceforaccount` answer with the given zatoshi values; zero pools
/// are left out the way the node does.
pub fn balance_json(transparent: u64, sapling: u64, orchard: u64, minconf: u32) -> Value {
    let mut pools = serde_json::Map::new();
    for (name, value) in [
        ("transparent", transparent),
        ("sapling", sapling),
        ("orchard", orchard),
    ] {
        if value > 0 {
            pools.insert(name.to_string(), json!({ "valueZat": value }));
        }
    }
    json!({ "pools": pools, "minimum_confirmations": minconf })
}
