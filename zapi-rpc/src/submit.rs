//! Operation Submitter: validates a send and hands it to `z_sendmany`.

use serde_json::{json, Value};
use tracing::info;

use crate::client::ZcashRpc;
use crate::error::{ZapiError, ZapiResult};
use crate::types::{OperationId, SendRequest};

/// Substituted for an absent `minconf` when a later argument is supplied.
pub const SEND_MANY_DEFAULT_MINCONF: u32 = 10;

/// Submits validated multi-recipient sends. Holds no state besides the client.
#[derive(Clone)]
pub struct OperationSubmitter {
    rpc: ZcashRpc,
}

impl OperationSubmitter {
    pub fn new(rpc: ZcashRpc) -> Self {
        Self { rpc }
    }

    /// Validate and submit `request`, returning the node's operation id.
    ///
    /// Validation failures return before any network call is made.
    pub async fn submit(&self, request: &SendRequest) -> ZapiResult<OperationId> {
        validate_send_request(request)?;

        let id = self.rpc.send_many(request).await?;
        info!(
            operation_id = %id,
            recipients = request.recipients.len(),
            privacy_policy = request.privacy_policy.map(|p| p.as_str()),
            "z_sendmany submitted"
        );
        Ok(id)
    }
}

pub fn validate_send_request(request: &SendRequest) -> ZapiResult<()> {
    if request.from_address.is_empty() || request.recipients.is_empty() {
        return Err(ZapiError::validation(
            "fromAddress and recipients array are required",
        ));
    }

    for recipient in &request.recipients {
        let amount = match (recipient.address.is_empty(), recipient.amount) {
            (false, Some(amount)) => amount,
            _ => {
                return Err(ZapiError::validation(
                    "Each recipient must have address and amount",
                ))
            }
        };
        if !amount.is_finite() || amount < 0.0 {
            return Err(ZapiError::validation(
                "Recipient amount must be a non-negative number",
            ));
        }
    }

    Ok(())
}

/// Positional arguments for `z_sendmany`.
///
/// `minconf`, `fee` and `privacyPolicy` are a fixed row of optional slots.
/// The row is cut after the last supplied slot; any unsupplied slot before it
/// is filled (`minconf` with 10, `fee` with `null`) so later values keep
/// their position.
pub(crate) fn send_many_params(request: &SendRequest) -> ZapiResult<Vec<Value>> {
    let recipients = serde_json::to_value(&request.recipients)
        .map_err(|e| ZapiError::validation(format!("invalid recipients: {}", e)))?;

    let slots: [Option<Value>; 3] = [
        request.minconf.map(|m| json!(m)),
        request.fee.map(|f| json!(f)),
        request.privacy_policy.map(|p| json!(p.as_str())),
    ];
    let fillers: [Value; 3] = [json!(SEND_MANY_DEFAULT_MINCONF), Value::Null, Value::Null];

    let mut params = vec![json!(request.from_address), recipients];
    let used = slots.iter().rposition(Option::is_some).map_or(0, |last| last + 1);
    for (slot, filler) in slots.into_iter().zip(fillers).take(used) {
        params.push(slot.unwrap_or(filler));
    }

    Ok(params)
}
