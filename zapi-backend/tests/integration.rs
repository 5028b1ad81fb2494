use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use zapi_backend::{app_router, AppState, HEADER_API_KEY};
use zapi_rpc::{PollConfig, WalletMonitor};
use zapi_test_fixtures::{
    balance_json, failed_operation_json, operation_json, success_operation_json,
    ScriptedTransport, SAMPLE_TXID,
};

const BODY_LIMIT: usize = usize::MAX;
const API_KEY: &str = "test-api-key";

fn test_app(node: &ScriptedTransport) -> Router {
    let poll = PollConfig::new(Duration::from_millis(100), 3);
    app_router(AppState::new(node.client(), poll, API_KEY))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(HEADER_API_KEY, API_KEY)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(HEADER_API_KEY, API_KEY)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("router response");
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_is_not_gated() {
    let node = ScriptedTransport::new();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(test_app(&node), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_or_wrong_api_key_is_rejected() {
    let node = ScriptedTransport::new().reply("getblockcount", json!(1));

    let missing = Request::builder()
        .uri("/api/zcash/blockchain/blockcount")
        .body(Body::empty())
        .unwrap();
    let wrong = Request::builder()
        .uri("/api/zcash/blockchain/blockcount")
        .header(HEADER_API_KEY, "not-the-key")
        .body(Body::empty())
        .unwrap();

    for request in [missing, wrong] {
        let (status, body) = send(test_app(&node), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Unauthorized: Invalid or missing API key");
    }
    assert_eq!(node.call_count(), 0);
}

#[tokio::test]
async fn unset_api_key_locks_the_api() {
    let node = ScriptedTransport::new().reply("getblockcount", json!(1));
    let app = app_router(AppState::new(node.client(), PollConfig::default(), ""));
    let request = Request::builder()
        .uri("/api/zcash/blockchain/blockcount")
        .header(HEADER_API_KEY, "")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn block_count_uses_success_envelope() {
    let node = ScriptedTransport::new().reply("getblockcount", json!(2_712_345));

    let (status, body) = send(test_app(&node), get("/api/zcash/blockchain/blockcount")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "data": { "blockCount": 2_712_345 } }));
}

#[tokio::test]
async fn non_numeric_height_is_bad_request() {
    let node = ScriptedTransport::new();

    let (status, body) = send(test_app(&node), get("/api/zcash/blockchain/blockhash/tip")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Valid block height is required");
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn z_sendmany_returns_operation_id() {
    let node = ScriptedTransport::new().reply("z_sendmany", json!("opid-abc"));

    let (status, body) = send(
        test_app(&node),
        post_json(
            "/api/zcash/transaction/z_sendmany",
            json!({
                "fromAddress": "ANY_TADDR",
                "recipients": [{ "address": "zs1alice", "amount": 0.01, "memo": "68656c6c6f" }],
                "fee": 0.0001
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["operationId"], "opid-abc");
    let params = &node.calls_to("z_sendmany")[0].params;
    assert_eq!(params[2], json!(10));
    assert_eq!(params[3], json!(0.0001));
}

#[tokio::test]
async fn z_sendmany_without_recipients_is_rejected() {
    let node = ScriptedTransport::new();

    let (status, body) = send(
        test_app(&node),
        post_json(
            "/api/zcash/transaction/z_sendmany",
            json!({ "fromAddress": "t1sender", "recipients": [] }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "fromAddress and recipients array are required");
    assert_eq!(node.call_count(), 0);
}

#[tokio::test]
async fn node_errors_map_to_bad_gateway() {
    let node = ScriptedTransport::new().reply_rpc_error("z_sendmany", -6, "Insufficient funds");

    let (status, body) = send(
        test_app(&node),
        post_json(
            "/api/zcash/transaction/z_sendmany",
            json!({
                "fromAddress": "t1sender",
                "recipients": [{ "address": "t1bob", "amount": 1000 }]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "RPC Error: Insufficient funds (Code: -6)");
    assert_eq!(body["error_code"], "RPC_ERROR");
}

#[tokio::test]
async fn balance_for_account_reports_pools_and_total() {
    let node = ScriptedTransport::new().reply(
        "z_getbalanceforaccount",
        balance_json(100_000_000, 50_000_000, 0, 1),
    );

    let (status, body) = send(
        test_app(&node),
        post_json("/api/zcash/wallet/getbalanceforaccount", json!({ "account": 0 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["pools"]["transparent"]["valueZat"], 100_000_000);
    assert_eq!(data["pools"]["sapling"]["valueZat"], 50_000_000);
    assert!(data["pools"].get("orchard").is_none());
    assert_eq!(data["minimum_confirmations"], 1);
    assert_eq!(data["total_zat"], 150_000_000);
    assert_eq!(data["total_zec"], 1.5);
}

#[tokio::test]
async fn balance_for_account_requires_account() {
    let node = ScriptedTransport::new();

    let (status, body) = send(
        test_app(&node),
        post_json("/api/zcash/wallet/getbalanceforaccount", json!({ "minconf": 3 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Account number is required");
}

#[tokio::test]
async fn new_account_includes_its_address() {
    let node = ScriptedTransport::new()
        .reply("z_getnewaccount", json!({ "account": 4 }))
        .reply(
            "z_getaddressforaccount",
            json!({
                "account": 4,
                "diversifier_index": 0,
                "receiver_types": ["p2pkh", "sapling", "orchard"],
                "address": "u1newaccountaddress"
            }),
        );

    let (status, body) = send(
        test_app(&node),
        post_json("/api/zcash/wallet/newaccount", json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({
            "account": 4,
            "address": "u1newaccountaddress",
            "receiverTypes": ["p2pkh", "sapling", "orchard"]
        })
    );
    assert_eq!(node.calls_to("z_getaddressforaccount")[0].params, vec![json!(4)]);
}

#[tokio::test]
async fn send_to_address_requires_nonzero_amount() {
    let node = ScriptedTransport::new();

    let (status, body) = send(
        test_app(&node),
        post_json(
            "/api/zcash/transaction/send",
            json!({ "address": "t1bob", "amount": 0 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Address and amount are required");
}

#[tokio::test]
async fn operation_status_accepts_empty_body() {
    let node = ScriptedTransport::new().reply(
        "z_getoperationstatus",
        json!([operation_json("opid-1", "executing")]),
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/zcash/transaction/z_getoperationstatus")
        .header(HEADER_API_KEY, API_KEY)
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(test_app(&node), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["status"], "executing");
    assert!(node.calls_to("z_getoperationstatus")[0].params.is_empty());
}

#[tokio::test]
async fn operation_ids_must_be_an_array() {
    let node = ScriptedTransport::new();

    let (status, body) = send(
        test_app(&node),
        post_json(
            "/api/zcash/transaction/z_getoperationresult",
            json!({ "operationIds": "opid-1" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "operationIds must be an array");
}

#[tokio::test(start_paused = true)]
async fn wait_operation_returns_successful_operation() {
    let node = ScriptedTransport::new()
        .reply("z_getoperationstatus", json!([operation_json("opid-w", "executing")]))
        .reply(
            "z_getoperationstatus",
            json!([success_operation_json("opid-w", SAMPLE_TXID)]),
        );

    let (status, body) = send(
        test_app(&node),
        post_json(
            "/api/zcash/transaction/z_waitoperation",
            json!({ "operationId": "opid-w" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "success");
    assert_eq!(body["data"]["result"]["txid"], SAMPLE_TXID);
    assert_eq!(node.calls_to("z_getoperationstatus").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn wait_operation_maps_terminal_errors() {
    let cases = [
        (json!([]), StatusCode::NOT_FOUND, "OPERATION_NOT_FOUND"),
        (
            json!([operation_json("opid-w", "queued")]),
            StatusCode::GATEWAY_TIMEOUT,
            "OPERATION_TIMEOUT",
        ),
        (
            json!([failed_operation_json("opid-w", -6, "insufficient funds")]),
            StatusCode::BAD_GATEWAY,
            "OPERATION_FAILED",
        ),
    ];

    for (reply, expected_status, expected_code) in cases {
        let node = ScriptedTransport::new().reply("z_getoperationstatus", reply);
        let (status, body) = send(
            test_app(&node),
            post_json(
                "/api/zcash/transaction/z_waitoperation",
                json!({ "operationId": "opid-w", "maxAttempts": 2 }),
            ),
        )
        .await;

        assert_eq!(status, expected_status);
        assert_eq!(body["error_code"], expected_code);
    }
}

#[tokio::test]
async fn wait_operation_requires_id() {
    let node = ScriptedTransport::new();

    let (status, body) = send(
        test_app(&node),
        post_json("/api/zcash/transaction/z_waitoperation", json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "operationId is required");
}

#[tokio::test]
async fn wait_operation_rejects_pacing_outside_bounds() {
    let node = ScriptedTransport::new().reply(
        "z_getoperationstatus",
        json!([operation_json("opid-x", "executing")]),
    );

    for (request, message) in [
        (
            json!({ "operationId": "opid-x", "pollIntervalMs": 0, "maxAttempts": 5 }),
            "pollIntervalMs must be at least 100",
        ),
        (
            json!({ "operationId": "opid-x", "maxAttempts": 5000 }),
            "maxAttempts must be between 1 and 300",
        ),
        (
            json!({ "operationId": "opid-x", "maxAttempts": 0 }),
            "maxAttempts must be between 1 and 300",
        ),
    ] {
        let (status, body) = send(
            test_app(&node),
            post_json("/api/zcash/transaction/z_waitoperation", request),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "VALIDATION_ERROR");
        assert_eq!(body["error"], message);
    }
    assert_eq!(node.call_count(), 0);
}

#[tokio::test]
async fn unparseable_query_values_use_defaults() {
    let node = ScriptedTransport::new().reply("estimatefee", json!(0.0001));

    let (status, body) = send(test_app(&node), get("/api/zcash/fee/estimate?nblocks=soon")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "fee": 0.0001, "nblocks": 6 }));
    assert_eq!(node.calls_to("estimatefee")[0].params, vec![json!(6)]);
}

#[tokio::test]
async fn snapshot_without_monitor_is_unavailable() {
    let node = ScriptedTransport::new();

    let (status, body) = send(test_app(&node), get("/api/zcash/wallet/snapshot")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error_code"], "MONITOR_DISABLED");
}

#[tokio::test(start_paused = true)]
async fn snapshot_reports_monitor_state() {
    let node = ScriptedTransport::new()
        .reply("z_getbalanceforaccount", balance_json(0, 0, 7, 1))
        .reply("getblockcount", json!(100))
        .reply("getconnectioncount", json!(3));
    let handle = WalletMonitor::new(node.client(), 0, Duration::from_secs(30)).spawn();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let state = AppState::new(node.client(), PollConfig::default(), API_KEY).with_monitor(handle);
    let (status, body) = send(app_router(state), get("/api/zcash/wallet/snapshot")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["account"], 0);
    assert_eq!(body["data"]["block_height"], 100);
    assert_eq!(body["data"]["connections"], 3);
    assert_eq!(body["data"]["balance"]["pools"]["orchard"]["valueZat"], 7);
}
