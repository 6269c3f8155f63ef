mod common;

use common::{
    ack, dispatcher, error_envelope, ok_envelope, public_config, setup_mock_server, signed_config,
};
use okx_rest::okx::{acks_from_error, OkxCancelRequest, OkxOrderRequest, MAX_BATCH_SIZE};
use okx_rest::{ApiErrorKind, CallContext, Dispatch, OkxError, OkxRest};
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn market_buy(inst_id: &str) -> OkxOrderRequest {
    OkxOrderRequest {
        inst_id: inst_id.to_string(),
        td_mode: "cash".to_string(),
        side: "buy".to_string(),
        ord_type: "market".to_string(),
        sz: "100".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_get_system_time() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v5/public/time"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ok_envelope(json!([{ "ts": "1597026383085" }]))),
        )
        .mount(&server)
        .await;

    let okx = OkxRest::new(dispatcher(public_config(&server), 0));
    let ts = assert_ok!(okx.get_system_time(&CallContext::new()).await);
    assert_eq!(ts, 1_597_026_383_085);
}

#[tokio::test]
async fn test_get_system_time_rejects_empty_data() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v5/public/time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([]))))
        .mount(&server)
        .await;

    let okx = OkxRest::new(dispatcher(public_config(&server), 0));
    let err = okx.get_system_time(&CallContext::new()).await.unwrap_err();
    assert_eq!(err.api().map(|api| api.kind.clone()), Some(ApiErrorKind::EmptyData));
}

#[tokio::test]
async fn test_get_system_time_rejects_bad_timestamp() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v5/public/time"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-request-id", "req-ts")
                .set_body_json(ok_envelope(json!([{ "ts": "soon" }]))),
        )
        .mount(&server)
        .await;

    let okx = OkxRest::new(dispatcher(public_config(&server), 0));
    let err = okx.get_system_time(&CallContext::new()).await.unwrap_err();
    let OkxError::Decode {
        method,
        path,
        request_id,
        ..
    } = &err
    else {
        panic!("expected decode error, got {err:?}");
    };
    assert_eq!(method, "GET");
    assert_eq!(path, "/api/v5/public/time");
    assert_eq!(request_id.as_deref(), Some("req-ts"));
}

#[tokio::test]
async fn test_get_instruments_allows_empty_list() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v5/public/instruments"))
        .and(query_param("instType", "OPTION"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let okx = OkxRest::new(dispatcher(public_config(&server), 0));
    let instruments = assert_ok!(okx.get_instruments(&CallContext::new(), "OPTION").await);
    assert!(instruments.is_empty());
}

#[tokio::test]
async fn test_get_instruments() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v5/public/instruments"))
        .and(query_param("instType", "SPOT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([{
            "instType": "SPOT",
            "instId": "BTC-USDT",
            "baseCcy": "BTC",
            "quoteCcy": "USDT",
            "tickSz": "0.1",
            "lotSz": "0.00000001",
            "minSz": "0.00001",
            "state": "live"
        }]))))
        .mount(&server)
        .await;

    let okx = OkxRest::new(dispatcher(public_config(&server), 0));
    let instruments = assert_ok!(okx.get_instruments(&CallContext::new(), "SPOT").await);
    assert_eq!(instruments.len(), 1);
    assert_eq!(instruments[0].inst_id, "BTC-USDT");
    assert_eq!(instruments[0].tick_sz, "0.1");
    assert_eq!(instruments[0].settle_ccy, None);
}

#[tokio::test]
async fn test_get_ticker() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v5/market/ticker"))
        .and(query_param("instId", "BTC-USDT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([{
            "instType": "SPOT",
            "instId": "BTC-USDT",
            "last": "43000.1",
            "askPx": "43000.2",
            "bidPx": "43000.0",
            "open24h": "42000",
            "ts": "1597026383085"
        }]))))
        .mount(&server)
        .await;

    let okx = OkxRest::new(dispatcher(public_config(&server), 0));
    let ticker = assert_ok!(okx.get_ticker(&CallContext::new(), "BTC-USDT").await);
    assert_eq!(ticker.last, "43000.1");
    assert_eq!(ticker.open_24h, "42000");
}

#[tokio::test]
async fn test_get_order_book_sbe() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v5/market/books-sbe"))
        .and(query_param("instId", "BTC-USDT"))
        .and(query_param("sz", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![7u8, 8, 9], "application/sbe"))
        .mount(&server)
        .await;

    let okx = OkxRest::new(dispatcher(public_config(&server), 0));
    let frame = assert_ok!(
        okx.get_order_book_sbe(&CallContext::new(), "BTC-USDT", Some(5))
            .await
    );
    assert_eq!(frame, vec![7, 8, 9]);
}

#[tokio::test]
async fn test_get_balance_requires_credentials() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([]))))
        .expect(0)
        .mount(&server)
        .await;

    let okx = OkxRest::new(dispatcher(public_config(&server), 0));
    let err = okx
        .get_balance(&CallContext::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, OkxError::MissingCredentials { .. }));
}

#[tokio::test]
async fn test_get_balance() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v5/account/balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([{
            "totalEq": "1000.5",
            "uTime": "1597026383085",
            "details": [{ "ccy": "USDT", "eq": "1000.5", "availBal": "900", "frozenBal": "100.5" }]
        }]))))
        .mount(&server)
        .await;

    let okx = OkxRest::new(dispatcher(signed_config(&server), 0));
    let account = assert_ok!(okx.get_balance(&CallContext::new(), Some("USDT")).await);
    assert_eq!(account.total_eq, "1000.5");
    assert_eq!(account.details.len(), 1);
    assert_eq!(account.details[0].ccy, "USDT");
}

#[tokio::test]
async fn test_place_order_validates_before_sending() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([]))))
        .expect(0)
        .mount(&server)
        .await;

    let okx = OkxRest::new(dispatcher(signed_config(&server), 0));
    let mut order = market_buy("BTC-USDT");
    order.sz.clear();
    let err = okx
        .place_order(&CallContext::new(), &order)
        .await
        .unwrap_err();

    let OkxError::Validation(validation) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(validation.missing, vec!["sz"]);
}

#[tokio::test]
async fn test_place_order() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/api/v5/trade/order"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(ok_envelope(json!([ack("312269865356374016", "0", "")]))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let okx = OkxRest::new(dispatcher(signed_config(&server), 0));
    let placed = assert_ok!(okx.place_order(&CallContext::new(), &market_buy("BTC-USDT")).await);
    assert_eq!(placed.ord_id, "312269865356374016");
    assert_eq!(placed.s_code, "0");
}

#[tokio::test]
async fn test_place_order_rejected_item() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/api/v5/trade/order"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "1",
            "msg": "Operation failed.",
            "data": [ack("", "51008", "Order failed. Insufficient balance")]
        })))
        .mount(&server)
        .await;

    let okx = OkxRest::new(dispatcher(signed_config(&server), 0));
    let err = okx
        .place_order(&CallContext::new(), &market_buy("BTC-USDT"))
        .await
        .unwrap_err();

    let api = err.api().expect("api error");
    assert_eq!(api.failed_indices(), vec![0]);
    assert_eq!(err.stats_code(), "1");
}

#[tokio::test]
async fn test_place_batch_orders_partial_failure_keeps_every_ack() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/api/v5/trade/batch-orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "2",
            "msg": "",
            "data": [
                ack("1001", "0", ""),
                ack("", "51008", "Insufficient balance"),
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let okx = OkxRest::new(dispatcher(signed_config(&server), 3));
    let orders = [market_buy("BTC-USDT"), market_buy("ETH-USDT")];
    let err = okx
        .place_batch_orders(&CallContext::new(), &orders)
        .await
        .unwrap_err();

    let api = err.api().expect("api error");
    let ApiErrorKind::PartialFailure { failures } = &api.kind else {
        panic!("expected partial failure, got {:?}", api.kind);
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].index, 1);
    assert_eq!(failures[0].code, "51008");

    let acks = acks_from_error(&err).expect("acks");
    assert_eq!(acks.len(), 2);
    assert_eq!(acks[0].ord_id, "1001");
    assert_eq!(acks[1].s_msg, "Insufficient balance");
    assert_eq!(okx.dispatcher().stats().retry_total, 0);
}

#[tokio::test]
async fn test_place_batch_orders_rejects_oversized_batch() {
    let server = setup_mock_server().await;
    let okx = OkxRest::new(dispatcher(signed_config(&server), 0));
    let orders = vec![market_buy("BTC-USDT"); MAX_BATCH_SIZE + 1];

    let err = okx
        .place_batch_orders(&CallContext::new(), &orders)
        .await
        .unwrap_err();
    assert!(matches!(err, OkxError::Validation(_)));

    let err = okx
        .place_batch_orders(&CallContext::new(), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, OkxError::Validation(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_batch_orders() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/api/v5/trade/cancel-batch-orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope(json!([
            ack("1001", "0", ""),
            ack("1002", "0", ""),
        ]))))
        .expect(1)
        .mount(&server)
        .await;

    let okx = OkxRest::new(dispatcher(signed_config(&server), 0));
    let cancels = ["1001", "1002"].map(|id| OkxCancelRequest {
        inst_id: "BTC-USDT".to_string(),
        ord_id: Some(id.to_string()),
        cl_ord_id: None,
    });
    let acks = assert_ok!(okx.cancel_batch_orders(&CallContext::new(), &cancels).await);
    assert_eq!(acks.len(), 2);
    assert_eq!(acks[1].ord_id, "1002");
}

#[tokio::test]
async fn test_cancel_batch_orders_missing_ack() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/api/v5/trade/cancel-batch-orders"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(ok_envelope(json!([ack("1001", "0", "")]))),
        )
        .mount(&server)
        .await;

    let okx = OkxRest::new(dispatcher(signed_config(&server), 0));
    let cancels = ["1001", "1002"].map(|id| OkxCancelRequest {
        inst_id: "BTC-USDT".to_string(),
        ord_id: Some(id.to_string()),
        cl_ord_id: None,
    });
    let err = okx
        .cancel_batch_orders(&CallContext::new(), &cancels)
        .await
        .unwrap_err();
    assert_eq!(
        err.api().map(|api| api.kind.clone()),
        Some(ApiErrorKind::CardinalityMismatch {
            expected: 2,
            got: 1
        })
    );
    assert!(err.to_string().contains("expected 2 acks, got 1"));
}

#[tokio::test]
async fn test_business_error_on_public_endpoint() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v5/market/ticker"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(error_envelope("51001", "Instrument ID does not exist")),
        )
        .mount(&server)
        .await;

    let okx = OkxRest::new(dispatcher(public_config(&server), 0));
    let err = okx
        .get_ticker(&CallContext::new(), "NOPE-USDT")
        .await
        .unwrap_err();
    assert_eq!(err.stats_code(), "51001");
    assert_eq!(
        okx.dispatcher().stats().error_code_counts.get("51001"),
        Some(&1)
    );
}
