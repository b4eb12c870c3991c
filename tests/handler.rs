use std::sync::Arc;

use serde_json::{Value, json};
use zion_lib::handler::{Handler, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR};
use zion_sdk::testing::{MockUtxoSource, StaticPriceSource, TEST_MNEMONIC, explicit_utxo_for};
use zion_sdk::{Fee, MarketPolicy, Network, PriceSource, TradeConfig, TradeService, Wallet};

const QUOTE: &str = "0e99c1a6da379d1f4151fb9df90449d40d0608f6cb33a5bcbfc8c265f42bab0a";

fn handler(source: Arc<MockUtxoSource>) -> (Handler, String) {
    let network = Network::LiquidRegtest;
    let wallet = Wallet::from_mnemonic(TEST_MNEMONIC, network).unwrap();
    let base = network.policy_asset().to_string();
    let policy = MarketPolicy::new(&base, QUOTE, Fee::default()).unwrap();
    let prices: Arc<dyn PriceSource> = Arc::new(StaticPriceSource::new(0.5, 2.0));
    let service = TradeService::new(
        wallet,
        source,
        Some(prices),
        policy,
        TradeConfig::default(),
    )
    .unwrap();
    (Handler::new(Arc::new(service)), base)
}

async fn call(handler: &Handler, request: Value) -> Value {
    let line = handler.handle_line(&request.to_string()).await;
    serde_json::from_str(&line).unwrap()
}

#[tokio::test]
async fn lists_the_configured_market() {
    let (handler, base) = handler(Arc::new(MockUtxoSource::default()));
    let reply = call(&handler, json!({"id": 1, "method": "getTradableMarkets"})).await;
    assert_eq!(reply["id"], 1);
    let markets = reply["result"]["markets"].as_array().unwrap();
    assert_eq!(markets.len(), 1);
    assert_eq!(markets[0]["market"]["baseAsset"], base);
    assert_eq!(markets[0]["market"]["quoteAsset"], QUOTE);
    assert_eq!(markets[0]["fee"]["basisPoint"], 100);
    assert_eq!(markets[0]["fee"]["fixedBaseFee"], 650);
    assert_eq!(markets[0]["fee"]["fixedQuoteFee"], 4000);
}

#[tokio::test]
async fn balance_reports_both_sides() {
    let source = Arc::new(MockUtxoSource::default());
    let (handler, base) = handler(source.clone());
    let wallet = Wallet::from_mnemonic(TEST_MNEMONIC, Network::LiquidRegtest).unwrap();
    let base_id = Network::LiquidRegtest.policy_asset();
    source.push_utxo(explicit_utxo_for(base_id, 2_000, 0, wallet.receiving_script()));

    let reply = call(
        &handler,
        json!({"id": "b", "method": "getMarketBalance",
               "params": {"market": {"baseAsset": base, "quoteAsset": QUOTE}}}),
    )
    .await;
    assert_eq!(reply["result"]["balance"]["baseAmount"], 2_000);
    assert_eq!(reply["result"]["balance"]["quoteAmount"], 0);
    assert_eq!(reply["result"]["baseDetail"]["confirmed"], 2_000);
}

#[tokio::test]
async fn price_converts_quote_to_base() {
    let (handler, base) = handler(Arc::new(MockUtxoSource::default()));
    let reply = call(
        &handler,
        json!({"id": 3, "method": "getMarketPrice",
               "params": {"market": {"baseAsset": base, "quoteAsset": QUOTE},
                          "amount": 1001, "asset": QUOTE}}),
    )
    .await;
    assert_eq!(reply["result"]["amount"], 500);
    assert_eq!(reply["result"]["asset"], base);
    assert_eq!(reply["result"]["price"]["basePrice"], 0.5);
}

#[tokio::test]
async fn wrong_market_is_invalid_params_without_wallet_calls() {
    let source = Arc::new(MockUtxoSource::default());
    let (handler, base) = handler(source.clone());
    let reply = call(
        &handler,
        json!({"id": 4, "method": "proposeTrade", "params": {
            "market": {"baseAsset": base, "quoteAsset": "11".repeat(32)},
            "tradeType": 0,
            "swapRequest": {
                "id": "0011223344556677", "assetP": QUOTE, "amountP": 10,
                "assetR": base, "amountR": 10, "transaction": "cHNldP8B"
            }
        }}),
    )
    .await;
    assert_eq!(reply["error"]["code"], INVALID_PARAMS);
    assert!(reply.get("result").is_none());
    assert_eq!(source.fetch_calls(), 0);
}

#[tokio::test]
async fn empty_wallet_replies_with_fail_and_error() {
    let source = Arc::new(MockUtxoSource::default());
    let (handler, base) = handler(source.clone());
    let pset = zion_sdk::pset::encode_pset(&zion_sdk::testing::counterparty_pset(
        zion_sdk::pset::parse_asset_id(QUOTE).unwrap(),
        5_000,
        Network::LiquidRegtest.policy_asset(),
        1_000,
    ));
    let reply = call(
        &handler,
        json!({"id": 5, "method": "proposeTrade", "params": {
            "market": {"baseAsset": base, "quoteAsset": QUOTE},
            "tradeType": 1,
            "swapRequest": {
                "id": "0011223344556677", "assetP": QUOTE, "amountP": 5000,
                "assetR": base, "amountR": 1000, "transaction": pset,
                "inputBlindingKey": {}, "outputBlindingKey": {}
            }
        }}),
    )
    .await;
    let result = &reply["result"];
    assert!(result.get("swapAccept").is_none());
    assert_eq!(result["swapFail"]["messageId"], "0011223344556677");
    assert_eq!(
        result["swapFail"]["failureCode"],
        zion_sdk::error::failure_code::INSUFFICIENT_FUNDS
    );
    assert!(result["error"].as_str().unwrap().contains("insufficient funds"));
    assert_eq!(source.fetch_calls(), 1);
}

#[tokio::test]
async fn peer_fail_is_relayed() {
    let (handler, _) = handler(Arc::new(MockUtxoSource::default()));
    let reply = call(
        &handler,
        json!({"id": 6, "method": "completeTrade", "params": {
            "swapFail": {"id": "f1", "messageId": "a1", "failureMessage": "timeout"}
        }}),
    )
    .await;
    assert_eq!(reply["result"]["swapFail"]["messageId"], "a1");
    assert!(reply["result"].get("error").is_none());
    assert!(reply["result"].get("txid").is_none());
}

#[tokio::test]
async fn complete_needs_exactly_one_message() {
    let (handler, _) = handler(Arc::new(MockUtxoSource::default()));
    let reply = call(&handler, json!({"id": 7, "method": "completeTrade", "params": {}})).await;
    assert_eq!(reply["error"]["code"], INVALID_PARAMS);
}

#[tokio::test]
async fn protocol_errors() {
    let (handler, _) = handler(Arc::new(MockUtxoSource::default()));
    let reply: Value = serde_json::from_str(&handler.handle_line("{not json").await).unwrap();
    assert_eq!(reply["error"]["code"], PARSE_ERROR);
    assert_eq!(reply["id"], Value::Null);

    let reply = call(&handler, json!({"id": 8, "method": "sendToAddress"})).await;
    assert_eq!(reply["error"]["code"], METHOD_NOT_FOUND);

    let reply = call(
        &handler,
        json!({"id": 9, "method": "getMarketBalance", "params": {"market": 1}}),
    )
    .await;
    assert_eq!(reply["error"]["code"], INVALID_PARAMS);
}

#[tokio::test]
async fn serve_answers_every_line() {
    let (handler, _) = handler(Arc::new(MockUtxoSource::default()));
    let input = concat!(
        r#"{"id":1,"method":"getTradableMarkets"}"#,
        "\n\n",
        r#"{"id":2,"method":"nope"}"#,
        "\n"
    );
    let (client, server) = tokio::io::duplex(64 * 1024);
    zion_lib::serve(handler, input.as_bytes(), server).await.unwrap();

    use tokio::io::AsyncReadExt;
    let mut client = client;
    let mut out = String::new();
    client.read_to_string(&mut out).await.unwrap();
    let mut ids: Vec<i64> = out
        .lines()
        .map(|l| serde_json::from_str::<Value>(l).unwrap()["id"].as_i64().unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2]);
}
