//! 聚合余额降级重试测试

mod common;

use std::sync::Arc;

use common::{MockEngine, MockWalletProvider, TestHarness};
use ironbridge::{
    domain::{ChainRegistry, Environment},
    service::{balance_normalizer::BalanceNormalizer, execution_engine::EngineError},
    AppErrorCode, BalanceOptions,
};
use serde_json::json;

fn normalizer() -> BalanceNormalizer {
    BalanceNormalizer::new(Arc::new(ChainRegistry::new()))
}

fn not_iterable() -> EngineError {
    EngineError::TypeError("balances is not iterable".to_string())
}

#[tokio::test]
async fn test_malformed_payload_retries_without_swappable() {
    let engine = MockEngine::new(Environment::Testnet);
    engine.push_balance_response(Err(not_iterable()));
    engine.push_balance_response(Ok(json!([
        { "symbol": "USDC", "chainId": 84532, "balance": "1.5" },
        { "symbol": "ETH", "chain": { "id": 11155111 }, "balance": "0.2" }
    ])));

    let assets = normalizer()
        .get_aggregated_balances(&engine, true)
        .await
        .unwrap();

    assert_eq!(engine.balance_flags(), vec![true, false]);
    assert_eq!(assets.len(), 2);
    assert_eq!(assets[0].chain_label, "Base Sepolia");
    assert_eq!(assets[1].chain_label, "Sepolia");
}

#[tokio::test]
async fn test_retry_still_malformed_returns_empty() {
    let engine = MockEngine::new(Environment::Testnet);
    engine.push_balance_response(Err(not_iterable()));
    engine.push_balance_response(Err(not_iterable()));

    let assets = normalizer()
        .get_aggregated_balances(&engine, true)
        .await
        .unwrap();

    assert!(assets.is_empty());
    assert_eq!(engine.balance_flags(), vec![true, false]);
}

#[tokio::test]
async fn test_malformed_without_swappable_is_not_retried() {
    let engine = MockEngine::new(Environment::Testnet);
    engine.push_balance_response(Err(not_iterable()));

    let assets = normalizer()
        .get_aggregated_balances(&engine, false)
        .await
        .unwrap();

    assert!(assets.is_empty());
    assert_eq!(engine.balance_flags(), vec![false]);
}

#[tokio::test]
async fn test_other_errors_propagate() {
    let engine = MockEngine::new(Environment::Testnet);
    engine.push_balance_response(Err(EngineError::Failed("rpc unavailable".to_string())));

    let err = normalizer()
        .get_aggregated_balances(&engine, true)
        .await
        .unwrap_err();

    assert_eq!(err.code, AppErrorCode::ExecutionFailed);
    assert_eq!(err.message, "rpc unavailable");
    assert_eq!(engine.balance_flags(), vec![true]);

    let engine = MockEngine::new(Environment::Testnet);
    engine.push_balance_response(Err(EngineError::TypeError(
        "cannot read properties of undefined".to_string(),
    )));
    assert!(normalizer()
        .get_aggregated_balances(&engine, true)
        .await
        .is_err());
    assert_eq!(engine.balance_flags(), vec![true]);
}

#[tokio::test]
async fn test_wrapped_payload() {
    let engine = MockEngine::new(Environment::Mainnet);
    engine.push_balance_response(Ok(json!({
        "assets": [{ "symbol": "USDT", "chainId": 56, "balanceInFiat": 3.2 }]
    })));

    let assets = normalizer()
        .get_aggregated_balances(&engine, true)
        .await
        .unwrap();

    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].chain_label, "BNB Smart Chain");
    assert_eq!(assets[0].native_currency.as_deref(), Some("BNB"));
    assert_eq!(assets[0].fiat_value.as_deref(), Some("3.2"));
}

#[tokio::test]
async fn test_app_state_balances_use_session_environment() {
    let harness =
        TestHarness::initialized(Environment::Testnet, MockWalletProvider::new(1, &[])).await;
    let engine = harness.engine(Environment::Testnet);
    engine.push_balance_response(Err(not_iterable()));
    engine.push_balance_response(Ok(json!([{ "symbol": "USDC", "chainId": "0x14a34" }])));

    let assets = harness
        .state
        .get_unified_balances(BalanceOptions::default())
        .await
        .unwrap();

    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].chain_id, Some(84532));
    assert_eq!(engine.balance_flags(), vec![true, false]);
}

#[tokio::test]
async fn test_app_state_balances_require_session() {
    let harness = TestHarness::new(Environment::Testnet, MockWalletProvider::new(1, &[]));
    let err = harness
        .state
        .get_unified_balances(BalanceOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code, AppErrorCode::Uninitialized);
}
