//! 聚合余额规范化
//!
//! 引擎返回的余额可能是数组、也可能是包着 `assets` 数组的对象，
//! 资产字段名也不统一。这里在边界处按显式 schema 解码，
//! 并补充链显示名与原生币信息。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::ChainRegistry,
    error::AppError,
    service::execution_engine::ExecutionEngine,
    utils::amount::ChainIdField,
};

pub const UNKNOWN_CHAIN_LABEL: &str = "Unknown Chain";

// ============ 边界 schema ============

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BalancePayload {
    Assets(Vec<Value>),
    Wrapped { assets: Vec<Value> },
}

#[derive(Debug, Clone, Deserialize)]
struct ChainObject {
    #[serde(default)]
    id: Option<ChainIdField>,
    #[serde(default, rename = "chainId")]
    chain_id: Option<ChainIdField>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ChainField {
    Id(ChainIdField),
    Object(ChainObject),
}

#[derive(Debug, Clone, Deserialize)]
struct NetworkObject {
    #[serde(default, rename = "chainId")]
    chain_id: Option<ChainIdField>,
    #[serde(default)]
    id: Option<ChainIdField>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TokenField {
    Symbol(String),
    Object {
        #[serde(default)]
        symbol: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AmountField {
    Number(serde_json::Number),
    Text(String),
}

impl AmountField {
    fn to_display(&self) -> String {
        match self {
            AmountField::Number(n) => n.to_string(),
            AmountField::Text(s) => s.clone(),
        }
    }
}

/// 引擎返回的单条资产（所有已知的字段别名）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAsset {
    symbol: Option<String>,
    token: Option<TokenField>,
    name: Option<String>,

    chain_id: Option<ChainIdField>,
    chain: Option<ChainField>,
    network: Option<NetworkObject>,
    destination_chain_id: Option<ChainIdField>,
    source_chain_id: Option<ChainIdField>,
    #[serde(rename = "chainID")]
    chain_id_upper: Option<ChainIdField>,

    balance: Option<AmountField>,
    formatted_balance: Option<AmountField>,
    amount: Option<AmountField>,
    value: Option<AmountField>,
    quantity: Option<AmountField>,

    balance_in_fiat: Option<AmountField>,
    #[serde(rename = "valueUSD")]
    value_usd: Option<AmountField>,
    usd_value: Option<AmountField>,

    breakdown: Option<Vec<Value>>,

    address: Option<String>,
    wallet_address: Option<String>,
    account: Option<String>,
    owner: Option<String>,
}

impl RawAsset {
    /// 规范链 ID：直接字段 → chain 对象 → network → 目标/源链
    fn canonical_chain_id(&self) -> Option<u64> {
        let chain = self.chain.as_ref().and_then(|c| match c {
            ChainField::Id(id) => id.resolve(),
            ChainField::Object(obj) => obj
                .id
                .as_ref()
                .and_then(ChainIdField::resolve)
                .or_else(|| obj.chain_id.as_ref().and_then(ChainIdField::resolve)),
        });
        let network = self.network.as_ref().and_then(|n| {
            n.chain_id
                .as_ref()
                .and_then(ChainIdField::resolve)
                .or_else(|| n.id.as_ref().and_then(ChainIdField::resolve))
        });

        self.chain_id
            .as_ref()
            .and_then(ChainIdField::resolve)
            .or(chain)
            .or(network)
            .or_else(|| self.destination_chain_id.as_ref().and_then(ChainIdField::resolve))
            .or_else(|| self.source_chain_id.as_ref().and_then(ChainIdField::resolve))
            .or_else(|| self.chain_id_upper.as_ref().and_then(ChainIdField::resolve))
    }

    /// 响应自带的链名称（`chain.name`）
    fn chain_name(&self) -> Option<String> {
        match self.chain.as_ref()? {
            ChainField::Object(obj) => obj.name.clone().filter(|n| !n.trim().is_empty()),
            ChainField::Id(_) => None,
        }
    }

    fn symbol(&self) -> Option<String> {
        let token = self.token.as_ref().and_then(|t| match t {
            TokenField::Symbol(s) => Some(s.clone()),
            TokenField::Object { symbol } => symbol.clone(),
        });
        self.symbol.clone().or(token).or_else(|| self.name.clone())
    }
}

// ============ 规范化结果 ============

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedAsset {
    pub symbol: Option<String>,
    pub chain_id: Option<u64>,
    /// 链显示名：注册表名称 → 响应中的 `chain.name` → `Chain {id}` → `Unknown Chain`
    pub chain_label: String,
    /// 原生币符号（仅已注册的链）
    pub native_currency: Option<String>,
    pub balance: Option<String>,
    pub fiat_value: Option<String>,
    pub wallet_address: Option<String>,
    pub breakdown: Vec<NormalizedAsset>,
}

pub struct BalanceNormalizer {
    chains: Arc<ChainRegistry>,
}

impl BalanceNormalizer {
    pub fn new(chains: Arc<ChainRegistry>) -> Self {
        Self { chains }
    }

    /// 查询聚合余额
    ///
    /// 引擎因返回格式异常抛出 “is not iterable” 时，
    /// 以 `include_swappable = false` 重试一次；仍失败则返回空列表。其他错误原样返回。
    pub async fn get_aggregated_balances(
        &self,
        engine: &dyn ExecutionEngine,
        include_swappable: bool,
    ) -> Result<Vec<NormalizedAsset>, AppError> {
        match engine.get_unified_balances(include_swappable).await {
            Ok(payload) => Ok(self.normalize_payload(payload)),
            Err(e) if e.is_malformed_payload() => {
                if !include_swappable {
                    tracing::warn!(error = %e, "malformed balance payload, returning empty balances");
                    return Ok(Vec::new());
                }

                tracing::warn!(error = %e, "malformed balance payload, retrying without swappable assets");
                match engine.get_unified_balances(false).await {
                    Ok(payload) => Ok(self.normalize_payload(payload)),
                    Err(e) if e.is_malformed_payload() => {
                        tracing::warn!(error = %e, "balance retry still malformed, returning empty balances");
                        Ok(Vec::new())
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 解码余额响应（数组或 `{ assets: [...] }`）
    pub fn normalize_payload(&self, payload: Value) -> Vec<NormalizedAsset> {
        let assets = match serde_json::from_value::<BalancePayload>(payload) {
            Ok(BalancePayload::Assets(assets)) => assets,
            Ok(BalancePayload::Wrapped { assets }) => assets,
            Err(e) => {
                tracing::warn!(error = %e, "unrecognized balance payload shape");
                return Vec::new();
            }
        };

        assets
            .into_iter()
            .filter_map(|value| self.decode_asset(value))
            .collect()
    }

    fn decode_asset(&self, value: Value) -> Option<NormalizedAsset> {
        if !value.is_object() {
            tracing::warn!(asset = %value, "skipping non-object balance entry");
            return None;
        }
        match serde_json::from_value::<RawAsset>(value) {
            Ok(raw) => Some(self.normalize_asset(raw)),
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable balance entry");
                None
            }
        }
    }

    fn normalize_asset(&self, raw: RawAsset) -> NormalizedAsset {
        let chain_id = raw.canonical_chain_id();
        let descriptor = chain_id.and_then(|id| self.chains.get(id));

        // 注册表名称优先，其次是响应中的链名称
        let chain_label = match (chain_id, descriptor, raw.chain_name()) {
            (Some(_), Some(descriptor), _) => descriptor.display_name.clone(),
            (_, _, Some(name)) => name,
            (Some(id), _, None) => format!("Chain {}", id),
            (None, _, None) => UNKNOWN_CHAIN_LABEL.to_string(),
        };

        let balance = raw
            .balance
            .as_ref()
            .or(raw.formatted_balance.as_ref())
            .or(raw.amount.as_ref())
            .or(raw.value.as_ref())
            .or(raw.quantity.as_ref())
            .map(AmountField::to_display);
        let fiat_value = raw
            .balance_in_fiat
            .as_ref()
            .or(raw.value_usd.as_ref())
            .or(raw.usd_value.as_ref())
            .map(AmountField::to_display);
        let wallet_address = raw
            .address
            .clone()
            .or_else(|| raw.wallet_address.clone())
            .or_else(|| raw.account.clone())
            .or_else(|| raw.owner.clone());
        let symbol = raw.symbol();

        let breakdown = raw
            .breakdown
            .unwrap_or_default()
            .into_iter()
            .filter_map(|value| self.decode_asset(value))
            .collect();

        NormalizedAsset {
            symbol,
            chain_id,
            chain_label,
            native_currency: descriptor.map(|d| d.native_symbol().to_string()),
            balance,
            fiat_value,
            wallet_address,
            breakdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn normalizer() -> BalanceNormalizer {
        BalanceNormalizer::new(Arc::new(ChainRegistry::new()))
    }

    #[test]
    fn test_array_and_wrapped_payloads() {
        let normalizer = normalizer();
        let array = normalizer.normalize_payload(json!([{ "symbol": "USDC", "chainId": 84532 }]));
        assert_eq!(array.len(), 1);
        assert_eq!(array[0].chain_label, "Base Sepolia");
        assert_eq!(array[0].native_currency.as_deref(), Some("ETH"));

        let wrapped = normalizer.normalize_payload(json!({
            "assets": [{ "symbol": "USDC", "chainId": "0xaa36a7" }],
            "total": "1.00"
        }));
        assert_eq!(wrapped.len(), 1);
        assert_eq!(wrapped[0].chain_id, Some(11155111));
    }

    #[test]
    fn test_unrecognized_payload_is_empty() {
        let normalizer = normalizer();
        assert!(normalizer.normalize_payload(json!({ "balances": [] })).is_empty());
        assert!(normalizer.normalize_payload(Value::Null).is_empty());
        assert!(normalizer.normalize_payload(json!("oops")).is_empty());
    }

    #[test]
    fn test_chain_id_field_aliases() {
        let normalizer = normalizer();
        let assets = normalizer.normalize_payload(json!([
            { "symbol": "A", "chain": { "id": 1 } },
            { "symbol": "B", "chain": 10 },
            { "symbol": "C", "network": { "chainId": "137" } },
            { "symbol": "D", "destinationChainId": 8453 },
            { "symbol": "E", "sourceChainId": 42161 },
            { "symbol": "F", "chainID": 56 },
            { "symbol": "G" },
            { "symbol": "H", "chainId": 999999 },
        ]));
        let ids: Vec<_> = assets.iter().map(|a| a.chain_id).collect();
        assert_eq!(
            ids,
            vec![
                Some(1),
                Some(10),
                Some(137),
                Some(8453),
                Some(42161),
                Some(56),
                None,
                Some(999999)
            ]
        );
        assert_eq!(assets[6].chain_label, UNKNOWN_CHAIN_LABEL);
        assert_eq!(assets[7].chain_label, "Chain 999999");
        assert!(assets[7].native_currency.is_none());
    }

    #[test]
    fn test_asset_fields() {
        let normalizer = normalizer();
        let assets = normalizer.normalize_payload(json!([{
            "token": { "symbol": "USDC" },
            "formattedBalance": "12.5",
            "valueUSD": 12.49,
            "walletAddress": "0xabc",
            "breakdown": [
                { "chainId": 11155111, "balance": "10" },
                { "chainId": 84532, "balance": 2.5 },
                "garbage"
            ]
        }]));
        let asset = &assets[0];
        assert_eq!(asset.symbol.as_deref(), Some("USDC"));
        assert_eq!(asset.balance.as_deref(), Some("12.5"));
        assert_eq!(asset.fiat_value.as_deref(), Some("12.49"));
        assert_eq!(asset.wallet_address.as_deref(), Some("0xabc"));
        assert_eq!(asset.breakdown.len(), 2);
        assert_eq!(asset.breakdown[1].chain_label, "Base Sepolia");
        assert_eq!(asset.breakdown[1].balance.as_deref(), Some("2.5"));
    }

    #[test]
    fn test_value_and_quantity_balances() {
        let normalizer = normalizer();
        let assets = normalizer.normalize_payload(json!([
            { "symbol": "USDC", "chainId": 84532, "value": "3.5" },
            { "symbol": "USDT", "chainId": 1, "quantity": 7 },
            { "symbol": "DAI", "chainId": 84532, "amount": "1", "value": "9" },
        ]));
        let balances: Vec<_> = assets.iter().map(|a| a.balance.as_deref()).collect();
        assert_eq!(balances, vec![Some("3.5"), Some("7"), Some("1")]);
    }

    #[test]
    fn test_breakdown_uses_payload_chain_name() {
        let normalizer = normalizer();
        let assets = normalizer.normalize_payload(json!([{
            "symbol": "USDC",
            "breakdown": [
                { "chain": { "id": 31337, "name": "Local Devnet" }, "balance": "1" },
                { "chain": { "name": "Mystery L2" }, "balance": "2" },
                { "chain": { "id": 84532, "name": "base-sepolia" }, "balance": "3" },
                { "chain": { "id": 31338 }, "balance": "4" },
            ]
        }]));
        let labels: Vec<_> = assets[0]
            .breakdown
            .iter()
            .map(|b| b.chain_label.as_str())
            .collect();
        assert_eq!(
            labels,
            vec!["Local Devnet", "Mystery L2", "Base Sepolia", "Chain 31338"]
        );
        assert_eq!(assets[0].breakdown[0].chain_id, Some(31337));
        assert!(assets[0].breakdown[0].native_currency.is_none());
    }

    #[test]
    fn test_non_object_entries_are_skipped() {
        let normalizer = normalizer();
        let assets = normalizer.normalize_payload(json!([1, ["USDC", 1], { "symbol": "DAI" }]));
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].symbol.as_deref(), Some("DAI"));
    }
}
