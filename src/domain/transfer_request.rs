//! 转账 / 桥接请求模型
//!
//! 每次用户操作创建一个请求，编排一次后即丢弃，不做持久化

use std::fmt;

use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::{domain::token_registry::TokenRegistry, error::AppError, utils::amount};

/// 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// 转给指定收款地址（可跨链）
    Transfer,
    /// 仅改变余额所在链
    Bridge,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Transfer => "transfer",
            OperationKind::Bridge => "bridge",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UI 协作方传入的原始参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferParams {
    pub from_chain_id: u64,
    pub to_chain_id: u64,
    /// 代币符号
    pub token: String,
    /// 最小单位金额
    pub amount: U256,
    #[serde(default)]
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub kind: OperationKind,
    pub source_chain_id: u64,
    pub destination_chain_id: u64,
    pub token_symbol: String,
    pub amount_minor_units: U256,
    pub recipient_address: Option<String>,
}

impl TransferRequest {
    pub fn new(kind: OperationKind, params: TransferParams) -> Self {
        Self {
            kind,
            source_chain_id: params.from_chain_id,
            destination_chain_id: params.to_chain_id,
            token_symbol: params.token,
            amount_minor_units: params.amount,
            // 空白地址视为未填写
            recipient_address: params
                .recipient
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        }
    }

    pub fn transfer(params: TransferParams) -> Self {
        Self::new(OperationKind::Transfer, params)
    }

    pub fn bridge(params: TransferParams) -> Self {
        Self::new(OperationKind::Bridge, params)
    }

    /// 由显示金额（如 "0.01"）构造请求，精度取源链上的代币元数据
    pub fn from_display_amount(
        kind: OperationKind,
        from_chain_id: u64,
        to_chain_id: u64,
        token: &str,
        display_amount: &str,
        recipient: Option<String>,
        tokens: &TokenRegistry,
    ) -> Result<Self, AppError> {
        let resolved = tokens
            .resolve_token(token, from_chain_id)
            .ok_or_else(|| AppError::token_unavailable(token, from_chain_id))?;
        let amount = amount::parse_display_amount(display_amount, resolved.decimals)?;

        Ok(Self::new(
            kind,
            TransferParams {
                from_chain_id,
                to_chain_id,
                token: resolved.symbol,
                amount,
                recipient,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_recipient_is_absent() {
        let request = TransferRequest::transfer(TransferParams {
            from_chain_id: 11155111,
            to_chain_id: 84532,
            token: "USDC".into(),
            amount: U256::from(10_000u64),
            recipient: Some("   ".into()),
        });
        assert!(request.recipient_address.is_none());
    }

    #[test]
    fn test_from_display_amount_uses_source_decimals() {
        let tokens = TokenRegistry::new();
        let request = TransferRequest::from_display_amount(
            OperationKind::Bridge,
            11155111,
            84532,
            "usdc",
            "0.01",
            None,
            &tokens,
        )
        .unwrap();
        assert_eq!(request.amount_minor_units, U256::from(10_000u64));
        assert_eq!(request.token_symbol, "USDC");

        let bsc = TransferRequest::from_display_amount(
            OperationKind::Transfer,
            56,
            56,
            "USDT",
            "1",
            None,
            &tokens,
        )
        .unwrap();
        assert_eq!(
            bsc.amount_minor_units,
            U256::from_dec_str("1000000000000000000").unwrap()
        );
    }

    #[test]
    fn test_from_display_amount_unknown_token() {
        let tokens = TokenRegistry::new();
        let err = TransferRequest::from_display_amount(
            OperationKind::Transfer,
            11155111,
            84532,
            "DAI",
            "1",
            None,
            &tokens,
        )
        .unwrap_err();
        assert!(err.message.contains("11155111"));
    }
}
