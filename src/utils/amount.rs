//! 金额与链 ID 格式转换
//!
//! 最小单位 <-> 显示金额，链 ID <-> `0x` 十六进制字符串

use ethers::{
    types::U256,
    utils::{format_units, parse_units},
};
use serde::Deserialize;

use crate::error::AppError;

/// 最小单位转显示金额（去掉多余的尾随 0）
///
/// # 示例
/// ```rust
/// # use ethers::types::U256;
/// # use ironbridge::utils::amount::format_minor_units;
/// assert_eq!(format_minor_units(U256::from(10_000u64), 6).unwrap(), "0.01");
/// ```
pub fn format_minor_units(amount: U256, decimals: u8) -> Result<String, AppError> {
    let formatted = format_units(amount, decimals as u32)
        .map_err(|e| AppError::invalid_amount(format!("cannot format amount: {}", e)))?;
    Ok(trim_fraction(&formatted))
}

/// 显示金额转最小单位
pub fn parse_display_amount(value: &str, decimals: u8) -> Result<U256, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::invalid_amount("amount is required"));
    }
    if value.starts_with('-') {
        return Err(AppError::invalid_amount(format!(
            "amount must not be negative: {}",
            value
        )));
    }
    if let Some((_, fraction)) = value.split_once('.') {
        if fraction.len() > decimals as usize {
            return Err(AppError::invalid_amount(format!(
                "amount {} has more than {} decimal places",
                value, decimals
            )));
        }
    }

    let parsed = parse_units(value, decimals as u32)
        .map_err(|e| AppError::invalid_amount(format!("invalid amount '{}': {}", value, e)))?;
    Ok(parsed.into())
}

fn trim_fraction(formatted: &str) -> String {
    if !formatted.contains('.') {
        return formatted.to_string();
    }
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// 链 ID 转钱包使用的 `0x` 十六进制字符串
pub fn to_hex_chain_id(chain_id: u64) -> String {
    format!("0x{:x}", chain_id)
}

/// 解析链 ID（支持 `0x` 十六进制与十进制）
pub fn parse_chain_id(value: &str) -> Option<u64> {
    let value = value.trim();
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

/// 外部响应中的链 ID：数字，或十进制 / `0x` 十六进制字符串
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ChainIdField {
    Number(u64),
    Text(String),
}

impl ChainIdField {
    pub fn resolve(&self) -> Option<u64> {
        match self {
            ChainIdField::Number(id) => Some(*id),
            ChainIdField::Text(text) => parse_chain_id(text),
        }
    }
}
