//! 钱包 provider 接口（EIP-1193 `request({ method, params })`）
//!
//! 外部协作方：编排层只依赖 `WalletProvider` trait，
//! 错误以 `ProviderError` 原样向上传播。

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::WalletConfig;

/// EIP-1193: 用户拒绝请求
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-3326: 钱包未添加该链
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

// 部分钱包不返回 4902，只在消息里说明
static UNRECOGNIZED_CHAIN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(unrecognized chain|unknown chain|chain .*(has )?not been added|try adding the chain)")
        .expect("unrecognized chain pattern is valid")
});

/// provider 返回的错误（保留原始 code / message / data）
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ProviderError {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
            data: None,
        }
    }

    /// 无错误码的传输层错误
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            data: None,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == Some(USER_REJECTED_CODE)
    }

    /// 钱包不认识目标链（错误码 4902 或消息特征）
    pub fn is_unrecognized_chain(&self) -> bool {
        self.code == Some(UNRECOGNIZED_CHAIN_CODE)
            || UNRECOGNIZED_CHAIN_PATTERN.is_match(&self.message)
    }
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

// ============ HTTP JSON-RPC provider ============

/// 通过 HTTP JSON-RPC 暴露 EIP-1193 方法的钱包 / 开发节点
pub struct HttpWalletProvider {
    http_client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpWalletProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client: client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    /// 配置中没有 `rpc_url` 时返回 None
    pub fn from_config(config: &WalletConfig) -> Option<Self> {
        config
            .rpc_url
            .as_ref()
            .map(|url| Self::new(url.clone(), Duration::from_secs(config.timeout_secs)))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ProviderError>,
}

#[async_trait]
impl WalletProvider for HttpWalletProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        tracing::debug!(method, id, url = %self.url, "wallet rpc request");

        let response = self
            .http_client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::transport(format!("Failed to send {}: {}", method, e)))?;

        let body: JsonRpcResponse = response.json().await.map_err(|e| {
            ProviderError::transport(format!("Failed to parse {} response: {}", method, e))
        })?;

        if let Some(error) = body.error {
            tracing::debug!(method, code = ?error.code, "wallet rpc error: {}", error.message);
            return Err(error);
        }

        Ok(body.result.unwrap_or(Value::Null))
    }
}
