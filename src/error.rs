//! 统一错误类型
//!
//! 编排层所有失败都归入四类：校验、钱包交互、执行、响应格式异常。
//! 外部协作方（钱包 provider、执行引擎）的错误在边界处保持原样，
//! 进入编排层后转换为 `AppError`。

use thiserror::Error;

use crate::{infrastructure::wallet_provider::ProviderError, service::execution_engine::EngineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorCode {
    // 校验错误
    RecipientRequired,
    InvalidAddress,
    InvalidAmount,
    TokenUnavailable,
    CrossEnvironmentBridge,
    SameChainBridge,

    // 钱包交互错误
    WalletRequestFailed,
    UserRejected,

    // 执行错误
    ExecutionFailed,
    NoConfirmationData,

    // 响应格式异常
    MalformedResponse,

    // 生命周期
    Uninitialized,
    ProviderMissing,

    // 配置
    Configuration,
}

/// 错误分类（调用方据此决定是否重试、是否展示给用户）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    WalletInteraction,
    Execution,
    MalformedResponse,
    Lifecycle,
    Configuration,
}

impl AppErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppErrorCode::RecipientRequired => "recipient_required",
            AppErrorCode::InvalidAddress => "invalid_address",
            AppErrorCode::InvalidAmount => "invalid_amount",
            AppErrorCode::TokenUnavailable => "token_unavailable",
            AppErrorCode::CrossEnvironmentBridge => "cross_environment_bridge",
            AppErrorCode::SameChainBridge => "same_chain_bridge",
            AppErrorCode::WalletRequestFailed => "wallet_request_failed",
            AppErrorCode::UserRejected => "user_rejected",
            AppErrorCode::ExecutionFailed => "execution_failed",
            AppErrorCode::NoConfirmationData => "no_confirmation_data",
            AppErrorCode::MalformedResponse => "malformed_response",
            AppErrorCode::Uninitialized => "uninitialized",
            AppErrorCode::ProviderMissing => "provider_missing",
            AppErrorCode::Configuration => "configuration",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppErrorCode::RecipientRequired
            | AppErrorCode::InvalidAddress
            | AppErrorCode::InvalidAmount
            | AppErrorCode::TokenUnavailable
            | AppErrorCode::CrossEnvironmentBridge
            | AppErrorCode::SameChainBridge => ErrorCategory::Validation,
            AppErrorCode::WalletRequestFailed | AppErrorCode::UserRejected => {
                ErrorCategory::WalletInteraction
            }
            AppErrorCode::ExecutionFailed | AppErrorCode::NoConfirmationData => {
                ErrorCategory::Execution
            }
            AppErrorCode::MalformedResponse => ErrorCategory::MalformedResponse,
            AppErrorCode::Uninitialized | AppErrorCode::ProviderMissing => ErrorCategory::Lifecycle,
            AppErrorCode::Configuration => ErrorCategory::Configuration,
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    /// 钱包 provider 返回的原始错误码（如 4001 用户拒绝、4902 未知链）
    pub rpc_code: Option<i64>,
}

impl AppError {
    pub fn new(code: AppErrorCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            rpc_code: None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    // 校验错误辅助函数
    pub fn recipient_required() -> Self {
        Self::new(
            AppErrorCode::RecipientRequired,
            "recipient required: destination address is required for transfers",
        )
    }

    pub fn invalid_address(address: &str) -> Self {
        Self::new(
            AppErrorCode::InvalidAddress,
            format!("destination address is invalid: {}", address),
        )
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::InvalidAmount, msg)
    }

    pub fn token_unavailable(symbol: &str, chain_id: u64) -> Self {
        Self::new(
            AppErrorCode::TokenUnavailable,
            format!("token {} unavailable on chain {}", symbol, chain_id),
        )
    }

    pub fn cross_environment_bridge(from_chain_id: u64, to_chain_id: u64) -> Self {
        Self::new(
            AppErrorCode::CrossEnvironmentBridge,
            format!(
                "cross-environment bridging not supported ({} -> {}); only mainnet<->mainnet or testnet<->testnet",
                from_chain_id, to_chain_id
            ),
        )
    }

    pub fn same_chain_bridge(chain_id: u64) -> Self {
        Self::new(
            AppErrorCode::SameChainBridge,
            format!(
                "source and destination chains must differ for bridge (chain {})",
                chain_id
            ),
        )
    }

    // 生命周期
    pub fn uninitialized(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Uninitialized, msg)
    }

    pub fn provider_missing() -> Self {
        Self::new(
            AppErrorCode::ProviderMissing,
            "No EIP-1193 provider (e.g., MetaMask) found",
        )
    }

    // 执行
    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::ExecutionFailed, msg)
    }

    pub fn no_confirmation_data() -> Self {
        Self::new(AppErrorCode::NoConfirmationData, "no confirmation data returned")
    }

    pub fn user_rejected(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::UserRejected, msg)
    }

    pub fn malformed_response(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::MalformedResponse, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Configuration, msg)
    }
}

// 钱包 provider 错误：保留原始消息与错误码
impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        let code = if err.is_user_rejection() {
            AppErrorCode::UserRejected
        } else {
            AppErrorCode::WalletRequestFailed
        };
        Self {
            code,
            message: err.message,
            rpc_code: err.code,
        }
    }
}

// 执行引擎错误
impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Provider(provider_err) => provider_err.into(),
            EngineError::Rejected(msg) => Self::user_rejected(msg),
            EngineError::TypeError(msg) => Self::execution_failed(format!("TypeError: {}", msg)),
            EngineError::Failed(msg) => Self::execution_failed(msg),
        }
    }
}
