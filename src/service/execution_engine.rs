//! 执行引擎接口
//!
//! 外部协作方：每个环境（mainnet / testnet）一个实例，负责真正的签名、
//! 提交与跨链结算。编排层只通过 `ExecutionEngine` trait 与之交互。

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    domain::{Environment, OperationKind, ProgressEvent, ProgressStateMachine, ProgressStatus},
    infrastructure::{event_bus::ProgressEventBus, wallet_provider::{ProviderError, WalletProvider}},
    service::approval_hooks::ConfirmationGate,
};

// 余额聚合在返回格式异常时抛出的 TypeError 特征
static NOT_ITERABLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)is not iterable").expect("not iterable pattern is valid"));

/// 引擎错误（保留引擎原始消息）
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("TypeError: {0}")]
    TypeError(String),

    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl EngineError {
    /// 格式异常的余额响应（可降级重试）
    pub fn is_malformed_payload(&self) -> bool {
        matches!(self, EngineError::TypeError(msg) if NOT_ITERABLE_PATTERN.is_match(msg))
    }
}

/// 交给引擎的操作参数（金额已转换为显示金额）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionParams {
    pub from_chain_id: u64,
    pub to_chain_id: u64,
    pub token: String,
    /// 源链代币合约地址
    pub token_address: String,
    pub decimals: u8,
    pub amount: String,
    #[serde(default)]
    pub recipient: Option<String>,
}

/// 单次操作的执行上下文
pub struct ExecutionContext {
    pub gate: ConfirmationGate,
    pub progress: Arc<OperationProgress>,
}

#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    fn environment(&self) -> Environment;

    async fn initialize(&self, provider: Arc<dyn WalletProvider>) -> Result<(), EngineError>;

    fn is_initialized(&self) -> bool;

    async fn deinit(&self);

    /// 聚合余额（原始响应，由 `BalanceNormalizer` 解码）
    async fn get_unified_balances(&self, include_swappable: bool) -> Result<Value, EngineError>;

    /// 转给收款地址（可跨链）
    async fn transfer(
        &self,
        params: &ExecutionParams,
        ctx: &ExecutionContext,
    ) -> Result<Value, EngineError>;

    /// 跨链并转给收款地址
    async fn bridge_and_transfer(
        &self,
        params: &ExecutionParams,
        ctx: &ExecutionContext,
    ) -> Result<Value, EngineError>;

    /// 同环境内移动余额
    async fn bridge(&self, params: &ExecutionParams, ctx: &ExecutionContext)
        -> Result<Value, EngineError>;
}

/// 按环境创建引擎实例
pub trait EngineFactory: Send + Sync {
    fn create(&self, environment: Environment) -> Arc<dyn ExecutionEngine>;
}

impl<F> EngineFactory for F
where
    F: Fn(Environment) -> Arc<dyn ExecutionEngine> + Send + Sync,
{
    fn create(&self, environment: Environment) -> Arc<dyn ExecutionEngine> {
        self(environment)
    }
}

// ============ 操作进度 ============

/// 单次操作的进度句柄
///
/// 中间状态（submitted / proving / finalizing）可由引擎上报，终态由编排层通过
/// `finish` 上报且只上报一次，两者都按状态机校验。
pub struct OperationProgress {
    bus: Arc<ProgressEventBus>,
    operation_id: Uuid,
    kind: OperationKind,
    recipient: Option<String>,
    status: Mutex<Option<ProgressStatus>>,
}

impl OperationProgress {
    pub fn new(bus: Arc<ProgressEventBus>, kind: OperationKind, recipient: Option<String>) -> Self {
        Self {
            bus,
            operation_id: Uuid::new_v4(),
            kind,
            recipient,
            status: Mutex::new(None),
        }
    }

    pub fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn current_status(&self) -> Option<ProgressStatus> {
        match self.status.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// 上报非终态；非法转换会被忽略并返回 false
    pub fn report(
        &self,
        status: ProgressStatus,
        chain_id: Option<u64>,
        transaction_hash: Option<String>,
        message: Option<String>,
    ) -> bool {
        if status.is_terminal() {
            tracing::warn!(
                operation_id = %self.operation_id,
                status = status.as_str(),
                "terminal status can only be reported on finish"
            );
            return false;
        }
        self.emit(status, chain_id, transaction_hash, message, |from| match from {
            None => status == ProgressStatus::Pending,
            Some(from) => ProgressStateMachine::can_transition(from, status),
        })
    }

    /// 上报终态（completed / failed）
    pub fn finish(
        &self,
        status: ProgressStatus,
        chain_id: Option<u64>,
        transaction_hash: Option<String>,
        message: Option<String>,
    ) -> bool {
        if !status.is_terminal() {
            return false;
        }
        // proving 之后必须先经过 finalizing 才能完成
        if status == ProgressStatus::Completed
            && self.current_status() == Some(ProgressStatus::Proving)
        {
            self.emit(ProgressStatus::Finalizing, chain_id, None, None, |from| {
                from == Some(ProgressStatus::Proving)
            });
        }
        // 未进入 pending 的操作（校验失败）只能直接失败
        self.emit(status, chain_id, transaction_hash, message, |from| match from {
            None => status == ProgressStatus::Failed,
            Some(from) => ProgressStateMachine::can_transition(from, status),
        })
    }

    fn emit(
        &self,
        status: ProgressStatus,
        chain_id: Option<u64>,
        transaction_hash: Option<String>,
        message: Option<String>,
        allowed: impl FnOnce(Option<ProgressStatus>) -> bool,
    ) -> bool {
        {
            let mut current = match self.status.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if !allowed(*current) {
                tracing::warn!(
                    operation_id = %self.operation_id,
                    from = ?current.map(|s| s.as_str()),
                    to = status.as_str(),
                    "ignoring invalid progress transition"
                );
                return false;
            }
            *current = Some(status);
        }

        let mut event = ProgressEvent::new(self.operation_id, self.kind.as_str(), status)
            .with_recipient(self.recipient.clone());
        if let Some(chain_id) = chain_id {
            event = event.with_chain(chain_id);
        }
        if let Some(hash) = transaction_hash {
            event = event.with_transaction_hash(hash);
        }
        if let Some(message) = message {
            event = event.with_message(message);
        }

        tracing::debug!(
            operation_id = %self.operation_id,
            operation = self.kind.as_str(),
            status = status.as_str(),
            "progress"
        );
        self.bus.publish(&event);
        true
    }
}
