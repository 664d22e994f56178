//! 转账 / 桥接编排
//!
//! 校验 → 切换钱包网络 → 选择执行客户端 → 金额转换 → 调用引擎 → 解读结果，
//! 每一步的结果通过进度事件总线推送。

use std::{str::FromStr, sync::Arc};

use ethers::types::Address;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    domain::{
        ChainRegistry, OperationKind, ProgressStatus, ResolvedToken, TokenRegistry,
        TransferParams, TransferRequest,
    },
    error::AppError,
    infrastructure::event_bus::ProgressEventBus,
    service::{
        approval_hooks::ApprovalRegistry,
        client_selector::ExecutionClientSelector,
        execution_engine::{ExecutionContext, ExecutionParams, OperationProgress},
        wallet_network::WalletNetworkController,
    },
    utils::amount::{format_minor_units, ChainIdField},
};

// ============ 引擎响应 ============

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExecutionResponse {
    Hash(String),
    Receipt(ExecutionReceipt),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionReceipt {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    transaction_hash: Option<String>,
    #[serde(default)]
    tx_hash: Option<String>,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    explorer_url: Option<String>,
    #[serde(default)]
    chain_id: Option<ChainIdField>,
}

impl ExecutionReceipt {
    /// 第一个非空的交易哈希字段
    fn reference_hash(&self) -> Option<String> {
        [&self.transaction_hash, &self.tx_hash, &self.hash]
            .into_iter()
            .find_map(|hash| non_empty(hash.clone()))
    }

    fn failure_message(&self) -> Option<String> {
        let error = self.error.as_ref().and_then(|e| match e {
            Value::String(s) => Some(s.clone()),
            other => other.get("message").and_then(Value::as_str).map(str::to_string),
        });
        self.message
            .clone()
            .or(error)
            .filter(|m| !m.trim().is_empty())
    }
}

/// 成功操作的确认信息
#[derive(Debug, Clone, PartialEq, Eq)]
struct Confirmation {
    reference: String,
    chain_id: Option<u64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn interpret_response(kind: OperationKind, response: Value) -> Result<Confirmation, AppError> {
    if response.is_null() {
        return Err(AppError::no_confirmation_data());
    }

    let receipt = match serde_json::from_value::<ExecutionResponse>(response) {
        Ok(ExecutionResponse::Hash(hash)) => {
            return non_empty(Some(hash))
                .map(|reference| Confirmation {
                    reference,
                    chain_id: None,
                })
                .ok_or_else(AppError::no_confirmation_data);
        }
        Ok(ExecutionResponse::Receipt(receipt)) => receipt,
        Err(e) => {
            return Err(AppError::malformed_response(format!(
                "unexpected {} response: {}",
                kind, e
            )));
        }
    };

    if receipt.success == Some(false) {
        let message = receipt
            .failure_message()
            .unwrap_or_else(|| format!("{} failed", kind));
        return Err(AppError::execution_failed(message));
    }

    let chain_id = receipt.chain_id.as_ref().and_then(ChainIdField::resolve);
    receipt
        .reference_hash()
        .or_else(|| non_empty(receipt.explorer_url))
        .map(|reference| Confirmation { reference, chain_id })
        .ok_or_else(AppError::no_confirmation_data)
}

// ============ 编排器 ============

pub struct TransferOrchestrator {
    chains: Arc<ChainRegistry>,
    tokens: Arc<TokenRegistry>,
    network: WalletNetworkController,
    selector: Arc<ExecutionClientSelector>,
    bus: Arc<ProgressEventBus>,
    approvals: Arc<ApprovalRegistry>,
}

impl TransferOrchestrator {
    pub fn new(
        chains: Arc<ChainRegistry>,
        tokens: Arc<TokenRegistry>,
        selector: Arc<ExecutionClientSelector>,
        bus: Arc<ProgressEventBus>,
        approvals: Arc<ApprovalRegistry>,
    ) -> Self {
        Self {
            network: WalletNetworkController::new(chains.clone()),
            chains,
            tokens,
            selector,
            bus,
            approvals,
        }
    }

    pub async fn transfer(&self, params: TransferParams) -> Result<String, AppError> {
        self.execute(TransferRequest::transfer(params)).await
    }

    pub async fn bridge(&self, params: TransferParams) -> Result<String, AppError> {
        self.execute(TransferRequest::bridge(params)).await
    }

    /// 执行一次操作，返回交易哈希（或浏览器链接）
    pub async fn execute(&self, request: TransferRequest) -> Result<String, AppError> {
        let progress = Arc::new(OperationProgress::new(
            self.bus.clone(),
            request.kind,
            request.recipient_address.clone(),
        ));
        let operation_id = progress.operation_id();

        // 校验失败不经过 pending，直接 failed
        let (source_token, _) = match self.validate(&request) {
            Ok(tokens) => tokens,
            Err(err) => {
                tracing::warn!(
                    operation_id = %operation_id,
                    operation = request.kind.as_str(),
                    code = err.code.as_str(),
                    "validation failed: {}",
                    err
                );
                progress.finish(
                    ProgressStatus::Failed,
                    Some(request.source_chain_id),
                    None,
                    Some(err.message.clone()),
                );
                return Err(err);
            }
        };

        tracing::info!(
            operation_id = %operation_id,
            operation = request.kind.as_str(),
            from_chain_id = request.source_chain_id,
            to_chain_id = request.destination_chain_id,
            token = %source_token.symbol,
            "operation started"
        );
        progress.report(
            ProgressStatus::Pending,
            Some(request.source_chain_id),
            None,
            None,
        );

        match self.run(&request, &source_token, progress.clone()).await {
            Ok(confirmation) => {
                tracing::info!(
                    operation_id = %operation_id,
                    reference = %confirmation.reference,
                    "operation completed"
                );
                progress.finish(
                    ProgressStatus::Completed,
                    Some(
                        confirmation
                            .chain_id
                            .unwrap_or(request.destination_chain_id),
                    ),
                    Some(confirmation.reference.clone()),
                    None,
                );
                Ok(confirmation.reference)
            }
            Err(err) => {
                tracing::error!(
                    operation_id = %operation_id,
                    code = err.code.as_str(),
                    "operation failed: {}",
                    err
                );
                progress.finish(
                    ProgressStatus::Failed,
                    Some(request.source_chain_id),
                    None,
                    Some(err.message.clone()),
                );
                Err(err)
            }
        }
    }

    /// 校验请求；任何钱包调用之前完成
    fn validate(&self, request: &TransferRequest) -> Result<(ResolvedToken, ResolvedToken), AppError> {
        let from = request.source_chain_id;
        let to = request.destination_chain_id;

        match request.kind {
            OperationKind::Transfer => {
                if request.recipient_address.is_none() {
                    return Err(AppError::recipient_required());
                }
            }
            OperationKind::Bridge => {
                if from == to {
                    return Err(AppError::same_chain_bridge(from));
                }
                if !self.chains.same_environment(from, to) {
                    return Err(AppError::cross_environment_bridge(from, to));
                }
            }
        }

        if let Some(recipient) = &request.recipient_address {
            validate_address(recipient)?;
        }

        if request.amount_minor_units.is_zero() {
            return Err(AppError::invalid_amount("amount must be greater than zero"));
        }

        let source = self
            .tokens
            .resolve_token(&request.token_symbol, from)
            .ok_or_else(|| AppError::token_unavailable(&request.token_symbol, from))?;
        let destination = self
            .tokens
            .resolve_token(&request.token_symbol, to)
            .ok_or_else(|| AppError::token_unavailable(&request.token_symbol, to))?;

        Ok((source, destination))
    }

    async fn run(
        &self,
        request: &TransferRequest,
        source_token: &ResolvedToken,
        progress: Arc<OperationProgress>,
    ) -> Result<Confirmation, AppError> {
        let provider = self.selector.provider().ok_or_else(|| {
            AppError::uninitialized("wallet session not initialized; call initialize_with_provider first")
        })?;

        self.network
            .ensure_chain(provider.as_ref(), request.source_chain_id)
            .await?;

        let engine = self.selector.get_client_for(request.source_chain_id).await?;

        // 精度取源链上的代币元数据
        let amount = format_minor_units(request.amount_minor_units, source_token.decimals)?;
        let params = ExecutionParams {
            from_chain_id: request.source_chain_id,
            to_chain_id: request.destination_chain_id,
            token: source_token.symbol.clone(),
            token_address: source_token.address.clone(),
            decimals: source_token.decimals,
            amount,
            recipient: request.recipient_address.clone(),
        };
        let ctx = ExecutionContext {
            gate: self.approvals.gate(),
            progress,
        };

        tracing::debug!(
            operation_id = %ctx.progress.operation_id(),
            environment = %engine.environment(),
            amount = %params.amount,
            "invoking execution engine"
        );

        let response = match (request.kind, request.recipient_address.is_some()) {
            (OperationKind::Transfer, true) => engine.transfer(&params, &ctx).await,
            (OperationKind::Bridge, true) => engine.bridge_and_transfer(&params, &ctx).await,
            (_, false) => engine.bridge(&params, &ctx).await,
        }
        .map_err(|e| {
            let mut err = AppError::from(e);
            if err.message.trim().is_empty() {
                err.message = format!("{} failed", request.kind);
            }
            err
        })?;

        interpret_response(request.kind, response)
    }
}

fn validate_address(address: &str) -> Result<(), AppError> {
    let well_formed = address.len() == 42
        && (address.starts_with("0x") || address.starts_with("0X"))
        && Address::from_str(address).is_ok();
    if well_formed {
        Ok(())
    } else {
        Err(AppError::invalid_address(address))
    }
}
