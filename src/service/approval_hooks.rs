//! 审批检查点（intent 签名 / ERC-20 授权）
//!
//! 编排层在每次操作前取一份审批能力快照，包装成 `ConfirmationGate` 交给执行引擎；
//! 引擎在检查点 await 返回的 future，拿到签名或授权结果后再继续提交。

use std::{
    str::FromStr,
    sync::{Arc, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use ethers::{
    abi::{self, Token},
    types::{Address, U256},
    utils::id,
};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    config::ApprovalsConfig,
    domain::OperationKind,
    infrastructure::wallet_provider::{ProviderError, WalletProvider},
    service::execution_engine::EngineError,
    utils::amount::parse_chain_id,
};

pub const INTENT_REJECTED: &str = "User rejected intent";
pub const ALLOWANCE_REJECTED: &str = "User rejected allowance";

// ============ 检查点与结果 ============

/// intent 签名检查点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentCheckpoint {
    pub kind: OperationKind,
    pub from_chain_id: u64,
    pub to_chain_id: u64,
    pub token: String,
    /// 显示金额
    pub amount: String,
    #[serde(default)]
    pub recipient: Option<String>,
}

impl IntentCheckpoint {
    pub fn summary(&self) -> String {
        let target = self
            .recipient
            .as_deref()
            .map(|r| format!(" to {}", r))
            .unwrap_or_default();
        format!(
            "{} {} {} from chain {} to chain {}{}",
            self.kind, self.amount, self.token, self.from_chain_id, self.to_chain_id, target
        )
    }
}

/// ERC-20 授权检查点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowanceCheckpoint {
    pub chain_id: u64,
    pub token: String,
    pub token_address: String,
    pub spender: String,
    /// 最小单位
    pub amount: U256,
}

impl AllowanceCheckpoint {
    pub fn summary(&self) -> String {
        format!(
            "approve {} {} (minor units) for spender {} on chain {}",
            self.amount, self.token, self.spender, self.chain_id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentSignature {
    pub signer: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceApproval {
    pub tx_hash: String,
}

/// 检查点返回的 future
pub type PendingApproval<T> = BoxFuture<'static, Result<T, EngineError>>;

// ============ 审批能力 ============

#[async_trait]
pub trait ApprovalCapability: Send + Sync {
    async fn sign_intent(&self, checkpoint: &IntentCheckpoint) -> Result<IntentSignature, EngineError>;

    async fn approve_allowance(
        &self,
        checkpoint: &AllowanceCheckpoint,
    ) -> Result<AllowanceApproval, EngineError>;
}

/// 向用户展示待确认操作
#[async_trait]
pub trait UserConfirmation: Send + Sync {
    async fn confirm(&self, summary: &str) -> bool;
}

/// 总是同意（命令行 / 测试）
pub struct AutoConfirm;

#[async_trait]
impl UserConfirmation for AutoConfirm {
    async fn confirm(&self, summary: &str) -> bool {
        tracing::debug!(summary, "auto-confirming");
        true
    }
}

/// 交给执行引擎的检查点入口
#[derive(Clone, Default)]
pub struct ConfirmationGate {
    capability: Option<Arc<dyn ApprovalCapability>>,
}

impl ConfirmationGate {
    pub fn new(capability: Option<Arc<dyn ApprovalCapability>>) -> Self {
        Self { capability }
    }

    pub fn has_capability(&self) -> bool {
        self.capability.is_some()
    }

    pub fn intent(&self, checkpoint: IntentCheckpoint) -> PendingApproval<IntentSignature> {
        let capability = self.capability.clone();
        Box::pin(async move {
            match capability {
                Some(capability) => capability.sign_intent(&checkpoint).await,
                None => Err(EngineError::Failed(
                    "approval hooks not registered: cannot sign intent".to_string(),
                )),
            }
        })
    }

    pub fn allowance(&self, checkpoint: AllowanceCheckpoint) -> PendingApproval<AllowanceApproval> {
        let capability = self.capability.clone();
        Box::pin(async move {
            match capability {
                Some(capability) => capability.approve_allowance(&checkpoint).await,
                None => Err(EngineError::Failed(
                    "approval hooks not registered: cannot approve allowance".to_string(),
                )),
            }
        })
    }
}

/// 当前注册的审批能力（可替换）
#[derive(Default)]
pub struct ApprovalRegistry {
    capability: RwLock<Option<Arc<dyn ApprovalCapability>>>,
}

impl ApprovalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, capability: Arc<dyn ApprovalCapability>) {
        match self.capability.write() {
            Ok(mut guard) => *guard = Some(capability),
            Err(poisoned) => *poisoned.into_inner() = Some(capability),
        }
    }

    pub fn clear(&self) {
        match self.capability.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    /// 取快照：操作进行中替换能力不影响已开始的操作
    pub fn gate(&self) -> ConfirmationGate {
        let capability = match self.capability.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        ConfirmationGate::new(capability)
    }
}

// ============ 基于钱包 provider 的实现 ============

/// 经用户确认后通过钱包签名 EIP-712 intent、发送 ERC-20 approve 交易
pub struct ProviderApprovalCapability {
    provider: Arc<dyn WalletProvider>,
    confirmer: Arc<dyn UserConfirmation>,
    config: ApprovalsConfig,
}

impl ProviderApprovalCapability {
    pub fn new(
        provider: Arc<dyn WalletProvider>,
        confirmer: Arc<dyn UserConfirmation>,
        config: ApprovalsConfig,
    ) -> Self {
        Self {
            provider,
            confirmer,
            config,
        }
    }

    async fn account(&self) -> Result<String, EngineError> {
        let accounts = self.provider.request("eth_accounts", json!([])).await?;
        accounts
            .as_array()
            .and_then(|list| list.first())
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| EngineError::Failed("no wallet account available".to_string()))
    }

    async fn wallet_chain_id(&self, fallback: u64) -> u64 {
        match self.provider.request("eth_chainId", json!([])).await {
            Ok(value) => value.as_str().and_then(parse_chain_id).unwrap_or(fallback),
            Err(e) => {
                tracing::warn!(error = %e, "eth_chainId failed, using operation chain");
                fallback
            }
        }
    }

    fn typed_data(&self, checkpoint: &IntentCheckpoint, chain_id: u64, signer: &str) -> Value {
        let mut domain_types = vec![
            json!({ "name": "name", "type": "string" }),
            json!({ "name": "version", "type": "string" }),
            json!({ "name": "chainId", "type": "uint256" }),
        ];
        let mut domain = json!({
            "name": self.config.intent_domain_name,
            "version": self.config.intent_domain_version,
            "chainId": chain_id,
        });
        if let Some(contract) = &self.config.verifying_contract {
            domain_types.push(json!({ "name": "verifyingContract", "type": "address" }));
            domain["verifyingContract"] = json!(contract);
        }

        json!({
            "types": {
                "EIP712Domain": domain_types,
                "TransferIntent": [
                    { "name": "operation", "type": "string" },
                    { "name": "fromChainId", "type": "uint256" },
                    { "name": "toChainId", "type": "uint256" },
                    { "name": "token", "type": "string" },
                    { "name": "amount", "type": "string" },
                    { "name": "recipient", "type": "address" },
                ],
            },
            "primaryType": "TransferIntent",
            "domain": domain,
            "message": {
                "operation": checkpoint.kind.as_str(),
                "fromChainId": checkpoint.from_chain_id,
                "toChainId": checkpoint.to_chain_id,
                "token": checkpoint.token,
                "amount": checkpoint.amount,
                "recipient": checkpoint.recipient.as_deref().unwrap_or(signer),
            },
        })
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<(), EngineError> {
        let interval = Duration::from_millis(self.config.receipt_poll_interval_ms);
        for attempt in 1..=self.config.receipt_max_attempts {
            let receipt = self
                .provider
                .request("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;

            if !receipt.is_null() {
                return match receipt.get("status").and_then(Value::as_str) {
                    Some("0x0") => Err(EngineError::Failed(format!(
                        "allowance transaction {} reverted",
                        tx_hash
                    ))),
                    _ => {
                        tracing::info!(tx_hash, attempt, "allowance transaction mined");
                        Ok(())
                    }
                };
            }
            tokio::time::sleep(interval).await;
        }

        Err(EngineError::Failed(format!(
            "allowance transaction {} not mined after {} attempts",
            tx_hash, self.config.receipt_max_attempts
        )))
    }
}

/// `approve(address,uint256)` calldata
pub fn encode_approve_calldata(spender: &str, amount: U256) -> Result<String, EngineError> {
    let spender = Address::from_str(spender)
        .map_err(|_| EngineError::Failed(format!("invalid spender address: {}", spender)))?;
    let selector = &id("approve(address,uint256)")[..4];
    let args = abi::encode(&[Token::Address(spender), Token::Uint(amount)]);

    let mut data = Vec::with_capacity(4 + args.len());
    data.extend_from_slice(selector);
    data.extend_from_slice(&args);
    Ok(format!("0x{}", hex::encode(data)))
}

fn rejection_or(err: ProviderError, rejected: &str) -> EngineError {
    if err.is_user_rejection() {
        EngineError::Rejected(rejected.to_string())
    } else {
        EngineError::Provider(err)
    }
}

#[async_trait]
impl ApprovalCapability for ProviderApprovalCapability {
    async fn sign_intent(&self, checkpoint: &IntentCheckpoint) -> Result<IntentSignature, EngineError> {
        if !self.confirmer.confirm(&checkpoint.summary()).await {
            return Err(EngineError::Rejected(INTENT_REJECTED.to_string()));
        }

        let signer = self.account().await?;
        let chain_id = self.wallet_chain_id(checkpoint.from_chain_id).await;
        let typed_data = self.typed_data(checkpoint, chain_id, &signer);

        let signature = self
            .provider
            .request(
                "eth_signTypedData_v4",
                json!([signer, typed_data.to_string()]),
            )
            .await
            .map_err(|e| rejection_or(e, INTENT_REJECTED))?;

        let signature = signature
            .as_str()
            .ok_or_else(|| EngineError::Failed("wallet returned no signature".to_string()))?
            .to_string();

        tracing::info!(signer = %signer, chain_id, "intent signed");
        Ok(IntentSignature { signer, signature })
    }

    async fn approve_allowance(
        &self,
        checkpoint: &AllowanceCheckpoint,
    ) -> Result<AllowanceApproval, EngineError> {
        if !self.confirmer.confirm(&checkpoint.summary()).await {
            return Err(EngineError::Rejected(ALLOWANCE_REJECTED.to_string()));
        }

        let from = self.account().await?;
        let data = encode_approve_calldata(&checkpoint.spender, checkpoint.amount)?;

        let tx_hash = self
            .provider
            .request(
                "eth_sendTransaction",
                json!([{
                    "from": from,
                    "to": checkpoint.token_address,
                    "data": data,
                }]),
            )
            .await
            .map_err(|e| rejection_or(e, ALLOWANCE_REJECTED))?;

        let tx_hash = tx_hash
            .as_str()
            .ok_or_else(|| EngineError::Failed("wallet returned no transaction hash".to_string()))?
            .to_string();

        tracing::info!(
            tx_hash = %tx_hash,
            token = %checkpoint.token,
            chain_id = checkpoint.chain_id,
            "allowance transaction sent"
        );
        self.wait_for_receipt(&tx_hash).await?;

        Ok(AllowanceApproval { tx_hash })
    }
}
