use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    domain::{ChainRegistry, ProgressEvent, ResolvedToken, TokenRegistry, TransferParams},
    error::AppError,
    infrastructure::{
        event_bus::{ListenerId, ProgressEventBus, ProgressHistory, ProgressListener},
        wallet_provider::WalletProvider,
    },
    service::{
        approval_hooks::{ApprovalRegistry, ProviderApprovalCapability, UserConfirmation},
        balance_normalizer::{BalanceNormalizer, NormalizedAsset},
        client_selector::ExecutionClientSelector,
        execution_engine::EngineFactory,
        orchestrator::TransferOrchestrator,
    },
};

/// 内置链 / 代币目录 + 配置中的额外条目
pub fn build_catalog(config: &Config) -> Result<(ChainRegistry, TokenRegistry), AppError> {
    let mut chains = ChainRegistry::new();
    for descriptor in &config.chains {
        chains.register(descriptor.clone())?;
        tracing::info!(chain_id = descriptor.chain_id, "registered chain from config");
    }

    let mut tokens = TokenRegistry::new();
    for descriptor in &config.tokens {
        tokens.register(descriptor.clone())?;
        tracing::info!(symbol = %descriptor.symbol, "registered token from config");
    }

    Ok((chains, tokens))
}

/// 余额查询选项
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceOptions {
    /// 缺省取配置值
    #[serde(default)]
    pub include_swappable: Option<bool>,
    /// 按该链所属环境查询；缺省为会话当前环境
    #[serde(default)]
    pub chain_id: Option<u64>,
}

/// 应用状态
/// 组合根：持有所有共享组件，UI 协作方只通过这里调用
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub chains: Arc<ChainRegistry>,
    pub tokens: Arc<TokenRegistry>,
    pub event_bus: Arc<ProgressEventBus>,
    pub progress_history: Arc<ProgressHistory>,
    pub selector: Arc<ExecutionClientSelector>,
    pub approvals: Arc<ApprovalRegistry>,
    pub orchestrator: Arc<TransferOrchestrator>,
    pub balances: Arc<BalanceNormalizer>,
}

impl AppState {
    /// 创建新的应用状态（配置中的额外链 / 代币在此注册）
    pub fn new(config: Config, factory: Arc<dyn EngineFactory>) -> Result<Self, AppError> {
        let (chains, tokens) = build_catalog(&config)?;
        let chains = Arc::new(chains);
        let tokens = Arc::new(tokens);

        let event_bus = Arc::new(ProgressEventBus::new());
        let progress_history = Arc::new(ProgressHistory::new(config.progress.history_limit));
        event_bus.subscribe(progress_history.clone());

        let selector = Arc::new(ExecutionClientSelector::new(chains.clone(), factory));
        let approvals = Arc::new(ApprovalRegistry::new());
        let orchestrator = Arc::new(TransferOrchestrator::new(
            chains.clone(),
            tokens.clone(),
            selector.clone(),
            event_bus.clone(),
            approvals.clone(),
        ));
        let balances = Arc::new(BalanceNormalizer::new(chains.clone()));

        Ok(Self {
            config: Arc::new(config),
            chains,
            tokens,
            event_bus,
            progress_history,
            selector,
            approvals,
            orchestrator,
            balances,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.selector.is_initialized()
    }

    /// 建立钱包会话；未提供 provider 时失败
    pub async fn initialize_with_provider(
        &self,
        provider: Option<Arc<dyn WalletProvider>>,
    ) -> Result<(), AppError> {
        let provider = provider.ok_or_else(AppError::provider_missing)?;
        self.selector
            .initialize_with_provider(provider, self.config.engine.default_environment)
            .await
    }

    /// 注销会话、拆除引擎并清除审批能力
    pub async fn deinit(&self) {
        self.approvals.clear();
        self.selector.deinit().await;
    }

    pub async fn get_unified_balances(
        &self,
        options: BalanceOptions,
    ) -> Result<Vec<NormalizedAsset>, AppError> {
        let include_swappable = options
            .include_swappable
            .unwrap_or(self.config.engine.include_swappable);

        let environment = match options.chain_id {
            Some(chain_id) => self.chains.chain_environment(chain_id),
            None => self.selector.current_environment().ok_or_else(|| {
                AppError::uninitialized(
                    "wallet session not initialized; call initialize_with_provider first",
                )
            })?,
        };

        let engine = self.selector.get_client_for_environment(environment).await?;
        self.balances
            .get_aggregated_balances(engine.as_ref(), include_swappable)
            .await
    }

    pub async fn transfer(&self, params: TransferParams) -> Result<String, AppError> {
        self.orchestrator.transfer(params).await
    }

    pub async fn bridge(&self, params: TransferParams) -> Result<String, AppError> {
        self.orchestrator.bridge(params).await
    }

    /// 注册审批能力（需要已有钱包会话）
    pub fn register_approval_hooks(
        &self,
        provider: Arc<dyn WalletProvider>,
        confirmer: Arc<dyn UserConfirmation>,
    ) -> Result<(), AppError> {
        if self.selector.session().is_none() {
            return Err(AppError::uninitialized(
                "cannot register approval hooks before initialize_with_provider",
            ));
        }
        self.approvals.install(Arc::new(ProviderApprovalCapability::new(
            provider,
            confirmer,
            self.config.approvals.clone(),
        )));
        tracing::info!("approval hooks registered");
        Ok(())
    }

    pub fn add_progress_listener(&self, listener: Arc<dyn ProgressListener>) -> ListenerId {
        self.event_bus.subscribe(listener)
    }

    pub fn remove_progress_listener(&self, id: ListenerId) -> bool {
        self.event_bus.unsubscribe(id)
    }

    /// 最近的进度事件（有界）
    pub fn recent_progress(&self) -> Vec<ProgressEvent> {
        self.progress_history.snapshot()
    }

    pub fn get_token_on_chain(&self, symbol: &str, chain_id: u64) -> Option<ResolvedToken> {
        self.tokens.resolve_token(symbol, chain_id)
    }

    pub fn is_mainnet_chain(&self, chain_id: u64) -> bool {
        self.chains.is_mainnet_chain(chain_id)
    }
}
