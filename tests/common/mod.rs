//! 测试辅助模块
//! 可记录调用的钱包 provider、可编排响应的执行引擎与引擎工厂

#![allow(dead_code)]

use std::{
    collections::{HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use ironbridge::{
    config::Config,
    domain::{Environment, ProgressStatus},
    infrastructure::{
        event_bus::ProgressHistory,
        wallet_provider::{ProviderError, WalletProvider},
    },
    service::{
        approval_hooks::IntentCheckpoint,
        execution_engine::{
            EngineError, EngineFactory, ExecutionContext, ExecutionEngine, ExecutionParams,
        },
    },
    utils::amount::{parse_chain_id, to_hex_chain_id},
    AppState,
};
use serde_json::{json, Value};

pub const ACCOUNT: &str = "0x1111111111111111111111111111111111111111";
pub const RECIPIENT: &str = "0xabc0000000000000000000000000000000000abc";

// ============ 钱包 provider ============

/// 钱包不认识链时的报错方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownChainStyle {
    Code4902,
    MessageOnly,
}

pub struct MockWalletProvider {
    calls: Mutex<Vec<(String, Value)>>,
    current_chain: Mutex<u64>,
    known_chains: Mutex<HashSet<u64>>,
    unknown_chain_style: UnknownChainStyle,
    switch_error: Mutex<Option<ProviderError>>,
}

impl MockWalletProvider {
    pub fn new(current_chain: u64, known_chains: &[u64]) -> Self {
        let mut known: HashSet<u64> = known_chains.iter().copied().collect();
        known.insert(current_chain);
        Self {
            calls: Mutex::new(Vec::new()),
            current_chain: Mutex::new(current_chain),
            known_chains: Mutex::new(known),
            unknown_chain_style: UnknownChainStyle::Code4902,
            switch_error: Mutex::new(None),
        }
    }

    /// 认识所有内置链
    pub fn knowing_all(current_chain: u64) -> Self {
        Self::new(
            current_chain,
            &[1, 10, 56, 137, 8453, 42161, 11155111, 84532, 421614, 11155420, 80002],
        )
    }

    pub fn with_unknown_chain_style(mut self, style: UnknownChainStyle) -> Self {
        self.unknown_chain_style = style;
        self
    }

    /// 所有切换请求都返回该错误
    pub fn fail_switch_with(&self, error: ProviderError) {
        *self.switch_error.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|(m, _)| m).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn current_chain(&self) -> u64 {
        *self.current_chain.lock().unwrap()
    }

    fn chain_param(params: &Value) -> Option<u64> {
        params
            .get(0)
            .and_then(|p| p.get("chainId"))
            .and_then(Value::as_str)
            .and_then(parse_chain_id)
    }
}

#[async_trait]
impl WalletProvider for MockWalletProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params.clone()));

        match method {
            "wallet_switchEthereumChain" => {
                if let Some(err) = self.switch_error.lock().unwrap().clone() {
                    return Err(err);
                }
                let chain_id = Self::chain_param(&params)
                    .ok_or_else(|| ProviderError::new(-32602, "invalid chainId"))?;
                if self.known_chains.lock().unwrap().contains(&chain_id) {
                    *self.current_chain.lock().unwrap() = chain_id;
                    return Ok(Value::Null);
                }
                let message = format!(
                    "Unrecognized chain ID \"{}\". Try adding the chain using wallet_addEthereumChain first.",
                    to_hex_chain_id(chain_id)
                );
                Err(match self.unknown_chain_style {
                    UnknownChainStyle::Code4902 => ProviderError::new(4902, message),
                    UnknownChainStyle::MessageOnly => ProviderError::new(-32603, message),
                })
            }
            "wallet_addEthereumChain" => {
                let chain_id = Self::chain_param(&params)
                    .ok_or_else(|| ProviderError::new(-32602, "invalid chainId"))?;
                self.known_chains.lock().unwrap().insert(chain_id);
                Ok(Value::Null)
            }
            "eth_chainId" => Ok(json!(to_hex_chain_id(self.current_chain()))),
            "eth_accounts" => Ok(json!([ACCOUNT])),
            "eth_signTypedData_v4" => Ok(json!("0xsignature")),
            other => Err(ProviderError::new(
                -32601,
                format!("the method {} does not exist", other),
            )),
        }
    }
}

// ============ 执行引擎 ============

pub struct MockEngine {
    environment: Environment,
    initialized: AtomicBool,
    pub init_count: AtomicUsize,
    pub deinit_count: AtomicUsize,
    init_delay: Duration,
    balance_responses: Mutex<VecDeque<Result<Value, EngineError>>>,
    balance_flags: Mutex<Vec<bool>>,
    execution_response: Mutex<Result<Value, EngineError>>,
    executions: Mutex<Vec<(String, ExecutionParams)>>,
    require_intent: AtomicBool,
    report_submitted: AtomicBool,
}

impl MockEngine {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            initialized: AtomicBool::new(false),
            init_count: AtomicUsize::new(0),
            deinit_count: AtomicUsize::new(0),
            init_delay: Duration::ZERO,
            balance_responses: Mutex::new(VecDeque::new()),
            balance_flags: Mutex::new(Vec::new()),
            execution_response: Mutex::new(Ok(json!({ "transactionHash": "0xdeadbeef" }))),
            executions: Mutex::new(Vec::new()),
            require_intent: AtomicBool::new(false),
            report_submitted: AtomicBool::new(false),
        }
    }

    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    pub fn push_balance_response(&self, response: Result<Value, EngineError>) {
        self.balance_responses.lock().unwrap().push_back(response);
    }

    pub fn balance_flags(&self) -> Vec<bool> {
        self.balance_flags.lock().unwrap().clone()
    }

    pub fn set_execution_response(&self, response: Result<Value, EngineError>) {
        *self.execution_response.lock().unwrap() = response;
    }

    pub fn executions(&self) -> Vec<(String, ExecutionParams)> {
        self.executions.lock().unwrap().clone()
    }

    pub fn require_intent(&self, required: bool) {
        self.require_intent.store(required, Ordering::SeqCst);
    }

    pub fn report_submitted(&self, enabled: bool) {
        self.report_submitted.store(enabled, Ordering::SeqCst);
    }

    async fn execute(
        &self,
        operation: &str,
        params: &ExecutionParams,
        ctx: &ExecutionContext,
    ) -> Result<Value, EngineError> {
        self.executions
            .lock()
            .unwrap()
            .push((operation.to_string(), params.clone()));

        if self.require_intent.load(Ordering::SeqCst) {
            ctx.gate
                .intent(IntentCheckpoint {
                    kind: ctx.progress.kind(),
                    from_chain_id: params.from_chain_id,
                    to_chain_id: params.to_chain_id,
                    token: params.token.clone(),
                    amount: params.amount.clone(),
                    recipient: params.recipient.clone(),
                })
                .await?;
        }

        if self.report_submitted.load(Ordering::SeqCst) {
            ctx.progress.report(
                ProgressStatus::Submitted,
                Some(params.from_chain_id),
                Some("0xsubmitted".to_string()),
                None,
            );
        }

        self.execution_response.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionEngine for MockEngine {
    fn environment(&self) -> Environment {
        self.environment
    }

    async fn initialize(&self, _provider: Arc<dyn WalletProvider>) -> Result<(), EngineError> {
        self.init_count.fetch_add(1, Ordering::SeqCst);
        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn deinit(&self) {
        self.deinit_count.fetch_add(1, Ordering::SeqCst);
        self.initialized.store(false, Ordering::SeqCst);
    }

    async fn get_unified_balances(&self, include_swappable: bool) -> Result<Value, EngineError> {
        self.balance_flags.lock().unwrap().push(include_swappable);
        self.balance_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!([])))
    }

    async fn transfer(
        &self,
        params: &ExecutionParams,
        ctx: &ExecutionContext,
    ) -> Result<Value, EngineError> {
        self.execute("transfer", params, ctx).await
    }

    async fn bridge_and_transfer(
        &self,
        params: &ExecutionParams,
        ctx: &ExecutionContext,
    ) -> Result<Value, EngineError> {
        self.execute("bridge_and_transfer", params, ctx).await
    }

    async fn bridge(
        &self,
        params: &ExecutionParams,
        ctx: &ExecutionContext,
    ) -> Result<Value, EngineError> {
        self.execute("bridge", params, ctx).await
    }
}

// ============ 引擎工厂 ============

#[derive(Default)]
pub struct MockEngineFactory {
    created: Mutex<Vec<Arc<MockEngine>>>,
    init_delay: Duration,
}

impl MockEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_init_delay(delay: Duration) -> Self {
        Self {
            created: Mutex::new(Vec::new()),
            init_delay: delay,
        }
    }

    pub fn created(&self) -> Vec<Arc<MockEngine>> {
        self.created.lock().unwrap().clone()
    }

    pub fn created_environments(&self) -> Vec<Environment> {
        self.created().iter().map(|e| e.environment()).collect()
    }

    /// 该环境最近创建的引擎
    pub fn engine(&self, environment: Environment) -> Option<Arc<MockEngine>> {
        self.created()
            .into_iter()
            .rev()
            .find(|e| e.environment() == environment)
    }
}

impl EngineFactory for MockEngineFactory {
    fn create(&self, environment: Environment) -> Arc<dyn ExecutionEngine> {
        let engine = Arc::new(MockEngine::new(environment).with_init_delay(self.init_delay));
        self.created.lock().unwrap().push(engine.clone());
        engine
    }
}

// ============ 组合 ============

pub fn test_config(default_environment: Environment) -> Config {
    let mut config = Config::from_env().expect("config from env");
    config.engine.default_environment = default_environment;
    config.engine.include_swappable = true;
    config.progress.history_limit = 10;
    config
}

pub struct TestHarness {
    pub state: AppState,
    pub wallet: Arc<MockWalletProvider>,
    pub factory: Arc<MockEngineFactory>,
    pub events: Arc<ProgressHistory>,
}

impl TestHarness {
    /// 未初始化的状态
    pub fn new(environment: Environment, wallet: MockWalletProvider) -> Self {
        let factory = Arc::new(MockEngineFactory::new());
        let state = AppState::new(test_config(environment), factory.clone()).expect("app state");
        let events = Arc::new(ProgressHistory::new(100));
        state.add_progress_listener(events.clone());
        Self {
            state,
            wallet: Arc::new(wallet),
            factory,
            events,
        }
    }

    /// 已建立钱包会话的状态
    pub async fn initialized(environment: Environment, wallet: MockWalletProvider) -> Self {
        let harness = Self::new(environment, wallet);
        harness
            .state
            .initialize_with_provider(Some(harness.wallet.clone()))
            .await
            .expect("initialize");
        harness
    }

    pub fn engine(&self, environment: Environment) -> Arc<MockEngine> {
        self.factory.engine(environment).expect("engine created")
    }

    pub fn statuses(&self) -> Vec<ProgressStatus> {
        self.events.snapshot().iter().map(|e| e.status).collect()
    }
}
