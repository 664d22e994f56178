//! 执行客户端选择器
//!
//! 每个环境最多一个执行引擎实例，首次使用时创建并初始化；
//! 每个环境一把异步锁，保证并发的首次调用只初始化一次。

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, RwLock,
};

use tokio::sync::Mutex;

use crate::{
    domain::{ChainRegistry, Environment},
    error::AppError,
    infrastructure::wallet_provider::WalletProvider,
    service::execution_engine::{EngineFactory, ExecutionEngine},
};

/// 钱包会话：从初始化成功到显式注销
#[derive(Clone)]
pub struct WalletSession {
    pub provider: Arc<dyn WalletProvider>,
    pub current_environment: Environment,
}

/// 单个环境的引擎槽位
///
/// `ready` 在初始化成功后置位、注销时清除，查询不需要拿锁
#[derive(Default)]
struct EngineSlot {
    engine: Mutex<Option<Arc<dyn ExecutionEngine>>>,
    ready: AtomicBool,
}

pub struct ExecutionClientSelector {
    chains: Arc<ChainRegistry>,
    factory: Arc<dyn EngineFactory>,
    mainnet: EngineSlot,
    testnet: EngineSlot,
    session: RwLock<Option<WalletSession>>,
}

impl ExecutionClientSelector {
    pub fn new(chains: Arc<ChainRegistry>, factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            chains,
            factory,
            mainnet: EngineSlot::default(),
            testnet: EngineSlot::default(),
            session: RwLock::new(None),
        }
    }

    fn slot(&self, environment: Environment) -> &EngineSlot {
        match environment {
            Environment::Mainnet => &self.mainnet,
            Environment::Testnet => &self.testnet,
        }
    }

    pub fn session(&self) -> Option<WalletSession> {
        match self.session.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace_session(&self, session: Option<WalletSession>) {
        match self.session.write() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }

    pub fn provider(&self) -> Option<Arc<dyn WalletProvider>> {
        self.session().map(|s| s.provider)
    }

    pub fn current_environment(&self) -> Option<Environment> {
        self.session().map(|s| s.current_environment)
    }

    fn set_current_environment(&self, environment: Environment) {
        let mut guard = match self.session.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(session) = guard.as_mut() {
            session.current_environment = environment;
        }
    }

    /// 按链所属环境取已初始化的引擎
    pub async fn get_client_for(&self, chain_id: u64) -> Result<Arc<dyn ExecutionEngine>, AppError> {
        let environment = self.chains.chain_environment(chain_id);
        self.get_client_for_environment(environment).await
    }

    pub async fn get_client_for_environment(
        &self,
        environment: Environment,
    ) -> Result<Arc<dyn ExecutionEngine>, AppError> {
        let provider = self.provider().ok_or_else(|| {
            AppError::uninitialized(
                "wallet session not initialized; call initialize_with_provider first",
            )
        })?;

        // 持锁直到初始化完成
        let slot = self.slot(environment);
        let mut cached = slot.engine.lock().await;
        let engine = match cached.as_ref() {
            Some(engine) => engine.clone(),
            None => {
                tracing::info!(environment = %environment, "creating execution client");
                let engine = self.factory.create(environment);
                *cached = Some(engine.clone());
                engine
            }
        };

        if !engine.is_initialized() {
            slot.ready.store(false, Ordering::SeqCst);
            tracing::info!(environment = %environment, "initializing execution client");
            engine.initialize(provider).await.map_err(|e| {
                tracing::error!(environment = %environment, error = %e, "execution client initialization failed");
                AppError::from(e)
            })?;
        }
        slot.ready.store(true, Ordering::SeqCst);
        drop(cached);

        self.set_current_environment(environment);
        Ok(engine)
    }

    /// 建立钱包会话并初始化默认环境的引擎；已初始化时为空操作
    pub async fn initialize_with_provider(
        &self,
        provider: Arc<dyn WalletProvider>,
        environment: Environment,
    ) -> Result<(), AppError> {
        if self.is_initialized() {
            tracing::debug!("execution client already initialized");
            return Ok(());
        }

        self.replace_session(Some(WalletSession {
            provider,
            current_environment: environment,
        }));

        if let Err(e) = self.get_client_for_environment(environment).await {
            self.replace_session(None);
            return Err(e);
        }

        tracing::info!(environment = %environment, "wallet session initialized");
        Ok(())
    }

    /// 注销会话并拆除所有引擎实例
    pub async fn deinit(&self) {
        self.replace_session(None);

        for environment in [Environment::Mainnet, Environment::Testnet] {
            let slot = self.slot(environment);
            slot.ready.store(false, Ordering::SeqCst);
            let engine = slot.engine.lock().await.take();
            if let Some(engine) = engine {
                engine.deinit().await;
                tracing::info!(environment = %environment, "execution client deinitialized");
            }
        }
    }

    /// 会话存在且当前环境的引擎已初始化
    pub fn is_initialized(&self) -> bool {
        let Some(environment) = self.current_environment() else {
            return false;
        };
        self.slot(environment).ready.load(Ordering::SeqCst)
    }
}
