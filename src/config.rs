//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{ChainDescriptor, Environment, TokenDescriptor};

/// 应用配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub approvals: ApprovalsConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    /// 额外注册的链（chain_id 不得与内置链重复）
    #[serde(default)]
    pub chains: Vec<ChainDescriptor>,
    /// 额外注册的代币（同符号时合并部署项）
    #[serde(default)]
    pub tokens: Vec<TokenDescriptor>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

/// 钱包 provider 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// HTTP JSON-RPC 钱包端点（命令行工具使用）
    pub rpc_url: Option<String>,
    pub timeout_secs: u64,
}

/// 执行引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 初始化钱包会话时的默认环境
    pub default_environment: Environment,
    /// 余额查询是否包含可兑换资产
    pub include_swappable: bool,
}

/// 审批（签名 / 授权）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalsConfig {
    /// EIP-712 domain name
    pub intent_domain_name: String,
    pub intent_domain_version: String,
    pub verifying_contract: Option<String>,
    pub receipt_poll_interval_ms: u64,
    pub receipt_max_attempts: u32,
}

/// 进度事件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// UI 侧保留的最近事件数
    pub history_limit: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            rpc_url: std::env::var("WALLET_RPC_URL").ok(),
            timeout_secs: std::env::var("WALLET_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_environment: std::env::var("DEFAULT_ENVIRONMENT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Environment::Testnet),
            include_swappable: std::env::var("INCLUDE_SWAPPABLE")
                .ok()
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
        }
    }
}

impl Default for ApprovalsConfig {
    fn default() -> Self {
        Self {
            intent_domain_name: std::env::var("INTENT_DOMAIN_NAME")
                .unwrap_or_else(|_| "IronBridge".into()),
            intent_domain_version: std::env::var("INTENT_DOMAIN_VERSION")
                .unwrap_or_else(|_| "1".into()),
            verifying_contract: std::env::var("INTENT_VERIFYING_CONTRACT").ok(),
            receipt_poll_interval_ms: std::env::var("RECEIPT_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1500),
            receipt_max_attempts: std::env::var("RECEIPT_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(40),
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            history_limit: std::env::var("PROGRESS_HISTORY_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            logging: LoggingConfig::default(),
            wallet: WalletConfig::default(),
            engine: EngineConfig::default(),
            approvals: ApprovalsConfig::default(),
            progress: ProgressConfig::default(),
            chains: Vec::new(),
            tokens: Vec::new(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                // 文件中缺省的段落回落到环境变量默认值
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        if let Some(url) = &self.wallet.rpc_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("WALLET_RPC_URL must start with http:// or https://");
            }
        }

        if self.wallet.timeout_secs == 0 {
            anyhow::bail!("WALLET_TIMEOUT_SECS must be greater than 0");
        }

        if self.approvals.receipt_max_attempts == 0 {
            anyhow::bail!("RECEIPT_MAX_ATTEMPTS must be greater than 0");
        }

        if self.progress.history_limit == 0 {
            anyhow::bail!("PROGRESS_HISTORY_LIMIT must be greater than 0");
        }

        Ok(())
    }
}
