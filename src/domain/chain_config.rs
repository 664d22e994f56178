//! 多链配置模块
//!
//! 定义所有支持的 EVM 链及其连接元数据，按 mainnet / testnet 两个环境分组

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{error::AppError, utils::amount::to_hex_chain_id};

/// 网络环境（执行客户端只作用于其中一个）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Mainnet,
    Testnet,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Mainnet => "mainnet",
            Environment::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" => Ok(Environment::Mainnet),
            "testnet" => Ok(Environment::Testnet),
            other => Err(AppError::config(format!(
                "unknown environment '{}', expected 'mainnet' or 'testnet'",
                other
            ))),
        }
    }
}

/// 原生币信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    #[serde(default = "default_native_decimals")]
    pub decimals: u8,
}

fn default_native_decimals() -> u8 {
    18
}

/// 链描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    /// 链 ID (EIP-155)
    pub chain_id: u64,
    /// 显示名称
    pub display_name: String,
    /// 原生币
    pub native_currency: NativeCurrency,
    /// RPC 端点（按优先级排序）
    pub rpc_endpoints: Vec<String>,
    /// 区块浏览器
    #[serde(default)]
    pub explorer_url: Option<String>,
    pub environment: Environment,
}

impl ChainDescriptor {
    pub fn native_symbol(&self) -> &str {
        &self.native_currency.symbol
    }

    pub fn is_mainnet(&self) -> bool {
        self.environment == Environment::Mainnet
    }

    /// `wallet_addEthereumChain` 参数（EIP-3085）
    pub fn add_chain_params(&self) -> serde_json::Value {
        let mut params = serde_json::json!({
            "chainId": to_hex_chain_id(self.chain_id),
            "chainName": self.display_name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": self.rpc_endpoints,
        });
        if let Some(explorer) = &self.explorer_url {
            params["blockExplorerUrls"] = serde_json::json!([explorer]);
        }
        params
    }
}

/// 链配置注册表
pub struct ChainRegistry {
    configs: BTreeMap<u64, ChainDescriptor>,
}

impl ChainRegistry {
    /// 创建预配置的注册表
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_default_chains();
        registry
    }

    pub fn empty() -> Self {
        Self {
            configs: BTreeMap::new(),
        }
    }

    fn register_default_chains(&mut self) {
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // Mainnet
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        self.insert_default(
            1,
            "Ethereum",
            ("Ether", "ETH"),
            &["https://eth.llamarpc.com", "https://rpc.ankr.com/eth"],
            Some("https://etherscan.io"),
            Environment::Mainnet,
        );
        self.insert_default(
            10,
            "Optimism",
            ("Ether", "ETH"),
            &["https://mainnet.optimism.io"],
            Some("https://optimistic.etherscan.io"),
            Environment::Mainnet,
        );
        self.insert_default(
            56,
            "BNB Smart Chain",
            ("BNB", "BNB"),
            &["https://bsc-dataseed.binance.org"],
            Some("https://bscscan.com"),
            Environment::Mainnet,
        );
        self.insert_default(
            137,
            "Polygon",
            ("POL", "POL"),
            &["https://polygon-rpc.com"],
            Some("https://polygonscan.com"),
            Environment::Mainnet,
        );
        self.insert_default(
            8453,
            "Base",
            ("Ether", "ETH"),
            &["https://mainnet.base.org"],
            Some("https://basescan.org"),
            Environment::Mainnet,
        );
        self.insert_default(
            42161,
            "Arbitrum One",
            ("Ether", "ETH"),
            &["https://arb1.arbitrum.io/rpc"],
            Some("https://arbiscan.io"),
            Environment::Mainnet,
        );

        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        // Testnet
        // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
        self.insert_default(
            11155111,
            "Sepolia",
            ("Sepolia Ether", "ETH"),
            &[
                "https://rpc.sepolia.org",
                "https://ethereum-sepolia-rpc.publicnode.com",
            ],
            Some("https://sepolia.etherscan.io"),
            Environment::Testnet,
        );
        self.insert_default(
            84532,
            "Base Sepolia",
            ("Sepolia Ether", "ETH"),
            &["https://sepolia.base.org"],
            Some("https://sepolia.basescan.org"),
            Environment::Testnet,
        );
        self.insert_default(
            421614,
            "Arbitrum Sepolia",
            ("Sepolia Ether", "ETH"),
            &["https://sepolia-rollup.arbitrum.io/rpc"],
            Some("https://sepolia.arbiscan.io"),
            Environment::Testnet,
        );
        self.insert_default(
            11155420,
            "Optimism Sepolia",
            ("Sepolia Ether", "ETH"),
            &["https://sepolia.optimism.io"],
            Some("https://sepolia-optimism.etherscan.io"),
            Environment::Testnet,
        );
        self.insert_default(
            80002,
            "Polygon Amoy",
            ("POL", "POL"),
            &["https://rpc-amoy.polygon.technology"],
            Some("https://amoy.polygonscan.com"),
            Environment::Testnet,
        );
    }

    fn insert_default(
        &mut self,
        chain_id: u64,
        name: &str,
        native: (&str, &str),
        rpc_endpoints: &[&str],
        explorer_url: Option<&str>,
        environment: Environment,
    ) {
        self.configs.insert(
            chain_id,
            ChainDescriptor {
                chain_id,
                display_name: name.to_string(),
                native_currency: NativeCurrency {
                    name: native.0.to_string(),
                    symbol: native.1.to_string(),
                    decimals: 18,
                },
                rpc_endpoints: rpc_endpoints.iter().map(|s| s.to_string()).collect(),
                explorer_url: explorer_url.map(str::to_string),
                environment,
            },
        );
    }

    /// 注册链配置（chain_id 必须唯一）
    pub fn register(&mut self, descriptor: ChainDescriptor) -> Result<(), AppError> {
        if self.configs.contains_key(&descriptor.chain_id) {
            return Err(AppError::config(format!(
                "chain {} is already registered",
                descriptor.chain_id
            )));
        }
        if descriptor.rpc_endpoints.is_empty() {
            return Err(AppError::config(format!(
                "chain {} has no rpc endpoints",
                descriptor.chain_id
            )));
        }
        self.configs.insert(descriptor.chain_id, descriptor);
        Ok(())
    }

    pub fn get(&self, chain_id: u64) -> Option<&ChainDescriptor> {
        self.configs.get(&chain_id)
    }

    /// 链所属环境；未注册的链按 testnet 处理
    pub fn chain_environment(&self, chain_id: u64) -> Environment {
        self.configs
            .get(&chain_id)
            .map(|c| c.environment)
            .unwrap_or(Environment::Testnet)
    }

    pub fn is_mainnet_chain(&self, chain_id: u64) -> bool {
        self.chain_environment(chain_id) == Environment::Mainnet
    }

    pub fn same_environment(&self, a: u64, b: u64) -> bool {
        self.chain_environment(a) == self.chain_environment(b)
    }

    /// 列出所有支持的链（按 chain_id 排序）
    pub fn list_all(&self) -> Vec<&ChainDescriptor> {
        self.configs.values().collect()
    }

    pub fn list_by_environment(&self, environment: Environment) -> Vec<&ChainDescriptor> {
        self.configs
            .values()
            .filter(|c| c.environment == environment)
            .collect()
    }

    /// 桥接目标候选：与源链同环境且不同于源链
    pub fn bridge_destinations(&self, from_chain_id: u64) -> Vec<&ChainDescriptor> {
        let environment = self.chain_environment(from_chain_id);
        self.configs
            .values()
            .filter(|c| c.environment == environment && c.chain_id != from_chain_id)
            .collect()
    }

    /// 显示名称；未知链返回 `Chain {id}`
    pub fn display_name(&self, chain_id: u64) -> String {
        self.configs
            .get(&chain_id)
            .map(|c| c.display_name.clone())
            .unwrap_or_else(|| format!("Chain {}", chain_id))
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::new()
    }
}
