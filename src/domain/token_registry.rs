//! 代币注册表
//!
//! 每个代币以符号为键，列出其部署的链及合约地址。
//! 精度按链解析：部署项可覆盖代币的规范精度（如 BSC 上的 USDT 为 18 位）。

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 单条链上部署
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDeployment {
    pub chain_id: u64,
    pub address: String,
    /// 覆盖规范精度
    #[serde(default)]
    pub decimals: Option<u8>,
}

/// 代币描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub decimals: u8,
    pub deployments: Vec<TokenDeployment>,
}

impl TokenDescriptor {
    pub fn is_deployed_on(&self, chain_id: u64) -> bool {
        self.deployments.iter().any(|d| d.chain_id == chain_id)
    }

    fn deployment(&self, chain_id: u64) -> Option<&TokenDeployment> {
        self.deployments.iter().find(|d| d.chain_id == chain_id)
    }
}

/// 解析结果：某代币在某条链上的元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedToken {
    pub symbol: String,
    pub chain_id: u64,
    pub address: String,
    pub decimals: u8,
}

/// 代币注册表
pub struct TokenRegistry {
    tokens: Vec<TokenDescriptor>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_default_tokens();
        registry
    }

    pub fn empty() -> Self {
        Self { tokens: Vec::new() }
    }

    fn register_default_tokens(&mut self) {
        self.tokens.push(TokenDescriptor {
            symbol: "USDC".to_string(),
            decimals: 6,
            deployments: vec![
                // mainnet
                deployment(1, "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
                deployment(10, "0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85"),
                deployment(137, "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359"),
                deployment(8453, "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
                deployment(42161, "0xaf88d065e77c8cC2239327C5EDb3A432268e5831"),
                // testnet
                deployment(11155111, "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238"),
                deployment(84532, "0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
                deployment(421614, "0x75faf114eafb1BDbe2F0316DF893fd58CE46AA4d"),
                deployment(11155420, "0x5fd84259d66Cd46123540766Be93DFE6D43130D7"),
            ],
        });

        self.tokens.push(TokenDescriptor {
            symbol: "USDT".to_string(),
            decimals: 6,
            deployments: vec![
                deployment(1, "0xdAC17F958D2ee523a2206206994597C13D831ec7"),
                deployment(10, "0x94b008aA00579c1307B0EF2c499aD98a8ce58e58"),
                deployment(137, "0xc2132D05D31c914a87C6611C10748AEb04B58e8F"),
                deployment(42161, "0xFd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9"),
                // BSC 上的 USDT 为 18 位精度
                TokenDeployment {
                    chain_id: 56,
                    address: "0x55d398326f99059fF775485246999027B3197955".to_string(),
                    decimals: Some(18),
                },
            ],
        });

        // Base Sepolia 测试 DAI
        self.tokens.push(TokenDescriptor {
            symbol: "DAI".to_string(),
            decimals: 18,
            deployments: vec![deployment(
                84532,
                "0x11fe4b6ae13d2a6055c8d89530d10d79d5d95d9d",
            )],
        });
    }

    /// 注册代币；同符号已存在时合并部署项
    pub fn register(&mut self, descriptor: TokenDescriptor) -> Result<(), AppError> {
        if descriptor.symbol.trim().is_empty() {
            return Err(AppError::config("token symbol must not be empty"));
        }
        let existing = self
            .tokens
            .iter_mut()
            .find(|t| t.symbol.eq_ignore_ascii_case(&descriptor.symbol));

        match existing {
            Some(token) => {
                for dep in descriptor.deployments {
                    if token.is_deployed_on(dep.chain_id) {
                        return Err(AppError::config(format!(
                            "token {} is already deployed on chain {}",
                            token.symbol, dep.chain_id
                        )));
                    }
                    // 不同的规范精度以部署级覆盖的形式保留
                    let decimals = dep.decimals.or_else(|| {
                        (descriptor.decimals != token.decimals).then_some(descriptor.decimals)
                    });
                    token.deployments.push(TokenDeployment { decimals, ..dep });
                }
            }
            None => self.tokens.push(descriptor),
        }
        Ok(())
    }

    pub fn find_by_symbol(&self, symbol: &str) -> Option<&TokenDescriptor> {
        self.tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }

    /// 按符号（不区分大小写）+ 链 ID 解析代币
    pub fn resolve_token(&self, symbol: &str, chain_id: u64) -> Option<ResolvedToken> {
        let token = self.find_by_symbol(symbol)?;
        let dep = token.deployment(chain_id)?;
        Some(ResolvedToken {
            symbol: token.symbol.clone(),
            chain_id,
            address: dep.address.clone(),
            decimals: dep.decimals.unwrap_or(token.decimals),
        })
    }

    pub fn list_all(&self) -> &[TokenDescriptor] {
        &self.tokens
    }

    /// 某条链上可用的代币
    pub fn tokens_on_chain(&self, chain_id: u64) -> Vec<&TokenDescriptor> {
        self.tokens
            .iter()
            .filter(|t| t.is_deployed_on(chain_id))
            .collect()
    }

    /// 两条链上都可用的代币（桥接候选）
    pub fn tokens_on_both(&self, from_chain_id: u64, to_chain_id: u64) -> Vec<&TokenDescriptor> {
        self.tokens
            .iter()
            .filter(|t| t.is_deployed_on(from_chain_id) && t.is_deployed_on(to_chain_id))
            .collect()
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn deployment(chain_id: u64, address: &str) -> TokenDeployment {
    TokenDeployment {
        chain_id,
        address: address.to_string(),
        decimals: None,
    }
}
