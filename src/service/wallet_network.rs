//! 钱包网络控制
//!
//! 切换钱包到目标链；钱包不认识该链时按注册表元数据添加后重试一次切换

use std::sync::Arc;

use serde_json::json;

use crate::{
    domain::ChainRegistry,
    infrastructure::wallet_provider::{ProviderError, WalletProvider},
    utils::amount::{parse_chain_id, to_hex_chain_id},
};

pub struct WalletNetworkController {
    chains: Arc<ChainRegistry>,
}

impl WalletNetworkController {
    pub fn new(chains: Arc<ChainRegistry>) -> Self {
        Self { chains }
    }

    /// 确保钱包位于 `chain_id`
    ///
    /// 已在目标链时只发出一次切换请求。
    /// 除“未知链”外的错误原样返回；未知链且注册表无元数据时返回原始错误。
    pub async fn ensure_chain(
        &self,
        provider: &dyn WalletProvider,
        chain_id: u64,
    ) -> Result<(), ProviderError> {
        let hex_chain_id = to_hex_chain_id(chain_id);

        let err = match switch_chain(provider, &hex_chain_id).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        if !err.is_unrecognized_chain() {
            tracing::warn!(chain_id, code = ?err.code, "wallet_switchEthereumChain failed: {}", err);
            return Err(err);
        }

        let Some(descriptor) = self.chains.get(chain_id) else {
            tracing::warn!(chain_id, "wallet does not know chain and no metadata is registered");
            return Err(err);
        };

        tracing::info!(
            chain_id,
            chain = %descriptor.display_name,
            "chain unknown to wallet, adding it"
        );
        provider
            .request("wallet_addEthereumChain", json!([descriptor.add_chain_params()]))
            .await?;

        switch_chain(provider, &hex_chain_id).await
    }

    /// 钱包当前所在链
    pub async fn current_chain(&self, provider: &dyn WalletProvider) -> Result<u64, ProviderError> {
        let value = provider.request("eth_chainId", json!([])).await?;
        value
            .as_str()
            .and_then(parse_chain_id)
            .or_else(|| value.as_u64())
            .ok_or_else(|| ProviderError::transport(format!("unexpected eth_chainId result: {}", value)))
    }
}

async fn switch_chain(provider: &dyn WalletProvider, hex_chain_id: &str) -> Result<(), ProviderError> {
    provider
        .request(
            "wallet_switchEthereumChain",
            json!([{ "chainId": hex_chain_id }]),
        )
        .await
        .map(|_| ())
}
