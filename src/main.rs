//! IronBridge 命令行入口
//!
//! - `ironbridge catalog`：输出链 / 代币目录
//! - `ironbridge ensure-chain <chain-id>`：把 HTTP 钱包切换到目标链（必要时先添加）

use std::sync::Arc;

use anyhow::{Context, Result};
use ironbridge::{
    app_state::build_catalog,
    config::Config,
    infrastructure::{logging, wallet_provider::HttpWalletProvider},
    service::wallet_network::WalletNetworkController,
    utils::amount::parse_chain_id,
};

const USAGE: &str = "usage: ironbridge [catalog | ensure-chain <chain-id>]";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载环境变量
    dotenvy::dotenv().ok();

    // 2. 加载配置（CONFIG_PATH 指定的文件优先）
    let config = match std::env::var("CONFIG_PATH") {
        Ok(path) => Config::from_env_and_file(Some(path.as_str()))?,
        Err(_) => Config::from_env()?,
    };
    config.validate()?;

    // 3. 初始化日志
    if let Err(e) = logging::init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("catalog") => print_catalog(&config),
        Some("ensure-chain") => {
            let chain_id = args
                .get(1)
                .and_then(|s| parse_chain_id(s))
                .context(USAGE)?;
            ensure_chain(&config, chain_id).await
        }
        Some(other) => anyhow::bail!("unknown command '{}'; {}", other, USAGE),
    }
}

fn print_catalog(config: &Config) -> Result<()> {
    let (chains, tokens) = build_catalog(config)?;
    let catalog = serde_json::json!({
        "chains": chains.list_all(),
        "tokens": tokens.list_all(),
    });
    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(())
}

async fn ensure_chain(config: &Config, chain_id: u64) -> Result<()> {
    let (chains, _) = build_catalog(config)?;
    let provider = HttpWalletProvider::from_config(&config.wallet)
        .context("WALLET_RPC_URL must be set for ensure-chain")?;

    tracing::info!(chain_id, url = provider.url(), "ensuring wallet chain");

    let controller = WalletNetworkController::new(Arc::new(chains));
    controller.ensure_chain(&provider, chain_id).await?;
    let current = controller.current_chain(&provider).await?;

    println!("wallet is on chain {}", current);
    Ok(())
}
