//! IronBridge - 多链转账 / 桥接编排层
//!
//! 切换钱包网络、按环境选择执行客户端、解析代币元数据、推送进度事件

pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use app_state::{AppState, BalanceOptions};
pub use error::{AppError, AppErrorCode};

pub mod prelude {
    pub use crate::{
        app_state::{AppState, BalanceOptions},
        domain::{ChainRegistry, Environment, OperationKind, ProgressEvent, ProgressStatus, TokenRegistry, TransferParams},
        error::{AppError, AppErrorCode, ErrorCategory},
        infrastructure::{ProgressListener, WalletProvider},
        service::{EngineFactory, ExecutionEngine},
    };
}
