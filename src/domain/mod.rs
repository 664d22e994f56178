//! Domain 模块
//!
//! 链 / 代币目录、请求模型与进度状态机

pub mod chain_config;
pub mod progress;
pub mod token_registry;
pub mod transfer_request;

// 重新导出常用类型
pub use chain_config::{ChainDescriptor, ChainRegistry, Environment, NativeCurrency};
pub use progress::{ProgressEvent, ProgressStateMachine, ProgressStatus};
pub use token_registry::{ResolvedToken, TokenDeployment, TokenDescriptor, TokenRegistry};
pub use transfer_request::{OperationKind, TransferParams, TransferRequest};
